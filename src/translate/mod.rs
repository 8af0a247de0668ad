//! Translation Provider Adapter (§4.7). Four interchangeable providers sit
//! behind one `TranslationProvider` trait; `engine.rs` picks among them per
//! target language and falls back when a provider can't serve the RTL
//! target (§9 redesign: providers are a strategy object, not a 150-line
//! if/elif chain like `TranslationManager.translate_text`).

pub mod deepl;
pub mod engine;
pub mod google;
pub mod langdetect;
pub mod microsoft;
pub mod openai;

use crate::config::{Config, TranslationProviderKind};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Formality hint forwarded to providers that support it (DeepL). Others
/// ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Formality {
    Default,
    More,
    Less,
}

/// One translated chunk plus whether the provider flagged untranslated
/// ("foreign") content remaining in its output (§4.7 step 8, `has_foreign`
/// — used by OpenAI's JSON-schema response and by the post-translation
/// lint pass).
#[derive(Debug, Clone)]
pub struct TranslationOutput {
    pub text: String,
    pub has_foreign: bool,
}

#[async_trait]
pub trait TranslationProvider: Send + Sync {
    /// Whether this provider can translate into `target_lang` at all
    /// (§9 Open Question / design note: DeepL variant A does not support
    /// the RTL target language).
    fn supports(&self, target_lang: &str) -> bool;

    /// Maximum characters this provider accepts per call (§4.7 step 6
    /// chunking: 2500 for the size-constrained provider, 4500 otherwise).
    fn max_chunk_chars(&self) -> usize;

    async fn translate(
        &self,
        text: &str,
        source_lang: Option<&str>,
        target_lang: &str,
        formality: Formality,
    ) -> Result<TranslationOutput>;

    fn name(&self) -> &'static str;
}

/// Normalize a language code for one provider's expected vocabulary
/// (§4.7/original `normalize_language_code`: each vendor has its own casing
/// and dialect conventions for the same ISO code).
pub fn normalize_for_provider(lang: &str, provider: &str) -> String {
    let lower = lang.to_lowercase();
    match (provider, lower.as_str()) {
        ("deepl", "en") => "EN-US".to_string(),
        ("deepl", _) => lower.to_uppercase(),
        ("microsoft", _) => lower,
        ("google", _) => lower,
        ("openai", "he") => "Hebrew".to_string(),
        ("openai", "en") => "English".to_string(),
        ("openai", "de") => "German".to_string(),
        _ => lower,
    }
}

/// Split `text` into chunks no longer than `max_chars`, breaking on
/// paragraph boundaries first and falling back to sentence boundaries, then
/// a hard cut, so a provider's size limit is never exceeded (§4.7 step 6).
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    if text.len() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for paragraph in text.split("\n\n") {
        let candidate_len = current.len() + 2 + paragraph.len();
        if current.is_empty() {
            if paragraph.len() > max_chars {
                chunks.extend(split_long_paragraph(paragraph, max_chars));
            } else {
                current.push_str(paragraph);
            }
        } else if candidate_len <= max_chars {
            current.push_str("\n\n");
            current.push_str(paragraph);
        } else {
            chunks.push(std::mem::take(&mut current));
            if paragraph.len() > max_chars {
                chunks.extend(split_long_paragraph(paragraph, max_chars));
            } else {
                current.push_str(paragraph);
            }
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn split_long_paragraph(paragraph: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for sentence in paragraph.split_inclusive(". ") {
        if current.len() + sentence.len() > max_chars && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        if sentence.len() > max_chars {
            for slice in sentence.as_bytes().chunks(max_chars) {
                chunks.push(String::from_utf8_lossy(slice).to_string());
            }
        } else {
            current.push_str(sentence);
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Every provider the process has credentials for, constructed once at
/// startup (§5 "Provider API keys are process-wide configuration, read once
/// at startup") and shared by every worker (§9: no per-call client
/// construction, no cyclic manager setters — engines take this as a
/// constructor argument).
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    pub deepl: Option<Arc<deepl::DeeplClient>>,
    pub google: Option<Arc<google::GoogleClient>>,
    pub microsoft: Option<Arc<microsoft::MicrosoftClient>>,
    /// Primary-model OpenAI client: general provider-D translation calls and
    /// the first RTL-polish pass.
    pub openai_primary: Option<Arc<openai::OpenaiClient>>,
    /// Secondary-model OpenAI client: provider-D's one retry-on-`has_foreign`
    /// pass (§4.7 step 7) and the RTL-polish pass's second model.
    pub openai_secondary: Option<Arc<openai::OpenaiClient>>,
}

impl ProviderRegistry {
    pub fn from_config(config: &Config) -> Self {
        let deepl = config
            .deepl_api_key
            .clone()
            .map(|key| Arc::new(deepl::DeeplClient::new(key, config.rtl_target_language.clone())));
        let google = config
            .google_api_key
            .clone()
            .map(|key| Arc::new(google::GoogleClient::new(key)));
        let microsoft = match (&config.microsoft_api_key, &config.microsoft_region) {
            (Some(key), Some(region)) => Some(Arc::new(microsoft::MicrosoftClient::new(
                key.clone(),
                region.clone(),
            ))),
            _ => None,
        };
        let openai_primary = config.openai_api_key.clone().map(|key| {
            Arc::new(openai::OpenaiClient::new(
                key,
                config.rtl_polish_primary_model.clone(),
            ))
        });
        let openai_secondary = config.openai_api_key.clone().map(|key| {
            Arc::new(openai::OpenaiClient::new(
                key,
                config.rtl_polish_secondary_model.clone(),
            ))
        });

        Self {
            deepl,
            google,
            microsoft,
            openai_primary,
            openai_secondary,
        }
    }

    /// Resolve a configured provider kind to its live client, as a trait
    /// object so the engine never matches on the variant again once it has
    /// picked one (§9: "the translation engine takes the interface, never a
    /// variant").
    pub fn get(&self, kind: TranslationProviderKind) -> Option<Arc<dyn TranslationProvider>> {
        match kind {
            TranslationProviderKind::Deepl => {
                self.deepl.clone().map(|c| c as Arc<dyn TranslationProvider>)
            }
            TranslationProviderKind::Google => {
                self.google.clone().map(|c| c as Arc<dyn TranslationProvider>)
            }
            TranslationProviderKind::Microsoft => self
                .microsoft
                .clone()
                .map(|c| c as Arc<dyn TranslationProvider>),
            TranslationProviderKind::Openai => self
                .openai_primary
                .clone()
                .map(|c| c as Arc<dyn TranslationProvider>),
        }
    }

    /// The first configured provider (other than `exclude`) that supports
    /// `target_lang` — used for the RTL routing fallback (§4.7 step 3).
    pub fn fallback_for(
        &self,
        target_lang: &str,
        exclude: TranslationProviderKind,
    ) -> Option<(TranslationProviderKind, Arc<dyn TranslationProvider>)> {
        for kind in [
            TranslationProviderKind::Openai,
            TranslationProviderKind::Google,
            TranslationProviderKind::Microsoft,
            TranslationProviderKind::Deepl,
        ] {
            if kind == exclude {
                continue;
            }
            if let Some(provider) = self.get(kind) {
                if provider.supports(target_lang) {
                    return Some((kind, provider));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_text_under_limit_returns_single_chunk() {
        let chunks = chunk_text("short text", 100);
        assert_eq!(chunks, vec!["short text".to_string()]);
    }

    #[test]
    fn test_chunk_text_splits_on_paragraphs() {
        let text = format!("{}\n\n{}", "a".repeat(40), "b".repeat(40));
        let chunks = chunk_text(&text, 50);
        assert_eq!(chunks.len(), 2);
        for c in &chunks {
            assert!(c.len() <= 50);
        }
    }

    #[test]
    fn test_normalize_for_provider_deepl_english_variant() {
        assert_eq!(normalize_for_provider("en", "deepl"), "EN-US");
        assert_eq!(normalize_for_provider("de", "deepl"), "DE");
    }

    #[test]
    fn test_normalize_for_provider_openai_uses_language_names() {
        assert_eq!(normalize_for_provider("he", "openai"), "Hebrew");
    }
}
