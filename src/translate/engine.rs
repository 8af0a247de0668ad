//! Translation Engine (§4.7): per-(file, target language) orchestration.
//! Reads the transcript, optionally routes paragraphs already in the target
//! language around translation, chunks, calls the resolved provider (with a
//! routing fallback for targets the chosen provider can't serve), runs the
//! provider-D lint/retry and RTL-polish passes, writes `<lang>.txt`, and
//! re-times `<lang>.srt` from the already-produced `orig.srt`.

use super::langdetect;
use super::{chunk_text, Formality, ProviderRegistry, TranslationOutput, TranslationProvider};
use crate::config::{Config, TranslationProviderKind};
use crate::error::{PipelineError, Result};
use crate::layout::ArtifactLayout;
use crate::store::models::{MediaFile, StageStatus, StatusUpdate};
use crate::store::Store;
use crate::transcribe::srt::{self, Cue};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Inter-chunk sleep (§4.7 step 6: "a short inter-chunk sleep"). Not part of
/// the named Configuration object, so a fixed small constant rather than a
/// new config field.
const CHUNK_PAUSE: Duration = Duration::from_millis(500);

/// Up to this many glossary entries are forwarded to the RTL-polish system
/// prompt (§4.7 step 8).
const GLOSSARY_LIMIT: usize = 200;

pub struct TranslationEngine<'a> {
    pub store: &'a Store,
    pub layout: &'a ArtifactLayout,
    pub config: &'a Config,
    pub providers: &'a ProviderRegistry,
    /// Caller's provider override (§4.7 step 3); `None` uses the configured
    /// default for the target language.
    pub provider_override: Option<TranslationProviderKind>,
    pub force: bool,
}

impl<'a> TranslationEngine<'a> {
    /// Run the full translation stage for one (file, target language) pair
    /// (§4.7 steps 1-11). Returns `Ok(true)` on success, `Ok(false)` if the
    /// stage was marked `failed`, and `Err` only for unexpected store/I-O
    /// failures that should abort the worker loop.
    pub async fn translate_file(&self, media: &MediaFile, target_lang: &str) -> Result<bool> {
        let file_id = media
            .file_id
            .parse()
            .map_err(|_| PipelineError::Validation("invalid file_id in media_files row".into()))?;
        let stage_tag = format!("translation_{target_lang}");

        let status = self
            .store
            .get_status(file_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(file_id.to_string()))?;

        if status.transcription() != StageStatus::Completed {
            let message = "transcription is not completed".to_string();
            self.store.log_error(file_id, &stage_tag, &message, None).await?;
            self.store
                .update_status(
                    file_id,
                    StatusUpdate::translation(target_lang, StageStatus::Failed),
                )
                .await?;
            return Ok(false);
        }

        if !self.force && status.translation_status(target_lang) == Some(StageStatus::Completed) {
            return Ok(true);
        }

        let transcript_path = self.layout.transcript_path(&media.safe_filename);
        let transcript = std::fs::read_to_string(&transcript_path).map_err(PipelineError::Io)?;
        if transcript.trim().is_empty() {
            let message = format!("transcript file is empty: {}", transcript_path.display());
            self.store.log_error(file_id, &stage_tag, &message, None).await?;
            self.store
                .update_status(
                    file_id,
                    StatusUpdate::translation(target_lang, StageStatus::Failed),
                )
                .await?;
            return Ok(false);
        }

        self.store
            .update_status(
                file_id,
                StatusUpdate::translation(target_lang, StageStatus::InProgress),
            )
            .await?;

        match self.try_translate(media, target_lang, &transcript).await {
            Ok(()) => {
                self.store
                    .update_status(
                        file_id,
                        StatusUpdate::translation(target_lang, StageStatus::Completed),
                    )
                    .await?;
                self.store.clear_errors(Some(file_id), Some(&stage_tag)).await?;
                self.maybe_promote_overall(file_id).await?;
                Ok(true)
            }
            Err(err) => {
                warn!(
                    "translation to {target_lang} failed for {}: {err}",
                    media.original_path
                );
                self.store
                    .log_error(file_id, &stage_tag, "translation failed", Some(&err.to_string()))
                    .await?;
                self.store
                    .update_status(
                        file_id,
                        StatusUpdate::translation(target_lang, StageStatus::Failed),
                    )
                    .await?;
                Ok(false)
            }
        }
    }

    async fn try_translate(&self, media: &MediaFile, target_lang: &str, transcript: &str) -> Result<()> {
        let provider_kind = self
            .provider_override
            .unwrap_or_else(|| self.config.provider_for_target(target_lang));
        let provider = self
            .providers
            .get(provider_kind)
            .ok_or_else(|| PipelineError::Configuration(format!("no credentials for provider {provider_kind}")))?;

        let source_lang = media.detected_language.clone();
        let formality = Formality::Default;

        let translated = if target_lang == self.config.default_western_target
            && self.paragraph_routing_enabled()
        {
            self.translate_with_paragraph_routing(
                transcript,
                target_lang,
                source_lang.as_deref(),
                provider_kind,
                &provider,
                formality,
            )
            .await?
        } else {
            self.translate_whole(
                transcript,
                target_lang,
                source_lang.as_deref(),
                provider_kind,
                &provider,
                formality,
            )
            .await?
        };

        let translation_path = self.layout.translation_path(&media.safe_filename, target_lang);
        std::fs::write(&translation_path, &translated)?;

        let orig_srt_path = self.layout.orig_srt_path(&media.safe_filename);
        if orig_srt_path.exists() {
            let orig_srt = std::fs::read_to_string(&orig_srt_path)?;
            let parsed = srt::parse_srt(&orig_srt);
            if !parsed.is_empty() {
                let cues = retime_cues(&parsed, &translated);
                let subtitle_path = self.layout.subtitle_path(&media.safe_filename, target_lang);
                std::fs::write(&subtitle_path, srt::render_srt(&cues))?;
            }
        }

        Ok(())
    }

    fn paragraph_routing_enabled(&self) -> bool {
        // §4.7 step 5: "a language-detection capability is available" — the
        // cheap heuristic in `langdetect` is always available, so paragraph
        // routing is always on for the default Western target.
        true
    }

    /// §4.7 step 5: split on blank lines; paragraphs already in the target
    /// language pass through unchanged, others are translated; rejoin with
    /// `\n\n`.
    async fn translate_with_paragraph_routing(
        &self,
        transcript: &str,
        target_lang: &str,
        source_lang: Option<&str>,
        provider_kind: TranslationProviderKind,
        provider: &Arc<dyn TranslationProvider>,
        formality: Formality,
    ) -> Result<String> {
        let paragraphs: Vec<&str> = transcript.split("\n\n").collect();
        let mut out = Vec::with_capacity(paragraphs.len());

        for paragraph in paragraphs {
            if langdetect::matches_target_language(paragraph, target_lang, &self.config.rtl_target_language) {
                out.push(paragraph.to_string());
                continue;
            }
            let translated = self
                .translate_text(paragraph, target_lang, source_lang, provider_kind, provider, formality)
                .await?;
            out.push(translated);
        }

        Ok(out.join("\n\n"))
    }

    async fn translate_whole(
        &self,
        transcript: &str,
        target_lang: &str,
        source_lang: Option<&str>,
        provider_kind: TranslationProviderKind,
        provider: &Arc<dyn TranslationProvider>,
        formality: Formality,
    ) -> Result<String> {
        self.translate_text(transcript, target_lang, source_lang, provider_kind, provider, formality)
            .await
    }

    /// Routes around a provider that can't serve `target_lang` (§4.7 step 3
    /// / spec.md §4.5: variant A can't target the RTL language). Chunks per
    /// §4.7 step 6, runs the provider-D lint/retry for OpenAI (§4.7 step 7),
    /// and the RTL-polish pass (§4.7 step 8) when applicable.
    async fn translate_text(
        &self,
        text: &str,
        target_lang: &str,
        source_lang: Option<&str>,
        provider_kind: TranslationProviderKind,
        provider: &Arc<dyn TranslationProvider>,
        formality: Formality,
    ) -> Result<String> {
        let draft = if provider.supports(target_lang) {
            self.translate_chunked(text, source_lang, target_lang, provider_kind, provider, formality)
                .await?
        } else {
            self.translate_via_fallback_route(text, source_lang, target_lang, provider_kind, formality)
                .await?
        };

        if target_lang == self.config.rtl_target_language {
            return Ok(self.maybe_polish_rtl(text, &draft, target_lang).await);
        }

        Ok(draft)
    }

    /// §4.7 step 3 routing fallback: translate to the intermediate
    /// (default Western) language via the chosen provider, then route the
    /// intermediate text through a provider that supports the target.
    async fn translate_via_fallback_route(
        &self,
        text: &str,
        source_lang: Option<&str>,
        target_lang: &str,
        provider_kind: TranslationProviderKind,
        formality: Formality,
    ) -> Result<String> {
        let intermediate_lang = self.config.default_western_target.clone();
        let intermediate_provider = self
            .providers
            .get(provider_kind)
            .ok_or_else(|| PipelineError::Configuration(format!("no credentials for provider {provider_kind}")))?;

        info!(
            "{provider_kind} does not support {target_lang}; routing via intermediate language {intermediate_lang}"
        );

        let intermediate_text = self
            .translate_chunked(
                text,
                source_lang,
                &intermediate_lang,
                provider_kind,
                &intermediate_provider,
                formality,
            )
            .await?;

        let (fallback_kind, fallback_provider) = self
            .providers
            .fallback_for(target_lang, provider_kind)
            .ok_or_else(|| {
                PipelineError::Configuration(format!("no provider available that supports {target_lang}"))
            })?;

        self.translate_chunked(
            &intermediate_text,
            Some(&intermediate_lang),
            target_lang,
            fallback_kind,
            &fallback_provider,
            formality,
        )
        .await
    }

    async fn translate_chunked(
        &self,
        text: &str,
        source_lang: Option<&str>,
        target_lang: &str,
        provider_kind: TranslationProviderKind,
        provider: &Arc<dyn TranslationProvider>,
        formality: Formality,
    ) -> Result<String> {
        let chunks = chunk_text(text, provider.max_chunk_chars());
        let mut translated_chunks = Vec::with_capacity(chunks.len());

        for (index, chunk) in chunks.iter().enumerate() {
            let output = if provider_kind == TranslationProviderKind::Openai {
                self.translate_openai_chunk(chunk, source_lang, target_lang, formality).await?
            } else {
                provider.translate(chunk, source_lang, target_lang, formality).await?
            };
            translated_chunks.push(output.text);

            if index + 1 < chunks.len() {
                tokio::time::sleep(CHUNK_PAUSE).await;
            }
        }

        Ok(translated_chunks.join(""))
    }

    /// §4.7 step 7 provider-D path: one primary-model call, a single
    /// secondary-model retry if `has_foreign`, then a lint that fails the
    /// translation outright if source-language diacritics survive both
    /// passes.
    async fn translate_openai_chunk(
        &self,
        chunk: &str,
        source_lang: Option<&str>,
        target_lang: &str,
        formality: Formality,
    ) -> Result<TranslationOutput> {
        let primary = self
            .providers
            .openai_primary
            .clone()
            .ok_or_else(|| PipelineError::Configuration("no credentials for provider openai".into()))?;

        let mut output = primary.translate(chunk, source_lang, target_lang, formality).await?;

        if output.has_foreign {
            if let Some(secondary) = &self.providers.openai_secondary {
                warn!("openai primary pass left foreign text; retrying with secondary model");
                output = secondary
                    .translate(&output.text, source_lang, target_lang, formality)
                    .await?;
            }
        }

        if langdetect::contains_source_diacritics(&output.text, source_lang) {
            return Err(PipelineError::PermanentProvider(
                "translation still contains source-language characters after both openai passes".into(),
            ));
        }

        Ok(output)
    }

    /// §4.7 step 8: only runs when the target is the RTL language and both
    /// an OpenAI client and a glossary file are configured. Failure here
    /// keeps the draft rather than failing the whole translation.
    async fn maybe_polish_rtl(&self, source_text: &str, draft: &str, target_lang: &str) -> String {
        if target_lang != self.config.rtl_target_language {
            return draft.to_string();
        }
        let Some(polisher) = &self.providers.openai_primary else {
            return draft.to_string();
        };
        let Some(glossary_path) = &self.config.rtl_polish_glossary_path else {
            return draft.to_string();
        };

        let glossary = match std::fs::read_to_string(glossary_path) {
            Ok(contents) => Some(truncate_glossary(&contents, GLOSSARY_LIMIT)),
            Err(e) => {
                warn!("could not read RTL polish glossary {}: {e}", glossary_path.display());
                None
            }
        };

        let combined = format!(
            "Source text:\n{source_text}\n\nDraft translation:\n{draft}\n\nReturn the polished translation only."
        );

        match polisher.polish(&combined, target_lang, glossary.as_deref()).await {
            Ok(output) => output.text,
            Err(e) => {
                warn!("RTL polish pass failed, keeping draft translation: {e}");
                draft.to_string()
            }
        }
    }

    async fn maybe_promote_overall(&self, file_id: uuid::Uuid) -> Result<()> {
        let status = self
            .store
            .get_status(file_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(file_id.to_string()))?;

        if status.transcription() != StageStatus::Completed {
            return Ok(());
        }

        let all_complete = self
            .config
            .target_languages
            .iter()
            .all(|lang| status.translation_status(lang) == Some(StageStatus::Completed));

        if all_complete {
            self.store
                .update_status(
                    file_id,
                    StatusUpdate::overall(crate::store::models::OverallStatus::Completed),
                )
                .await?;
        }

        Ok(())
    }
}

/// Keep only the first `limit` non-empty glossary lines — §4.7 step 8
/// bounds the system prompt to 200 `source -> target` mappings.
fn truncate_glossary(contents: &str, limit: usize) -> String {
    contents
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(limit)
        .collect::<Vec<_>>()
        .join("\n")
}

fn split_sentences(text: &str, delimiters: &[char]) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        current.push(c);
        if delimiters.contains(&c) {
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                out.push(trimmed.to_string());
            }
            current.clear();
        }
    }
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
    out
}

/// Group `sentences` into `cue_count` contiguous buckets of proportional
/// size (extra sentences land on the earliest buckets).
fn distribute_sentences(sentences: &[String], cue_count: usize) -> Vec<String> {
    let n = sentences.len();
    let base = n / cue_count;
    let remainder = n % cue_count;
    let mut buckets = Vec::with_capacity(cue_count);
    let mut index = 0;
    for i in 0..cue_count {
        let take = base + usize::from(i < remainder);
        let end = (index + take).min(n);
        buckets.push(sentences[index..end].join(" "));
        index = end;
    }
    buckets
}

/// Snap a character-index cut point to the nearest preceding whitespace
/// (within a small window) so a word is never cut in half; falls back to
/// the first whitespace found going forward, then the raw cut.
fn snap_to_whitespace(chars: &[char], cut: usize) -> usize {
    const WINDOW: usize = 20;
    if cut >= chars.len() {
        return chars.len();
    }
    let back_limit = cut.saturating_sub(WINDOW);
    for i in (back_limit..=cut).rev() {
        if i > 0 && chars[i - 1].is_whitespace() {
            return i;
        }
    }
    let forward_limit = (cut + WINDOW).min(chars.len());
    for i in cut..forward_limit {
        if chars[i].is_whitespace() {
            return i + 1;
        }
    }
    cut
}

/// Split `translated` into `cue_lens.len()` pieces whose character lengths
/// are proportional to each original cue's text length, cutting only at
/// whitespace boundaries (§4.7 step 10, the non-sentence path).
fn distribute_by_length(translated: &str, cue_lens: &[usize]) -> Vec<String> {
    let chars: Vec<char> = translated.chars().collect();
    let total_len: usize = cue_lens.iter().sum::<usize>().max(1);
    let mut pieces = Vec::with_capacity(cue_lens.len());
    let mut pos = 0usize;

    for (i, &len) in cue_lens.iter().enumerate() {
        if i + 1 == cue_lens.len() {
            let piece: String = chars[pos..].iter().collect();
            pieces.push(piece.trim().to_string());
            break;
        }
        let target = ((len as f64 / total_len as f64) * chars.len() as f64).round() as usize;
        let raw_cut = (pos + target).min(chars.len());
        let cut = snap_to_whitespace(&chars, raw_cut).max(pos);
        let piece: String = chars[pos..cut].iter().collect();
        pieces.push(piece.trim().to_string());
        pos = cut;
    }

    while pieces.len() < cue_lens.len() {
        pieces.push(pieces.last().cloned().unwrap_or_default());
    }

    pieces
}

/// §4.7 step 10: re-time a translation across the already-produced
/// `orig.srt` cues, preserving each cue's index and timestamp but replacing
/// its text.
fn retime_cues(parsed: &[srt::ParsedCue], translated_text: &str) -> Vec<Cue> {
    let cue_count = parsed.len();
    if cue_count == 0 {
        return Vec::new();
    }

    let sentences = {
        let first_pass = split_sentences(translated_text, &['.', '!', '?']);
        if first_pass.len() >= cue_count {
            first_pass
        } else {
            let second_pass = split_sentences(translated_text, &[',', ';', ':']);
            if second_pass.len() >= cue_count {
                second_pass
            } else {
                Vec::new()
            }
        }
    };

    let pieces = if !sentences.is_empty() {
        distribute_sentences(&sentences, cue_count)
    } else {
        let cue_lens: Vec<usize> = parsed.iter().map(|c| c.text.chars().count().max(1)).collect();
        distribute_by_length(translated_text, &cue_lens)
    };

    parsed
        .iter()
        .zip(pieces.into_iter().chain(std::iter::repeat(String::new())))
        .map(|(cue, text)| Cue {
            index: cue.index,
            start_seconds: cue.start_seconds,
            end_seconds: cue.end_seconds,
            text,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed_cue(index: usize, start: f64, end: f64, text: &str) -> srt::ParsedCue {
        srt::ParsedCue {
            index,
            start_seconds: start,
            end_seconds: end,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_truncate_glossary_limits_lines() {
        let contents = (0..300).map(|i| format!("w{i}=x{i}")).collect::<Vec<_>>().join("\n");
        let truncated = truncate_glossary(&contents, 200);
        assert_eq!(truncated.lines().count(), 200);
    }

    #[test]
    fn test_split_sentences_on_terminal_punctuation() {
        let sentences = split_sentences("Hello there. How are you? Fine!", &['.', '!', '?']);
        assert_eq!(sentences.len(), 3);
        assert_eq!(sentences[0], "Hello there.");
    }

    #[test]
    fn test_distribute_sentences_proportional() {
        let sentences = vec!["a.".to_string(), "b.".to_string(), "c.".to_string(), "d.".to_string()];
        let buckets = distribute_sentences(&sentences, 2);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0], "a. b.");
        assert_eq!(buckets[1], "c. d.");
    }

    #[test]
    fn test_distribute_by_length_snaps_to_whitespace() {
        let translated = "one two three four five six seven eight";
        let pieces = distribute_by_length(translated, &[10, 10, 10]);
        assert_eq!(pieces.len(), 3);
        for piece in &pieces {
            assert!(!piece.starts_with(' ') && !piece.ends_with(' '));
        }
        assert_eq!(pieces.join(" ").split_whitespace().collect::<Vec<_>>().join(" "), translated);
    }

    #[test]
    fn test_retime_cues_preserves_index_and_timestamps() {
        let parsed = vec![
            parsed_cue(1, 0.0, 1.0, "hi there"),
            parsed_cue(2, 1.0, 2.0, "how are you"),
        ];
        let cues = retime_cues(&parsed, "Hallo zusammen. Wie geht es dir.");
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].index, 1);
        assert_eq!(cues[0].start_seconds, 0.0);
        assert_eq!(cues[1].end_seconds, 2.0);
        assert!(!cues[0].text.is_empty());
        assert!(!cues[1].text.is_empty());
    }

    #[test]
    fn test_retime_cues_empty_input_yields_no_cues() {
        assert!(retime_cues(&[], "anything").is_empty());
    }

    #[test]
    fn test_retime_cues_pads_with_last_piece_when_short_on_sentences() {
        let parsed = vec![
            parsed_cue(1, 0.0, 1.0, "a"),
            parsed_cue(2, 1.0, 2.0, "b"),
            parsed_cue(3, 2.0, 3.0, "c"),
        ];
        // Only one sentence and not enough comma-separated clauses either —
        // falls through to the character-length path, which always
        // produces exactly `cue_count` pieces.
        let cues = retime_cues(&parsed, "short");
        assert_eq!(cues.len(), 3);
    }
}
