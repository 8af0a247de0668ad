//! DeepL provider (variant A). Grounded in the REST contract the original's
//! `deepl.Translator.translate_text` wraps: `POST /v2/translate` with
//! `text[]`, `target_lang`, optional `source_lang`, and `formality`. Does
//! not support the RTL target language (design note / Open Question #6).

use super::{Formality, TranslationOutput, TranslationProvider};
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

const CHUNK_LIMIT: usize = 4500;

pub struct DeeplClient {
    http: Client,
    api_key: String,
    endpoint: String,
    rtl_target_language: String,
}

impl DeeplClient {
    pub fn new(api_key: String, rtl_target_language: String) -> Self {
        let endpoint = if api_key.ends_with(":fx") {
            "https://api-free.deepl.com/v2/translate".to_string()
        } else {
            "https://api.deepl.com/v2/translate".to_string()
        };
        Self {
            http: Client::new(),
            api_key,
            endpoint,
            rtl_target_language,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DeeplResponseEntry {
    text: String,
}

#[derive(Debug, Deserialize)]
struct DeeplResponse {
    translations: Vec<DeeplResponseEntry>,
}

#[async_trait]
impl TranslationProvider for DeeplClient {
    fn supports(&self, target_lang: &str) -> bool {
        target_lang != self.rtl_target_language
    }

    fn max_chunk_chars(&self) -> usize {
        CHUNK_LIMIT
    }

    async fn translate(
        &self,
        text: &str,
        source_lang: Option<&str>,
        target_lang: &str,
        formality: Formality,
    ) -> Result<TranslationOutput> {
        if !self.supports(target_lang) {
            return Err(PipelineError::Validation(format!(
                "deepl does not support target language {target_lang}"
            )));
        }

        let target = super::normalize_for_provider(target_lang, "deepl");
        let formality_param = match formality {
            Formality::More => "prefer_more",
            Formality::Less => "prefer_less",
            Formality::Default => "default",
        };

        let mut form = vec![
            ("text".to_string(), text.to_string()),
            ("target_lang".to_string(), target),
            ("formality".to_string(), formality_param.to_string()),
        ];
        if let Some(source) = source_lang {
            form.push((
                "source_lang".to_string(),
                super::normalize_for_provider(source, "deepl_source"),
            ));
        }

        let response = self
            .http
            .post(&self.endpoint)
            .header("Authorization", format!("DeepL-Auth-Key {}", self.api_key))
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    PipelineError::TransientProvider(format!("deepl request failed: {e}"))
                } else {
                    PipelineError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let parsed: DeeplResponse = response.json().await?;
        let translated = parsed
            .translations
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::PermanentProvider("deepl returned no translations".into()))?
            .text;

        Ok(TranslationOutput {
            text: translated,
            has_foreign: false,
        })
    }

    fn name(&self) -> &'static str {
        "deepl"
    }
}

fn classify_status(status: StatusCode, body: &str) -> PipelineError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        PipelineError::TransientProvider(format!("deepl {status}: {body}"))
    } else {
        PipelineError::PermanentProvider(format!("deepl {status}: {body}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supports_rejects_rtl_target() {
        let client = DeeplClient::new("key".to_string(), "he".to_string());
        assert!(!client.supports("he"));
        assert!(client.supports("en"));
    }

    #[test]
    fn test_free_tier_key_uses_free_endpoint() {
        let client = DeeplClient::new("abc:fx".to_string(), "he".to_string());
        assert!(client.endpoint.contains("api-free"));
    }
}
