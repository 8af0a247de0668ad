//! Google Cloud Translation provider (variant B). Grounded in the
//! original's `google.cloud.translate_v2.Client.translate`, which this
//! client reimplements against the plain `POST /language/translate/v2` REST
//! endpoint (API-key auth, no service-account SDK dependency).

use super::{Formality, TranslationOutput, TranslationProvider};
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

const ENDPOINT: &str = "https://translation.googleapis.com/language/translate/v2";
const CHUNK_LIMIT: usize = 4500;

pub struct GoogleClient {
    http: Client,
    api_key: String,
}

impl GoogleClient {
    pub fn new(api_key: String) -> Self {
        Self {
            http: Client::new(),
            api_key,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GoogleTranslation {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

#[derive(Debug, Deserialize)]
struct GoogleData {
    translations: Vec<GoogleTranslation>,
}

#[derive(Debug, Deserialize)]
struct GoogleResponse {
    data: GoogleData,
}

#[async_trait]
impl TranslationProvider for GoogleClient {
    fn supports(&self, _target_lang: &str) -> bool {
        true
    }

    fn max_chunk_chars(&self) -> usize {
        CHUNK_LIMIT
    }

    async fn translate(
        &self,
        text: &str,
        source_lang: Option<&str>,
        target_lang: &str,
        _formality: Formality,
    ) -> Result<TranslationOutput> {
        let target = super::normalize_for_provider(target_lang, "google");

        let mut params = vec![
            ("q".to_string(), text.to_string()),
            ("target".to_string(), target),
            ("format".to_string(), "text".to_string()),
            ("key".to_string(), self.api_key.clone()),
        ];
        if let Some(source) = source_lang {
            params.push(("source".to_string(), super::normalize_for_provider(source, "google")));
        }

        let response = self
            .http
            .post(ENDPOINT)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    PipelineError::TransientProvider(format!("google translate request failed: {e}"))
                } else {
                    PipelineError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let parsed: GoogleResponse = response.json().await?;
        let translated = parsed
            .data
            .translations
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::PermanentProvider("google returned no translations".into()))?
            .translated_text;

        Ok(TranslationOutput {
            text: translated,
            has_foreign: false,
        })
    }

    fn name(&self) -> &'static str {
        "google"
    }
}

fn classify_status(status: StatusCode, body: &str) -> PipelineError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        PipelineError::TransientProvider(format!("google translate {status}: {body}"))
    } else {
        PipelineError::PermanentProvider(format!("google translate {status}: {body}"))
    }
}
