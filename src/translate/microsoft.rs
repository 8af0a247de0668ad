//! Microsoft Translator provider (variant C). REST contract grounded in the
//! original's `_translate_with_microsoft` (a raw `requests` call against the
//! Cognitive Services Translator endpoint): `POST /translate` with
//! `api-version`, `from`, `to` query params, a region header, and a JSON
//! array body `[{"Text": "..."}]`. The original uses a lower chunk limit
//! (2500 chars) than the other providers (§4.7 step 6).

use super::{Formality, TranslationOutput, TranslationProvider};
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

const ENDPOINT: &str = "https://api.cognitive.microsofttranslator.com/translate";
const CHUNK_LIMIT: usize = 2500;

pub struct MicrosoftClient {
    http: Client,
    api_key: String,
    region: String,
}

impl MicrosoftClient {
    pub fn new(api_key: String, region: String) -> Self {
        Self {
            http: Client::new(),
            api_key,
            region,
        }
    }
}

#[derive(Serialize)]
struct RequestEntry<'a> {
    #[serde(rename = "Text")]
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct ResponseTranslation {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ResponseEntry {
    translations: Vec<ResponseTranslation>,
}

#[async_trait]
impl TranslationProvider for MicrosoftClient {
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
        let target = super::normalize_for_provider(target_lang, "microsoft");
        let mut query = vec![("api-version", "3.0".to_string()), ("to", target)];
        if let Some(source) = source_lang {
            query.push(("from", super::normalize_for_provider(source, "microsoft")));
        }

        let response = self
            .http
            .post(ENDPOINT)
            .query(&query)
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .header("Ocp-Apim-Subscription-Region", &self.region)
            .json(&[RequestEntry { text }])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    PipelineError::TransientProvider(format!("microsoft translator request failed: {e}"))
                } else {
                    PipelineError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let parsed: Vec<ResponseEntry> = response.json().await?;
        let translated = parsed
            .into_iter()
            .next()
            .and_then(|entry| entry.translations.into_iter().next())
            .ok_or_else(|| PipelineError::PermanentProvider("microsoft returned no translations".into()))?
            .text;

        Ok(TranslationOutput {
            text: translated,
            has_foreign: false,
        })
    }

    fn name(&self) -> &'static str {
        "microsoft"
    }
}

fn classify_status(status: StatusCode, body: &str) -> PipelineError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        PipelineError::TransientProvider(format!("microsoft translator {status}: {body}"))
    } else {
        PipelineError::PermanentProvider(format!("microsoft translator {status}: {body}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_microsoft_chunk_limit_is_lower_than_default() {
        let client = MicrosoftClient::new("key".to_string(), "westus".to_string());
        assert_eq!(client.max_chunk_chars(), 2500);
    }
}
