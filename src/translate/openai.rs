//! OpenAI provider (variant D): an LLM translator used both as a regular
//! target-language provider and as the RTL-polish pass (§4.7 step 9, Open
//! Question #4 — polish models are configuration, not a hardcoded
//! contract). Forces a strict JSON response shape
//! `{"translation": "...", "has_foreign": bool}` so the engine can lint for
//! leftover source-language text without a second round-trip (SPEC_FULL
//! supplement grounded in the original's `has_foreign`/quality-check
//! follow-up calls).

use super::{Formality, TranslationOutput, TranslationProvider};
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;

const ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const CHUNK_LIMIT: usize = 4500;

pub struct OpenaiClient {
    http: Client,
    api_key: String,
    model: String,
}

impl OpenaiClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            http: Client::new(),
            api_key,
            model,
        }
    }

    /// The RTL-polish pass (§4.7 step 9): re-run a finished translation
    /// through a second model to catch untranslated phrases and fix RTL
    /// punctuation/number placement, guided by an optional glossary.
    pub async fn polish(&self, text: &str, target_lang: &str, glossary: Option<&str>) -> Result<TranslationOutput> {
        let target_name = super::normalize_for_provider(target_lang, "openai");
        let mut system = format!(
            "You are a meticulous {target_name} copy editor for right-to-left subtitle text. \
             Fix any leftover untranslated words, correct punctuation and digit placement for \
             right-to-left display, and preserve meaning and line breaks exactly."
        );
        if let Some(glossary) = glossary {
            system.push_str(&format!("\n\nUse this glossary where applicable:\n{glossary}"));
        }
        self.call_schema(&system, text).await
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageContent,
}

#[derive(Deserialize)]
struct ChatMessageContent {
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct TranslationSchema {
    translation: String,
    #[serde(default)]
    has_foreign: bool,
}

impl OpenaiClient {
    async fn call_schema(&self, system_prompt: &str, user_content: &str) -> Result<TranslationOutput> {
        let body = json!({
            "model": self.model,
            "messages": [
                ChatMessage { role: "system", content: system_prompt.to_string() },
                ChatMessage { role: "user", content: user_content.to_string() },
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": "translation_result",
                    "strict": true,
                    "schema": {
                        "type": "object",
                        "properties": {
                            "translation": { "type": "string" },
                            "has_foreign": { "type": "boolean" }
                        },
                        "required": ["translation", "has_foreign"],
                        "additionalProperties": false
                    }
                }
            }
        });

        let response = self
            .http
            .post(ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    PipelineError::TransientProvider(format!("openai request failed: {e}"))
                } else {
                    PipelineError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &text));
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::PermanentProvider("openai returned no choices".into()))?
            .message
            .content;

        let schema: TranslationSchema = serde_json::from_str(&content).map_err(|e| {
            PipelineError::PermanentProvider(format!("openai response did not match schema: {e}"))
        })?;

        Ok(TranslationOutput {
            text: schema.translation,
            has_foreign: schema.has_foreign,
        })
    }
}

#[async_trait]
impl TranslationProvider for OpenaiClient {
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
        formality: Formality,
    ) -> Result<TranslationOutput> {
        let target_name = super::normalize_for_provider(target_lang, "openai");
        let formality_hint = match formality {
            Formality::More => "Use a formal register.",
            Formality::Less => "Use a casual, informal register.",
            Formality::Default => "Use a neutral register.",
        };
        let source_hint = source_lang
            .map(|s| format!("The source language is {s}."))
            .unwrap_or_default();
        let system = format!(
            "Translate the user's text into {target_name}. {formality_hint} {source_hint} \
             Preserve paragraph breaks. If any words could not be translated, set has_foreign to true."
        );
        self.call_schema(&system, text).await
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

fn classify_status(status: StatusCode, body: &str) -> PipelineError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        PipelineError::TransientProvider(format!("openai {status}: {body}"))
    } else {
        PipelineError::PermanentProvider(format!("openai {status}: {body}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_supports_every_language() {
        let client = OpenaiClient::new("key".to_string(), "gpt-4o".to_string());
        assert!(client.supports("he"));
    }
}
