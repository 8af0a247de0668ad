//! ElevenLabs Scribe provider adapter (§4.4 Transcription Provider Adapter).
//! Talks to the `speech-to-text` REST endpoint directly with `reqwest`
//! multipart — the original drives this through the `elevenlabs` Python SDK
//! (`examples/original_source/transcription.py`), but the wire contract it
//! exercises (`model_id`, `tag_audio_events`, `diarize`,
//! `timestamps_granularity=word`, optional `language_code`) is the same one
//! this adapter builds by hand.

use super::{SegmentTranscript, TranscribeRequest, TranscribedWord, Transcriber};
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

const ENDPOINT: &str = "https://api.elevenlabs.io/v1/speech-to-text";

pub struct ElevenLabsClient {
    http: Client,
    api_key: String,
    model_id: String,
    speaker_detection: bool,
}

impl ElevenLabsClient {
    pub fn new(api_key: String, model_id: String, speaker_detection: bool, timeout: Duration) -> Self {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http,
            api_key,
            model_id,
            speaker_detection,
        }
    }
}

#[derive(Debug, Deserialize, serde::Serialize)]
struct ApiWord {
    text: String,
    #[serde(default)]
    start: f64,
    #[serde(default)]
    end: f64,
    #[serde(rename = "type", default)]
    word_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    text: String,
    #[serde(default)]
    words: Vec<ApiWord>,
}

#[async_trait]
impl Transcriber for ElevenLabsClient {
    async fn transcribe_segment(&self, request: TranscribeRequest<'_>) -> Result<SegmentTranscript> {
        let bytes = tokio::fs::read(request.audio_path).await?;
        let file_name = request
            .audio_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "segment.mp3".to_string());

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("audio/mpeg")
            .map_err(|e| PipelineError::Validation(format!("invalid multipart mime: {e}")))?;

        let mut form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model_id", self.model_id.clone())
            .text("tag_audio_events", request.tag_audio_events.to_string())
            .text("diarize", (request.diarize && self.speaker_detection).to_string())
            .text("timestamps_granularity", "word");

        if let Some(lang) = request.language_code {
            form = form.text("language_code", lang.to_string());
        }

        let response = self
            .http
            .post(ENDPOINT)
            .header("xi-api-key", &self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    PipelineError::TransientProvider(format!("elevenlabs request failed: {e}"))
                } else {
                    PipelineError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let parsed: ApiResponse = response.json().await?;
        if parsed.text.trim().is_empty() {
            return Err(PipelineError::PermanentProvider(
                "transcription returned no text for segment".to_string(),
            ));
        }

        #[derive(serde::Serialize)]
        struct RawEnvelope<'a> {
            text: &'a str,
            words: &'a [ApiWord],
        }
        let raw = serde_json::to_value(&RawEnvelope {
            text: &parsed.text,
            words: &parsed.words,
        })?;

        let words = parsed
            .words
            .into_iter()
            .filter(|w| w.word_type.as_deref() != Some("spacing"))
            .map(|w| TranscribedWord {
                text: w.text,
                start_seconds: w.start,
                end_seconds: w.end,
            })
            .collect();

        Ok(SegmentTranscript {
            text: parsed.text,
            words,
            raw,
        })
    }

    fn name(&self) -> &'static str {
        "elevenlabs"
    }
}

/// §7 error classification: 429 and 5xx are transient (retry with backoff);
/// everything else (400, 401, 422...) is permanent.
fn classify_status(status: StatusCode, body: &str) -> PipelineError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        PipelineError::TransientProvider(format!("elevenlabs {status}: {body}"))
    } else {
        PipelineError::PermanentProvider(format!("elevenlabs {status}: {body}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_classify_status_transient_vs_permanent() {
        assert_matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, ""),
            PipelineError::TransientProvider(_)
        );
        assert_matches!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR, ""),
            PipelineError::TransientProvider(_)
        );
        assert_matches!(
            classify_status(StatusCode::UNAUTHORIZED, ""),
            PipelineError::PermanentProvider(_)
        );
        assert_matches!(
            classify_status(StatusCode::BAD_REQUEST, ""),
            PipelineError::PermanentProvider(_)
        );
    }
}
