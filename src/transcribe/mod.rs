//! Transcription Provider Adapter + Engine (design doc §4.6).

pub mod elevenlabs;
pub mod engine;
pub mod srt;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A single word with timestamps relative to the audio clip it was
/// transcribed from (segment-local, not yet offset by the segment's start).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscribedWord {
    pub text: String,
    pub start_seconds: f64,
    pub end_seconds: f64,
}

/// The provider's response for one audio clip (one segment, or the whole
/// file when it didn't need splitting).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentTranscript {
    pub text: String,
    pub words: Vec<TranscribedWord>,
    /// The raw provider JSON, kept verbatim for `<stem>.txt.segments.json`
    /// (§6 on-disk output; mirrors the original's debug dump).
    pub raw: serde_json::Value,
}

/// Parameters for one transcription call (§4.6 step 4).
#[derive(Debug, Clone)]
pub struct TranscribeRequest<'a> {
    pub audio_path: &'a Path,
    /// ISO 639 source-language hint; `None` requests provider auto-detect.
    pub language_code: Option<&'a str>,
    pub tag_audio_events: bool,
    pub diarize: bool,
}

/// Trait for transcription providers. Only ElevenLabs Scribe is implemented
/// (Resolved Open Question: transcription provider), but the seam exists so
/// an additional provider can be added without touching `engine.rs`.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe_segment(&self, request: TranscribeRequest<'_>) -> Result<SegmentTranscript>;

    fn name(&self) -> &'static str;
}
