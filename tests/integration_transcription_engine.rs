//! Integration test for the Transcription Engine (§4.6): a fake provider
//! (no network) driven through the full per-file pipeline — split decision,
//! per-segment calls, word-timestamp stitching, artifact writes, and the
//! store status transition — the way `wiremock`-style fakes stand in for
//! the teacher's own provider mocks.

use async_trait::async_trait;
use scribe_pipeline::config::Config;
use scribe_pipeline::error::Result;
use scribe_pipeline::layout::ArtifactLayout;
use scribe_pipeline::store::models::{MediaType, StageStatus};
use scribe_pipeline::store::Store;
use scribe_pipeline::transcribe::engine::TranscriptionEngine;
use scribe_pipeline::transcribe::{SegmentTranscript, TranscribeRequest, TranscribedWord, Transcriber};
use std::sync::atomic::{AtomicUsize, Ordering};

struct FakeTranscriber {
    calls: AtomicUsize,
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe_segment(&self, request: TranscribeRequest<'_>) -> Result<SegmentTranscript> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let text = format!("hello from {}", request.audio_path.display());
        Ok(SegmentTranscript {
            text: text.clone(),
            words: vec![
                TranscribedWord { text: "hello".into(), start_seconds: 0.0, end_seconds: 0.4 },
                TranscribedWord { text: "world".into(), start_seconds: 0.5, end_seconds: 1.0 },
            ],
            raw: serde_json::json!({ "text": text }),
        })
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

#[tokio::test]
async fn test_transcribe_file_writes_artifacts_and_completes() {
    let store = Store::connect_in_memory().await.unwrap();
    let tmp = tempfile::tempdir().unwrap();
    let layout = ArtifactLayout::new(tmp.path());
    let mut config = Config::default();
    config.force_language = Some("en".to_string());
    let transcriber = FakeTranscriber { calls: AtomicUsize::new(0) };

    let source = tmp.path().join("interview.mp3");
    std::fs::write(&source, b"not real audio, just bytes").unwrap();

    let file_id = store
        .add_media(source.to_str().unwrap(), "interview.mp3", MediaType::Audio, None, None, None, None)
        .await
        .unwrap();
    let media = store.get_media(file_id).await.unwrap().unwrap();

    let engine = TranscriptionEngine {
        store: &store,
        layout: &layout,
        transcriber: &transcriber,
        config: &config,
    };

    let ok = engine.transcribe_file(&media).await.unwrap();
    assert!(ok);
    assert_eq!(transcriber.calls.load(Ordering::SeqCst), 1);

    let status = store.get_status(file_id).await.unwrap().unwrap();
    assert_eq!(status.transcription(), StageStatus::Completed);

    let transcript = std::fs::read_to_string(layout.transcript_path("interview.mp3")).unwrap();
    assert!(transcript.contains("hello from"));

    let srt = std::fs::read_to_string(layout.orig_srt_path("interview.mp3")).unwrap();
    assert!(srt.contains("hello"));

    let segments_json = std::fs::read_to_string(layout.segments_json_path("interview.mp3")).unwrap();
    assert!(segments_json.contains("hello from"));
}

struct ZeroWordTranscriber;

#[async_trait]
impl Transcriber for ZeroWordTranscriber {
    async fn transcribe_segment(&self, _request: TranscribeRequest<'_>) -> Result<SegmentTranscript> {
        Ok(SegmentTranscript {
            text: String::new(),
            words: Vec::new(),
            raw: serde_json::json!({ "text": "" }),
        })
    }

    fn name(&self) -> &'static str {
        "zero-word"
    }
}

#[tokio::test]
async fn test_transcribe_file_with_zero_words_writes_empty_well_formed_srt() {
    let store = Store::connect_in_memory().await.unwrap();
    let tmp = tempfile::tempdir().unwrap();
    let layout = ArtifactLayout::new(tmp.path());
    let mut config = Config::default();
    config.force_language = Some("en".to_string());
    let transcriber = ZeroWordTranscriber;

    let source = tmp.path().join("silent.mp3");
    std::fs::write(&source, b"not real audio, just bytes").unwrap();

    let file_id = store
        .add_media(source.to_str().unwrap(), "silent.mp3", MediaType::Audio, None, None, None, None)
        .await
        .unwrap();
    let media = store.get_media(file_id).await.unwrap().unwrap();

    let engine = TranscriptionEngine {
        store: &store,
        layout: &layout,
        transcriber: &transcriber,
        config: &config,
    };

    let ok = engine.transcribe_file(&media).await.unwrap();
    assert!(ok);

    let status = store.get_status(file_id).await.unwrap().unwrap();
    assert_eq!(status.transcription(), StageStatus::Completed);

    // B3: the srt file must exist and be well-formed (empty, zero cues)
    // rather than missing entirely.
    let srt_path = layout.orig_srt_path("silent.mp3");
    assert!(srt_path.exists());
    let srt = std::fs::read_to_string(&srt_path).unwrap();
    assert!(srt.is_empty());
}

struct FailingTranscriber;

#[async_trait]
impl Transcriber for FailingTranscriber {
    async fn transcribe_segment(&self, _request: TranscribeRequest<'_>) -> Result<SegmentTranscript> {
        Err(scribe_pipeline::error::PipelineError::PermanentProvider("bad request".into()))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

#[tokio::test]
async fn test_transcribe_file_marks_failed_on_permanent_provider_error() {
    let store = Store::connect_in_memory().await.unwrap();
    let tmp = tempfile::tempdir().unwrap();
    let layout = ArtifactLayout::new(tmp.path());
    let config = Config::default();
    let transcriber = FailingTranscriber;

    let source = tmp.path().join("a.mp3");
    std::fs::write(&source, b"fake audio").unwrap();
    let file_id = store
        .add_media(source.to_str().unwrap(), "a.mp3", MediaType::Audio, None, None, None, None)
        .await
        .unwrap();
    let media = store.get_media(file_id).await.unwrap().unwrap();

    let engine = TranscriptionEngine {
        store: &store,
        layout: &layout,
        transcriber: &transcriber,
        config: &config,
    };

    let ok = engine.transcribe_file(&media).await.unwrap();
    assert!(!ok);

    let status = store.get_status(file_id).await.unwrap().unwrap();
    assert_eq!(status.transcription(), StageStatus::Failed);

    let errors = store.list_errors(file_id).await.unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].process_stage, "transcription");
}
