//! Transcription Engine (§4.6): per-file orchestration. Decides whether a
//! file needs splitting, transcribes each segment with retry/backoff,
//! stitches word timestamps back into the file's timeline, and writes
//! `transcript.txt`, `<name>.txt.segments.json`, and `<name>.orig.srt`.

use super::srt::{self, Word};
use super::{TranscribeRequest, TranscribedWord, Transcriber};
use crate::avtool::{self, SplitOptions};
use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::layout::ArtifactLayout;
use crate::retry::{retry_transient, RetryPolicy};
use crate::store::models::{MediaFile, StageStatus, StatusUpdate};
use crate::store::Store;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

pub struct TranscriptionEngine<'a> {
    pub store: &'a Store,
    pub layout: &'a ArtifactLayout,
    pub transcriber: &'a dyn Transcriber,
    pub config: &'a Config,
}

impl<'a> TranscriptionEngine<'a> {
    /// Run the full transcription stage for one media file (§4.6 steps
    /// 1-9). Returns `Ok(true)` on success, `Ok(false)` if the stage was
    /// marked `failed` after exhausting retries (the caller should move on
    /// rather than propagate), and `Err` only for unexpected store/I-O
    /// failures that should abort the worker loop.
    pub async fn transcribe_file(&self, media: &MediaFile) -> Result<bool> {
        let file_id = media
            .file_id
            .parse()
            .map_err(|_| PipelineError::Validation("invalid file_id in media_files row".into()))?;

        let transcript_path = self.layout.transcript_path(&media.safe_filename);
        if !self.config.force_reprocess {
            let non_empty = std::fs::metadata(&transcript_path).map(|m| m.len() > 0).unwrap_or(false);
            if non_empty {
                let status = self.store.get_status(file_id).await?;
                if status.map(|s| s.transcription()) != Some(StageStatus::Completed) {
                    self.store
                        .update_status(file_id, StatusUpdate::transcription(StageStatus::Completed))
                        .await?;
                }
                return Ok(true);
            }
        }

        self.store
            .update_status(file_id, StatusUpdate::transcription(StageStatus::InProgress))
            .await?;

        match self.try_transcribe(file_id, media).await {
            Ok(()) => {
                self.store
                    .update_status(file_id, StatusUpdate::transcription(StageStatus::Completed))
                    .await?;
                self.store.clear_errors(Some(file_id), Some("transcription")).await?;
                Ok(true)
            }
            Err(err) => {
                warn!("transcription failed for {}: {err}", media.original_path);
                self.store
                    .log_error(file_id, "transcription", "transcription failed", Some(&err.to_string()))
                    .await?;
                self.store
                    .update_status(file_id, StatusUpdate::transcription(StageStatus::Failed))
                    .await?;
                Ok(false)
            }
        }
    }

    async fn try_transcribe(&self, file_id: uuid::Uuid, media: &MediaFile) -> Result<()> {
        let source_path = self.layout.materialize_source(Path::new(&media.original_path), &media.safe_filename)?;

        let audio_path = if media.media_type == "video" {
            let extracted = self
                .layout
                .extracted_audio_path(&media.safe_filename, &self.config.extract_audio_format);
            avtool::extract_audio(&source_path, &extracted, &Default::default())?;
            extracted
        } else {
            source_path.clone()
        };

        let language_code = self.determine_language(media);

        let split_options = SplitOptions {
            max_size_bytes: self.config.max_audio_bytes(),
            max_segment_seconds: self.config.max_segment_seconds,
        };
        let file_size = std::fs::metadata(&audio_path)?.len();
        let needs_split = file_size > split_options.max_size_bytes;

        let segments = if needs_split {
            let split_dir = self.layout.item_dir(&media.safe_filename).join(".segments");
            avtool::split_audio(&audio_path, &split_dir, &split_options)?
        } else {
            vec![avtool::Segment {
                path: audio_path.clone(),
                start_seconds: 0.0,
            }]
        };

        let policy = RetryPolicy::transcription_default().with_max_attempts(self.config.api_retries.max(1));

        let mut full_text = Vec::with_capacity(segments.len());
        let mut all_words: Vec<Word> = Vec::new();
        let mut raw_segments = Vec::with_capacity(segments.len());

        for segment in &segments {
            info!(
                "transcribing segment starting at {:.2}s: {}",
                segment.start_seconds,
                segment.path.display()
            );

            let path = segment.path.clone();
            let lang = language_code.clone();
            let transcript = retry_transient(policy, || {
                let request = TranscribeRequest {
                    audio_path: &path,
                    language_code: lang.as_deref(),
                    tag_audio_events: true,
                    diarize: true,
                };
                self.transcriber.transcribe_segment(request)
            })
            .await?;

            full_text.push(transcript.text.clone());
            raw_segments.push(transcript.raw.clone());

            for word in shift_words(&transcript.words, segment.start_seconds) {
                all_words.push(word);
            }

            if segments.len() > 1 && self.config.segment_pause_seconds > 0 {
                tokio::time::sleep(Duration::from_secs(self.config.segment_pause_seconds)).await;
            }
        }

        if needs_split {
            let split_dir = self.layout.item_dir(&media.safe_filename).join(".segments");
            let _ = std::fs::remove_dir_all(&split_dir);
        }

        let transcript_path = self.layout.transcript_path(&media.safe_filename);
        std::fs::write(&transcript_path, full_text.join(" "))?;

        let segments_json_path = self.layout.segments_json_path(&media.safe_filename);
        std::fs::write(&segments_json_path, serde_json::to_string_pretty(&raw_segments)?)?;

        // B3: zero words still produces a well-formed, empty `orig.srt`.
        let cues = srt::build_cues(&all_words);
        let srt_path = self.layout.orig_srt_path(&media.safe_filename);
        std::fs::write(&srt_path, srt::render_srt(&cues))?;

        Ok(())
    }

    /// §4.6 step 3: forced language overrides everything; otherwise
    /// auto-detect (provider picks), or fall back to the configured hint.
    fn determine_language(&self, media: &MediaFile) -> Option<String> {
        if let Some(forced) = &self.config.force_language {
            return Some(forced.clone());
        }
        if self.config.auto_detect_language {
            return None;
        }
        Some(
            media
                .detected_language
                .clone()
                .unwrap_or_else(|| self.config.default_language_hint.clone()),
        )
    }
}

fn shift_words(words: &[TranscribedWord], offset_seconds: f64) -> Vec<Word> {
    words
        .iter()
        .map(|w| Word {
            text: w.text.clone(),
            start_seconds: w.start_seconds + offset_seconds,
            end_seconds: w.end_seconds + offset_seconds,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shift_words_offsets_by_segment_start() {
        let words = vec![TranscribedWord {
            text: "hi".into(),
            start_seconds: 1.0,
            end_seconds: 1.5,
        }];
        let shifted = shift_words(&words, 10.0);
        assert_eq!(shifted[0].start_seconds, 11.0);
        assert_eq!(shifted[0].end_seconds, 11.5);
    }

    struct PanicTranscriber;

    #[async_trait::async_trait]
    impl Transcriber for PanicTranscriber {
        async fn transcribe_segment(&self, _request: TranscribeRequest<'_>) -> Result<super::super::SegmentTranscript> {
            panic!("provider should not be called when transcript already exists");
        }

        fn name(&self) -> &'static str {
            "panic"
        }
    }

    #[tokio::test]
    async fn test_transcribe_file_is_noop_when_transcript_exists_and_not_forced() {
        use crate::store::models::MediaType;

        let store = Store::connect_in_memory().await.unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let layout = ArtifactLayout::new(tmp.path());
        let config = Config::default();
        let transcriber = PanicTranscriber;

        let source = tmp.path().join("a.mp3");
        std::fs::write(&source, b"fake audio").unwrap();

        let file_id = store
            .add_media(
                source.to_str().unwrap(),
                "a.mp3",
                MediaType::Audio,
                None,
                None,
                None,
                None,
            )
            .await
            .unwrap();
        let media = store.get_media(file_id).await.unwrap().unwrap();

        let transcript_path = layout.transcript_path(&media.safe_filename);
        std::fs::create_dir_all(transcript_path.parent().unwrap()).unwrap();
        std::fs::write(&transcript_path, "already transcribed").unwrap();

        let engine = TranscriptionEngine {
            store: &store,
            layout: &layout,
            transcriber: &transcriber,
            config: &config,
        };

        let result = engine.transcribe_file(&media).await.unwrap();
        assert!(result);

        let status = store.get_status(file_id).await.unwrap().unwrap();
        assert_eq!(status.transcription(), StageStatus::Completed);
    }
}
