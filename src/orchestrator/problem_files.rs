//! Problem-file classification and recovery (§4.8 supplement). Files that
//! keep failing the same stage are diagnosed from their error log rather
//! than retried blind forever, and — where the diagnosis suggests a fix —
//! the audio itself is repaired before the stage is requeued.
//!
//! This is orchestration-adjacent but deliberately kept out of the worker
//! pools: it runs as a separate, operator-triggered sweep (`scribe special
//! audio-fix`, §6) rather than inline in every retry, because repair is
//! comparatively expensive (re-encodes the whole file) and should not run
//! on every transient network failure.

use crate::avtool;
use crate::error::Result;
use crate::layout::ArtifactLayout;
use crate::store::models::{MediaType, StageStatus, StatusUpdate};
use crate::store::Store;
use tracing::{info, warn};
use uuid::Uuid;

/// Why a file is being flagged for special handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemClass {
    /// Transcription has failed the configured retry budget worth of times
    /// for this file and stage without ever reaching `completed`.
    FailedRepeatedly,
    /// The error log contains a decode/corruption marker from ffmpeg.
    InvalidAudio,
    /// The error log contains a provider timeout marker.
    TimedOut,
    /// The stage reports `completed` but its artifact is missing or empty.
    EmptyOutput,
}

#[derive(Debug, Clone)]
pub struct ProblemFile {
    pub file_id: Uuid,
    pub original_path: String,
    pub safe_filename: String,
    pub class: ProblemClass,
}

const CORRUPTION_MARKERS: &[&str] = &[
    "invalid data found",
    "moov atom not found",
    "corrupt",
    "could not find codec",
];

const TIMEOUT_MARKERS: &[&str] = &["timed out", "timeout", "deadline exceeded"];

/// Scan every file whose transcription stage is `failed` and classify it
/// (§4.8). A file can only carry one class per sweep — the first matching
/// rule wins, checked in the order a human triaging would check them:
/// missing output, then corruption, then timeout, then "just keeps failing".
pub async fn identify_problem_files(
    store: &Store,
    layout: &ArtifactLayout,
    repeat_failure_threshold: i64,
) -> Result<Vec<ProblemFile>> {
    use crate::store::models::OverallStatus;

    let mut problems = Vec::new();

    let failed = store
        .list_by_status(&[OverallStatus::Failed, OverallStatus::InProgress, OverallStatus::Pending], None)
        .await?;

    for status in failed {
        let Ok(file_id) = status.file_id.parse::<Uuid>() else {
            continue;
        };
        let Some(media) = store.get_media(file_id).await? else {
            continue;
        };

        if status.transcription() == StageStatus::Completed {
            let transcript_path = layout.transcript_path(&media.safe_filename);
            let empty = std::fs::metadata(&transcript_path).map(|m| m.len() == 0).unwrap_or(true);
            if empty {
                problems.push(ProblemFile {
                    file_id,
                    original_path: media.original_path.clone(),
                    safe_filename: media.safe_filename.clone(),
                    class: ProblemClass::EmptyOutput,
                });
                continue;
            }
        }

        if status.transcription() != StageStatus::Failed {
            continue;
        }

        let errors = store.list_errors(file_id).await?;
        let combined: String = errors
            .iter()
            .filter(|e| e.process_stage == "transcription")
            .map(|e| format!("{} {}", e.error_message.clone().unwrap_or_default(), e.error_details.clone().unwrap_or_default()))
            .collect::<Vec<_>>()
            .join(" \n ")
            .to_lowercase();

        let class = if CORRUPTION_MARKERS.iter().any(|m| combined.contains(m)) {
            Some(ProblemClass::InvalidAudio)
        } else if TIMEOUT_MARKERS.iter().any(|m| combined.contains(m)) {
            Some(ProblemClass::TimedOut)
        } else {
            let attempts = store.count_errors(file_id, Some("transcription")).await?;
            if attempts >= repeat_failure_threshold {
                Some(ProblemClass::FailedRepeatedly)
            } else {
                None
            }
        };

        if let Some(class) = class {
            problems.push(ProblemFile {
                file_id,
                original_path: media.original_path,
                safe_filename: media.safe_filename,
                class,
            });
        }
    }

    Ok(problems)
}

/// Apply the recovery action for one problem file and reset its
/// transcription stage to `not_started` so the next pool run retries it
/// (§4.8: "the audit/fix path never marks a stage `completed` on behalf of
/// a worker — it only clears the way for the worker to try again").
pub async fn apply_fix(store: &Store, layout: &ArtifactLayout, problem: &ProblemFile) -> Result<bool> {
    match problem.class {
        ProblemClass::InvalidAudio => {
            let source = layout.source_path(&problem.safe_filename);
            let repaired = layout.item_dir(&problem.safe_filename).join("repaired.mp3");
            avtool::repair_audio(&source, &repaired)?;
            info!("repaired audio for {}: {}", problem.original_path, repaired.display());
            requeue_transcription(store, problem.file_id).await?;
            Ok(true)
        }
        ProblemClass::EmptyOutput => {
            let source = layout.source_path(&problem.safe_filename);
            let normalized = layout.item_dir(&problem.safe_filename).join("normalized.mp3");
            avtool::normalize_audio(&source, &normalized)?;
            info!("normalized audio for {}: {}", problem.original_path, normalized.display());
            requeue_transcription(store, problem.file_id).await?;
            Ok(true)
        }
        ProblemClass::TimedOut => {
            // No artifact fix applies; the retry itself (with its own
            // per-call timeout) is the remedy. Just clear the way.
            requeue_transcription(store, problem.file_id).await?;
            Ok(true)
        }
        ProblemClass::FailedRepeatedly => {
            segment_and_requeue(store, layout, problem).await
        }
    }
}

async fn requeue_transcription(store: &Store, file_id: Uuid) -> Result<()> {
    store
        .update_status(file_id, StatusUpdate::transcription(StageStatus::NotStarted))
        .await?;
    store.clear_errors(Some(file_id), Some("transcription")).await?;
    Ok(())
}

/// Split a repeatedly-failing file into audio segments and register each as
/// its own `MediaFile` row so they transcribe independently (§4.8 "long-audio
/// segmentation"). The original row is left untouched — its failure history
/// stays on the record — and the segmentation is recorded as an error-log
/// entry on the parent naming its children, since the data model (§3) has no
/// parent/child column to hang a formal relationship off of.
async fn segment_and_requeue(store: &Store, layout: &ArtifactLayout, problem: &ProblemFile) -> Result<bool> {
    let source = layout.source_path(&problem.safe_filename);
    let split_dir = layout.item_dir(&problem.safe_filename).join(".manual_segments");

    let options = avtool::SplitOptions {
        max_segment_seconds: 300,
        ..Default::default()
    };

    let segments = match avtool::split_audio(&source, &split_dir, &options) {
        Ok(segments) => segments,
        Err(e) => {
            warn!("segmentation failed for {}: {e}", problem.original_path);
            return Ok(false);
        }
    };

    let mut child_ids = Vec::with_capacity(segments.len());
    for (index, segment) in segments.iter().enumerate() {
        let safe_filename = format!("{}__part{:02}", problem.safe_filename, index);
        match store
            .add_media(
                segment.path.to_str().unwrap_or_default(),
                &safe_filename,
                MediaType::Audio,
                std::fs::metadata(&segment.path).ok().map(|m| m.len() as i64),
                None,
                None,
                None,
            )
            .await
        {
            Ok(id) => child_ids.push(id.to_string()),
            Err(e) => warn!("could not register segment {index} for {}: {e}", problem.original_path),
        }
    }

    if child_ids.is_empty() {
        return Ok(false);
    }

    store
        .log_error(
            problem.file_id,
            "transcription",
            "segmented into child files after repeated failure",
            Some(&child_ids.join(",")),
        )
        .await?;

    info!(
        "segmented repeatedly-failing file {} into {} child file(s)",
        problem.original_path,
        child_ids.len()
    );

    Ok(true)
}
