//! Generic bounded worker pool over one pipeline stage (§4.8). Grounded in
//! the teacher pack's `WorkQueue`/semaphore pattern (Dastari-librarian's
//! `services/legacy/job_queue.rs`), adapted from a channel-fed queue to a
//! store-polling loop: each iteration claims a batch via
//! `list_pending_for_stage`, processes up to `concurrency` items at once,
//! and the pool stops once a batch comes back empty or cancellation is
//! observed at a batch boundary (§5 "Workers check a shutdown flag at batch
//! boundaries and between items").

use crate::error::Result;
use crate::store::models::{ProcessingStatus, StageStatus, StatusUpdate};
use crate::store::Store;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Default per-item soft cap (§6 Configuration object doesn't name this
/// explicitly; §4.8 gives "e.g. 30 minutes" as the default).
pub const DEFAULT_ITEM_TIMEOUT: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone, Copy, Default)]
pub struct PoolStats {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl PoolStats {
    fn absorb(&mut self, other: PoolStats) {
        self.processed += other.processed;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
    }
}

/// Runs one stage's worker pool to drain (§4.8 "Each worker loop claims a
/// batch ... and repeats until the store returns empty"). `process` is
/// called once per claimed row with bounded concurrency; if it doesn't
/// return within `item_timeout`, the item is marked `failed` with a
/// `TimeoutError` and the pool moves on (§7 "TimeoutError ... treated like
/// a PermanentProviderError at the item level") — this is a distinct,
/// coarser cap than each provider call's own `timeout_seconds`, and unlike
/// cooperative shutdown it does abort the in-flight future.
pub async fn run_stage_pool<F, Fut>(
    store: &Store,
    stage: &str,
    concurrency: usize,
    batch_size: i64,
    item_timeout: Duration,
    cancelled: &Arc<AtomicBool>,
    show_progress: bool,
    process: F,
) -> Result<PoolStats>
where
    F: Fn(ProcessingStatus) -> Fut + Send + Sync,
    Fut: Future<Output = Result<bool>> + Send,
{
    let mut stats = PoolStats::default();

    loop {
        if cancelled.load(Ordering::Relaxed) {
            info!("{stage}: cancellation observed at batch boundary, stopping");
            break;
        }

        let batch = store.list_pending_for_stage(stage, batch_size).await?;
        if batch.is_empty() {
            break;
        }

        info!("{stage}: claimed {} item(s)", batch.len());
        let process = &process;

        // Teacher's `TranscriptionOrchestrator` shows a per-run progress bar
        // (`src/transcribe/orchestrator.rs`); the pool equivalent is one bar
        // per claimed batch, since the pool doesn't know the stage's total
        // pending count up front.
        let progress = if show_progress {
            let pb = ProgressBar::new(batch.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            pb.set_message(stage.to_string());
            Some(pb)
        } else {
            None
        };

        let results: Vec<(String, Result<bool>)> = stream::iter(batch.into_iter())
            .map(|item| {
                let file_id = item.file_id.clone();
                let progress = progress.clone();
                async move {
                    let outcome = tokio::time::timeout(item_timeout, process(item)).await;
                    if let Some(pb) = &progress {
                        pb.inc(1);
                    }
                    match outcome {
                        Ok(result) => (file_id, result),
                        Err(_) => {
                            warn!("{stage}: item {file_id} exceeded the per-item timeout of {item_timeout:?}");
                            if let Ok(id) = file_id.parse::<Uuid>() {
                                let _ = store
                                    .log_error(id, stage, "item exceeded per-item timeout", None)
                                    .await;
                                if let Some(update) = StatusUpdate::for_stage(stage, StageStatus::Failed) {
                                    let _ = store.update_status(id, update).await;
                                }
                            }
                            (file_id, Ok(false))
                        }
                    }
                }
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        let mut batch_stats = PoolStats::default();
        for (file_id, result) in results {
            batch_stats.processed += 1;
            match result {
                Ok(true) => batch_stats.succeeded += 1,
                Ok(false) => batch_stats.failed += 1,
                Err(e) => {
                    warn!("{stage}: item {file_id} errored outside its own failure handling: {e}");
                    if let Ok(id) = file_id.parse::<Uuid>() {
                        let _ = store.log_error(id, stage, "worker pool error", Some(&e.to_string())).await;
                    }
                    batch_stats.failed += 1;
                }
            }
        }
        stats.absorb(batch_stats);

        if cancelled.load(Ordering::Relaxed) {
            break;
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::models::{MediaType, StageStatus, StatusUpdate};
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn test_run_stage_pool_drains_all_pending_items() {
        let store = Store::connect_in_memory().await.unwrap();
        for i in 0..5 {
            store
                .add_media(&format!("/in/{i}.mp3"), &format!("{i}.mp3"), MediaType::Audio, None, None, None, None)
                .await
                .unwrap();
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let cancelled = Arc::new(AtomicBool::new(false));

        let calls_clone = calls.clone();
        let stats = run_stage_pool(
            &store,
            "transcription",
            3,
            10,
            Duration::from_secs(5),
            &cancelled,
            false,
            move |item| {
                let calls = calls_clone.clone();
                let store = store.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let id = item.file_id.parse().unwrap();
                    store
                        .update_status(id, StatusUpdate::transcription(StageStatus::Completed))
                        .await
                        .unwrap();
                    Ok(true)
                }
            },
        )
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(stats.processed, 5);
        assert_eq!(stats.succeeded, 5);
    }

    #[tokio::test]
    async fn test_run_stage_pool_respects_pre_set_cancellation() {
        let store = Store::connect_in_memory().await.unwrap();
        store
            .add_media("/in/a.mp3", "a.mp3", MediaType::Audio, None, None, None, None)
            .await
            .unwrap();

        let cancelled = Arc::new(AtomicBool::new(true));
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        let stats = run_stage_pool(
            &store,
            "transcription",
            2,
            10,
            Duration::from_secs(5),
            &cancelled,
            false,
            move |_item| {
                let calls = calls_clone.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(true)
                }
            },
        )
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(stats.processed, 0);
    }

    #[tokio::test]
    async fn test_run_stage_pool_marks_timed_out_item_as_failed_batch_stat() {
        let store = Store::connect_in_memory().await.unwrap();
        let id = store
            .add_media("/in/a.mp3", "a.mp3", MediaType::Audio, None, None, None, None)
            .await
            .unwrap();
        let cancelled = Arc::new(AtomicBool::new(false));

        let stats = run_stage_pool(
            &store,
            "transcription",
            1,
            10,
            Duration::from_millis(10),
            &cancelled,
            false,
            |_item| async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(true)
            },
        )
        .await
        .unwrap();

        assert_eq!(stats.processed, 1);
        assert_eq!(stats.failed, 1);

        let status = store.get_status(id).await.unwrap().unwrap();
        assert_eq!(status.transcription(), StageStatus::Failed);
    }
}
