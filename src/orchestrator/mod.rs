//! Pipeline Orchestrator (§4.8): wires the Tracking Store, Artifact Layout,
//! transcription/translation engines and provider registry into one or more
//! bounded worker pools, plus the stall-recovery sweep. One `Orchestrator`
//! is constructed once per process and shared (by reference) across every
//! pool and the CLI commands that drive them.

pub mod pool;
pub mod problem_files;
pub mod stall;

use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::layout::ArtifactLayout;
use crate::store::Store;
use crate::transcribe::elevenlabs::ElevenLabsClient;
use crate::transcribe::engine::TranscriptionEngine;
use crate::transcribe::Transcriber;
use crate::translate::engine::TranslationEngine;
use crate::translate::ProviderRegistry;
use pool::PoolStats;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub struct Orchestrator {
    pub store: Store,
    pub layout: ArtifactLayout,
    pub config: Config,
    pub providers: ProviderRegistry,
    pub transcriber: Arc<dyn Transcriber>,
    cancelled: Arc<AtomicBool>,
}

impl Orchestrator {
    pub fn new(store: Store, layout: ArtifactLayout, config: Config) -> Self {
        let providers = ProviderRegistry::from_config(&config);
        let transcriber: Arc<dyn Transcriber> = Arc::new(ElevenLabsClient::new(
            config.elevenlabs_api_key.clone().unwrap_or_default(),
            config.elevenlabs_model_id.clone(),
            config.elevenlabs_speaker_detection,
            Duration::from_secs(config.api_timeout_seconds),
        ));

        Self {
            store,
            layout,
            config,
            providers,
            transcriber,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A clone of the cancellation flag for a Ctrl-C handler to flip (§5
    /// "cooperative cancellation... a shared flag checked at batch and item
    /// boundaries").
    pub fn cancellation_handle(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    pub fn request_shutdown(&self) {
        self.cancelled.store(true, std::sync::atomic::Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(std::sync::atomic::Ordering::Relaxed)
    }

    /// Drain the transcription pool once (§4.8). Returns when the store
    /// reports no more pending transcription rows, or cancellation is
    /// observed.
    pub async fn run_transcription_pool(&self) -> Result<PoolStats> {
        pool::run_stage_pool(
            &self.store,
            "transcription",
            self.config.transcription_workers,
            self.config.batch_size as i64,
            pool::DEFAULT_ITEM_TIMEOUT,
            &self.cancelled,
            self.config.show_progress,
            |status| async move {
                let file_id = status
                    .file_id
                    .parse()
                    .map_err(|_| PipelineError::Validation("invalid file_id in processing_status row".into()))?;
                let media = self
                    .store
                    .get_media(file_id)
                    .await?
                    .ok_or_else(|| PipelineError::NotFound(status.file_id.clone()))?;

                let engine = TranscriptionEngine {
                    store: &self.store,
                    layout: &self.layout,
                    transcriber: self.transcriber.as_ref(),
                    config: &self.config,
                };
                engine.transcribe_file(&media).await
            },
        )
        .await
    }

    /// Drain one target language's translation pool once (§4.8). Strict
    /// ordering across stages for a single file is enforced by
    /// `list_pending_for_stage`, not by the pool itself: a row only becomes
    /// eligible for `translation_<lang>` once its transcription is
    /// `completed`.
    pub async fn run_translation_pool(&self, target_lang: &str) -> Result<PoolStats> {
        let stage = format!("translation_{target_lang}");
        pool::run_stage_pool(
            &self.store,
            &stage,
            self.config.translation_workers,
            self.config.batch_size as i64,
            pool::DEFAULT_ITEM_TIMEOUT,
            &self.cancelled,
            self.config.show_progress,
            |status| async move {
                let file_id = status
                    .file_id
                    .parse()
                    .map_err(|_| PipelineError::Validation("invalid file_id in processing_status row".into()))?;
                let media = self
                    .store
                    .get_media(file_id)
                    .await?
                    .ok_or_else(|| PipelineError::NotFound(status.file_id.clone()))?;

                let engine = TranslationEngine {
                    store: &self.store,
                    layout: &self.layout,
                    config: &self.config,
                    providers: &self.providers,
                    provider_override: None,
                    force: self.config.force_reprocess,
                };
                engine.translate_file(&media, target_lang).await
            },
        )
        .await
    }

    /// Drain transcription, then every configured target language's
    /// translation pool, once each (§4.8: "extraction and transcription
    /// before any of that file's translations start" — draining
    /// transcription to empty first is the simplest way to honor that
    /// ordering without a per-file barrier).
    pub async fn run_all_pools_once(&self) -> Result<Vec<(String, PoolStats)>> {
        let mut results = Vec::new();

        let transcription_stats = self.run_transcription_pool().await?;
        info!(
            "transcription pool: {} processed, {} succeeded, {} failed",
            transcription_stats.processed, transcription_stats.succeeded, transcription_stats.failed
        );
        results.push(("transcription".to_string(), transcription_stats));

        for lang in self.config.target_languages.clone() {
            if self.is_cancelled() {
                break;
            }
            let stats = self.run_translation_pool(&lang).await?;
            info!(
                "translation_{lang} pool: {} processed, {} succeeded, {} failed",
                stats.processed, stats.succeeded, stats.failed
            );
            results.push((format!("translation_{lang}"), stats));
        }

        Ok(results)
    }

    /// Long-running service loop (§4.8, §6 `scribe start`): repeatedly
    /// drains every pool, runs a stall sweep, then sleeps
    /// `check_interval_seconds` before the next pass, until cancelled.
    pub async fn run_service_loop(&self) -> Result<()> {
        use std::sync::atomic::Ordering;

        loop {
            if self.is_cancelled() {
                return Ok(());
            }

            self.run_all_pools_once().await?;

            let sweep = stall::sweep_once(
                &self.store,
                self.config.stalled_timeout_minutes as i64,
                &self.config.target_languages,
            )
            .await?;
            if sweep.recovered > 0 {
                info!("stall sweep recovered {} stage(s)", sweep.recovered);
            }

            let step = Duration::from_secs(1);
            let mut waited = Duration::ZERO;
            let target = Duration::from_secs(self.config.check_interval_seconds);
            while waited < target {
                if self.cancelled.load(Ordering::Relaxed) {
                    return Ok(());
                }
                tokio::time::sleep(step).await;
                waited += step;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::models::{MediaType, OverallStatus};

    fn test_config(tmp: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.output_directory = tmp.to_path_buf();
        config.transcription_workers = 2;
        config.translation_workers = 2;
        config.batch_size = 10;
        config.api_retries = 1;
        config.api_timeout_seconds = 1;
        config
    }

    #[tokio::test]
    async fn test_run_transcription_pool_marks_failure_without_elevenlabs_key() {
        let store = Store::connect_in_memory().await.unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let layout = ArtifactLayout::new(tmp.path());
        let config = test_config(tmp.path());

        let source = tmp.path().join("a.mp3");
        std::fs::write(&source, b"fake audio").unwrap();
        store
            .add_media(source.to_str().unwrap(), "a.mp3", MediaType::Audio, None, None, None, None)
            .await
            .unwrap();

        let orchestrator = Orchestrator::new(store.clone(), layout, config);
        let stats = orchestrator.run_transcription_pool().await.unwrap();

        assert_eq!(stats.processed, 1);
        assert_eq!(stats.failed, 1);
    }

    #[tokio::test]
    async fn test_run_all_pools_once_skips_translation_until_transcription_completes() {
        let store = Store::connect_in_memory().await.unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let layout = ArtifactLayout::new(tmp.path());
        let config = test_config(tmp.path());

        let source = tmp.path().join("a.mp3");
        std::fs::write(&source, b"fake audio").unwrap();
        let id = store
            .add_media(source.to_str().unwrap(), "a.mp3", MediaType::Audio, None, None, None, None)
            .await
            .unwrap();

        let orchestrator = Orchestrator::new(store.clone(), layout, config);
        orchestrator.run_all_pools_once().await.unwrap();

        let status = store.get_status(id).await.unwrap().unwrap();
        assert_eq!(status.overall(), OverallStatus::Pending);
        assert_eq!(status.translation_status("en"), Some(crate::store::models::StageStatus::NotStarted));
    }
}
