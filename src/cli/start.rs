//! `scribe start --transcription | --translation LANGS` (§6): run one-shot
//! batches of the named stages, draining each pool until the store reports
//! no more pending work. `--workers`/`--batch-size` apply only to this run
//! (§9: explicit update-descriptor philosophy, not a mutation of the
//! persisted config) — they're layered onto a cloned `Config` that backs a
//! scoped `Orchestrator` for the duration of the command.

use super::ExitCode;
use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::orchestrator::Orchestrator;
use clap::Args;
use futures::future::join_all;
use tracing::info;

#[derive(Debug, Args)]
pub struct StartArgs {
    /// Run the transcription pool once.
    #[arg(long)]
    pub transcription: bool,

    /// Comma-separated target languages to translate (e.g. "en,he,de").
    #[arg(long, value_name = "LANGS")]
    pub translation: Option<String>,

    /// Override worker count for this run only.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Override batch size for this run only.
    #[arg(long)]
    pub batch_size: Option<usize>,
}

pub async fn run(args: StartArgs, orchestrator: &Orchestrator) -> Result<ExitCode> {
    if !args.transcription && args.translation.is_none() {
        return Err(PipelineError::Validation(
            "start requires --transcription or --translation LANGS".to_string(),
        ));
    }

    let mut config: Config = orchestrator.config.clone();
    if let Some(workers) = args.workers {
        config.transcription_workers = workers;
        config.translation_workers = workers;
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }

    let scoped = Orchestrator::new(orchestrator.store.clone(), orchestrator.layout.clone(), config);
    let mut any_failed = false;

    if args.transcription {
        let stats = scoped.run_transcription_pool().await?;
        info!(
            "start: transcription pool processed {} ({} succeeded, {} failed)",
            stats.processed, stats.succeeded, stats.failed
        );
        any_failed |= stats.failed > 0;
    }

    if let Some(langs) = &args.translation {
        let targets: Vec<&str> = langs.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
        if targets.is_empty() {
            return Err(PipelineError::Validation("--translation given but no languages parsed".to_string()));
        }

        let results = join_all(targets.iter().map(|lang| scoped.run_translation_pool(lang))).await;
        for (lang, result) in targets.iter().zip(results) {
            let stats = result?;
            info!(
                "start: translation_{lang} pool processed {} ({} succeeded, {} failed)",
                stats.processed, stats.succeeded, stats.failed
            );
            any_failed |= stats.failed > 0;
        }
    }

    Ok(if any_failed { ExitCode::Recoverable } else { ExitCode::Success })
}
