//! `scribe retry` (§6, SPEC_FULL §C): re-run the transcription stage for
//! files currently flagged as problems, with a per-run timeout/retry budget
//! that's wider than the normal pool pass — useful when a provider is
//! degraded rather than the file itself being bad. Never mutates the
//! persisted `Config`; the scaling lives entirely on a clone scoped to this
//! invocation.

use super::{parse_file_ids, ExitCode};
use crate::error::Result;
use crate::orchestrator::{problem_files, Orchestrator};
use crate::transcribe::engine::TranscriptionEngine;
use clap::Args;
use tracing::info;

#[derive(Debug, Args)]
pub struct RetryArgs {
    /// Restrict to these file ids (comma-separated UUIDs); default: every
    /// identified problem file.
    #[arg(long, value_name = "IDS")]
    pub file_ids: Option<String>,

    /// Multiply every retry delay and the per-call provider timeout by this
    /// factor for this run only.
    #[arg(long, default_value_t = 2.0)]
    pub timeout_multiplier: f64,

    /// Override the retry attempt budget for this run only.
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// How many repeated transcription failures mark a file "failed
    /// repeatedly" rather than merely transient.
    #[arg(long, default_value_t = 3)]
    pub repeat_failure_threshold: i64,
}

pub async fn run(args: RetryArgs, orchestrator: &Orchestrator) -> Result<ExitCode> {
    let mut config = orchestrator.config.clone();
    config.retry_timeout_multiplier = args.timeout_multiplier;
    config.api_timeout_seconds = ((config.api_timeout_seconds as f64) * args.timeout_multiplier.max(0.0)) as u64;
    if let Some(max_retries) = args.max_retries {
        config.api_retries = max_retries;
    }

    let scoped = Orchestrator::new(orchestrator.store.clone(), orchestrator.layout.clone(), config);

    let wanted = args.file_ids.as_deref().map(parse_file_ids).transpose()?;

    let problems = problem_files::identify_problem_files(&scoped.store, &scoped.layout, args.repeat_failure_threshold)
        .await?
        .into_iter()
        .filter(|p| match &wanted {
            Some(ids) => ids.contains(&p.file_id),
            None => true,
        })
        .collect::<Vec<_>>();

    info!("retry: {} problem file(s) selected", problems.len());

    let mut failures = 0usize;
    for problem in &problems {
        if !problem_files::apply_fix(&scoped.store, &scoped.layout, problem).await? {
            failures += 1;
            continue;
        }

        let Some(media) = scoped.store.get_media(problem.file_id).await? else {
            continue;
        };

        let engine = TranscriptionEngine {
            store: &scoped.store,
            layout: &scoped.layout,
            transcriber: scoped.transcriber.as_ref(),
            config: &scoped.config,
        };
        if !engine.transcribe_file(&media).await? {
            failures += 1;
        }
    }

    info!("retry: {} of {} file(s) still failing after retry", failures, problems.len());

    Ok(if failures > 0 { ExitCode::Recoverable } else { ExitCode::Success })
}
