//! `scribe special` (§6, SPEC_FULL §C): one-shot sweep applying the
//! problem-file diagnosis and repair from `orchestrator::problem_files`
//! without the timeout/retry-budget scaling that `scribe retry` layers on.

use super::{parse_file_ids, ExitCode};
use crate::error::Result;
use crate::orchestrator::{problem_files, Orchestrator};
use clap::Args;
use tracing::info;

#[derive(Debug, Args)]
pub struct SpecialArgs {
    /// Restrict to these file ids (comma-separated UUIDs); default: every
    /// identified problem file.
    #[arg(long, value_name = "IDS")]
    pub file_ids: Option<String>,

    /// How many repeated transcription failures mark a file "failed
    /// repeatedly" rather than merely transient.
    #[arg(long, default_value_t = 3)]
    pub repeat_failure_threshold: i64,
}

pub async fn run(args: SpecialArgs, orchestrator: &Orchestrator) -> Result<ExitCode> {
    let wanted = args.file_ids.as_deref().map(parse_file_ids).transpose()?;

    let problems = problem_files::identify_problem_files(
        &orchestrator.store,
        &orchestrator.layout,
        args.repeat_failure_threshold,
    )
    .await?
    .into_iter()
    .filter(|p| match &wanted {
        Some(ids) => ids.contains(&p.file_id),
        None => true,
    })
    .collect::<Vec<_>>();

    info!("special: {} problem file(s) selected", problems.len());

    let mut applied = 0usize;
    for problem in &problems {
        info!("special: {:?} -> {}", problem.class, problem.original_path);
        if problem_files::apply_fix(&orchestrator.store, &orchestrator.layout, problem).await? {
            applied += 1;
        }
    }

    info!("special: fixed {applied} of {} problem file(s)", problems.len());

    Ok(if applied < problems.len() {
        ExitCode::Recoverable
    } else {
        ExitCode::Success
    })
}
