//! `scribe restart` (§6): reset stalled stages and optionally kick off one
//! fresh pool pass over everything that is now eligible again.

use super::ExitCode;
use crate::error::Result;
use crate::orchestrator::{stall, Orchestrator};
use clap::Args;
use tracing::info;

#[derive(Debug, Args)]
pub struct RestartArgs {
    /// Minutes an in-progress stage may sit idle before it's considered
    /// stalled (default: config.stalled_timeout_minutes).
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Reset stalled stages but don't start a fresh pool pass.
    #[arg(long)]
    pub no_auto_restart: bool,
}

pub async fn run(args: RestartArgs, orchestrator: &Orchestrator) -> Result<ExitCode> {
    let threshold = args.timeout.unwrap_or(orchestrator.config.stalled_timeout_minutes);

    let result = stall::sweep_once(
        &orchestrator.store,
        threshold as i64,
        &orchestrator.config.target_languages,
    )
    .await?;
    info!("restart: reset {} stalled stage(s)", result.recovered);

    if !args.no_auto_restart {
        orchestrator.run_all_pools_once().await?;
    }

    Ok(ExitCode::Success)
}
