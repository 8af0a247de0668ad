//! `scribe monitor` (§6): run the pipeline in the foreground, draining every
//! pool on a fixed interval and optionally sweeping stalled stages, until
//! SIGINT requests a clean shutdown.

use super::ExitCode;
use crate::error::Result;
use crate::orchestrator::{stall, Orchestrator};
use clap::Args;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Args)]
pub struct MonitorArgs {
    /// Seconds between pool drain passes (default: config.check_interval_seconds).
    #[arg(long)]
    pub check_interval: Option<u64>,

    /// Minutes before an in-progress stage is considered stalled (default: config value).
    #[arg(long)]
    pub restart_interval: Option<u64>,

    /// Disable the stall-recovery sweep entirely.
    #[arg(long)]
    pub no_auto_restart: bool,
}

pub async fn run(args: MonitorArgs, orchestrator: &Orchestrator) -> Result<ExitCode> {
    let check_interval = Duration::from_secs(
        args.check_interval.unwrap_or(orchestrator.config.check_interval_seconds),
    );
    let stall_threshold = args
        .restart_interval
        .unwrap_or(orchestrator.config.stalled_timeout_minutes);

    info!("monitor: starting (check_interval={check_interval:?}, auto_restart={})", !args.no_auto_restart);

    loop {
        if orchestrator.is_cancelled() {
            info!("monitor: shutdown requested, exiting cleanly");
            return Ok(ExitCode::Success);
        }

        orchestrator.run_all_pools_once().await?;

        if !args.no_auto_restart {
            let swept = stall::sweep_once(
                &orchestrator.store,
                stall_threshold as i64,
                &orchestrator.config.target_languages,
            )
            .await?;
            if swept.recovered > 0 {
                info!("monitor: stall sweep recovered {} stage(s)", swept.recovered);
            }
        }

        let step = Duration::from_secs(1);
        let mut waited = Duration::ZERO;
        while waited < check_interval {
            if orchestrator.is_cancelled() {
                info!("monitor: shutdown requested, exiting cleanly");
                return Ok(ExitCode::Success);
            }
            tokio::time::sleep(step.min(check_interval - waited)).await;
            waited += step;
        }
    }
}

/// Install the SIGINT handler that flips `orchestrator`'s cancellation flag
/// (§5 "cooperative cancellation... a shared flag checked at batch and item
/// boundaries"); shared by every long-running CLI command, not just monitor.
pub fn install_signal_handler(orchestrator: &Orchestrator) {
    let cancelled = orchestrator.cancellation_handle();
    let _ = ctrlc::set_handler(move || {
        if cancelled.load(Ordering::Relaxed) {
            std::process::exit(1);
        }
        eprintln!("\nreceived interrupt, finishing in-flight items before exiting...");
        cancelled.store(true, Ordering::Relaxed);
    });
}
