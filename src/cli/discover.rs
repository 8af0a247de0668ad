//! `scribe discover` (design doc §3 Lifecycle): get files into the tracking
//! store, either by scanning a directory or registering one file directly.

use super::ExitCode;
use crate::discover;
use crate::error::{PipelineError, Result};
use crate::orchestrator::Orchestrator;
use clap::Args;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Args)]
pub struct DiscoverArgs {
    /// Directory to scan recursively for new audio/video files.
    #[arg(long, conflicts_with = "file")]
    pub directory: Option<PathBuf>,

    /// Register a single file instead of scanning a directory.
    #[arg(long, conflicts_with = "directory")]
    pub file: Option<PathBuf>,

    /// Stop after registering this many new files (directory scan only).
    #[arg(long)]
    pub limit: Option<usize>,
}

pub async fn run(args: DiscoverArgs, orchestrator: &Orchestrator) -> Result<ExitCode> {
    if let Some(file) = &args.file {
        let id = discover::add_single_file(&orchestrator.store, &orchestrator.config, file).await?;
        info!("discover: registered {} as {id}", file.display());
        return Ok(ExitCode::Success);
    }

    let directory = args
        .directory
        .as_ref()
        .ok_or_else(|| PipelineError::Validation("discover requires --directory or --file".to_string()))?;
    let found = discover::discover_files(&orchestrator.store, &orchestrator.config, directory, args.limit).await?;
    info!("discover: registered {} new file(s) from {}", found.len(), directory.display());

    Ok(ExitCode::Success)
}
