//! `scribe fix <action>` (§6 supplement, SPEC_FULL §C): a grab-bag of
//! targeted repair actions an operator reaches for once a specific problem
//! has already been diagnosed, as opposed to `scribe special`'s automatic
//! sweep. `fix hebrew` is the RTL audit shortcut called out by name in the
//! distilled spec's lifecycle notes.

use super::ExitCode;
use crate::audit;
use crate::error::{PipelineError, Result};
use crate::orchestrator::{stall, Orchestrator};
use crate::store::models::{OverallStatus, StageStatus, StatusUpdate};
use clap::{Args, Subcommand};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Subcommand)]
pub enum FixAction {
    /// Reset in-progress stages that have sat idle past the stall threshold.
    Stalled {
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Re-materialize each file's source symlink/copy under its artifact
    /// directory, repairing broken links left by a moved input tree.
    Paths,
    /// Find `transcription_status = completed` rows whose transcript.txt is
    /// missing or empty and reset them (enforces the "a completed stage has
    /// a non-empty artifact" invariant).
    Transcripts,
    /// Manually override one file's stage status.
    Mark(MarkArgs),
    /// Audit and, unless `--dry-run`, fix the configured RTL target
    /// language's translations for every file.
    Hebrew {
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Debug, Args)]
pub struct MarkArgs {
    pub file_id: Uuid,
    /// "transcription" or "translation:<lang>".
    pub stage: String,
    pub status: String,
}

#[derive(Debug, Args)]
pub struct FixArgs {
    #[command(subcommand)]
    pub action: FixAction,
}

pub async fn run(args: FixArgs, orchestrator: &Orchestrator) -> Result<ExitCode> {
    match args.action {
        FixAction::Stalled { timeout } => {
            let threshold = timeout.unwrap_or(orchestrator.config.stalled_timeout_minutes);
            let result = stall::sweep_once(
                &orchestrator.store,
                threshold as i64,
                &orchestrator.config.target_languages,
            )
            .await?;
            info!("fix stalled: reset {} stage(s)", result.recovered);
            Ok(ExitCode::Success)
        }
        FixAction::Paths => fix_paths(orchestrator).await,
        FixAction::Transcripts => fix_transcripts(orchestrator).await,
        FixAction::Mark(mark) => fix_mark(orchestrator, mark).await,
        FixAction::Hebrew { dry_run } => fix_hebrew(orchestrator, dry_run).await,
    }
}

async fn fix_paths(orchestrator: &Orchestrator) -> Result<ExitCode> {
    let statuses = [
        OverallStatus::Pending,
        OverallStatus::InProgress,
        OverallStatus::Completed,
        OverallStatus::Failed,
    ];
    let rows = orchestrator.store.list_by_status(&statuses, None).await?;

    let mut repaired = 0usize;
    for row in rows {
        let Ok(file_id) = row.file_id.parse() else { continue };
        let Some(media) = orchestrator.store.get_media(file_id).await? else { continue };
        match orchestrator
            .layout
            .materialize_source(std::path::Path::new(&media.original_path), &media.safe_filename)
        {
            Ok(_) => repaired += 1,
            Err(e) => warn!("could not materialize source for {}: {e}", media.original_path),
        }
    }

    info!("fix paths: re-materialized {repaired} source link(s)");
    Ok(ExitCode::Success)
}

async fn fix_transcripts(orchestrator: &Orchestrator) -> Result<ExitCode> {
    let rows = orchestrator
        .store
        .list_by_status(&[OverallStatus::Pending, OverallStatus::InProgress, OverallStatus::Completed], None)
        .await?;

    let mut reset = 0usize;
    for row in rows {
        if row.transcription() != StageStatus::Completed {
            continue;
        }
        let Ok(file_id) = row.file_id.parse() else { continue };
        let Some(media) = orchestrator.store.get_media(file_id).await? else { continue };

        let path = orchestrator.layout.transcript_path(&media.safe_filename);
        let non_empty = std::fs::metadata(&path).map(|m| m.len() > 0).unwrap_or(false);
        if non_empty {
            continue;
        }

        orchestrator
            .store
            .update_status(file_id, StatusUpdate::transcription(StageStatus::Failed))
            .await?;
        warn!("fix transcripts: {} claimed completed with no transcript, reset to failed", media.original_path);
        reset += 1;
    }

    info!("fix transcripts: reset {reset} file(s) with a missing/empty transcript");
    Ok(if reset > 0 { ExitCode::Recoverable } else { ExitCode::Success })
}

async fn fix_mark(orchestrator: &Orchestrator, mark: MarkArgs) -> Result<ExitCode> {
    if orchestrator.store.get_media(mark.file_id).await?.is_none() {
        return Err(PipelineError::NotFound(mark.file_id.to_string()));
    }

    let status: StageStatus = mark
        .status
        .parse()
        .map_err(|e: String| PipelineError::Validation(e))?;

    let update = if mark.stage == "transcription" {
        StatusUpdate::transcription(status)
    } else if let Some(lang) = mark.stage.strip_prefix("translation:") {
        StatusUpdate::translation(lang, status)
    } else {
        return Err(PipelineError::Validation(format!(
            "unknown stage '{}': expected 'transcription' or 'translation:<lang>'",
            mark.stage
        )));
    };

    orchestrator.store.update_status(mark.file_id, update).await?;
    info!("fix mark: {} {} -> {}", mark.file_id, mark.stage, mark.status);
    Ok(ExitCode::Success)
}

async fn fix_hebrew(orchestrator: &Orchestrator, dry_run: bool) -> Result<ExitCode> {
    let rtl = vec![orchestrator.config.rtl_target_language.clone()];
    let statuses = [
        OverallStatus::Pending,
        OverallStatus::InProgress,
        OverallStatus::Completed,
        OverallStatus::Failed,
    ];
    let rows = orchestrator.store.list_by_status(&statuses, None).await?;

    let mut fixed = 0usize;
    for row in rows {
        let Ok(file_id) = row.file_id.parse() else { continue };
        let Some(media) = orchestrator.store.get_media(file_id).await? else { continue };

        let findings = audit::audit_file(
            &orchestrator.store,
            &orchestrator.layout,
            &media,
            &rtl,
            &orchestrator.config.rtl_target_language,
        )
        .await?;
        for finding in &findings {
            if finding.verdict == audit::AuditVerdict::Valid {
                continue;
            }
            println!("{} [{}] {:?}", media.original_path, finding.lang, finding.verdict);
            if audit::apply_fix(&orchestrator.store, finding, dry_run).await? {
                fixed += 1;
            }
        }
    }

    info!("fix hebrew: {fixed} finding(s) fixed (dry_run={dry_run})");
    Ok(ExitCode::Success)
}
