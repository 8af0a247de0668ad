//! `scribe verify` (§4.9, §6): audit every known file's translations against
//! what's actually on disk and report (or fix) the discrepancies.

use super::ExitCode;
use crate::audit::{self, AuditVerdict};
use crate::error::Result;
use crate::orchestrator::Orchestrator;
use crate::store::models::OverallStatus;
use clap::Args;
use tracing::info;

#[derive(Debug, Args)]
pub struct VerifyArgs {
    /// Apply the fix implied by each finding instead of only reporting it.
    #[arg(long)]
    pub auto_fix: bool,

    /// Print findings only; exit code still reflects whether any were found.
    #[arg(long)]
    pub report_only: bool,
}

pub async fn run(args: VerifyArgs, orchestrator: &Orchestrator) -> Result<ExitCode> {
    let apply_fixes = args.auto_fix && !args.report_only;

    let statuses = [
        OverallStatus::Pending,
        OverallStatus::InProgress,
        OverallStatus::Completed,
        OverallStatus::Failed,
    ];
    let rows = orchestrator.store.list_by_status(&statuses, None).await?;

    let mut total_findings = 0usize;
    let mut fixed = 0usize;

    for row in rows {
        let Ok(file_id) = row.file_id.parse() else {
            continue;
        };
        let Some(media) = orchestrator.store.get_media(file_id).await? else {
            continue;
        };

        let findings = audit::audit_file(
            &orchestrator.store,
            &orchestrator.layout,
            &media,
            &orchestrator.config.target_languages,
            &orchestrator.config.rtl_target_language,
        )
        .await?;

        for finding in &findings {
            if finding.verdict == AuditVerdict::Valid {
                continue;
            }
            total_findings += 1;
            println!(
                "{} [{}] {:?}: {}",
                media.original_path,
                finding.lang,
                finding.verdict,
                finding.translation_path.display()
            );

            if apply_fixes {
                if audit::apply_fix(&orchestrator.store, finding, false).await? {
                    fixed += 1;
                }
            }
        }
    }

    info!("verify: {total_findings} finding(s), {fixed} fixed");

    Ok(if total_findings > 0 && !apply_fixes {
        ExitCode::Recoverable
    } else if total_findings > fixed {
        ExitCode::Recoverable
    } else {
        ExitCode::Success
    })
}
