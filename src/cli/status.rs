//! `scribe status` (§6): print aggregate counts per stage, optionally with
//! a per-file breakdown and quality-evaluation summary (SPEC_FULL §C: the
//! store-side quality contract surfaces here, read-only).

use super::ExitCode;
use crate::error::Result;
use crate::orchestrator::Orchestrator;
use crate::store::models::OverallStatus;
use clap::Args;
use console::style;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum StatusFormat {
    #[default]
    Text,
    Json,
    Markdown,
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Include a per-file breakdown and quality evaluation counts.
    #[arg(long)]
    pub detailed: bool,

    #[arg(long, value_enum, default_value_t = StatusFormat::Text)]
    pub format: StatusFormat,
}

#[derive(Debug, Serialize)]
struct FileDetail {
    file_id: String,
    original_path: String,
    overall_status: String,
    transcription_status: String,
    translation_status: Vec<(String, String)>,
    quality_evaluations: usize,
}

#[derive(Debug, Serialize)]
struct StatusReport {
    total_files: i64,
    by_overall_status: Vec<(String, i64)>,
    by_transcription_status: Vec<(String, i64)>,
    details: Option<Vec<FileDetail>>,
}

pub async fn run(args: StatusArgs, orchestrator: &Orchestrator) -> Result<ExitCode> {
    let summary = orchestrator.store.summary_statistics().await?;

    let details = if args.detailed {
        let statuses = [
            OverallStatus::Pending,
            OverallStatus::InProgress,
            OverallStatus::Completed,
            OverallStatus::Failed,
        ];
        let rows = orchestrator.store.list_by_status(&statuses, None).await?;
        let mut details = Vec::with_capacity(rows.len());
        for row in rows {
            let Ok(file_id) = row.file_id.parse() else {
                continue;
            };
            let Some(media) = orchestrator.store.get_media(file_id).await? else {
                continue;
            };
            let translation_status = orchestrator
                .config
                .target_languages
                .iter()
                .map(|lang| {
                    let status = row
                        .translation_status(lang)
                        .map(|s| s.as_str().to_string())
                        .unwrap_or_else(|| "unknown".to_string());
                    (lang.clone(), status)
                })
                .collect();
            let quality_evaluations = orchestrator.store.list_quality(file_id).await?.len();

            details.push(FileDetail {
                file_id: row.file_id.clone(),
                original_path: media.original_path,
                overall_status: row.overall_status.clone(),
                transcription_status: row.transcription_status.clone(),
                translation_status,
                quality_evaluations,
            });
        }
        Some(details)
    } else {
        None
    };

    let report = StatusReport {
        total_files: summary.total_files,
        by_overall_status: summary.by_overall_status,
        by_transcription_status: summary.by_transcription_status,
        details,
    };

    match args.format {
        StatusFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        StatusFormat::Markdown => print_markdown(&report),
        StatusFormat::Text => print_text(&report),
    }

    let any_failed = report
        .by_overall_status
        .iter()
        .any(|(status, count)| status == "failed" && *count > 0);

    Ok(if any_failed {
        ExitCode::Recoverable
    } else {
        ExitCode::Success
    })
}

/// Colorize a status label the way the teacher's `interactive.rs` colorizes
/// its summary (`style(...).green()/.yellow()/.red()`): complete is green,
/// failed is red, everything in-flight is yellow.
fn styled_status(status: &str) -> String {
    match status {
        "completed" => style(status).green().to_string(),
        "failed" | "qa_failed" => style(status).red().to_string(),
        "in_progress" => style(status).yellow().to_string(),
        other => style(other).dim().to_string(),
    }
}

fn print_text(report: &StatusReport) {
    println!("{}", style("Total files").bold());
    println!("  {}", report.total_files);
    println!("{}", style("By overall status:").bold());
    for (status, count) in &report.by_overall_status {
        println!("  {:<12} {count}", styled_status(status));
    }
    println!("{}", style("By transcription status:").bold());
    for (status, count) in &report.by_transcription_status {
        println!("  {:<12} {count}", styled_status(status));
    }
    if let Some(details) = &report.details {
        println!("\n{}", style("Files:").bold());
        for d in details {
            println!(
                "  {} [{}] transcription={} translations={:?} evals={}",
                d.file_id,
                styled_status(&d.overall_status),
                styled_status(&d.transcription_status),
                d.translation_status,
                d.quality_evaluations
            );
        }
    }
}

fn print_markdown(report: &StatusReport) {
    println!("| status | count |");
    println!("|---|---|");
    for (status, count) in &report.by_overall_status {
        println!("| {status} | {count} |");
    }
    if let Some(details) = &report.details {
        println!("\n| file_id | overall | transcription |");
        println!("|---|---|---|");
        for d in details {
            println!("| {} | {} | {} |", d.file_id, d.overall_status, d.transcription_status);
        }
    }
}
