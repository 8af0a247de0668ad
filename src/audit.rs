//! Audit/maintenance subsystem (§4.9): reconciles what the tracking store
//! believes about each (file, target language) pair against what is
//! actually on disk, and offers a dry-run-capable fix pass. The audit never
//! writes or rewrites an artifact itself — every fix action is a store
//! status update that either clears a stage back to `not_started` so the
//! next worker pass regenerates the artifact, or promotes a status to
//! `completed` when the artifact already proves the work was done.

use crate::error::Result;
use crate::layout::ArtifactLayout;
use crate::store::models::{MediaFile, StageStatus, StatusUpdate};
use crate::store::Store;
use crate::translate::langdetect::contains_rtl_char;
use std::path::PathBuf;
use tracing::info;

/// One (file, language) pair's diagnosis (§4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditVerdict {
    /// Store says `completed`, the artifact exists, is non-trivial, and
    /// looks structurally sound.
    Valid,
    /// The artifact exists but its content is a known placeholder/stub
    /// rather than a real translation (e.g. left over from a failed run).
    Placeholder,
    /// Store says `completed` but the artifact file does not exist at all.
    Missing,
    /// The artifact file exists and looks like real content, but the store
    /// does not record the stage as `completed` — most likely a worker
    /// wrote the file and then crashed before it could update the store.
    Orphaned,
    /// The artifact exists, is non-empty, but fails a basic structural
    /// check for its format (e.g. an `.srt` file with no parseable cues).
    Corrupted,
    /// The artifact exists but is zero bytes.
    Empty,
}

#[derive(Debug, Clone)]
pub struct AuditFinding {
    pub file_id: uuid::Uuid,
    pub lang: String,
    pub verdict: AuditVerdict,
    pub translation_path: PathBuf,
}

/// §4.9's literal placeholder markers, case-insensitive.
const PLACEHOLDER_MARKERS: &[&str] = &[
    "[hebrew translation]",
    "[german translation]",
    "[english translation]",
    "<<<placeholder>>>",
    "translation pending",
    "to be translated",
];

/// Audit every configured target language for one media file (§4.9). Does
/// not require the transcription stage to be complete — a language whose
/// translation was never attempted is simply reported against whatever the
/// store currently says, which for an unattempted stage is consistent
/// (no artifact, status not `completed`) and is not itself a finding.
///
/// `rtl_target_language` is the configured RTL target (e.g. `"he"`); a file
/// for that language with no RTL characters at all is a `PLACEHOLDER` per
/// §4.9 even without a literal marker string (P2: a completed RTL
/// translation must contain RTL script).
pub async fn audit_file(
    store: &Store,
    layout: &ArtifactLayout,
    media: &MediaFile,
    target_languages: &[String],
    rtl_target_language: &str,
) -> Result<Vec<AuditFinding>> {
    let file_id = media.id();
    let status = store.get_status(file_id).await?;
    let mut findings = Vec::new();

    for lang in target_languages {
        let completed = status
            .as_ref()
            .and_then(|s| s.translation_status(lang))
            == Some(StageStatus::Completed);

        let path = layout.translation_path(&media.safe_filename, lang);
        let metadata = std::fs::metadata(&path).ok();

        let verdict = match (completed, metadata) {
            (true, None) => Some(AuditVerdict::Missing),
            (false, None) => None,
            (_, Some(m)) if m.len() == 0 => Some(AuditVerdict::Empty),
            (completed, Some(_)) => {
                let contents = std::fs::read_to_string(&path).unwrap_or_default();
                let lowered = contents.to_lowercase();
                let is_rtl_target = lang == rtl_target_language;
                if PLACEHOLDER_MARKERS.iter().any(|m| lowered.contains(m))
                    || (is_rtl_target && !contains_rtl_char(&contents))
                {
                    Some(AuditVerdict::Placeholder)
                } else if looks_corrupted(&contents) {
                    Some(AuditVerdict::Corrupted)
                } else if !completed {
                    Some(AuditVerdict::Orphaned)
                } else {
                    Some(AuditVerdict::Valid)
                }
            }
        };

        if let Some(verdict) = verdict {
            findings.push(AuditFinding {
                file_id,
                lang: lang.clone(),
                verdict,
                translation_path: path,
            });
        }
    }

    Ok(findings)
}

/// Cheap structural check: a translation file full of the Unicode
/// replacement character or otherwise devoid of any alphabetic content is
/// almost certainly mojibake from a failed decode somewhere upstream.
fn looks_corrupted(contents: &str) -> bool {
    let trimmed = contents.trim();
    if trimmed.is_empty() {
        return false;
    }
    let replacement_count = trimmed.chars().filter(|&c| c == '\u{FFFD}').count();
    let has_alpha = trimmed.chars().any(|c| c.is_alphabetic());
    replacement_count > 0 || !has_alpha
}

/// Apply the fix implied by `finding` (§4.9 fix action). `dry_run` reports
/// what would happen without calling `update_status`. Returns `true` if a
/// (non-dry-run) change was made.
pub async fn apply_fix(store: &Store, finding: &AuditFinding, dry_run: bool) -> Result<bool> {
    let action = match finding.verdict {
        AuditVerdict::Valid => return Ok(false),
        AuditVerdict::Missing | AuditVerdict::Empty | AuditVerdict::Corrupted | AuditVerdict::Placeholder => {
            StatusUpdate::translation(finding.lang.clone(), StageStatus::NotStarted)
        }
        AuditVerdict::Orphaned => StatusUpdate::translation(finding.lang.clone(), StageStatus::Completed),
    };

    info!(
        "audit fix for {} [{}]: {:?} -> {}",
        finding.file_id,
        finding.lang,
        finding.verdict,
        if dry_run { "dry-run" } else { "applied" }
    );

    if dry_run {
        return Ok(false);
    }

    store.update_status(finding.file_id, action).await?;
    Ok(true)
}
