//! Stall recovery (§4.8): a periodic sweep that finds rows stuck
//! `in_progress` past a threshold — almost always a prior process that died
//! without reaching a terminal status — and resets them to `failed` so the
//! next pool run picks them back up as fresh retries.

use crate::error::Result;
use crate::store::models::{StageStatus, StatusUpdate};
use crate::store::Store;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct StallSweepResult {
    pub recovered: usize,
}

/// One sweep: reset every stalled stage on every row `list_stalled` returns
/// to `failed`, logging an error so it shows up in `count_errors` the same
/// way a real provider failure would. `target_languages` should be the
/// configured set (§6 `target_languages`) — stalled translation stages for
/// languages outside it are never checked.
pub async fn sweep_once(
    store: &Store,
    threshold_minutes: i64,
    target_languages: &[String],
) -> Result<StallSweepResult> {
    let stalled = store.list_stalled(threshold_minutes).await?;
    let mut recovered = 0usize;

    for status in stalled {
        let Ok(file_id) = status.file_id.parse() else {
            warn!("stall sweep: skipping row with unparsable file_id {}", status.file_id);
            continue;
        };

        if status.transcription() == StageStatus::InProgress {
            store
                .log_error(file_id, "transcription", "stage stalled, auto-reset to failed", None)
                .await?;
            store
                .update_status(file_id, StatusUpdate::transcription(StageStatus::Failed))
                .await?;
            recovered += 1;
        }

        for lang in target_languages {
            if status.translation_status(lang) == Some(StageStatus::InProgress) {
                let stage = format!("translation_{lang}");
                store
                    .log_error(file_id, &stage, "stage stalled, auto-reset to failed", None)
                    .await?;
                store
                    .update_status(file_id, StatusUpdate::translation(lang, StageStatus::Failed))
                    .await?;
                recovered += 1;
            }
        }
    }

    if recovered > 0 {
        info!("stall sweep: recovered {recovered} stalled stage(s)");
    }

    Ok(StallSweepResult { recovered })
}
