use super::models::{OverallStatus, ProcessingStatus, StageStatus, StatusUpdate};
use super::Store;
use crate::error::{PipelineError, Result};
use chrono::Utc;
use uuid::Uuid;

fn translation_column(lang: &str) -> Result<&'static str> {
    match lang {
        "en" => Ok("translation_en_status"),
        "he" => Ok("translation_he_status"),
        "de" => Ok("translation_de_status"),
        other => Err(PipelineError::Validation(format!(
            "unsupported target language: {other}"
        ))),
    }
}

impl Store {
    pub async fn get_status(&self, file_id: Uuid) -> Result<Option<ProcessingStatus>> {
        let row = sqlx::query_as::<_, ProcessingStatus>(
            "SELECT * FROM processing_status WHERE file_id = ?",
        )
        .bind(file_id.to_string())
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    /// Apply a whitelisted status update (§4.1 `update_status`). Always
    /// bumps `attempts` and `last_updated`; sets `started_at` on the first
    /// transition into `in_progress` and `completed_at` on transitions into
    /// `completed`/`failed` unless the caller supplied one explicitly.
    pub async fn update_status(&self, file_id: Uuid, update: StatusUpdate) -> Result<bool> {
        let _guard = self.write_guard().await;
        let file_id_str = file_id.to_string();

        let current = sqlx::query_as::<_, ProcessingStatus>(
            "SELECT * FROM processing_status WHERE file_id = ?",
        )
        .bind(&file_id_str)
        .fetch_optional(self.pool())
        .await?;

        let Some(current) = current else {
            return Err(PipelineError::NotFound(file_id.to_string()));
        };

        let now = Utc::now().to_rfc3339();

        let becomes_in_progress = update.overall_status == Some(OverallStatus::InProgress)
            || update.transcription_status == Some(StageStatus::InProgress)
            || update.translation_status == Some(StageStatus::InProgress);

        let transcription_terminal = update
            .transcription_status
            .map(|s| matches!(s, StageStatus::Completed | StageStatus::Failed))
            .unwrap_or(false);
        let translation_terminal = update
            .translation_status
            .map(|s| matches!(s, StageStatus::Completed | StageStatus::Failed))
            .unwrap_or(false);
        let overall_terminal = update
            .overall_status
            .map(|s| matches!(s, OverallStatus::Completed | OverallStatus::Failed))
            .unwrap_or(false);

        let started_at = if becomes_in_progress && current.started_at.is_none() {
            Some(now.clone())
        } else {
            None
        };

        let explicit_completed_at = update.completed_at.map(|t| t.to_rfc3339());
        let completed_at = explicit_completed_at.or_else(|| {
            if transcription_terminal || translation_terminal || overall_terminal {
                Some(now.clone())
            } else {
                None
            }
        });

        let mut tx = self.pool().begin().await?;

        if let Some(overall) = update.overall_status {
            sqlx::query("UPDATE processing_status SET overall_status = ? WHERE file_id = ?")
                .bind(overall.as_str())
                .bind(&file_id_str)
                .execute(&mut *tx)
                .await?;
        }

        if let Some(status) = update.transcription_status {
            sqlx::query("UPDATE processing_status SET transcription_status = ? WHERE file_id = ?")
                .bind(status.as_str())
                .bind(&file_id_str)
                .execute(&mut *tx)
                .await?;
        }

        if let (Some(lang), Some(status)) = (&update.translation_lang, update.translation_status) {
            let column = translation_column(lang)?;
            let sql = format!("UPDATE processing_status SET {column} = ? WHERE file_id = ?");
            sqlx::query(&sql)
                .bind(status.as_str())
                .bind(&file_id_str)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(
            r#"
            UPDATE processing_status SET
                last_updated = ?,
                attempts = attempts + 1,
                started_at = COALESCE(?, started_at),
                completed_at = COALESCE(?, completed_at)
            WHERE file_id = ?
            "#,
        )
        .bind(&now)
        .bind(&started_at)
        .bind(&completed_at)
        .bind(&file_id_str)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(true)
    }

    pub async fn list_by_status(
        &self,
        statuses: &[OverallStatus],
        limit: Option<i64>,
    ) -> Result<Vec<ProcessingStatus>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = statuses.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT * FROM processing_status WHERE overall_status IN ({placeholders}) LIMIT ?"
        );
        let mut query = sqlx::query_as::<_, ProcessingStatus>(&sql);
        for status in statuses {
            query = query.bind(status.as_str());
        }
        query = query.bind(limit.unwrap_or(i64::MAX));
        Ok(query.fetch_all(self.pool()).await?)
    }

    /// Rows ready to be claimed for a given stage (§4.8 worker loop): for
    /// `transcription`, rows with `transcription_status = 'not_started'`;
    /// for `translation_<lang>`, rows whose transcription is `completed` and
    /// whose `translation_<lang>_status = 'not_started'`.
    pub async fn list_pending_for_stage(
        &self,
        stage: &str,
        limit: i64,
    ) -> Result<Vec<ProcessingStatus>> {
        if stage == "transcription" {
            let rows = sqlx::query_as::<_, ProcessingStatus>(
                "SELECT * FROM processing_status WHERE transcription_status = 'not_started' LIMIT ?",
            )
            .bind(limit)
            .fetch_all(self.pool())
            .await?;
            return Ok(rows);
        }

        if let Some(lang) = stage.strip_prefix("translation_") {
            let column = translation_column(lang)?;
            let sql = format!(
                "SELECT * FROM processing_status WHERE transcription_status = 'completed' AND {column} = 'not_started' LIMIT ?"
            );
            let rows = sqlx::query_as::<_, ProcessingStatus>(&sql)
                .bind(limit)
                .fetch_all(self.pool())
                .await?;
            return Ok(rows);
        }

        if stage == "extraction" {
            let rows = sqlx::query_as::<_, ProcessingStatus>(
                "SELECT * FROM processing_status WHERE overall_status = 'pending' LIMIT ?",
            )
            .bind(limit)
            .fetch_all(self.pool())
            .await?;
            return Ok(rows);
        }

        Err(PipelineError::Validation(format!("unknown stage: {stage}")))
    }

    pub async fn list_for_transcription(&self, limit: Option<i64>) -> Result<Vec<ProcessingStatus>> {
        self.list_pending_for_stage("transcription", limit.unwrap_or(i64::MAX)).await
    }

    pub async fn list_unknown_language(&self) -> Result<Vec<super::models::MediaFile>> {
        let rows = sqlx::query_as::<_, super::models::MediaFile>(
            "SELECT * FROM media_files WHERE detected_language IS NULL",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// Rows stalled in `in_progress` longer than `threshold_minutes` (§4.8
    /// Stall recovery).
    pub async fn list_stalled(&self, threshold_minutes: i64) -> Result<Vec<ProcessingStatus>> {
        let cutoff = (Utc::now() - chrono::Duration::minutes(threshold_minutes)).to_rfc3339();
        let rows = sqlx::query_as::<_, ProcessingStatus>(
            r#"
            SELECT * FROM processing_status
            WHERE last_updated < ?
              AND (
                  transcription_status = 'in_progress'
                  OR translation_en_status = 'in_progress'
                  OR translation_he_status = 'in_progress'
                  OR translation_de_status = 'in_progress'
                  OR overall_status = 'in_progress'
              )
            "#,
        )
        .bind(cutoff)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    pub async fn summary_statistics(&self) -> Result<SummaryStatistics> {
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM media_files")
            .fetch_one(self.pool())
            .await?;

        let overall_counts = sqlx::query_as::<_, (String, i64)>(
            "SELECT overall_status, COUNT(*) FROM processing_status GROUP BY overall_status",
        )
        .fetch_all(self.pool())
        .await?;

        let transcription_counts = sqlx::query_as::<_, (String, i64)>(
            "SELECT transcription_status, COUNT(*) FROM processing_status GROUP BY transcription_status",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(SummaryStatistics {
            total_files: total.0,
            by_overall_status: overall_counts,
            by_transcription_status: transcription_counts,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SummaryStatistics {
    pub total_files: i64,
    pub by_overall_status: Vec<(String, i64)>,
    pub by_transcription_status: Vec<(String, i64)>,
}
