use super::models::ErrorLogEntry;
use super::Store;
use crate::error::Result;
use uuid::Uuid;

impl Store {
    pub async fn log_error(
        &self,
        file_id: Uuid,
        process_stage: &str,
        message: &str,
        details: Option<&str>,
    ) -> Result<bool> {
        let _guard = self.write_guard().await;
        let result = sqlx::query(
            r#"
            INSERT INTO errors (file_id, process_stage, error_message, error_details)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(file_id.to_string())
        .bind(process_stage)
        .bind(message)
        .bind(details)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_errors(&self, file_id: Uuid) -> Result<Vec<ErrorLogEntry>> {
        let rows = sqlx::query_as::<_, ErrorLogEntry>(
            "SELECT * FROM errors WHERE file_id = ? ORDER BY timestamp ASC",
        )
        .bind(file_id.to_string())
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    pub async fn count_errors(&self, file_id: Uuid, stage: Option<&str>) -> Result<i64> {
        let count: (i64,) = if let Some(stage) = stage {
            sqlx::query_as("SELECT COUNT(*) FROM errors WHERE file_id = ? AND process_stage = ?")
                .bind(file_id.to_string())
                .bind(stage)
                .fetch_one(self.pool())
                .await?
        } else {
            sqlx::query_as("SELECT COUNT(*) FROM errors WHERE file_id = ?")
                .bind(file_id.to_string())
                .fetch_one(self.pool())
                .await?
        };
        Ok(count.0)
    }

    /// Clear errors for a file (optionally scoped to one stage) — used after
    /// a stage completes successfully (§4.6 step 8: "clear prior errors for
    /// this file's `transcription` stage").
    pub async fn clear_errors(&self, file_id: Option<Uuid>, stage: Option<&str>) -> Result<u64> {
        let _guard = self.write_guard().await;

        let affected = match (file_id, stage) {
            (Some(id), Some(stage)) => {
                sqlx::query("DELETE FROM errors WHERE file_id = ? AND process_stage = ?")
                    .bind(id.to_string())
                    .bind(stage)
                    .execute(self.pool())
                    .await?
                    .rows_affected()
            }
            (Some(id), None) => {
                sqlx::query("DELETE FROM errors WHERE file_id = ?")
                    .bind(id.to_string())
                    .execute(self.pool())
                    .await?
                    .rows_affected()
            }
            (None, Some(stage)) => {
                sqlx::query("DELETE FROM errors WHERE process_stage = ?")
                    .bind(stage)
                    .execute(self.pool())
                    .await?
                    .rows_affected()
            }
            (None, None) => {
                sqlx::query("DELETE FROM errors")
                    .execute(self.pool())
                    .await?
                    .rows_affected()
            }
        };

        Ok(affected)
    }
}
