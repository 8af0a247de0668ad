use super::models::{MediaFile, MediaMetadataUpdate, MediaType};
use super::Store;
use crate::error::{PipelineError, Result};
use uuid::Uuid;

impl Store {
    /// Atomically insert a MediaFile and its initial ProcessingStatus row
    /// (§3 Lifecycle: "ProcessingStatus is created atomically with its
    /// MediaFile in the same transaction"). Fails with `DuplicatePath` if
    /// `original_path` is already recorded.
    #[allow(clippy::too_many_arguments)]
    pub async fn add_media(
        &self,
        original_path: &str,
        safe_filename: &str,
        media_type: MediaType,
        file_size: Option<i64>,
        duration: Option<f64>,
        checksum: Option<&str>,
        detected_language: Option<&str>,
    ) -> Result<Uuid> {
        let _guard = self.write_guard().await;

        if self.get_by_path_unlocked(original_path).await?.is_some() {
            return Err(PipelineError::DuplicatePath(original_path.to_string()));
        }

        let file_id = Uuid::new_v4();
        let file_id_str = file_id.to_string();

        let mut tx = self.pool().begin().await?;

        sqlx::query(
            r#"
            INSERT INTO media_files
                (file_id, original_path, safe_filename, file_size, duration, checksum, media_type, detected_language)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&file_id_str)
        .bind(original_path)
        .bind(safe_filename)
        .bind(file_size)
        .bind(duration)
        .bind(checksum)
        .bind(media_type.as_str())
        .bind(detected_language)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                PipelineError::DuplicatePath(original_path.to_string())
            }
            other => PipelineError::Database(other),
        })?;

        sqlx::query(
            r#"
            INSERT INTO processing_status (file_id)
            VALUES (?)
            "#,
        )
        .bind(&file_id_str)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(file_id)
    }

    pub async fn get_by_path(&self, original_path: &str) -> Result<Option<MediaFile>> {
        self.get_by_path_unlocked(original_path).await
    }

    async fn get_by_path_unlocked(&self, original_path: &str) -> Result<Option<MediaFile>> {
        let row = sqlx::query_as::<_, MediaFile>(
            "SELECT * FROM media_files WHERE original_path = ?",
        )
        .bind(original_path)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    pub async fn get_media(&self, file_id: Uuid) -> Result<Option<MediaFile>> {
        let row = sqlx::query_as::<_, MediaFile>("SELECT * FROM media_files WHERE file_id = ?")
            .bind(file_id.to_string())
            .fetch_optional(self.pool())
            .await?;
        Ok(row)
    }

    /// Whitelisted-field update (§4.1; §9 "replace dynamic kwargs with an
    /// explicit update-descriptor"). `safe_filename` changes are an explicit
    /// rename migration per §3 I7 — callers should rarely use it.
    pub async fn update_media_metadata(
        &self,
        file_id: Uuid,
        update: MediaMetadataUpdate,
    ) -> Result<bool> {
        let _guard = self.write_guard().await;
        let file_id_str = file_id.to_string();

        let result = sqlx::query(
            r#"
            UPDATE media_files SET
                file_size = COALESCE(?, file_size),
                duration = COALESCE(?, duration),
                checksum = COALESCE(?, checksum),
                detected_language = COALESCE(?, detected_language),
                safe_filename = COALESCE(?, safe_filename)
            WHERE file_id = ?
            "#,
        )
        .bind(update.file_size)
        .bind(update.duration)
        .bind(update.checksum)
        .bind(update.detected_language)
        .bind(update.safe_filename)
        .bind(&file_id_str)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn test_add_media_creates_status_row() {
        let store = Store::connect_in_memory().await.unwrap();
        let id = store
            .add_media("/in/a.mp3", "a.mp3", MediaType::Audio, Some(1024), None, None, None)
            .await
            .unwrap();

        let status = store.get_status(id).await.unwrap().unwrap();
        assert_eq!(status.overall_status, "pending");
        assert_eq!(status.transcription_status, "not_started");
        assert_eq!(status.attempts, 0);
    }

    #[tokio::test]
    async fn test_add_media_rejects_duplicate_path() {
        let store = Store::connect_in_memory().await.unwrap();
        store
            .add_media("/in/a.mp3", "a.mp3", MediaType::Audio, None, None, None, None)
            .await
            .unwrap();

        let result = store
            .add_media("/in/a.mp3", "a_again.mp3", MediaType::Audio, None, None, None, None)
            .await;

        assert_matches!(result, Err(PipelineError::DuplicatePath(_)));
    }

    #[tokio::test]
    async fn test_update_media_metadata_is_whitelisted() {
        let store = Store::connect_in_memory().await.unwrap();
        let id = store
            .add_media("/in/a.mp3", "a.mp3", MediaType::Audio, None, None, None, None)
            .await
            .unwrap();

        let update = MediaMetadataUpdate {
            duration: Some(42.5),
            detected_language: Some("deu".to_string()),
            ..Default::default()
        };
        assert!(store.update_media_metadata(id, update).await.unwrap());

        let media = store.get_media(id).await.unwrap().unwrap();
        assert_eq!(media.duration, Some(42.5));
        assert_eq!(media.detected_language.as_deref(), Some("deu"));
    }
}
