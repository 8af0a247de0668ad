use super::models::QualityEvaluation;
use super::Store;
use crate::error::Result;
use uuid::Uuid;

impl Store {
    /// Record a quality evaluation row (§3 QualityEvaluation). `custom_data`
    /// is intentionally omitted from the schema (Open Question #3) — the
    /// `issues`/`comment` columns cover the contract.
    pub async fn record_quality(
        &self,
        file_id: Uuid,
        language: &str,
        model: &str,
        score: f64,
        issues: &[String],
        comment: Option<&str>,
    ) -> Result<bool> {
        let _guard = self.write_guard().await;
        let issues_json = serde_json::to_string(issues)?;

        let result = sqlx::query(
            r#"
            INSERT INTO quality_evaluations (file_id, language, model, score, issues, comment)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(file_id.to_string())
        .bind(language)
        .bind(model)
        .bind(score)
        .bind(issues_json)
        .bind(comment)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn list_quality(&self, file_id: Uuid) -> Result<Vec<QualityEvaluation>> {
        let rows = sqlx::query_as::<_, QualityEvaluation>(
            "SELECT * FROM quality_evaluations WHERE file_id = ? ORDER BY evaluated_at DESC",
        )
        .bind(file_id.to_string())
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::models::MediaType;

    #[tokio::test]
    async fn test_record_and_list_quality() {
        let store = Store::connect_in_memory().await.unwrap();
        let id = store
            .add_media("/in/a.mp3", "a.mp3", MediaType::Audio, None, None, None, None)
            .await
            .unwrap();

        store
            .record_quality(id, "he", "gpt-4o", 8.5, &["minor awkward phrasing".to_string()], Some("good"))
            .await
            .unwrap();

        let rows = store.list_quality(id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].score, 8.5);
        assert_eq!(rows[0].issues_list(), vec!["minor awkward phrasing".to_string()]);
    }
}
