//! Cross-module integration tests for the Tracking Store: a file's status
//! row walked through the full lifecycle (§3), exercising `media`, `status`,
//! `errors`, and `quality` together rather than each in isolation.

use scribe_pipeline::store::models::{MediaType, StageStatus, StatusUpdate};
use scribe_pipeline::store::Store;

#[tokio::test]
async fn test_full_lifecycle_from_discovery_to_all_stages_completed() {
    let store = Store::connect_in_memory().await.unwrap();

    let file_id = store
        .add_media("/interviews/a.mp3", "a.mp3", MediaType::Audio, Some(1024), Some(12.5), None, None)
        .await
        .unwrap();

    let status = store.get_status(file_id).await.unwrap().unwrap();
    assert_eq!(status.overall(), scribe_pipeline::store::models::OverallStatus::Pending);
    assert_eq!(status.transcription(), StageStatus::NotStarted);
    assert_eq!(status.attempts, 0);

    store
        .update_status(file_id, StatusUpdate::transcription(StageStatus::InProgress))
        .await
        .unwrap();
    store
        .update_status(file_id, StatusUpdate::transcription(StageStatus::Completed))
        .await
        .unwrap();

    for lang in ["en", "he", "de"] {
        store
            .update_status(file_id, StatusUpdate::translation(lang, StageStatus::Completed))
            .await
            .unwrap();
    }

    let status = store.get_status(file_id).await.unwrap().unwrap();
    assert_eq!(status.transcription(), StageStatus::Completed);
    assert_eq!(status.translation_status("en"), Some(StageStatus::Completed));
    assert_eq!(status.translation_status("he"), Some(StageStatus::Completed));
    assert_eq!(status.translation_status("de"), Some(StageStatus::Completed));
    assert!(status.attempts >= 4);
    assert!(status.completed_at.is_none(), "overall_status itself is promoted by the engine, not update_status alone");
}

#[tokio::test]
async fn test_duplicate_path_is_rejected() {
    let store = Store::connect_in_memory().await.unwrap();
    store
        .add_media("/interviews/a.mp3", "a.mp3", MediaType::Audio, None, None, None, None)
        .await
        .unwrap();

    let result = store
        .add_media("/interviews/a.mp3", "a-2.mp3", MediaType::Audio, None, None, None, None)
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_list_pending_for_stage_respects_transcription_gate() {
    let store = Store::connect_in_memory().await.unwrap();
    let file_id = store
        .add_media("/interviews/a.mp3", "a.mp3", MediaType::Audio, None, None, None, None)
        .await
        .unwrap();

    let pending_translation = store.list_pending_for_stage("translation_en", 10).await.unwrap();
    assert!(pending_translation.is_empty(), "translation isn't eligible until transcription completes");

    store
        .update_status(file_id, StatusUpdate::transcription(StageStatus::Completed))
        .await
        .unwrap();

    let pending_translation = store.list_pending_for_stage("translation_en", 10).await.unwrap();
    assert_eq!(pending_translation.len(), 1);
    assert_eq!(pending_translation[0].file_id, file_id.to_string());
}

#[tokio::test]
async fn test_error_log_round_trips_and_clears_by_stage() {
    let store = Store::connect_in_memory().await.unwrap();
    let file_id = store
        .add_media("/interviews/a.mp3", "a.mp3", MediaType::Audio, None, None, None, None)
        .await
        .unwrap();

    store.log_error(file_id, "transcription", "provider returned 500", Some("retry 1/8")).await.unwrap();
    store.log_error(file_id, "translation_en", "empty transcript", None).await.unwrap();

    assert_eq!(store.count_errors(file_id, Some("transcription")).await.unwrap(), 1);
    assert_eq!(store.list_errors(file_id).await.unwrap().len(), 2);

    store.clear_errors(Some(file_id), Some("transcription")).await.unwrap();
    let remaining = store.list_errors(file_id).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].process_stage, "translation_en");
}

#[tokio::test]
async fn test_quality_evaluations_accumulate_per_language() {
    let store = Store::connect_in_memory().await.unwrap();
    let file_id = store
        .add_media("/interviews/a.mp3", "a.mp3", MediaType::Audio, None, None, None, None)
        .await
        .unwrap();

    store
        .record_quality(file_id, "en", "gpt-4o", 0.92, &["minor timing drift".to_string()], Some("looks good"))
        .await
        .unwrap();
    store
        .record_quality(file_id, "he", "gpt-4o", 0.81, &[], None)
        .await
        .unwrap();

    let evaluations = store.list_quality(file_id).await.unwrap();
    assert_eq!(evaluations.len(), 2);
    let en_eval = evaluations.iter().find(|e| e.language == "en").unwrap();
    assert_eq!(en_eval.issues_list(), vec!["minor timing drift".to_string()]);
}

#[tokio::test]
async fn test_summary_statistics_counts_across_files() {
    let store = Store::connect_in_memory().await.unwrap();
    let a = store.add_media("/a.mp3", "a.mp3", MediaType::Audio, None, None, None, None).await.unwrap();
    store.add_media("/b.mp3", "b.mp3", MediaType::Audio, None, None, None, None).await.unwrap();

    store
        .update_status(a, StatusUpdate::transcription(StageStatus::Completed))
        .await
        .unwrap();

    let summary = store.summary_statistics().await.unwrap();
    assert_eq!(summary.total_files, 2);
    let completed_transcriptions = summary
        .by_transcription_status
        .iter()
        .find(|(status, _)| status == "completed")
        .map(|(_, count)| *count)
        .unwrap_or(0);
    assert_eq!(completed_transcriptions, 1);
}
