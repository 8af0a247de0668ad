//! Integration test for the Translation Engine (§4.7): the store-state-driven
//! paths that don't require a live provider — the precondition gate on
//! transcription, the already-completed no-op, and the empty-transcript
//! failure. Provider dispatch itself needs real API keys and is covered by
//! the provider adapters' own unit tests (status classification, chunking,
//! normalization) rather than here.

use scribe_pipeline::config::Config;
use scribe_pipeline::layout::ArtifactLayout;
use scribe_pipeline::store::models::{MediaType, StageStatus, StatusUpdate};
use scribe_pipeline::store::Store;
use scribe_pipeline::translate::engine::TranslationEngine;
use scribe_pipeline::translate::ProviderRegistry;

#[tokio::test]
async fn test_translate_file_fails_fast_when_transcription_not_completed() {
    let store = Store::connect_in_memory().await.unwrap();
    let tmp = tempfile::tempdir().unwrap();
    let layout = ArtifactLayout::new(tmp.path());
    let config = Config::default();
    let providers = ProviderRegistry::from_config(&config);

    let file_id = store
        .add_media("/in/a.mp3", "a.mp3", MediaType::Audio, None, None, None, None)
        .await
        .unwrap();
    let media = store.get_media(file_id).await.unwrap().unwrap();

    let engine = TranslationEngine {
        store: &store,
        layout: &layout,
        config: &config,
        providers: &providers,
        provider_override: None,
        force: false,
    };

    let ok = engine.translate_file(&media, "en").await.unwrap();
    assert!(!ok);

    let status = store.get_status(file_id).await.unwrap().unwrap();
    assert_eq!(status.translation_status("en"), Some(StageStatus::Failed));

    let errors = store.list_errors(file_id).await.unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].error_message.as_deref().unwrap_or_default().contains("transcription"));
}

#[tokio::test]
async fn test_translate_file_is_noop_when_already_completed_and_not_forced() {
    let store = Store::connect_in_memory().await.unwrap();
    let tmp = tempfile::tempdir().unwrap();
    let layout = ArtifactLayout::new(tmp.path());
    let config = Config::default();
    let providers = ProviderRegistry::from_config(&config);

    let file_id = store
        .add_media("/in/a.mp3", "a.mp3", MediaType::Audio, None, None, None, None)
        .await
        .unwrap();
    store
        .update_status(file_id, StatusUpdate::transcription(StageStatus::Completed))
        .await
        .unwrap();
    store
        .update_status(file_id, StatusUpdate::translation("en", StageStatus::Completed))
        .await
        .unwrap();
    let media = store.get_media(file_id).await.unwrap().unwrap();

    let engine = TranslationEngine {
        store: &store,
        layout: &layout,
        config: &config,
        providers: &providers,
        provider_override: None,
        force: false,
    };

    let ok = engine.translate_file(&media, "en").await.unwrap();
    assert!(ok);
}

#[tokio::test]
async fn test_translate_file_fails_on_empty_transcript() {
    let store = Store::connect_in_memory().await.unwrap();
    let tmp = tempfile::tempdir().unwrap();
    let layout = ArtifactLayout::new(tmp.path());
    let config = Config::default();
    let providers = ProviderRegistry::from_config(&config);

    let file_id = store
        .add_media("/in/a.mp3", "a.mp3", MediaType::Audio, None, None, None, None)
        .await
        .unwrap();
    store
        .update_status(file_id, StatusUpdate::transcription(StageStatus::Completed))
        .await
        .unwrap();
    let media = store.get_media(file_id).await.unwrap().unwrap();

    let transcript_path = layout.transcript_path(&media.safe_filename);
    std::fs::create_dir_all(transcript_path.parent().unwrap()).unwrap();
    std::fs::write(&transcript_path, "   \n  ").unwrap();

    let engine = TranslationEngine {
        store: &store,
        layout: &layout,
        config: &config,
        providers: &providers,
        provider_override: None,
        force: false,
    };

    let ok = engine.translate_file(&media, "en").await.unwrap();
    assert!(!ok);

    let status = store.get_status(file_id).await.unwrap().unwrap();
    assert_eq!(status.translation_status("en"), Some(StageStatus::Failed));
}
