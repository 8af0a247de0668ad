//! Integration test for discovery + audit working together (§3 Lifecycle,
//! §4.9): register files via `discover`, simulate completed stages by
//! writing artifacts directly (standing in for the engines, which have
//! their own integration coverage), then audit and fix the discrepancies.

use scribe_pipeline::audit::{self, AuditVerdict};
use scribe_pipeline::config::Config;
use scribe_pipeline::discover;
use scribe_pipeline::layout::ArtifactLayout;
use scribe_pipeline::store::models::{StageStatus, StatusUpdate};
use scribe_pipeline::store::Store;

#[tokio::test]
async fn test_discover_then_audit_finds_missing_and_orphaned_and_valid() {
    let store = Store::connect_in_memory().await.unwrap();
    let tmp = tempfile::tempdir().unwrap();
    let layout = ArtifactLayout::new(tmp.path());
    let config = Config::default();

    let source_dir = tmp.path().join("source");
    std::fs::create_dir_all(&source_dir).unwrap();
    std::fs::write(source_dir.join("missing.mp3"), b"fake").unwrap();
    std::fs::write(source_dir.join("orphaned.mp3"), b"fake").unwrap();
    std::fs::write(source_dir.join("valid.mp3"), b"fake").unwrap();

    let found = discover::discover_files(&store, &config, &source_dir, None).await.unwrap();
    assert_eq!(found.len(), 3);

    for &file_id in &found {
        store
            .update_status(file_id, StatusUpdate::transcription(StageStatus::Completed))
            .await
            .unwrap();
    }

    let missing_path = source_dir.join("missing.mp3").to_str().unwrap().to_string();
    let orphaned_path = source_dir.join("orphaned.mp3").to_str().unwrap().to_string();
    let valid_path = source_dir.join("valid.mp3").to_str().unwrap().to_string();
    let missing = store.get_by_path(&missing_path).await.unwrap().unwrap();
    let orphaned = store.get_by_path(&orphaned_path).await.unwrap().unwrap();
    let valid = store.get_by_path(&valid_path).await.unwrap().unwrap();

    // "missing": store says completed, no artifact written at all.
    store
        .update_status(missing.id(), StatusUpdate::translation("en", StageStatus::Completed))
        .await
        .unwrap();

    // "orphaned": artifact exists with real content, but store was never updated.
    let orphaned_path = layout.translation_path(&orphaned.safe_filename, "en");
    std::fs::create_dir_all(orphaned_path.parent().unwrap()).unwrap();
    std::fs::write(&orphaned_path, "a perfectly good translation of the interview").unwrap();

    // "valid": artifact exists and store agrees.
    let valid_path = layout.translation_path(&valid.safe_filename, "en");
    std::fs::create_dir_all(valid_path.parent().unwrap()).unwrap();
    std::fs::write(&valid_path, "another good translation").unwrap();
    store
        .update_status(valid.id(), StatusUpdate::translation("en", StageStatus::Completed))
        .await
        .unwrap();

    let targets = vec!["en".to_string()];

    let missing_findings = audit::audit_file(&store, &layout, &missing, &targets, "he").await.unwrap();
    assert_eq!(missing_findings.len(), 1);
    assert_eq!(missing_findings[0].verdict, AuditVerdict::Missing);

    let orphaned_findings = audit::audit_file(&store, &layout, &orphaned, &targets, "he").await.unwrap();
    assert_eq!(orphaned_findings.len(), 1);
    assert_eq!(orphaned_findings[0].verdict, AuditVerdict::Orphaned);

    let valid_findings = audit::audit_file(&store, &layout, &valid, &targets, "he").await.unwrap();
    assert_eq!(valid_findings.len(), 1);
    assert_eq!(valid_findings[0].verdict, AuditVerdict::Valid);

    // Applying fixes: missing resets to not_started, orphaned promotes to completed,
    // valid is left untouched.
    assert!(audit::apply_fix(&store, &missing_findings[0], false).await.unwrap());
    assert!(audit::apply_fix(&store, &orphaned_findings[0], false).await.unwrap());
    assert!(!audit::apply_fix(&store, &valid_findings[0], false).await.unwrap());

    let missing_status = store.get_status(missing.id()).await.unwrap().unwrap();
    assert_eq!(missing_status.translation_status("en"), Some(StageStatus::NotStarted));

    let orphaned_status = store.get_status(orphaned.id()).await.unwrap().unwrap();
    assert_eq!(orphaned_status.translation_status("en"), Some(StageStatus::Completed));

    // A second audit pass now finds the orphaned file valid and the missing
    // file reports nothing (not_started with no artifact is not a finding).
    let orphaned_followup = audit::audit_file(&store, &layout, &orphaned, &targets, "he").await.unwrap();
    assert_eq!(orphaned_followup[0].verdict, AuditVerdict::Valid);

    let missing_followup = audit::audit_file(&store, &layout, &missing, &targets, "he").await.unwrap();
    assert!(missing_followup.is_empty());
}

#[tokio::test]
async fn test_audit_flags_placeholder_content() {
    let store = Store::connect_in_memory().await.unwrap();
    let tmp = tempfile::tempdir().unwrap();
    let layout = ArtifactLayout::new(tmp.path());

    let file_id = store
        .add_media("/in/a.mp3", "a.mp3", scribe_pipeline::store::models::MediaType::Audio, None, None, None, None)
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

    let path = layout.translation_path(&media.safe_filename, "en");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "[ENGLISH TRANSLATION] left over from a previous aborted run").unwrap();

    let findings = audit::audit_file(&store, &layout, &media, &["en".to_string()], "he").await.unwrap();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].verdict, AuditVerdict::Placeholder);

    let dry_run_changed = audit::apply_fix(&store, &findings[0], true).await.unwrap();
    assert!(!dry_run_changed);
    let changed = audit::apply_fix(&store, &findings[0], false).await.unwrap();
    assert!(changed);

    let status = store.get_status(file_id).await.unwrap().unwrap();
    assert_eq!(status.translation_status("en"), Some(StageStatus::NotStarted));
}

#[tokio::test]
async fn test_audit_flags_rtl_target_without_rtl_characters_as_placeholder() {
    let store = Store::connect_in_memory().await.unwrap();
    let tmp = tempfile::tempdir().unwrap();
    let layout = ArtifactLayout::new(tmp.path());

    let file_id = store
        .add_media("/in/b.mp3", "b.mp3", scribe_pipeline::store::models::MediaType::Audio, None, None, None, None)
        .await
        .unwrap();
    store
        .update_status(file_id, StatusUpdate::transcription(StageStatus::Completed))
        .await
        .unwrap();
    store
        .update_status(file_id, StatusUpdate::translation("he", StageStatus::Completed))
        .await
        .unwrap();
    let media = store.get_media(file_id).await.unwrap().unwrap();

    // Store says "he" translation is completed, but the file is plain
    // Latin-script text with no Hebrew characters at all — P2 says a
    // completed RTL translation must contain RTL script, so this is a
    // placeholder even though it has no literal marker string.
    let path = layout.translation_path(&media.safe_filename, "he");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "this never actually got translated to Hebrew").unwrap();

    let findings = audit::audit_file(&store, &layout, &media, &["he".to_string()], "he").await.unwrap();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].verdict, AuditVerdict::Placeholder);
}
