//! Behaviour when the content store misbehaves

use tmx_core::{EngineError, FailureKind, Interface, Metadata, MigrationStatus};
use tmx_store::StoreError;
use tmx_test_utils::{translation_payload, EngineHarness};

#[tokio::test]
async fn rejected_live_write_is_reported_and_record_stays_pending() {
    let h = EngineHarness::new();
    h.seed_live(Interface::Mobile, "{}");
    let record = h.track(Interface::Mobile, "v1.1.0").await;
    h.store.reject_live_writes(true);

    let result = h.engine.apply_migration(record.id, true, true).await.unwrap();

    assert!(!result.success);
    assert_eq!(result.failure, Some(FailureKind::ApplyFailed));
    assert_eq!(result.error.as_deref(), Some("Migration application failed"));

    let stored = h.record(record.id);
    assert_eq!(stored.status, MigrationStatus::Pending);
    assert!(stored.executed_at.is_none());
    assert!(stored.backup_path().is_none());
    assert_eq!(h.events.count("failed"), 1);
    assert_eq!(h.events.count("applied"), 0);
    assert_eq!(h.live(Interface::Mobile).await.unwrap(), b"{}");
}

#[tokio::test]
async fn payload_read_fault_propagates_and_leaves_record_untouched() {
    let h = EngineHarness::new();
    let record = h.track(Interface::Mobile, "v1.1.0").await;
    let before = h.record(record.id);
    h.store.fault_payload_reads(true);

    let err = h
        .engine
        .apply_migration(record.id, true, false)
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Store(StoreError::Unavailable(_))));
    assert!(err.is_retryable());
    assert_eq!(h.record(record.id), before);
    assert!(h.events.events().is_empty());
    assert!(h.live(Interface::Mobile).await.is_none());
}

#[tokio::test]
async fn backup_write_fault_aborts_before_live_write() {
    let h = EngineHarness::new();
    h.seed_live(Interface::WebFinancer, "{\"old\":true}");
    let record = h.track(Interface::WebFinancer, "v2.0.0").await;
    h.store.fault_backup_writes(true);

    let err = h
        .engine
        .apply_migration(record.id, true, true)
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(h.record(record.id).status, MigrationStatus::Pending);
    assert_eq!(h.store.live_writes(), 0);
    assert!(h.events.events().is_empty());
}

#[tokio::test]
async fn retry_after_transient_fault_applies_once() {
    let h = EngineHarness::new();
    let record = h.track(Interface::Mobile, "v1.1.0").await;

    h.store.fault_payload_reads(true);
    assert!(h.engine.apply_migration(record.id, true, true).await.is_err());
    h.store.fault_payload_reads(false);

    let result = h.engine.apply_migration(record.id, true, true).await.unwrap();

    assert!(result.success);
    assert_eq!(
        h.live(Interface::Mobile).await.unwrap(),
        translation_payload("v1.1.0").into_bytes()
    );
    assert_eq!(h.events.count("applied"), 1);
}

#[tokio::test]
async fn unreadable_backup_fails_rollback_without_event() {
    let h = EngineHarness::new();
    h.seed_live(Interface::Mobile, "{}");
    let record = h.track(Interface::Mobile, "v1.1.0").await;
    h.engine.apply_migration(record.id, true, true).await.unwrap();
    h.events.take();
    h.store.fault_backup_reads(true);

    let result = h
        .engine
        .rollback_migration(record.id, "mobile copy reverted by product")
        .await
        .unwrap();

    assert_eq!(result.error.as_deref(), Some("Rollback failed"));
    let stored = h.record(record.id);
    assert_eq!(stored.status, MigrationStatus::Completed);
    assert!(stored.rollback_reason().is_none());
    assert!(h.events.events().is_empty());
}

#[tokio::test]
async fn rejected_restore_keeps_record_completed() {
    let h = EngineHarness::new();
    h.seed_live(Interface::Mobile, "{}");
    let record = h.track(Interface::Mobile, "v1.1.0").await;
    h.engine.apply_migration(record.id, true, true).await.unwrap();
    h.store.reject_live_writes(true);

    let result = h
        .engine
        .rollback_migration(record.id, "mobile copy reverted by product")
        .await
        .unwrap();

    assert_eq!(result.failure, Some(FailureKind::RollbackFailed));
    assert_eq!(h.record(record.id).status, MigrationStatus::Completed);
    assert_eq!(h.events.count("rolled_back"), 0);
}

#[tokio::test]
async fn imported_backup_path_blocks_apply_before_live_write() {
    let h = EngineHarness::new();
    h.seed_live(Interface::Mobile, "{\"home\":\"original\"}");
    let record = h
        .track_with_metadata(
            Interface::Mobile,
            "v1.1.0",
            Metadata::new().with("backup_path", "backups/mobile/imported.json"),
        )
        .await;
    let before = h.record(record.id);

    let err = h
        .engine
        .apply_migration(record.id, true, true)
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Record(_)));
    assert_eq!(h.record(record.id), before);
    assert_eq!(h.store.live_writes(), 0);
    assert_eq!(
        h.live(Interface::Mobile).await.unwrap(),
        b"{\"home\":\"original\"}"
    );
    assert!(h.events.events().is_empty());
}
