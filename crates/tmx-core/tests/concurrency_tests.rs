//! Concurrent callers on the same record

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tmx_core::{FailureKind, Interface, MigrationStatus};
use tmx_test_utils::EngineHarness;

#[tokio::test]
async fn concurrent_applies_write_live_content_once() {
    let h = EngineHarness::new();
    h.seed_live(Interface::Mobile, "{}");
    let record = h.track(Interface::Mobile, "v1.1.0").await;
    h.store.delay_writes(Duration::from_millis(5));

    let results = join_all((0..8).map(|_| h.engine.apply_migration(record.id, true, true))).await;

    let results: Vec<_> = results.into_iter().map(Result::unwrap).collect();
    assert_eq!(results.iter().filter(|r| r.success).count(), 1);
    assert!(results
        .iter()
        .filter(|r| !r.success)
        .all(|r| r.failure == Some(FailureKind::AlreadyApplied)));
    assert_eq!(h.store.live_writes(), 1);
    assert_eq!(h.events.count("applied"), 1);
    assert_eq!(h.record(record.id).status, MigrationStatus::Completed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_rollbacks_restore_once() {
    let h = Arc::new(EngineHarness::new());
    h.seed_live(Interface::WebFinancer, "{\"v\":1}");
    let record = h.track(Interface::WebFinancer, "v2.0.0").await;
    h.engine.apply_migration(record.id, true, true).await.unwrap();
    h.store.delay_writes(Duration::from_millis(5));
    let id = record.id;

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let h = Arc::clone(&h);
            tokio::spawn(async move {
                h.engine
                    .rollback_migration(id, format!("duplicate rollback request {i}"))
                    .await
            })
        })
        .collect();

    let mut succeeded = 0;
    for handle in handles {
        let result = handle.await.unwrap().unwrap();
        if result.success {
            succeeded += 1;
        } else {
            assert_eq!(result.failure, Some(FailureKind::AlreadyRolledBack));
        }
    }

    assert_eq!(succeeded, 1);
    assert_eq!(h.events.count("rolled_back"), 1);
    assert_eq!(h.live(Interface::WebFinancer).await.unwrap(), b"{\"v\":1}");
}

#[tokio::test]
async fn different_records_do_not_block_each_other() {
    let h = EngineHarness::new();
    let mobile = h.track(Interface::Mobile, "v1.1.0").await;
    let web = h.track(Interface::WebBeneficiary, "v1.0.0").await;

    let (a, b) = tokio::join!(
        h.engine.apply_migration(mobile.id, false, true),
        h.engine.apply_migration(web.id, false, true),
    );

    assert!(a.unwrap().success);
    assert!(b.unwrap().success);
}
