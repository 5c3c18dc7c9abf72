//! Integration tests for index failures that follow a filesystem change.

use treehub_core::error::{ErrorKind, OperationKind, RepairHint};

use crate::helpers::{ALICE, BOB, TestApp, key};

#[tokio::test]
async fn test_failed_rewrite_reports_partial_failure_and_keeps_old_prefix() {
    let app = TestApp::new().await;
    app.upload(ALICE, "docs/a.txt", b"0123456789").await;
    app.upload(ALICE, "docs/b.txt", b"01234").await;
    app.fail_writes_to("documents/b.txt").await;

    let err = app.ctx.namespace.rename(ALICE, "docs", "documents").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::PartialFailure);
    assert!(!err.is_retryable());
    assert_eq!(
        err.repair,
        Some(RepairHint {
            owner_id: ALICE,
            operation: OperationKind::Move,
            source: key("docs"),
            target: Some(key("documents")),
        })
    );

    // The rewrite rolled back as a whole.
    assert_eq!(
        app.indexed_paths(ALICE).await,
        vec!["docs", "docs/a.txt", "docs/b.txt"]
    );
    assert!(app.on_disk(ALICE, "documents/b.txt"));
    assert!(!app.on_disk(ALICE, "docs"));

    let report = app.ctx.reconciler.check(ALICE).await.unwrap();
    assert_eq!(
        report.missing_on_disk,
        vec![key("docs"), key("docs/a.txt"), key("docs/b.txt")]
    );
    assert_eq!(
        report.missing_in_index,
        vec![key("documents"), key("documents/a.txt"), key("documents/b.txt")]
    );
}

#[tokio::test]
async fn test_repair_restores_index_after_failed_move() {
    let app = TestApp::new().await;
    app.upload(ALICE, "docs/a.txt", b"0123456789").await;
    app.fail_writes_to("documents/a.txt").await;
    app.ctx
        .namespace
        .rename(ALICE, "docs", "documents")
        .await
        .unwrap_err();
    app.heal_index().await;

    let report = app.ctx.reconciler.repair(ALICE).await.unwrap();
    assert!(report.repaired);
    assert_eq!(report.discrepancy_count(), 4);

    assert_eq!(
        app.indexed_paths(ALICE).await,
        vec!["documents", "documents/a.txt"]
    );
    app.assert_consistent(ALICE).await;
    let listing = app.ctx.browse.list_children(ALICE, "documents").await.unwrap();
    assert_eq!(listing[0].entry.size_bytes, 10);
}

#[tokio::test]
async fn test_failed_upload_record_leaves_file_for_repair() {
    let app = TestApp::new().await;
    app.fail_writes_to("new.txt").await;

    let err = app
        .ctx
        .namespace
        .upload(ALICE, "new.txt", crate::helpers::body(b"payload"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::PartialFailure);
    assert_eq!(
        err.repair.as_ref().map(|h| h.operation),
        Some(OperationKind::Upload)
    );
    assert!(app.on_disk(ALICE, "new.txt"));
    assert!(!app.indexed(ALICE, "new.txt").await);
    assert_eq!(app.staged_count(), 0);

    app.heal_index().await;
    let reports = app.ctx.reconciler.run_all(true).await.unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].missing_in_index, vec![key("new.txt")]);

    let entry = app.ctx.browse.list_subtree(ALICE, "new.txt").await.unwrap();
    assert_eq!(entry[0].size_bytes, 7);
    app.assert_consistent(ALICE).await;
}

#[tokio::test]
async fn test_failed_delete_keeps_index_rows_until_repair() {
    let app = TestApp::new().await;
    app.upload(ALICE, "trash/x.txt", b"x").await;
    app.upload(ALICE, "trash/y.txt", b"y").await;
    app.fail_writes_to("trash/y.txt").await;

    let err = app.ctx.namespace.delete(ALICE, "trash").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::PartialFailure);
    assert_eq!(
        err.repair.as_ref().map(|h| h.operation),
        Some(OperationKind::Delete)
    );
    assert!(!app.on_disk(ALICE, "trash"));
    assert_eq!(
        app.indexed_paths(ALICE).await,
        vec!["trash", "trash/x.txt", "trash/y.txt"]
    );

    app.heal_index().await;
    app.ctx.reconciler.repair(ALICE).await.unwrap();
    assert!(app.indexed_paths(ALICE).await.is_empty());
    app.assert_consistent(ALICE).await;
}

#[tokio::test]
async fn test_failed_folder_record_is_partial_failure() {
    let app = TestApp::new().await;
    app.fail_writes_to("made").await;

    let err = app.ctx.namespace.create_folder(ALICE, "made").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::PartialFailure);
    assert_eq!(
        err.repair.as_ref().map(|h| h.operation),
        Some(OperationKind::CreateFolder)
    );
    assert!(app.on_disk(ALICE, "made"));

    app.heal_index().await;
    app.ctx.reconciler.repair(ALICE).await.unwrap();
    assert!(app.indexed(ALICE, "made").await);
}

#[tokio::test]
async fn test_unindexed_source_is_refused_before_any_change() {
    let app = TestApp::new().await;
    app.upload(ALICE, "stray.txt", b"s").await;
    sqlx::query("DELETE FROM entries WHERE logical_path = 'stray.txt'")
        .execute(&app.db_pool)
        .await
        .unwrap();

    let err = app
        .ctx
        .namespace
        .rename(ALICE, "stray.txt", "kept.txt")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert!(app.on_disk(ALICE, "stray.txt"));
    assert!(!app.on_disk(ALICE, "kept.txt"));
}

#[tokio::test]
async fn test_repair_of_one_owner_leaves_others_alone() {
    let app = TestApp::new().await;
    app.upload(ALICE, "a.txt", b"a").await;
    app.upload(BOB, "b.txt", b"b").await;
    std::fs::write(app.disk_path(BOB, "extra.txt"), b"extra").unwrap();

    let report = app.ctx.reconciler.repair(ALICE).await.unwrap();
    assert!(report.is_consistent());
    assert!(!report.repaired);

    let bob = app.ctx.reconciler.check(BOB).await.unwrap();
    assert_eq!(bob.missing_in_index, vec![key("extra.txt")]);
}
