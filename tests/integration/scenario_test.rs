//! Integration tests for the end-to-end namespace scenarios.

use treehub_core::error::ErrorKind;
use treehub_database::NamespaceIndex;

use crate::helpers::{ALICE, TestApp, key};

#[tokio::test]
async fn test_upload_into_new_folder_is_listed() {
    let app = TestApp::new().await;
    app.mkdir(ALICE, "docs").await;
    app.upload(ALICE, "docs/a.txt", b"0123456789").await;

    let children = app.ctx.index.list_children(ALICE, &key("docs")).await.unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].logical_path.as_str(), "docs/a.txt");
    assert!(!children[0].is_folder);
    assert_eq!(children[0].size_bytes, 10);

    app.assert_consistent(ALICE).await;
}

#[tokio::test]
async fn test_rename_folder_rewrites_descendants() {
    let app = TestApp::new().await;
    app.mkdir(ALICE, "docs").await;
    app.upload(ALICE, "docs/a.txt", b"0123456789").await;

    let rewritten = app.ctx.namespace.rename(ALICE, "docs", "documents").await.unwrap();
    assert_eq!(rewritten, 2);

    let moved = app.ctx.index.list_subtree(ALICE, &key("documents")).await.unwrap();
    assert!(moved.iter().any(|e| e.logical_path.as_str() == "documents/a.txt"));
    assert!(app.ctx.index.list_subtree(ALICE, &key("docs")).await.unwrap().is_empty());

    assert!(app.on_disk(ALICE, "documents/a.txt"));
    assert!(!app.on_disk(ALICE, "docs"));
    app.assert_consistent(ALICE).await;
}

#[tokio::test]
async fn test_rename_leaves_prefix_sibling_alone() {
    let app = TestApp::new().await;
    app.mkdir(ALICE, "pics").await;
    app.upload(ALICE, "pics2/file.txt", b"sibling").await;

    app.ctx.namespace.rename(ALICE, "pics", "images").await.unwrap();

    assert!(app.indexed(ALICE, "images").await);
    assert!(!app.indexed(ALICE, "pics").await);
    assert!(app.indexed(ALICE, "pics2/file.txt").await);
    assert_eq!(app.read_disk(ALICE, "pics2/file.txt"), b"sibling");
    assert!(app.on_disk(ALICE, "images"));
    assert!(!app.on_disk(ALICE, "pics"));
    app.assert_consistent(ALICE).await;
}

#[tokio::test]
async fn test_delete_folder_removes_both_stores() {
    let app = TestApp::new().await;
    app.mkdir(ALICE, "documents").await;
    app.upload(ALICE, "documents/a.txt", b"0123456789").await;

    let removed = app.ctx.namespace.delete(ALICE, "documents").await.unwrap();
    assert_eq!(removed, 2);

    assert!(!app.indexed(ALICE, "documents").await);
    assert!(!app.indexed(ALICE, "documents/a.txt").await);
    assert!(!app.on_disk(ALICE, "documents"));
    app.assert_consistent(ALICE).await;
}

#[tokio::test]
async fn test_move_onto_existing_path_conflicts() {
    let app = TestApp::new().await;
    app.upload(ALICE, "a", b"first").await;
    app.upload(ALICE, "b", b"second").await;
    let before = app.indexed_paths(ALICE).await;

    let err = app.ctx.namespace.rename(ALICE, "a", "b").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);

    assert_eq!(app.indexed_paths(ALICE).await, before);
    assert_eq!(app.read_disk(ALICE, "a"), b"first");
    assert_eq!(app.read_disk(ALICE, "b"), b"second");
    let a = app.ctx.index.get(ALICE, &key("a")).await.unwrap().unwrap();
    let b = app.ctx.index.get(ALICE, &key("b")).await.unwrap().unwrap();
    assert_eq!((a.size_bytes, b.size_bytes), (5, 6));
    app.assert_consistent(ALICE).await;
}

#[tokio::test]
async fn test_move_into_keeps_name() {
    let app = TestApp::new().await;
    app.mkdir(ALICE, "archive").await;
    app.upload(ALICE, "inbox/report.pdf", b"%PDF").await;

    app.ctx
        .namespace
        .move_into(ALICE, "inbox/report.pdf", "archive")
        .await
        .unwrap();
    assert!(app.indexed(ALICE, "archive/report.pdf").await);
    assert!(app.on_disk(ALICE, "archive/report.pdf"));

    app.ctx.namespace.move_into(ALICE, "archive", "").await.unwrap_err();
    app.ctx
        .namespace
        .move_into(ALICE, "archive/report.pdf", "")
        .await
        .unwrap();
    assert!(app.indexed(ALICE, "report.pdf").await);
    app.assert_consistent(ALICE).await;
}

#[tokio::test]
async fn test_invalid_paths_are_rejected_before_mutation() {
    let app = TestApp::new().await;
    app.mkdir(ALICE, "docs").await;

    for bad in ["../escape", "docs/../..", "", "/", "a//b\0"] {
        let err = app.ctx.namespace.create_folder(ALICE, bad).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidPath, "path {bad:?}");
    }
    let err = app.ctx.namespace.delete(ALICE, "").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidPath);
    let err = app.ctx.namespace.rename(ALICE, "docs", "docs/inner").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidPath);

    assert_eq!(app.indexed_paths(ALICE).await, vec!["docs".to_string()]);
}
