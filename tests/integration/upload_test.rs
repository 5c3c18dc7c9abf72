//! Integration tests for staged uploads.

use std::io;
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;

use treehub_core::error::ErrorKind;
use treehub_database::NamespaceIndex;
use treehub_storage::ByteStream;

use crate::helpers::{ALICE, TestApp, body, key};

fn chunks(parts: &[&'static [u8]]) -> ByteStream {
    let items: Vec<Result<Bytes, io::Error>> =
        parts.iter().map(|p| Ok(Bytes::from_static(p))).collect();
    Box::pin(futures::stream::iter(items))
}

#[tokio::test]
async fn test_abandoned_upload_leaves_no_trace() {
    let app = TestApp::new().await;
    let stalled: ByteStream = Box::pin(
        futures::stream::iter(vec![Ok::<_, io::Error>(Bytes::from_static(b"first chunk"))])
            .chain(futures::stream::pending()),
    );

    let upload = app.ctx.namespace.upload(ALICE, "big.iso", stalled);
    let outcome = tokio::time::timeout(Duration::from_millis(200), upload).await;
    assert!(outcome.is_err(), "upload should still be waiting for content");

    assert_eq!(app.staged_count(), 0);
    assert!(!app.indexed(ALICE, "big.iso").await);
    assert!(!app.on_disk(ALICE, "big.iso"));
}

#[tokio::test]
async fn test_broken_stream_discards_partial_upload() {
    let app = TestApp::new().await;
    let broken: ByteStream = Box::pin(futures::stream::iter(vec![
        Ok(Bytes::from_static(b"partial")),
        Err(io::Error::new(io::ErrorKind::ConnectionReset, "client went away")),
    ]));

    let err = app
        .ctx
        .namespace
        .upload(ALICE, "docs/half.bin", broken)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Io);
    assert_eq!(app.staged_count(), 0);
    assert!(app.indexed_paths(ALICE).await.is_empty());
    assert!(!app.on_disk(ALICE, "docs"));
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let app = TestApp::with_upload_limit(8).await;

    let err = app
        .ctx
        .namespace
        .upload(ALICE, "too-big.txt", chunks(&[b"12345", b"67890"]))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
    assert_eq!(app.staged_count(), 0);
    assert!(!app.on_disk(ALICE, "too-big.txt"));

    app.upload(ALICE, "fits.txt", b"12345678").await;
    assert!(app.indexed(ALICE, "fits.txt").await);
}

#[tokio::test]
async fn test_size_comes_from_written_bytes() {
    let app = TestApp::new().await;
    let entry = app
        .ctx
        .namespace
        .upload(ALICE, "multi.txt", chunks(&[b"abc", b"", b"defgh"]))
        .await
        .unwrap();
    assert_eq!(entry.size_bytes, 8);
    assert_eq!(app.read_disk(ALICE, "multi.txt"), b"abcdefgh");
}

#[tokio::test]
async fn test_overwrite_refreshes_size_in_place() {
    let app = TestApp::new().await;
    app.upload(ALICE, "docs/a.txt", b"short").await;
    let first = app.ctx.index.get(ALICE, &key("docs/a.txt")).await.unwrap().unwrap();

    let second = app
        .ctx
        .namespace
        .upload(ALICE, "docs/a.txt", body(b"a good deal longer"))
        .await
        .unwrap();
    assert_eq!(second.size_bytes, 18);
    assert_eq!(second.created_at, first.created_at);
    assert_eq!(app.read_disk(ALICE, "docs/a.txt"), b"a good deal longer");
    assert_eq!(app.ctx.index.count(ALICE).await.unwrap(), 2);
    assert_eq!(app.staged_count(), 0);
    app.assert_consistent(ALICE).await;
}

#[tokio::test]
async fn test_upload_onto_folder_conflicts() {
    let app = TestApp::new().await;
    app.mkdir(ALICE, "docs").await;

    let err = app
        .ctx
        .namespace
        .upload(ALICE, "docs", body(b"oops"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);
    assert_eq!(app.staged_count(), 0);
    assert!(app.disk_path(ALICE, "docs").is_dir());
}

#[tokio::test]
async fn test_upload_below_file_conflicts() {
    let app = TestApp::new().await;
    app.upload(ALICE, "notes.txt", b"n").await;

    let err = app
        .ctx
        .namespace
        .upload(ALICE, "notes.txt/inner.txt", body(b"i"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);
    assert_eq!(app.indexed_paths(ALICE).await, vec!["notes.txt"]);
    assert_eq!(app.staged_count(), 0);
    app.assert_consistent(ALICE).await;
}
