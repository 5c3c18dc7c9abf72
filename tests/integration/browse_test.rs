//! Integration tests for listings, downloads and the admin overview.

use std::io::{Cursor, Read};

use futures::TryStreamExt;

use treehub_core::error::ErrorKind;
use treehub_service::Download;

use crate::helpers::{ALICE, BOB, TestApp};

async fn collect(download: Download) -> Vec<u8> {
    download
        .stream
        .try_fold(Vec::new(), |mut acc, chunk| async move {
            acc.extend_from_slice(&chunk);
            Ok(acc)
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn test_listing_puts_folders_first_with_mtimes() {
    let app = TestApp::new().await;
    app.upload(ALICE, "docs/zeta.txt", b"z").await;
    app.upload(ALICE, "docs/alpha.txt", b"a").await;
    app.mkdir(ALICE, "docs/sub").await;

    let items = app.ctx.browse.list_children(ALICE, "docs").await.unwrap();
    let names: Vec<_> = items.iter().map(|i| i.entry.name()).collect();
    assert_eq!(names, vec!["sub", "alpha.txt", "zeta.txt"]);
    assert!(items.iter().all(|i| i.modified_at.is_some()));

    let top = app.ctx.browse.list_children(ALICE, "/").await.unwrap();
    assert_eq!(top.len(), 1);
    assert!(top[0].entry.is_folder);

    assert!(app.ctx.browse.list_children(BOB, "").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_listing_rejects_files_and_missing_folders() {
    let app = TestApp::new().await;
    app.upload(ALICE, "file.txt", b"f").await;
    app.mkdir(ALICE, "empty").await;

    assert!(app.ctx.browse.list_children(ALICE, "empty").await.unwrap().is_empty());

    let err = app.ctx.browse.list_children(ALICE, "file.txt").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
    let err = app.ctx.browse.list_children(ALICE, "nowhere").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    let err = app.ctx.browse.list_children(ALICE, "../up").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidPath);
}

#[tokio::test]
async fn test_folder_tree_reports_depth() {
    let app = TestApp::new().await;
    app.mkdir(ALICE, "a/b/c").await;
    app.upload(ALICE, "a/readme.md", b"r").await;
    app.mkdir(ALICE, "d").await;

    let tree = app.ctx.browse.folder_tree(ALICE).await.unwrap();
    let shape: Vec<_> = tree.iter().map(|t| (t.path.as_str(), t.depth)).collect();
    assert_eq!(shape, vec![("a", 0), ("a/b", 1), ("a/b/c", 2), ("d", 0)]);
    assert_eq!(tree[2].label(), "    └─ c");
}

#[tokio::test]
async fn test_download_file_streams_content() {
    let app = TestApp::new().await;
    app.upload(ALICE, "docs/a.txt", b"0123456789").await;

    let download = app.ctx.browse.download(ALICE, "docs/a.txt").await.unwrap();
    assert_eq!(download.file_name, "a.txt");
    assert!(!download.is_archive);
    assert_eq!(collect(download).await, b"0123456789");

    let err = app.ctx.browse.download(ALICE, "docs/missing.txt").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn test_download_folder_builds_zip() {
    let app = TestApp::new().await;
    app.upload(ALICE, "docs/a.txt", b"alpha").await;
    app.upload(ALICE, "docs/nested/b.txt", b"beta").await;
    app.mkdir(ALICE, "docs/empty").await;

    let download = app.ctx.browse.download(ALICE, "docs").await.unwrap();
    assert_eq!(download.file_name, "docs.zip");
    assert!(download.is_archive);

    let bytes = collect(download).await;
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut content = String::new();
    archive
        .by_name("nested/b.txt")
        .unwrap()
        .read_to_string(&mut content)
        .unwrap();
    assert_eq!(content, "beta");
    assert!(archive.by_name("a.txt").is_ok());
    assert!(archive.by_name("empty/").is_ok());

    let whole = app.ctx.browse.download(ALICE, "").await.unwrap();
    assert_eq!(whole.file_name, "root.zip");
    let bytes = collect(whole).await;
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    assert!(archive.by_name("docs/nested/b.txt").is_ok());
}

#[tokio::test]
async fn test_dir_size_and_stat() {
    let app = TestApp::new().await;
    app.upload(ALICE, "docs/a.txt", b"12345").await;
    app.upload(ALICE, "docs/deep/b.txt", b"123").await;

    assert_eq!(app.ctx.browse.dir_size(ALICE, "docs").await.unwrap(), 8);
    assert_eq!(app.ctx.browse.dir_size(ALICE, "gone").await.unwrap(), 0);

    let object = app.ctx.browse.stat(ALICE, "docs/a.txt").await.unwrap();
    assert!(!object.is_folder);
    assert_eq!(object.size_bytes, 5);
    let err = app.ctx.browse.stat(ALICE, "docs/none").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn test_admin_lists_every_owner() {
    let app = TestApp::new().await;
    app.upload(ALICE, "docs/a.txt", b"0123456789").await;
    app.upload(BOB, "b.txt", b"xyz").await;

    let owners = app.ctx.admin.owners().await.unwrap();
    let summary: Vec<_> = owners
        .iter()
        .map(|o| (o.root.owner_id, o.root.size_bytes, o.entry_count))
        .collect();
    assert_eq!(summary, vec![(ALICE, 10, 2), (BOB, 3, 1)]);
    assert!(owners.iter().all(|o| o.root.modified_at.is_some()));
}
