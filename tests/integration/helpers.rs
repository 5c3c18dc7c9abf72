//! Shared test helpers for integration tests.

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use sqlx::SqlitePool;
use tempfile::TempDir;

use treehub_core::config::{DatabaseConfig, StorageConfig};
use treehub_core::types::{OwnerId, PathKey};
use treehub_database::migration::run_migrations;
use treehub_database::{DatabasePool, EntryRepository, NamespaceIndex};
use treehub_service::ServiceContext;
use treehub_storage::{ByteStream, PhysicalStore};

/// Default owner used by most tests.
pub const ALICE: OwnerId = OwnerId(1);
/// Second owner, for isolation tests.
pub const BOB: OwnerId = OwnerId(2);

/// Test application context
pub struct TestApp {
    /// Every service, wired over the in-memory index and a temp store
    pub ctx: ServiceContext,
    /// Database pool for direct queries and failure injection
    pub db_pool: SqlitePool,
    /// Holds the owners root and staging directory
    pub dir: TempDir,
}

impl TestApp {
    /// Create a new test application
    pub async fn new() -> Self {
        Self::with_upload_limit(64 * 1024 * 1024).await
    }

    /// Create a test application with a custom upload size limit
    pub async fn with_upload_limit(max_upload_size_bytes: u64) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let db = DatabasePool::in_memory()
            .await
            .expect("Failed to open in-memory database");
        Self::build(dir, db, max_upload_size_bytes).await
    }

    /// Create a test application over a pooled file database, as deployed
    pub async fn with_file_database() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = DatabaseConfig {
            url: format!("sqlite://{}/index.db", dir.path().display()),
            max_connections: 8,
            ..DatabaseConfig::default()
        };
        let db = DatabasePool::connect(&config)
            .await
            .expect("Failed to open file database");
        Self::build(dir, db, 64 * 1024 * 1024).await
    }

    async fn build(dir: TempDir, db: DatabasePool, max_upload_size_bytes: u64) -> Self {
        run_migrations(db.pool())
            .await
            .expect("Failed to run migrations");
        let db_pool = db.into_pool();

        let storage = StorageConfig {
            owners_root: dir.path().join("owners").display().to_string(),
            staging_dir: dir.path().join("staging").display().to_string(),
            max_upload_size_bytes,
        };
        let store = PhysicalStore::new(&storage)
            .await
            .expect("Failed to init storage");

        let index: Arc<dyn NamespaceIndex> = Arc::new(EntryRepository::new(db_pool.clone()));
        let ctx = ServiceContext::new(index, Arc::new(store));

        Self { ctx, db_pool, dir }
    }

    /// Directory holding staged uploads
    pub fn staging_dir(&self) -> PathBuf {
        self.dir.path().join("staging")
    }

    /// Number of files currently staged
    pub fn staged_count(&self) -> usize {
        std::fs::read_dir(self.staging_dir())
            .map(|d| d.count())
            .unwrap_or(0)
    }

    /// Absolute path of a logical path on disk
    pub fn disk_path(&self, owner: OwnerId, path: &str) -> PathBuf {
        self.ctx.store.resolve(owner, &key(path))
    }

    /// Whether a logical path exists on disk
    pub fn on_disk(&self, owner: OwnerId, path: &str) -> bool {
        self.disk_path(owner, path).exists()
    }

    /// Read a file's content straight from disk
    pub fn read_disk(&self, owner: OwnerId, path: &str) -> Vec<u8> {
        std::fs::read(self.disk_path(owner, path)).expect("Failed to read file from disk")
    }

    /// Whether the index has a row for a logical path
    pub async fn indexed(&self, owner: OwnerId, path: &str) -> bool {
        self.ctx
            .index
            .get(owner, &key(path))
            .await
            .expect("Index lookup failed")
            .is_some()
    }

    /// Every indexed path of an owner, in order
    pub async fn indexed_paths(&self, owner: OwnerId) -> Vec<String> {
        self.ctx
            .index
            .list_subtree(owner, &PathKey::root())
            .await
            .expect("Index scan failed")
            .into_iter()
            .map(|e| e.logical_path.to_string())
            .collect()
    }

    /// Upload in-memory content
    pub async fn upload(&self, owner: OwnerId, path: &str, content: &[u8]) {
        self.ctx
            .namespace
            .upload(owner, path, body(content))
            .await
            .expect("Upload failed");
    }

    /// Create a folder
    pub async fn mkdir(&self, owner: OwnerId, path: &str) {
        self.ctx
            .namespace
            .create_folder(owner, path)
            .await
            .expect("Create folder failed");
    }

    /// Assert the index and the physical tree describe the same objects
    pub async fn assert_consistent(&self, owner: OwnerId) {
        let report = self
            .ctx
            .reconciler
            .check(owner)
            .await
            .expect("Reconcile check failed");
        assert!(report.is_consistent(), "stores diverge: {report:?}");
    }

    /// Make every index write touching `path` fail
    pub async fn fail_writes_to(&self, path: &str) {
        for (event, row) in [("INSERT", "NEW"), ("UPDATE", "NEW"), ("DELETE", "OLD")] {
            let sql = format!(
                "CREATE TRIGGER fail_{event} BEFORE {event} ON entries \
                 WHEN {row}.logical_path = '{path}' \
                 BEGIN SELECT RAISE(ABORT, 'injected failure'); END"
            );
            sqlx::query(&sql)
                .execute(&self.db_pool)
                .await
                .expect("Failed to install trigger");
        }
    }

    /// Remove the triggers installed by [`TestApp::fail_writes_to`]
    pub async fn heal_index(&self) {
        for event in ["INSERT", "UPDATE", "DELETE"] {
            sqlx::query(&format!("DROP TRIGGER IF EXISTS fail_{event}"))
                .execute(&self.db_pool)
                .await
                .expect("Failed to drop trigger");
        }
    }
}

/// Parse a logical path
pub fn key(raw: &str) -> PathKey {
    PathKey::normalize(raw).expect("Invalid test path")
}

/// Single-chunk upload body
pub fn body(content: &[u8]) -> ByteStream {
    let chunk = Bytes::copy_from_slice(content);
    Box::pin(futures::stream::iter(vec![Ok::<_, std::io::Error>(chunk)]))
}
