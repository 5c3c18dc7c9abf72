//! Entry repository: the SQLite-backed namespace index.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use treehub_core::error::{AppError, ErrorKind};
use treehub_core::result::AppResult;
use treehub_core::types::{OwnerId, PathKey};
use treehub_entity::Entry;

use crate::index::NamespaceIndex;

const COLUMNS: &str = "owner_id, logical_path, is_folder, size_bytes, created_at";

/// Rows equal to `?2` or strictly below it. The separator is appended before
/// comparing so that `pics` never matches `pics2`.
const SUBTREE_FILTER: &str =
    "owner_id = ?1 AND (logical_path = ?2 OR substr(logical_path, 1, length(?2) + 1) = ?2 || '/')";

/// Repository for entry CRUD and subtree queries.
#[derive(Debug, Clone)]
pub struct EntryRepository {
    pool: SqlitePool,
}

impl EntryRepository {
    /// Create a new entry repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Return the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Open a write transaction.
    ///
    /// `BEGIN IMMEDIATE` takes the database write lock up front, waiting up
    /// to the busy timeout. A deferred transaction that reads first cannot
    /// upgrade to a writer while another connection writes, and fails with
    /// `SQLITE_BUSY` without waiting.
    async fn begin(&self) -> AppResult<sqlx::Transaction<'static, sqlx::Sqlite>> {
        self.pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e))
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

fn size_to_i64(size_bytes: u64) -> AppResult<i64> {
    i64::try_from(size_bytes)
        .map_err(|_| AppError::validation(format!("size {size_bytes} exceeds the index range")))
}

/// Insert folder rows for every missing ancestor of `path`.
///
/// Concurrent creation of the same ancestor is absorbed by `ON CONFLICT DO
/// NOTHING`. An ancestor that is indexed as a file is a `Conflict`.
async fn ensure_ancestors(
    conn: &mut SqliteConnection,
    owner: OwnerId,
    path: &PathKey,
    now: DateTime<Utc>,
) -> AppResult<()> {
    for ancestor in path.ancestors() {
        let is_folder: Option<bool> = sqlx::query_scalar(
            "SELECT is_folder FROM entries WHERE owner_id = ?1 AND logical_path = ?2",
        )
        .bind(owner)
        .bind(&ancestor)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to look up ancestor", e))?;

        match is_folder {
            Some(true) => {}
            Some(false) => {
                return Err(AppError::conflict(format!(
                    "Ancestor '{ancestor}' of '{path}' is a file"
                )));
            }
            None => {
                sqlx::query(
                    "INSERT INTO entries (owner_id, logical_path, is_folder, size_bytes, created_at) \
                     VALUES (?1, ?2, 1, 0, ?3) ON CONFLICT (owner_id, logical_path) DO NOTHING",
                )
                .bind(owner)
                .bind(&ancestor)
                .bind(now)
                .execute(&mut *conn)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to create ancestor folder", e)
                })?;
                debug!(owner_id = %owner, path = %ancestor, "Created ancestor folder entry");
            }
        }
    }
    Ok(())
}

#[async_trait]
impl NamespaceIndex for EntryRepository {
    async fn get(&self, owner: OwnerId, path: &PathKey) -> AppResult<Option<Entry>> {
        if path.is_root() {
            return Ok(None);
        }
        let sql = format!("SELECT {COLUMNS} FROM entries WHERE owner_id = ?1 AND logical_path = ?2");
        sqlx::query_as::<_, Entry>(&sql)
            .bind(owner)
            .bind(path)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find entry", e))
    }

    async fn list_children(&self, owner: OwnerId, folder: &PathKey) -> AppResult<Vec<Entry>> {
        let mut children: BTreeMap<String, Entry> = BTreeMap::new();

        for row in self.list_subtree(owner, folder).await? {
            let Some(rel) = row.logical_path.relative_to(folder) else {
                continue;
            };
            if rel.is_empty() {
                continue;
            }
            match rel.split_once('/') {
                None => {
                    children.insert(rel.to_string(), row);
                }
                Some((first, _)) => {
                    if !children.contains_key(first) {
                        let child = folder.join(first)?;
                        children.insert(
                            first.to_string(),
                            Entry::implicit_folder(owner, child, row.created_at),
                        );
                    }
                }
            }
        }

        let mut out: Vec<Entry> = children.into_values().collect();
        out.sort_by(|a, b| b.is_folder.cmp(&a.is_folder).then_with(|| a.name().cmp(b.name())));
        Ok(out)
    }

    async fn list_subtree(&self, owner: OwnerId, path: &PathKey) -> AppResult<Vec<Entry>> {
        let query = if path.is_root() {
            let sql = format!("SELECT {COLUMNS} FROM entries WHERE owner_id = ?1 ORDER BY logical_path");
            sqlx::query_as::<_, Entry>(&sql)
                .bind(owner)
                .fetch_all(&self.pool)
                .await
        } else {
            let sql = format!(
                "SELECT {COLUMNS} FROM entries WHERE {SUBTREE_FILTER} ORDER BY logical_path"
            );
            sqlx::query_as::<_, Entry>(&sql)
                .bind(owner)
                .bind(path)
                .fetch_all(&self.pool)
                .await
        };
        query.map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list subtree", e))
    }

    async fn create(
        &self,
        owner: OwnerId,
        path: &PathKey,
        is_folder: bool,
        size_bytes: u64,
    ) -> AppResult<Entry> {
        if path.is_root() {
            return Err(AppError::invalid_path("the owner root cannot be indexed"));
        }
        let size_bytes = if is_folder { 0 } else { size_to_i64(size_bytes)? };
        let now = Utc::now();

        let mut tx = self.begin().await?;
        ensure_ancestors(&mut tx, owner, path, now).await?;

        let sql = format!(
            "INSERT INTO entries (owner_id, logical_path, is_folder, size_bytes, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5) RETURNING {COLUMNS}"
        );
        let entry = sqlx::query_as::<_, Entry>(&sql)
            .bind(owner)
            .bind(path)
            .bind(is_folder)
            .bind(size_bytes)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::conflict(format!("Entry '{path}' already exists"))
                } else {
                    AppError::with_source(ErrorKind::Database, "Failed to create entry", e)
                }
            })?;

        tx.commit()
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to commit entry", e))?;
        Ok(entry)
    }

    async fn record_upload(
        &self,
        owner: OwnerId,
        path: &PathKey,
        size_bytes: u64,
    ) -> AppResult<Entry> {
        if path.is_root() {
            return Err(AppError::invalid_path("the owner root cannot be indexed"));
        }
        let size_bytes = size_to_i64(size_bytes)?;
        let now = Utc::now();

        let mut tx = self.begin().await?;
        ensure_ancestors(&mut tx, owner, path, now).await?;

        let sql = format!(
            "INSERT INTO entries (owner_id, logical_path, is_folder, size_bytes, created_at) \
             VALUES (?1, ?2, 0, ?3, ?4) \
             ON CONFLICT (owner_id, logical_path) DO UPDATE SET size_bytes = excluded.size_bytes \
             WHERE entries.is_folder = 0 \
             RETURNING {COLUMNS}"
        );
        let entry = sqlx::query_as::<_, Entry>(&sql)
            .bind(owner)
            .bind(path)
            .bind(size_bytes)
            .bind(now)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to record upload", e))?
            .ok_or_else(|| AppError::conflict(format!("'{path}' is indexed as a folder")))?;

        tx.commit()
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to commit upload", e))?;
        Ok(entry)
    }

    async fn bulk_rewrite(
        &self,
        owner: OwnerId,
        old_prefix: &PathKey,
        new_prefix: &PathKey,
    ) -> AppResult<u64> {
        if old_prefix.is_root() || new_prefix.is_root() {
            return Err(AppError::invalid_path(
                "the owner root cannot be renamed or used as a rename target",
            ));
        }
        if new_prefix.is_within(old_prefix) {
            return Err(AppError::invalid_path(format!(
                "cannot move '{old_prefix}' into its own subtree '{new_prefix}'"
            )));
        }

        let mut tx = self.begin().await?;
        ensure_ancestors(&mut tx, owner, new_prefix, Utc::now()).await?;

        let sql = format!(
            "UPDATE entries SET logical_path = ?3 || substr(logical_path, length(?2) + 1) \
             WHERE {SUBTREE_FILTER}"
        );
        let result = sqlx::query(&sql)
            .bind(owner)
            .bind(old_prefix)
            .bind(new_prefix)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::conflict(format!(
                        "Rewriting '{old_prefix}' to '{new_prefix}' collides with an existing entry"
                    ))
                } else {
                    AppError::with_source(ErrorKind::Database, "Failed to rewrite subtree", e)
                }
            })?;

        let rewritten = result.rows_affected();
        if rewritten == 0 {
            return Err(AppError::not_found(format!(
                "No entries within '{old_prefix}'"
            )));
        }

        tx.commit()
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to commit rewrite", e))?;
        debug!(owner_id = %owner, from = %old_prefix, to = %new_prefix, rewritten, "Rewrote subtree");
        Ok(rewritten)
    }

    async fn delete_subtree(&self, owner: OwnerId, path: &PathKey) -> AppResult<u64> {
        if path.is_root() {
            return Err(AppError::invalid_path("the owner root cannot be deleted"));
        }
        let sql = format!("DELETE FROM entries WHERE {SUBTREE_FILTER}");
        let result = sqlx::query(&sql)
            .bind(owner)
            .bind(path)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete subtree", e))?;
        Ok(result.rows_affected())
    }

    async fn set_size(&self, owner: OwnerId, path: &PathKey, size_bytes: u64) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE entries SET size_bytes = ?3 \
             WHERE owner_id = ?1 AND logical_path = ?2 AND is_folder = 0",
        )
        .bind(owner)
        .bind(path)
        .bind(size_to_i64(size_bytes)?)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to update size", e))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("File entry '{path}' not found")));
        }
        Ok(())
    }

    async fn owners(&self) -> AppResult<Vec<OwnerId>> {
        sqlx::query_scalar::<_, OwnerId>("SELECT DISTINCT owner_id FROM entries ORDER BY owner_id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list owners", e))
    }

    async fn count(&self, owner: OwnerId) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries WHERE owner_id = ?1")
            .bind(owner)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count entries", e))?;
        Ok(count as u64)
    }
}
