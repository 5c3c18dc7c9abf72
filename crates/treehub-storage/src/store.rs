//! Owner-scoped physical store.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use treehub_core::config::StorageConfig;
use treehub_core::error::{AppError, ErrorKind};
use treehub_core::result::AppResult;
use treehub_core::types::{OwnerId, PathKey};
use treehub_entity::{OwnerRoot, PhysicalObject};

use crate::ByteStream;
use crate::archive;
use crate::scan;
use crate::staging::{self, StagedFile};

/// Filesystem store holding one directory tree per owner.
///
/// Every operation resolves a [`PathKey`] below `owners_root/<owner_id>`.
/// Path keys never contain `.` or `..` segments, so a resolved path cannot
/// leave the owner's directory.
#[derive(Debug, Clone)]
pub struct PhysicalStore {
    /// Shared root containing one directory per owner.
    owners_root: PathBuf,
    /// Directory for uploads that have not been committed yet.
    staging_dir: PathBuf,
    /// Upper bound on a single staged upload.
    max_upload_size_bytes: u64,
}

fn io_err(context: String, e: io::Error) -> AppError {
    AppError::with_source(ErrorKind::Io, context, e)
}

fn blocking_err(e: tokio::task::JoinError) -> AppError {
    AppError::with_source(ErrorKind::Internal, "Blocking filesystem task failed", e)
}

/// Directories created on the way to a destination, deepest first.
///
/// Dropping the guard removes them again; [`CreatedDirs::keep`] commits them
/// once the operation that needed them has succeeded.
#[derive(Debug, Default)]
struct CreatedDirs {
    dirs: Vec<PathBuf>,
}

impl CreatedDirs {
    fn keep(mut self) {
        self.dirs.clear();
    }
}

impl Drop for CreatedDirs {
    fn drop(&mut self) {
        for dir in &self.dirs {
            match std::fs::remove_dir(dir) {
                Ok(()) => debug!(path = %dir.display(), "Removed folder created for a failed operation"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(
                    path = %dir.display(),
                    error = %e,
                    "Failed to remove folder created for a failed operation"
                ),
            }
        }
    }
}

/// Copy `src` over `dest` through a sibling temporary file, so that `dest`
/// is either fully replaced or left as it was.
async fn copy_into_place(src: &Path, dest: &Path) -> io::Result<()> {
    let name = dest.file_name().and_then(|n| n.to_str()).unwrap_or("upload");
    let temp = dest.with_file_name(format!(".{name}.{}.part", Uuid::new_v4()));

    let result = match fs::copy(src, &temp).await {
        Ok(_) => fs::rename(&temp, dest).await,
        Err(e) => Err(e),
    };
    if result.is_err() {
        if let Err(e) = fs::remove_file(&temp).await {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %temp.display(), error = %e, "Failed to remove partial copy");
            }
        }
    }
    result
}

impl PhysicalStore {
    /// Create the store, creating the shared root and staging directories.
    pub async fn new(config: &StorageConfig) -> AppResult<Self> {
        let owners_root = PathBuf::from(&config.owners_root);
        let staging_dir = PathBuf::from(&config.staging_dir);
        for dir in [&owners_root, &staging_dir] {
            fs::create_dir_all(dir).await.map_err(|e| {
                io_err(format!("Failed to create storage directory: {}", dir.display()), e)
            })?;
        }
        info!(
            owners_root = %owners_root.display(),
            staging_dir = %staging_dir.display(),
            "Physical store ready"
        );
        Ok(Self {
            owners_root,
            staging_dir,
            max_upload_size_bytes: config.max_upload_size_bytes,
        })
    }

    /// Shared root containing every owner directory.
    pub fn owners_root(&self) -> &Path {
        &self.owners_root
    }

    /// Absolute path of an owner's tree, without touching the filesystem.
    fn owner_dir(&self, owner: OwnerId) -> PathBuf {
        self.owners_root.join(owner.dir_name())
    }

    /// Absolute path of an owner's tree, created on first access.
    pub async fn root_for(&self, owner: OwnerId) -> AppResult<PathBuf> {
        let root = self.owner_dir(owner);
        fs::create_dir_all(&root).await.map_err(|e| {
            io_err(format!("Failed to create owner root: {}", root.display()), e)
        })?;
        Ok(root)
    }

    /// Translate a logical path into an absolute path under the owner root.
    pub fn resolve(&self, owner: OwnerId, path: &PathKey) -> PathBuf {
        let mut full = self.owner_dir(owner);
        for segment in path.segments() {
            full.push(segment);
        }
        full
    }

    async fn metadata(&self, owner: OwnerId, path: &PathKey) -> AppResult<Option<std::fs::Metadata>> {
        let full = self.resolve(owner, path);
        match fs::symlink_metadata(&full).await {
            Ok(meta) => Ok(Some(meta)),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
                ) =>
            {
                Ok(None)
            }
            Err(e) => Err(io_err(format!("Failed to stat '{path}'"), e)),
        }
    }

    /// Whether anything exists at `path`.
    pub async fn exists(&self, owner: OwnerId, path: &PathKey) -> AppResult<bool> {
        Ok(self.metadata(owner, path).await?.is_some())
    }

    /// Type, size and modification time of the object at `path`.
    pub async fn stat(&self, owner: OwnerId, path: &PathKey) -> AppResult<PhysicalObject> {
        self.try_stat(owner, path)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Path not found: {path}")))
    }

    /// Like [`PhysicalStore::stat`], but a missing object is `None`.
    pub async fn try_stat(&self, owner: OwnerId, path: &PathKey) -> AppResult<Option<PhysicalObject>> {
        Ok(self.metadata(owner, path).await?.map(|meta| PhysicalObject {
            path: path.clone(),
            is_folder: meta.is_dir(),
            size_bytes: if meta.is_file() { meta.len() } else { 0 },
            modified_at: scan::modified_at(&meta),
        }))
    }

    /// Create every missing directory up to and including `dir`.
    ///
    /// A file sitting anywhere on the way is a `Conflict`.
    async fn create_dirs(&self, dir: &Path, display: &PathKey) -> AppResult<()> {
        fs::create_dir_all(dir).await.map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists | io::ErrorKind::NotADirectory => AppError::with_source(
                ErrorKind::Conflict,
                format!("A file is in the way of folder '{display}'"),
                e,
            ),
            _ => io_err(format!("Failed to create folder '{display}'"), e),
        })
    }

    /// Create the missing directories up to and including `dir`, returning
    /// a guard that removes them again unless kept.
    async fn create_parents(&self, dir: &Path, display: &PathKey) -> AppResult<CreatedDirs> {
        let mut missing = Vec::new();
        let mut cursor = Some(dir);
        while let Some(current) = cursor {
            if current == self.owners_root || fs::symlink_metadata(current).await.is_ok() {
                break;
            }
            missing.push(current.to_path_buf());
            cursor = current.parent();
        }
        self.create_dirs(dir, display).await?;
        Ok(CreatedDirs { dirs: missing })
    }

    /// Create `path` and its parents. Succeeds if the folder already exists.
    pub async fn create_folder(&self, owner: OwnerId, path: &PathKey) -> AppResult<()> {
        self.root_for(owner).await?;
        let full = self.resolve(owner, path);
        self.create_dirs(&full, path).await?;
        debug!(owner_id = %owner, path = %path, "Created folder");
        Ok(())
    }

    /// Stream upload content into the staging area.
    ///
    /// No owner state is touched; the result is committed with
    /// [`PhysicalStore::commit_staged`].
    pub async fn stage(&self, content: ByteStream) -> AppResult<StagedFile> {
        staging::stage_stream(&self.staging_dir, content, self.max_upload_size_bytes).await
    }

    /// Move a staged upload to `path`, replacing an existing file.
    ///
    /// Parent folders are created as needed. Returns the committed size.
    pub async fn commit_staged(
        &self,
        owner: OwnerId,
        path: &PathKey,
        staged: StagedFile,
    ) -> AppResult<u64> {
        if path.is_root() {
            return Err(AppError::invalid_path("cannot write a file at the owner root"));
        }
        self.root_for(owner).await?;
        let full = self.resolve(owner, path);

        if let Some(meta) = self.metadata(owner, path).await? {
            if meta.is_dir() {
                return Err(AppError::conflict(format!("'{path}' is a folder")));
            }
        }
        let created = match (full.parent(), path.parent()) {
            (Some(parent_dir), Some(parent_key)) => {
                self.create_parents(parent_dir, &parent_key).await?
            }
            _ => CreatedDirs::default(),
        };

        let size = match fs::rename(staged.path(), &full).await {
            Ok(()) => staged.disarm(),
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                warn!(
                    staging = %staged.path().display(),
                    "Staging directory is on another filesystem, copying upload"
                );
                copy_into_place(staged.path(), &full)
                    .await
                    .map_err(|e| io_err(format!("Failed to copy upload into '{path}'"), e))?;
                // The staged copy is removed when `staged` drops.
                staged.size_bytes()
            }
            Err(e) => return Err(io_err(format!("Failed to move upload into '{path}'"), e)),
        };
        created.keep();
        debug!(owner_id = %owner, path = %path, bytes = size, "Committed upload");
        Ok(size)
    }

    /// Write `content` to `path`, creating parents and overwriting an
    /// existing file. Returns the final size.
    pub async fn write_file(
        &self,
        owner: OwnerId,
        path: &PathKey,
        content: ByteStream,
    ) -> AppResult<u64> {
        let staged = self.stage(content).await?;
        self.commit_staged(owner, path, staged).await
    }

    /// Rename or move a file or folder within one owner's tree.
    ///
    /// Fails with `NotFound` if `from` is missing and with `Conflict` if
    /// `to` exists; in both cases nothing is changed. After the rename the
    /// modification time of the moved object and all its descendants is
    /// set to now.
    pub async fn move_or_rename(&self, owner: OwnerId, from: &PathKey, to: &PathKey) -> AppResult<()> {
        if from.is_root() || to.is_root() {
            return Err(AppError::invalid_path(
                "the owner root cannot be moved or used as a move target",
            ));
        }
        if to.is_within(from) {
            return Err(AppError::invalid_path(format!(
                "cannot move '{from}' into its own subtree '{to}'"
            )));
        }
        if self.metadata(owner, from).await?.is_none() {
            return Err(AppError::not_found(format!("Path not found: {from}")));
        }
        if self.metadata(owner, to).await?.is_some() {
            return Err(AppError::conflict(format!("Destination '{to}' already exists")));
        }

        let from_full = self.resolve(owner, from);
        let to_full = self.resolve(owner, to);
        let created = match (to_full.parent(), to.parent()) {
            (Some(parent_dir), Some(parent_key)) => {
                self.create_parents(parent_dir, &parent_key).await?
            }
            _ => CreatedDirs::default(),
        };

        fs::rename(&from_full, &to_full)
            .await
            .map_err(|e| io_err(format!("Failed to move '{from}' to '{to}'"), e))?;
        created.keep();

        let failures = tokio::task::spawn_blocking(move || scan::refresh_mtimes(&to_full))
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Modification time refresh task failed");
                1
            });
        if failures > 0 {
            warn!(owner_id = %owner, path = %to, failures, "Moved, but some modification times were not refreshed");
        }

        debug!(owner_id = %owner, from = %from, to = %to, "Moved");
        Ok(())
    }

    /// Remove a file, or a folder and everything under it.
    pub async fn delete(&self, owner: OwnerId, path: &PathKey) -> AppResult<()> {
        if path.is_root() {
            return Err(AppError::invalid_path("the owner root cannot be deleted"));
        }
        let meta = self
            .metadata(owner, path)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Path not found: {path}")))?;
        let full = self.resolve(owner, path);

        let result = if meta.is_dir() {
            fs::remove_dir_all(&full).await
        } else {
            fs::remove_file(&full).await
        };
        result.map_err(|e| io_err(format!("Failed to delete '{path}'"), e))?;

        debug!(owner_id = %owner, path = %path, "Deleted");
        Ok(())
    }

    /// Stream the contents of a single file.
    pub async fn open_file(&self, owner: OwnerId, path: &PathKey) -> AppResult<ByteStream> {
        let meta = self.metadata(owner, path).await?;
        if !meta.is_some_and(|m| m.is_file()) {
            return Err(AppError::not_found(format!("File not found: {path}")));
        }
        let file = fs::File::open(self.resolve(owner, path))
            .await
            .map_err(|e| io_err(format!("Failed to open file: {path}"), e))?;
        Ok(Box::pin(ReaderStream::new(file)))
    }

    /// Stream a zip archive of a file or folder subtree.
    ///
    /// Entry names are relative to `path`. The archive is assembled in a
    /// temporary file, so memory use does not grow with the subtree.
    pub async fn zip_subtree(&self, owner: OwnerId, path: &PathKey) -> AppResult<ByteStream> {
        let source = if path.is_root() {
            self.root_for(owner).await?
        } else {
            if !self.exists(owner, path).await? {
                return Err(AppError::not_found(format!("Path not found: {path}")));
            }
            self.resolve(owner, path)
        };

        let file = tokio::task::spawn_blocking(move || archive::build_zip(&source))
            .await
            .map_err(blocking_err)?
            .map_err(|e| io_err(format!("Failed to build archive of '{path}'"), e))?;

        Ok(Box::pin(ReaderStream::new(fs::File::from_std(file))))
    }

    /// Recursive size of `path` in bytes, skipping unreadable entries.
    pub async fn dir_size(&self, owner: OwnerId, path: &PathKey) -> AppResult<u64> {
        let full = self.resolve(owner, path);
        tokio::task::spawn_blocking(move || scan::dir_size(&full))
            .await
            .map_err(blocking_err)
    }

    /// Every object under the owner's root, sorted by logical path.
    pub async fn walk(&self, owner: OwnerId) -> AppResult<Vec<PhysicalObject>> {
        let root = self.root_for(owner).await?;
        tokio::task::spawn_blocking(move || scan::walk_tree(&root))
            .await
            .map_err(blocking_err)
    }

    /// Summaries of every owner directory under the shared root.
    ///
    /// Directories whose names are not owner ids are ignored.
    pub async fn owner_roots(&self) -> AppResult<Vec<OwnerRoot>> {
        let mut dir = fs::read_dir(&self.owners_root).await.map_err(|e| {
            io_err(format!("Failed to list owners root: {}", self.owners_root.display()), e)
        })?;

        let mut found = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| io_err("Failed to read owners root entry".to_string(), e))?
        {
            let Some(owner_id) = entry.file_name().to_str().and_then(|n| n.parse::<OwnerId>().ok())
            else {
                continue;
            };
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            if meta.is_dir() {
                found.push((owner_id, entry.path(), scan::modified_at(&meta)));
            }
        }

        let mut roots = tokio::task::spawn_blocking(move || {
            found
                .into_iter()
                .map(|(owner_id, path, modified_at)| OwnerRoot {
                    owner_id,
                    size_bytes: scan::dir_size(&path),
                    modified_at,
                })
                .collect::<Vec<_>>()
        })
        .await
        .map_err(blocking_err)?;
        roots.sort_by_key(|r| r.owner_id);
        Ok(roots)
    }
}
