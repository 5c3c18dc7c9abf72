//! Upload staging: content is streamed into a temporary file outside any
//! owner lock and later renamed into place.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use treehub_core::error::{AppError, ErrorKind};
use treehub_core::result::AppResult;

use crate::ByteStream;

/// A fully written upload waiting to be committed.
///
/// Dropping a `StagedFile` without committing it removes the temporary
/// file, so an abandoned or cancelled upload leaves nothing behind.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    size_bytes: u64,
    armed: bool,
}

impl StagedFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            size_bytes: 0,
            armed: true,
        }
    }

    /// Location of the temporary file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of bytes written.
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Stop the drop guard once the file has been moved into place.
    pub(crate) fn disarm(mut self) -> u64 {
        self.armed = false;
        self.size_bytes
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Discarded staged upload"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to discard staged upload"
            ),
        }
    }
}

/// Stream `content` into a fresh file under `staging_dir`.
///
/// Fails with `Validation` once more than `max_bytes` have been received.
/// The partial file is removed on every error path, and also when the
/// returned future is dropped before completion.
pub async fn stage_stream(
    staging_dir: &Path,
    mut content: ByteStream,
    max_bytes: u64,
) -> AppResult<StagedFile> {
    let mut staged = StagedFile::new(staging_dir.join(format!("{}.part", Uuid::new_v4())));

    let mut file = fs::File::create(&staged.path).await.map_err(|e| {
        AppError::with_source(
            ErrorKind::Io,
            format!("Failed to create staging file: {}", staged.path.display()),
            e,
        )
    })?;

    while let Some(chunk) = content.next().await {
        let chunk =
            chunk.map_err(|e| AppError::with_source(ErrorKind::Io, "Upload stream read error", e))?;
        staged.size_bytes += chunk.len() as u64;
        if staged.size_bytes > max_bytes {
            return Err(AppError::validation(format!(
                "Upload exceeds the maximum size of {max_bytes} bytes"
            )));
        }
        file.write_all(&chunk)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Io, "Failed to write chunk", e))?;
    }

    file.flush()
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Io, "Failed to flush staging file", e))?;
    file.sync_all()
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Io, "Failed to sync staging file", e))?;

    debug!(path = %staged.path.display(), bytes = staged.size_bytes, "Staged upload");
    Ok(staged)
}
