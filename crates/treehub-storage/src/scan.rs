//! Blocking directory scans: recursive sizes, full-tree listings and mtime
//! refresh. Callers run these on the blocking thread pool.

use std::fs::Metadata;
use std::path::Path;

use chrono::{DateTime, Utc};
use filetime::FileTime;
use tracing::{debug, warn};
use walkdir::WalkDir;

use treehub_core::types::PathKey;
use treehub_entity::PhysicalObject;

/// Last modification time of `meta`, if the platform reports one.
pub fn modified_at(meta: &Metadata) -> Option<DateTime<Utc>> {
    meta.modified().ok().map(DateTime::<Utc>::from)
}

/// Logical key of `path` relative to `root`.
///
/// Returns `None` for `root` itself and for names that are not valid UTF-8,
/// contain a backslash, or are not valid path segments. A backslash would be
/// read back as a separator and name a different object.
pub fn relative_key(root: &Path, path: &Path) -> Option<PathKey> {
    let rel = path.strip_prefix(root).ok()?;
    let mut segments = Vec::new();
    for component in rel.components() {
        let segment = component.as_os_str().to_str()?;
        if segment.contains('\\') {
            return None;
        }
        segments.push(segment);
    }
    if segments.is_empty() {
        return None;
    }
    PathKey::normalize(&segments.join("/")).ok()
}

/// Recursive byte size of every regular file below `path`.
///
/// Entries that cannot be read are skipped; a missing `path` counts as 0.
pub fn dir_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                debug!(%err, root = %path.display(), "Skipping unreadable entry during size scan");
                None
            }
        })
        .filter_map(|entry| entry.metadata().ok())
        .filter(|meta| meta.is_file())
        .map(|meta| meta.len())
        .sum()
}

/// Every file and directory below `root`, sorted by logical path.
pub fn walk_tree(root: &Path) -> Vec<PhysicalObject> {
    let mut objects = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(%err, root = %root.display(), "Skipping unreadable entry during walk");
                continue;
            }
        };
        let Some(path) = relative_key(root, entry.path()) else {
            warn!(path = %entry.path().display(), "Skipping entry with an unrepresentable name");
            continue;
        };
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        objects.push(PhysicalObject {
            path,
            is_folder: meta.is_dir(),
            size_bytes: if meta.is_file() { meta.len() } else { 0 },
            modified_at: modified_at(&meta),
        });
    }
    objects.sort_by(|a, b| a.path.cmp(&b.path));
    objects
}

/// Set the modification time of `path` and everything below it to now.
///
/// Returns the number of entries whose time could not be updated; each
/// failure is logged.
pub fn refresh_mtimes(path: &Path) -> usize {
    let now = FileTime::now();
    let mut failures = 0;
    for entry in WalkDir::new(path).follow_links(false) {
        let result = entry
            .map_err(std::io::Error::from)
            .and_then(|entry| filetime::set_file_mtime(entry.path(), now));
        if let Err(err) = result {
            failures += 1;
            warn!(%err, root = %path.display(), "Failed to refresh modification time");
        }
    }
    failures
}
