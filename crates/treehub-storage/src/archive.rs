//! Zip archives of a file or folder subtree.

use std::fs::File;
use std::io::{self, Seek, SeekFrom};
use std::path::Path;

use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use treehub_core::types::PathKey;

/// Download file name for an archive of `path`.
pub fn archive_name(path: &PathKey) -> String {
    format!("{}.zip", path.name().unwrap_or("root"))
}

/// Write a zip archive of `source` into an anonymous temporary file and
/// return it rewound to the start.
///
/// A single file is stored under its own name. For a directory, entry
/// names are relative to `source` and empty directories are kept.
/// Entries that cannot be read are skipped.
pub fn build_zip(source: &Path) -> io::Result<File> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut writer = ZipWriter::new(tempfile::tempfile()?);
    let mut written = 0usize;

    if source.is_file() {
        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file")
            .to_string();
        writer.start_file(name, options).map_err(io::Error::other)?;
        io::copy(&mut File::open(source)?, &mut writer)?;
        written += 1;
    } else {
        for entry in WalkDir::new(source).min_depth(1).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(%err, root = %source.display(), "Skipping unreadable entry in archive");
                    continue;
                }
            };
            let Some(name) = archive_entry_name(source, entry.path()) else {
                warn!(path = %entry.path().display(), "Skipping entry with an unrepresentable name");
                continue;
            };

            if entry.file_type().is_dir() {
                writer
                    .add_directory(format!("{name}/"), options)
                    .map_err(io::Error::other)?;
            } else if entry.file_type().is_file() {
                let mut file = match File::open(entry.path()) {
                    Ok(file) => file,
                    Err(err) => {
                        warn!(%err, path = %entry.path().display(), "Skipping unreadable file in archive");
                        continue;
                    }
                };
                writer.start_file(name, options).map_err(io::Error::other)?;
                io::copy(&mut file, &mut writer)?;
            }
            written += 1;
        }
    }

    let mut file = writer.finish().map_err(io::Error::other)?;
    file.seek(SeekFrom::Start(0))?;
    debug!(source = %source.display(), entries = written, "Built zip archive");
    Ok(file)
}

fn archive_entry_name(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let segments: Option<Vec<&str>> = rel.components().map(|c| c.as_os_str().to_str()).collect();
    Some(segments?.join("/"))
}
