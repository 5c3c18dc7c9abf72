//! Physical storage configuration.

use serde::{Deserialize, Serialize};

/// Filesystem layout for owner trees and upload staging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Shared root holding one directory per owner, named by owner id.
    #[serde(default = "default_owners_root")]
    pub owners_root: String,
    /// Directory for in-flight uploads. Must live on the same filesystem
    /// as `owners_root` so that committing an upload is a plain rename.
    #[serde(default = "default_staging_dir")]
    pub staging_dir: String,
    /// Maximum upload size in bytes (default 1 GB).
    #[serde(default = "default_max_upload")]
    pub max_upload_size_bytes: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            owners_root: default_owners_root(),
            staging_dir: default_staging_dir(),
            max_upload_size_bytes: default_max_upload(),
        }
    }
}

fn default_owners_root() -> String {
    "./data/owners".to_string()
}

fn default_staging_dir() -> String {
    "./data/staging".to_string()
}

fn default_max_upload() -> u64 {
    1_073_741_824 // 1 GB
}
