//! Reconciliation daemon configuration.

use serde::{Deserialize, Serialize};

/// Settings for the scheduled index/filesystem reconciliation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Whether the daemon runs passes at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between two passes.
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,
    /// Rewrite the index to match the filesystem instead of only reporting.
    #[serde(default)]
    pub repair: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: default_interval(),
            repair: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_interval() -> u64 {
    3600
}
