//! Optional gate configuration loaded from `.stopgate/config.toml`.
//!
//! Absence of the file (or any individual key) means defaults. A config file
//! that fails to parse is a validation error rather than a silent fallback,
//! since a half-read config could weaken a required gate.

use crate::core::error;
use serde::Deserialize;
use std::path::Path;

pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Minutes a passing execution stays fresh enough to satisfy its code
/// without a timing-window check.
const DEFAULT_FRESHNESS_MINUTES: i64 = 60;

fn default_freshness_minutes() -> i64 {
    DEFAULT_FRESHNESS_MINUTES
}

fn default_diff_excludes() -> Vec<String> {
    [".github/**", "docs/**"].iter().map(|s| s.to_string()).collect()
}

fn default_bypass_file() -> String {
    "bypass.json".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct GateConfig {
    #[serde(default = "default_freshness_minutes")]
    pub freshness_minutes: i64,
    /// Extra glob patterns excluded from the code-changeset signal, on top
    /// of the built-in test/markdown/config filters.
    #[serde(default = "default_diff_excludes")]
    pub diff_excludes: Vec<String>,
    /// Bypass artifact file name, relative to the store root.
    #[serde(default = "default_bypass_file")]
    pub bypass_file: String,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            freshness_minutes: DEFAULT_FRESHNESS_MINUTES,
            diff_excludes: default_diff_excludes(),
            bypass_file: default_bypass_file(),
        }
    }
}

impl GateConfig {
    pub fn load(store_root: &Path) -> Result<Self, error::GateError> {
        let path = store_root.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path).map_err(error::GateError::IoError)?;
        toml::from_str(&content).map_err(|e| {
            error::GateError::ValidationError(format!(
                "unreadable config at {}: {}",
                path.display(),
                e
            ))
        })
    }
}
