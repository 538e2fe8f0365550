//! Runtime settings.
//!
//! Resolved in order: `<data dir>/settings.json`, then environment
//! variables, then explicit overrides from the caller (CLI flags).
//!
//! | Source | Key | Meaning |
//! |--------|-----|---------|
//! | settings.json | `defaultModel` | response model id |
//! | settings.json | `apiBaseUrl` | response service base URL |
//! | env | `SYNTH_HIVE_DATA_DIR` | data directory |
//! | env | `SYNTH_HIVE_MODEL` | response model id |
//! | env | `GEMINI_API_KEY`, then `API_KEY` | response service key |

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Data directory used when nothing else is configured
pub const DEFAULT_DATA_DIR: &str = ".synth_hive";

/// Contents of `settings.json`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SettingsFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,
}

impl SettingsFile {
    /// Read `settings.json` from a data directory.
    ///
    /// A missing or unreadable file yields defaults.
    pub fn read(data_dir: &Path) -> Self {
        let path = data_dir.join("settings.json");
        if !path.exists() {
            return Self::default();
        }
        match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!(path = %path.display(), "Ignoring invalid settings file: {}", e);
                Self::default()
            }),
            Err(e) => {
                warn!(path = %path.display(), "Could not read settings file: {}", e);
                Self::default()
            }
        }
    }
}

/// Fully resolved settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HiveSettings {
    pub data_dir: PathBuf,
    pub model: Option<String>,
    pub api_base_url: Option<String>,
    pub api_key: Option<String>,
}

impl HiveSettings {
    /// Resolve settings from the process environment
    pub fn load(data_dir: Option<PathBuf>) -> Self {
        Self::resolve(data_dir, |key| std::env::var(key).ok())
    }

    /// Resolve settings with an explicit variable lookup
    pub fn resolve(data_dir: Option<PathBuf>, env: impl Fn(&str) -> Option<String>) -> Self {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let data_dir = data_dir
            .or_else(|| env("SYNTH_HIVE_DATA_DIR").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

        let file = SettingsFile::read(&data_dir);

        Self {
            model: env("SYNTH_HIVE_MODEL").or(file.default_model),
            api_base_url: file.api_base_url,
            api_key: env("GEMINI_API_KEY").or_else(|| env("API_KEY")),
            data_dir,
        }
    }

    /// Override the model id
    pub fn with_model(mut self, model: Option<String>) -> Self {
        if model.is_some() {
            self.model = model;
        }
        self
    }
}
