//! Runtime settings.
//!
//! Settings are read from JSON; every field has a default, so `{}` is a
//! complete configuration:
//!
//! ```json
//! {
//!   "view": { "autoUpdate": true },
//!   "log": { "filter": "vizor=debug,info" }
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use vizor_core::ViewSettings;

/// Errors raised while loading settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// The settings file could not be read.
    #[error("failed to read {}", path.display())]
    Io {
        /// The file that was read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The settings are not valid JSON or have the wrong shape.
    #[error("failed to parse settings")]
    Parse(#[from] serde_json::Error),
}

/// Top-level settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Passed to views through [`ViewBuilder::settings`](vizor_core::ViewBuilder::settings).
    pub view: ViewSettings,
    /// Logging configuration.
    pub log: LogSettings,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// An `EnvFilter` directive used when `RUST_LOG` is not set.
    pub filter: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl Settings {
    /// Parses settings from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Parse`] for malformed JSON.
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads settings from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Io`] when the file cannot be read and
    /// [`SettingsError::Parse`] when its contents are malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_json(&contents)?;
        tracing::debug!(path = %path.display(), "settings loaded");
        Ok(settings)
    }
}
