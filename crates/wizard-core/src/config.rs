//! Persistent configuration for bain-wizard.
//!
//! Stores user settings in `~/.bain-wizard/config.json`: the requirement
//! override policy and an optional host profile used when none is passed on
//! the command line.
//!
//! # Example
//!
//! ```no_run
//! use wizard_core::config::WizardConfig;
//!
//! // Load (returns defaults if file doesn't exist)
//! let config = WizardConfig::load();
//!
//! if let Some(path) = &config.default_host_profile {
//!     println!("Host profile: {}", path.display());
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::engine::OverridePolicy;

const CONFIG_FILENAME: &str = "config.json";

/// Returns the bain-wizard directory path (`~/.bain-wizard/`).
///
/// Falls back to the current directory when no home directory is known.
/// The directory is only created when a config is saved.
pub fn wizard_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".bain-wizard")
}

/// Persistent bain-wizard configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct WizardConfig {
    /// What to do when a script's `RequireVersions` is not met.
    #[serde(default)]
    pub override_policy: OverridePolicy,

    /// Host profile JSON used when `--host` is not given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_host_profile: Option<PathBuf>,
}

impl WizardConfig {
    /// Path of the config file.
    pub fn path() -> PathBuf {
        wizard_dir().join(CONFIG_FILENAME)
    }

    /// Load config from `~/.bain-wizard/config.json`.
    ///
    /// Returns [`Default`] if the file does not exist or cannot be parsed.
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    pub fn load_from(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Save config to `~/.bain-wizard/config.json`.
    pub fn save(&self) -> std::io::Result<()> {
        self.save_to(&Self::path())
    }

    /// Writes the config to `path`, creating missing parent directories.
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}
