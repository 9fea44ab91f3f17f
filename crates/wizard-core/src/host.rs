//! Facts supplied by the host application.
//!
//! The engine never inspects the game installation or the archive itself.
//! Instead it asks a [`HostFacts`] implementation for installed component
//! versions, file existence and the archive's sub-package names.
//!
//! [`HostProfile`] is a plain-data implementation that can be loaded from
//! JSON, which is what the CLI and the tests use:
//!
//! ```
//! use wizard_core::host::{Component, HostFacts, HostProfile};
//!
//! let profile: HostProfile = serde_json::from_str(r#"{
//!     "versions": { "game": "1.5.97" },
//!     "data_files": ["SkyUI_SE.esp"],
//!     "subpackages": ["00 Core", "10 Options"]
//! }"#).unwrap();
//!
//! assert_eq!(profile.installed_version(Component::Game).as_deref(), Some("1.5.97"));
//! assert!(profile.installed_version(Component::ScriptExtender).is_none());
//! assert!(profile.data_file_exists("skyui_se.esp"));
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// A component whose installed version a script may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Game,
    ScriptExtender,
    GraphicsExtender,
    WryeBash,
}

impl Component {
    /// Components in the order `RequireVersions` lists them positionally.
    pub const ALL: [Component; 4] = [
        Component::Game,
        Component::ScriptExtender,
        Component::GraphicsExtender,
        Component::WryeBash,
    ];

    /// Resolves the identifier used in named `RequireVersions` clauses.
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "game" => Some(Component::Game),
            "scriptextender" | "se" => Some(Component::ScriptExtender),
            "graphicsextender" | "ge" => Some(Component::GraphicsExtender),
            "wryebash" | "wb" => Some(Component::WryeBash),
            _ => None,
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Component::Game => "Game",
            Component::ScriptExtender => "Script Extender",
            Component::GraphicsExtender => "Graphics Extender",
            Component::WryeBash => "Wrye Bash",
        };
        write!(f, "{}", name)
    }
}

/// Read-only view of the host environment for one wizard run.
///
/// Implementations must be cheap to query; the engine calls them while
/// evaluating expressions and never caches the answers.
pub trait HostFacts: Send + Sync {
    /// The installed version of `component`, or `None` if it is not detected.
    fn installed_version(&self, component: Component) -> Option<String>;

    /// Whether `path` exists in the data directory or the archive being installed.
    fn data_file_exists(&self, path: &str) -> bool;

    /// Names of the sub-packages found in the archive, in archive order.
    fn subpackages(&self) -> Vec<String> {
        Vec::new()
    }

    /// Load order index of an installed plugin, or `None` if it is not in the load order.
    fn plugin_load_order(&self, _plugin: &str) -> Option<i64> {
        None
    }

    /// `2` for an active plugin, `0` for an inactive one, `-1` when missing.
    fn plugin_status(&self, _plugin: &str) -> i64 {
        -1
    }

    /// The file name of `path` if it exists as a file, otherwise empty.
    fn file_name(&self, _path: &str) -> String {
        String::new()
    }

    /// The folder name of `path` if it exists as a folder, otherwise empty.
    fn folder_name(&self, _path: &str) -> String {
        String::new()
    }
}

/// Whether an installed plugin is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginState {
    Active,
    Inactive,
}

/// Static host facts, typically loaded from a JSON profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostProfile {
    /// Installed versions; a missing or `null` entry means "not detected".
    #[serde(default)]
    pub versions: BTreeMap<Component, Option<String>>,

    /// Files known to exist, matched case-insensitively.
    #[serde(default)]
    pub data_files: Vec<String>,

    /// Sub-package names of the archive.
    #[serde(default)]
    pub subpackages: Vec<String>,

    /// Installed plugins by file name, matched case-insensitively.
    #[serde(default)]
    pub plugin_status: BTreeMap<String, PluginState>,

    /// Plugin file names in load order.
    #[serde(default)]
    pub load_order: Vec<String>,
}

impl HostProfile {
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    pub fn with_version(mut self, component: Component, version: impl Into<String>) -> Self {
        self.versions.insert(component, Some(version.into()));
        self
    }

    pub fn with_data_file(mut self, path: impl Into<String>) -> Self {
        self.data_files.push(path.into());
        self
    }

    pub fn with_subpackage(mut self, name: impl Into<String>) -> Self {
        self.subpackages.push(name.into());
        self
    }

    /// Adds `name` to the end of the load order with the given state.
    pub fn with_plugin(mut self, name: impl Into<String>, state: PluginState) -> Self {
        let name = name.into();
        self.load_order.push(name.clone());
        self.plugin_status.insert(name, state);
        self
    }
}

/// Lowercases and unifies separators so `Data\Foo.esp` matches `data/foo.esp`.
pub fn normalize_path(path: &str) -> String {
    path.trim()
        .replace('\\', "/")
        .trim_start_matches("./")
        .to_lowercase()
}

impl HostFacts for HostProfile {
    fn installed_version(&self, component: Component) -> Option<String> {
        self.versions
            .get(&component)
            .cloned()
            .flatten()
            .filter(|v| !v.trim().is_empty())
    }

    fn data_file_exists(&self, path: &str) -> bool {
        let wanted = normalize_path(path);
        self.data_files.iter().any(|f| normalize_path(f) == wanted)
    }

    fn subpackages(&self) -> Vec<String> {
        self.subpackages.clone()
    }

    fn plugin_load_order(&self, plugin: &str) -> Option<i64> {
        self.load_order
            .iter()
            .position(|p| p.eq_ignore_ascii_case(plugin.trim()))
            .and_then(|i| i64::try_from(i).ok())
    }

    fn plugin_status(&self, plugin: &str) -> i64 {
        let state = self
            .plugin_status
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(plugin.trim()))
            .map(|(_, state)| *state);
        match state {
            Some(PluginState::Active) => 2,
            Some(PluginState::Inactive) => 0,
            None => -1,
        }
    }

    fn file_name(&self, path: &str) -> String {
        let wanted = normalize_path(path);
        self.data_files
            .iter()
            .find(|f| normalize_path(f) == wanted)
            .and_then(|f| segments(f).last().map(str::to_string))
            .unwrap_or_default()
    }

    fn folder_name(&self, path: &str) -> String {
        let wanted = normalize_path(path);
        let wanted = wanted.trim_end_matches('/');
        if wanted.is_empty() {
            return String::new();
        }
        let prefix = format!("{}/", wanted);
        let depth = wanted.split('/').count();
        self.data_files
            .iter()
            .find(|f| normalize_path(f).starts_with(&prefix))
            .and_then(|f| segments(f).nth(depth - 1).map(str::to_string))
            .unwrap_or_default()
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.trim()
        .trim_start_matches("./")
        .trim_start_matches(".\\")
        .split(|c: char| c == '/' || c == '\\')
        .filter(|s| !s.is_empty())
}
