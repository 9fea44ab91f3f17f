//! Installation plan accumulation.
//!
//! The engine feeds every executed directive into a [`PlanBuilder`], which
//! only records operations. Deduplication happens once, in
//! [`PlanBuilder::finalize`], which consumes the builder and produces the
//! immutable [`InstallationPlan`].

use serde::{Deserialize, Serialize};

use crate::host::normalize_path;

/// A plugin and whether it should be enabled after install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginEntry {
    pub name: String,
    pub enabled: bool,
}

/// A plugin to install under a different filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginRename {
    pub from: String,
    pub to: String,
}

/// A single INI setting to apply after install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IniTweak {
    pub file: String,
    pub section: String,
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum PlanOp {
    SubPackage { name: String, selected: bool },
    ClearAll,
    Plugin { name: String, enabled: bool },
    Rename(PluginRename),
    Ini(IniTweak),
    Note(String),
}

/// Records plan operations in execution order.
///
/// The engine clones it into a checkpoint at every page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanBuilder {
    ops: Vec<PlanOp>,
}

impl PlanBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select_subpackage(&mut self, name: impl Into<String>) {
        self.ops.push(PlanOp::SubPackage {
            name: name.into(),
            selected: true,
        });
    }

    pub fn deselect_subpackage(&mut self, name: impl Into<String>) {
        self.ops.push(PlanOp::SubPackage {
            name: name.into(),
            selected: false,
        });
    }

    /// Deselects every sub-package and disables every plugin recorded so far.
    pub fn deselect_all(&mut self) {
        self.ops.push(PlanOp::ClearAll);
    }

    pub fn select_plugin(&mut self, name: impl Into<String>) {
        self.ops.push(PlanOp::Plugin {
            name: name.into(),
            enabled: true,
        });
    }

    pub fn deselect_plugin(&mut self, name: impl Into<String>) {
        self.ops.push(PlanOp::Plugin {
            name: name.into(),
            enabled: false,
        });
    }

    pub fn rename_plugin(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.ops.push(PlanOp::Rename(PluginRename {
            from: from.into(),
            to: to.into(),
        }));
    }

    pub fn edit_ini(&mut self, tweak: IniTweak) {
        self.ops.push(PlanOp::Ini(tweak));
    }

    pub fn note(&mut self, text: impl Into<String>) {
        self.ops.push(PlanOp::Note(text.into()));
    }

    /// Number of operations recorded so far.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Folds the recorded operations into the final plan.
    pub fn finalize(self) -> InstallationPlan {
        let mut plan = InstallationPlan::default();
        // Parallel to plan.plugins / plan.renames, holding normalized keys
        let mut plugin_keys: Vec<String> = Vec::new();
        let mut rename_keys: Vec<String> = Vec::new();

        for op in self.ops {
            match op {
                PlanOp::SubPackage { name, selected } => {
                    let existing = plan
                        .subpackages
                        .iter()
                        .position(|s| s.to_lowercase() == name.to_lowercase());
                    match (existing, selected) {
                        (None, true) => plan.subpackages.push(name),
                        (Some(i), false) => {
                            plan.subpackages.remove(i);
                        }
                        _ => {}
                    }
                }
                PlanOp::ClearAll => {
                    plan.subpackages.clear();
                    for plugin in &mut plan.plugins {
                        plugin.enabled = false;
                    }
                }
                PlanOp::Plugin { name, enabled } => {
                    let key = plugin_key(&name);
                    match plugin_keys.iter().position(|k| *k == key) {
                        Some(i) => plan.plugins[i].enabled = enabled,
                        None => {
                            plugin_keys.push(key);
                            plan.plugins.push(PluginEntry { name, enabled });
                        }
                    }
                }
                PlanOp::Rename(rename) => {
                    let key = plugin_key(&rename.from);
                    match rename_keys.iter().position(|k| *k == key) {
                        Some(i) => plan.renames[i] = rename,
                        None => {
                            rename_keys.push(key);
                            plan.renames.push(rename);
                        }
                    }
                }
                PlanOp::Ini(tweak) => plan.ini_tweaks.push(tweak),
                PlanOp::Note(text) => plan.notes.push(text),
            }
        }

        plan
    }
}

/// Normalized plugin filename: lowercase, directory stripped.
pub fn plugin_key(name: &str) -> String {
    let normalized = normalize_path(name);
    match normalized.rsplit_once('/') {
        Some((_, file)) => file.to_string(),
        None => normalized,
    }
}

/// The result of a completed wizard run. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationPlan {
    subpackages: Vec<String>,
    plugins: Vec<PluginEntry>,
    renames: Vec<PluginRename>,
    ini_tweaks: Vec<IniTweak>,
    notes: Vec<String>,
}

impl InstallationPlan {
    /// Selected sub-packages, in first-selection order.
    pub fn subpackages(&self) -> &[String] {
        &self.subpackages
    }

    /// Every plugin the script touched, with its final enabled state.
    pub fn plugins(&self) -> &[PluginEntry] {
        &self.plugins
    }

    pub fn enabled_plugins(&self) -> impl Iterator<Item = &str> {
        self.plugins
            .iter()
            .filter(|p| p.enabled)
            .map(|p| p.name.as_str())
    }

    pub fn renames(&self) -> &[PluginRename] {
        &self.renames
    }

    pub fn ini_tweaks(&self) -> &[IniTweak] {
        &self.ini_tweaks
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn is_empty(&self) -> bool {
        self.subpackages.is_empty()
            && self.plugins.is_empty()
            && self.renames.is_empty()
            && self.ini_tweaks.is_empty()
            && self.notes.is_empty()
    }
}
