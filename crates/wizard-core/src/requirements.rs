//! Version requirement checks for `RequireVersions`.
//!
//! [`check`] resolves each declared minimum against the host and returns one
//! [`RequirementResult`] per requirement, in declaration order, ready for a
//! "Need / Have" display. Comparison is delegated to [`version::compare`] so
//! requirements and `Compare*Version` built-ins can never disagree.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::host::{Component, HostFacts};
use crate::version::{self, Version};

/// Text shown when a component's installed version is unknown.
pub const NOT_AVAILABLE: &str = "N/A";

/// A declared minimum version for one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementSpec {
    pub component: Component,
    /// The minimum as written in the script; validated when parsed.
    pub minimum: String,
}

/// The outcome of checking one [`RequirementSpec`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementResult {
    pub component: Component,
    pub need: String,
    /// Installed version as reported by the host, `None` if not detected.
    pub have: Option<String>,
    pub passed: bool,
}

impl RequirementResult {
    /// The installed version, or `N/A` when absent.
    pub fn have_display(&self) -> &str {
        self.have.as_deref().unwrap_or(NOT_AVAILABLE)
    }
}

impl fmt::Display for RequirementResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: need {}, have {} [{}]",
            self.component,
            self.need,
            self.have_display(),
            if self.passed { "ok" } else { "missing" }
        )
    }
}

/// Checks every requirement against the host's installed versions.
///
/// An absent installed version, or one that cannot be parsed, never
/// satisfies a minimum.
pub fn check(specs: &[RequirementSpec], host: &dyn HostFacts) -> Vec<RequirementResult> {
    specs
        .iter()
        .map(|spec| {
            let have = host.installed_version(spec.component);
            let passed = match (&have, Version::parse(&spec.minimum)) {
                (Some(installed), Some(minimum)) => Version::parse(installed)
                    .map(|installed| version::compare(&installed, &minimum) != Ordering::Less)
                    .unwrap_or(false),
                _ => false,
            };
            debug!(
                component = %spec.component,
                need = %spec.minimum,
                have = have.as_deref().unwrap_or(NOT_AVAILABLE),
                passed,
                "requirement checked"
            );
            RequirementResult {
                component: spec.component,
                need: spec.minimum.clone(),
                have,
                passed,
            }
        })
        .collect()
}

/// True when every result passed (vacuously true for no requirements).
pub fn all_passed(results: &[RequirementResult]) -> bool {
    results.iter().all(|r| r.passed)
}
