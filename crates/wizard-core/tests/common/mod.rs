//! Shared test helpers for wizard-core integration tests.
//!
//! Provides host profiles, a scripted driver that answers pages in order,
//! and a host implementation that counts lookups.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use wizard_core::engine::{Step, WizardEngine};
use wizard_core::host::{Component, HostFacts, HostProfile};
use wizard_core::OverridePolicy;

// ---------------------------------------------------------------------------
// Host profiles
// ---------------------------------------------------------------------------

/// A Skyrim SE install with SKSE64, no ENB and a recent Wrye Bash.
pub fn skyrim_se() -> HostProfile {
    HostProfile::default()
        .with_version(Component::Game, "1.5.97.0")
        .with_version(Component::ScriptExtender, "0.2.0.17")
        .with_version(Component::WryeBash, "307")
        .with_data_file("Skyrim.esm")
        .with_data_file("SkyUI_SE.esp")
        .with_subpackage("00 Core")
        .with_subpackage("10 Textures 2K")
        .with_subpackage("10 Textures 4K")
        .with_subpackage("20 Patches")
}

// ---------------------------------------------------------------------------
// Driving the engine
// ---------------------------------------------------------------------------

/// Starts `source` and answers each page with the next entry of `answers`.
///
/// Panics if the run suspends more often than there are answers, or asks for
/// a requirement override.
pub fn run_with(host: HostProfile, source: &str, answers: &[&[usize]]) -> Step {
    run_with_policy(host, OverridePolicy::Deny, source, answers)
}

pub fn run_with_policy(
    host: HostProfile,
    policy: OverridePolicy,
    source: &str,
    answers: &[&[usize]],
) -> Step {
    let mut engine = WizardEngine::new(Arc::new(host)).with_policy(policy);
    let mut step = engine.start(source).unwrap();
    let mut answers = answers.iter();
    loop {
        match step {
            Step::AwaitingSelection(page) => {
                let answer = answers
                    .next()
                    .unwrap_or_else(|| panic!("no answer left for page '{}'", page.description));
                step = engine.resume(answer).unwrap();
            }
            Step::AwaitingOverride(results) => {
                panic!("unexpected override prompt: {:?}", results)
            }
            terminal => return terminal,
        }
    }
}

// ---------------------------------------------------------------------------
// Counting host
// ---------------------------------------------------------------------------

/// Wraps a profile and counts `data_file_exists` calls.
pub struct CountingHost {
    pub inner: HostProfile,
    pub lookups: AtomicUsize,
}

impl CountingHost {
    pub fn new(inner: HostProfile) -> Self {
        Self {
            inner,
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl HostFacts for CountingHost {
    fn installed_version(&self, component: Component) -> Option<String> {
        self.inner.installed_version(component)
    }

    fn data_file_exists(&self, path: &str) -> bool {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.data_file_exists(path)
    }

    fn subpackages(&self) -> Vec<String> {
        self.inner.subpackages()
    }
}
