//! # wizard-core
//!
//! Interpreter for BAIN `wizard.txt` install scripts.
//!
//! A wizard script asks the user a series of questions and, from the
//! answers, decides which sub-packages, plugins and INI edits a mod archive
//! should install. This crate parses the script, runs it as a resumable
//! state machine and produces an [`InstallationPlan`](plan::InstallationPlan).
//! It never touches the game directory; everything it needs to know about
//! the installation comes through [`HostFacts`](host::HostFacts).
//!
//! ## Modules
//!
//! - [`parser`] - Script text to syntax tree ([`ast`])
//! - [`eval`] - Expression evaluation and the run's flag table
//! - [`requirements`] - `RequireVersions` checks
//! - [`engine`] - The suspend/resume execution engine
//! - [`plan`] - Plan accumulation and the final installation plan
//! - [`page`] - Selection pages presented while suspended
//! - [`host`] - The host facts trait and a JSON-backed profile
//! - [`version`] - Dotted version parsing and comparison
//! - [`config`] - Persistent user configuration
//! - [`error`] - Error types
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use wizard_core::engine::{Step, WizardEngine};
//! use wizard_core::host::{Component, HostProfile};
//!
//! let host = HostProfile::default().with_version(Component::Game, "1.4.9");
//! let mut engine = WizardEngine::new(Arc::new(host));
//!
//! match engine.start("RequireVersions \"1.5.0\"\nSelectSubPackage \"00 Core\"").unwrap() {
//!     Step::Failed(err) => println!("cannot install: {}", err),
//!     other => println!("{:?}", other),
//! }
//! ```

pub mod ast;
pub mod config;
pub mod engine;
pub mod error;
pub mod eval;
pub mod host;
mod lexer;
pub mod page;
pub mod parser;
pub mod plan;
pub mod requirements;
pub mod value;
pub mod version;

pub use engine::{EngineState, OverridePolicy, Step, WizardEngine};
pub use error::{ContractViolation, ParseError, RuntimeError, RuntimeErrorKind, WizardError};
pub use plan::InstallationPlan;
