//! Error types shared by the parser, evaluator and engine.
//!
//! Errors fall into four groups:
//!
//! - [`ParseError`] - the script text is malformed; nothing is executed
//! - [`RuntimeError`] - evaluation or selection failed while running
//! - [`WizardError::RequirementNotMet`] - declared minimum versions are not installed
//! - [`ContractViolation`] - the host drove the engine incorrectly

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::requirements::RequirementResult;

/// A syntax error with the position of the offending token.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("Parse error at line {line}, column {column}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }
}

/// The category of a [`RuntimeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuntimeErrorKind {
    UndefinedVariable,
    TypeMismatch,
    InvalidSelectionIndex,
    InvalidVersion,
}

impl RuntimeErrorKind {
    pub fn name(&self) -> &'static str {
        match self {
            RuntimeErrorKind::UndefinedVariable => "undefined variable",
            RuntimeErrorKind::TypeMismatch => "type mismatch",
            RuntimeErrorKind::InvalidSelectionIndex => "invalid selection",
            RuntimeErrorKind::InvalidVersion => "invalid version",
        }
    }
}

/// An error raised while executing a parsed script.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("Runtime error ({}) at line {line}: {message}", kind.name())]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    /// Source line of the statement being executed, 0 when unknown.
    pub line: usize,
    pub message: String,
}

impl RuntimeError {
    pub fn new(kind: RuntimeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            line: 0,
            message: message.into(),
        }
    }

    pub fn undefined_variable(name: &str) -> Self {
        Self::new(
            RuntimeErrorKind::UndefinedVariable,
            format!("Undefined variable: {}", name),
        )
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::new(RuntimeErrorKind::TypeMismatch, message)
    }

    pub fn invalid_selection(message: impl Into<String>) -> Self {
        Self::new(RuntimeErrorKind::InvalidSelectionIndex, message)
    }

    pub fn invalid_version(text: &str) -> Self {
        Self::new(
            RuntimeErrorKind::InvalidVersion,
            format!("Not a dotted version: '{}'", text),
        )
    }

    /// Attaches a source line, keeping one already set by a nested statement.
    pub fn at_line(mut self, line: usize) -> Self {
        if self.line == 0 {
            self.line = line;
        }
        self
    }
}

/// The host called an engine operation that the current state does not accept.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractViolation {
    #[error("Engine has not been started")]
    NotStarted,

    #[error("Engine was already started")]
    AlreadyStarted,

    #[error("Engine is not awaiting a selection (state: {state})")]
    NotAwaitingSelection { state: String },

    #[error("Engine is not awaiting a requirement override (state: {state})")]
    NotAwaitingOverride { state: String },

    #[error("Engine reached a terminal state ({state})")]
    Terminal { state: String },

    #[error("There is no previous page to go back to")]
    NoPreviousPage,
}

/// Top-level error for a wizard run.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WizardError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("Version requirements not met: {}", summarize(results))]
    RequirementNotMet { results: Vec<RequirementResult> },

    #[error(transparent)]
    Contract(#[from] ContractViolation),
}

fn summarize(results: &[RequirementResult]) -> String {
    results
        .iter()
        .filter(|r| !r.passed)
        .map(|r| format!("{} needs {} (have {})", r.component, r.need, r.have_display()))
        .collect::<Vec<_>>()
        .join(", ")
}

impl WizardError {
    pub fn is_selection_error(&self) -> bool {
        matches!(
            self,
            WizardError::Runtime(RuntimeError {
                kind: RuntimeErrorKind::InvalidSelectionIndex,
                ..
            })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Component;

    #[test]
    fn parse_error_display_has_position() {
        let err = ParseError::new(3, 7, "Unexpected token");
        assert_eq!(
            err.to_string(),
            "Parse error at line 3, column 7: Unexpected token"
        );
    }

    #[test]
    fn at_line_keeps_innermost_line() {
        let err = RuntimeError::undefined_variable("x").at_line(4).at_line(9);
        assert_eq!(err.line, 4);
        assert!(err.to_string().contains("undefined variable"));
    }

    #[test]
    fn requirement_error_lists_only_failures() {
        let err = WizardError::RequirementNotMet {
            results: vec![
                RequirementResult {
                    component: Component::Game,
                    need: "1.5.0".to_string(),
                    have: Some("1.4.9".to_string()),
                    passed: false,
                },
                RequirementResult {
                    component: Component::WryeBash,
                    need: "300".to_string(),
                    have: Some("307".to_string()),
                    passed: true,
                },
            ],
        };
        let text = err.to_string();
        assert!(text.contains("Game needs 1.5.0 (have 1.4.9)"));
        assert!(!text.contains("Wrye Bash"));
    }

    #[test]
    fn selection_error_is_detected() {
        let err = WizardError::from(RuntimeError::invalid_selection("index 4 out of range"));
        assert!(err.is_selection_error());
        let err = WizardError::from(RuntimeError::type_mismatch("Bool + Int"));
        assert!(!err.is_selection_error());
    }
}
