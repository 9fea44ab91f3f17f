//! Selection pages shown to the user while the engine is suspended.

use serde::{Deserialize, Serialize};

use crate::ast::SelectionMode;
use crate::error::RuntimeError;

/// One option on a [`Page`], with its description already evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageOption {
    pub label: String,
    pub description: String,
    pub image: Option<String>,
    pub is_default: bool,
}

/// A pending choice. Transient: it lives only while the engine awaits a selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub description: String,
    pub options: Vec<PageOption>,
    pub mode: SelectionMode,
    pub allows_empty: bool,
    /// Source line of the `Select*` statement.
    pub line: usize,
    /// Indices chosen the last time this page was answered, if it was.
    #[serde(default)]
    pub previous_selection: Option<Vec<usize>>,
}

impl Page {
    /// Checks `indices` against the page's mode and returns them in option order.
    ///
    /// Out-of-range and repeated indices are rejected, as is any count the
    /// mode does not allow.
    pub fn validate(&self, indices: &[usize]) -> Result<Vec<usize>, RuntimeError> {
        let mut sorted = indices.to_vec();
        sorted.sort_unstable();

        if let Some(&bad) = sorted.iter().find(|&&i| i >= self.options.len()) {
            return Err(RuntimeError::invalid_selection(format!(
                "Option {} is out of range (page has {} options)",
                bad,
                self.options.len()
            )));
        }
        if let Some(pair) = sorted.windows(2).find(|w| w[0] == w[1]) {
            return Err(RuntimeError::invalid_selection(format!(
                "Option {} was selected more than once",
                pair[0]
            )));
        }

        match self.mode {
            SelectionMode::ExactlyOne if sorted.len() != 1 => {
                Err(RuntimeError::invalid_selection(format!(
                    "Exactly one option must be selected, got {}",
                    sorted.len()
                )))
            }
            SelectionMode::AtLeastOne if sorted.is_empty() => Err(RuntimeError::invalid_selection(
                "At least one option must be selected",
            )),
            _ => Ok(sorted),
        }
    }

    /// The selection a user would get by accepting the page as shown.
    ///
    /// Options marked default are chosen; when a mode requires a choice and
    /// none is marked, the first option is used.
    pub fn default_selection(&self) -> Vec<usize> {
        let defaults: Vec<usize> = self
            .options
            .iter()
            .enumerate()
            .filter(|(_, o)| o.is_default)
            .map(|(i, _)| i)
            .collect();

        match self.mode {
            SelectionMode::ExactlyOne => vec![defaults.first().copied().unwrap_or(0)],
            SelectionMode::AtLeastOne if defaults.is_empty() => vec![0],
            _ => defaults,
        }
    }

    /// The previous answer when revisiting a page, otherwise the defaults.
    pub fn initial_selection(&self) -> Vec<usize> {
        match &self.previous_selection {
            Some(indices) => indices.clone(),
            None => self.default_selection(),
        }
    }

    /// Finds an option index by label, ignoring case.
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.options
            .iter()
            .position(|o| o.label.eq_ignore_ascii_case(label))
    }
}
