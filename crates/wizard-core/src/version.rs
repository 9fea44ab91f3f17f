//! Dotted version numbers.
//!
//! Every version comparison in the crate goes through [`compare`]: segments
//! are compared numerically from left to right and a shorter version is
//! padded with zeros, so `1.2` and `1.2.0` are equal and `1.10` is newer
//! than `1.9`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RuntimeError;

/// A parsed dotted version such as `1.5.97.0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    segments: Vec<u64>,
}

impl Version {
    /// Parses a dotted version.
    ///
    /// Each segment must start with a digit; trailing non-digit text in a
    /// segment (`"0.2.0.12b"`, `"1.6.1130-beta"`) is ignored.
    pub fn parse(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        let trimmed = trimmed.strip_prefix(['v', 'V']).unwrap_or(trimmed);
        if trimmed.is_empty() {
            return None;
        }
        let mut segments = Vec::new();
        for part in trimmed.split('.') {
            let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
            if digits.is_empty() {
                return None;
            }
            segments.push(digits.parse().ok()?);
        }
        Some(Self { segments })
    }

    pub fn segments(&self) -> &[u64] {
        &self.segments
    }
}

/// Compares two versions segment by segment with zero padding.
pub fn compare(a: &Version, b: &Version) -> Ordering {
    let len = a.segments.len().max(b.segments.len());
    for i in 0..len {
        let left = a.segments.get(i).copied().unwrap_or(0);
        let right = b.segments.get(i).copied().unwrap_or(0);
        match left.cmp(&right) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// Parses both sides and compares them, failing on either invalid text.
pub fn compare_str(a: &str, b: &str) -> Result<Ordering, RuntimeError> {
    let left = a.parse::<Version>()?;
    let right = b.parse::<Version>()?;
    Ok(compare(&left, &right))
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        compare(self, other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        compare(self, other)
    }
}

impl FromStr for Version {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s).ok_or_else(|| RuntimeError::invalid_version(s))
    }
}

impl TryFrom<String> for Version {
    type Error = RuntimeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.to_string()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}
