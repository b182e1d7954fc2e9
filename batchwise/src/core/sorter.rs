//! Sort rules applied to batch lists.

use crate::error::{BatchError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sorts batches on one key, ascending unless `reverse` is set.
///
/// Parses from `"+year"`, `"-month"` or a bare `"day"`, and deserializes
/// from either that string form or `{"key": ..., "reverse": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SorterDefinition")]
pub struct Sorter {
    pub key: String,
    pub reverse: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SorterDefinition {
    Text(String),
    Fields {
        key: String,
        #[serde(default)]
        reverse: bool,
    },
}

impl TryFrom<SorterDefinition> for Sorter {
    type Error = BatchError;

    fn try_from(definition: SorterDefinition) -> Result<Self> {
        match definition {
            SorterDefinition::Text(text) => text.parse(),
            SorterDefinition::Fields { key, reverse } if !key.is_empty() => Ok(Self { key, reverse }),
            SorterDefinition::Fields { .. } => Err(BatchError::Configuration(
                "Invalid sorter: a sort key is required".to_string(),
            )),
        }
    }
}

impl Sorter {
    pub fn ascending(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            reverse: false,
        }
    }

    pub fn descending(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            reverse: true,
        }
    }

    /// Parses a list of sorter strings.
    pub fn parse_all<S: AsRef<str>>(definitions: impl IntoIterator<Item = S>) -> Result<Vec<Self>> {
        definitions.into_iter().map(|d| d.as_ref().parse()).collect()
    }
}

impl FromStr for Sorter {
    type Err = BatchError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (reverse, key) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };
        if key.is_empty() {
            return Err(BatchError::Configuration(format!(
                "Invalid sorter '{s}': a sort key is required"
            )));
        }
        Ok(Self {
            key: key.to_string(),
            reverse,
        })
    }
}

impl fmt::Display for Sorter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", if self.reverse { "-" } else { "+" }, self.key)
    }
}
