//! Closed classification label set

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A label from the configured closed set.
///
/// Derived sensitive content: never logged.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Label(String);

impl std::fmt::Debug for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Label([REDACTED])")
    }
}

impl Label {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

const LABEL_PATTERN: &str = r"^[a-z][a-z0-9_]*$";

/// The closed set of labels a verdict may carry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    labels: Vec<String>,
}

impl LabelSet {
    /// Build a label set. Rejects an empty set, duplicates, and names that
    /// are not lowercase snake_case.
    pub fn new<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pattern = Regex::new(LABEL_PATTERN)
            .map_err(|e| Error::Internal(format!("Invalid label pattern: {}", e)))?;
        let mut out: Vec<String> = Vec::new();
        for label in labels {
            let label = label.into();
            if !pattern.is_match(&label) {
                return Err(Error::Config(format!(
                    "Label '{}' must be lowercase snake_case",
                    label
                )));
            }
            if out.contains(&label) {
                return Err(Error::Config(format!("Duplicate label '{}'", label)));
            }
            out.push(label);
        }
        if out.is_empty() {
            return Err(Error::Config("Label set must not be empty".to_string()));
        }
        Ok(Self { labels: out })
    }

    /// Accept `s` only if it is in the set
    pub fn parse(&self, s: &str) -> Option<Label> {
        self.labels
            .iter()
            .find(|l| l.as_str() == s)
            .map(|l| Label(l.clone()))
    }

    pub fn contains(&self, label: &Label) -> bool {
        self.labels.iter().any(|l| l == &label.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
