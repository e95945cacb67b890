//! Per-item results of best-effort batch operations.

use std::fmt;

use crate::error::ApiError;

/// Outcome of a single remote call inside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemResult {
    Succeeded,
    Failed(String),
}

/// One item of a batch (a role, a channel, a setting) and how it went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome {
    pub name: String,
    pub result: ItemResult,
}

impl ItemOutcome {
    pub fn from_result<T>(name: impl Into<String>, result: &Result<T, ApiError>) -> Self {
        Self {
            name: name.into(),
            result: match result {
                Ok(_) => ItemResult::Succeeded,
                Err(e) => ItemResult::Failed(e.to_string()),
            },
        }
    }

    pub fn succeeded(&self) -> bool {
        self.result == ItemResult::Succeeded
    }
}

impl fmt::Display for ItemOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.result {
            ItemResult::Succeeded => write!(f, "{}: ok", self.name),
            ItemResult::Failed(reason) => write!(f, "{}: failed ({reason})", self.name),
        }
    }
}

/// Names of the items in `outcomes` that failed.
pub fn failed_names(outcomes: &[ItemOutcome]) -> Vec<&str> {
    outcomes
        .iter()
        .filter(|o| !o.succeeded())
        .map(|o| o.name.as_str())
        .collect()
}
