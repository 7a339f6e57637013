//! Release and timeout policies.

use serde::{Deserialize, Serialize};

/// When buffered items are released downstream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleasePolicy {
    /// Release each contiguous run as soon as it closes a gap
    #[default]
    Partial,
    /// Withhold everything until the whole sequence is buffered
    CompleteOnly,
}

impl std::fmt::Display for ReleasePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReleasePolicy::Partial => write!(f, "partial"),
            ReleasePolicy::CompleteOnly => write!(f, "complete_only"),
        }
    }
}

impl std::str::FromStr for ReleasePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "partial" => Ok(ReleasePolicy::Partial),
            "complete_only" | "complete" => Ok(ReleasePolicy::CompleteOnly),
            other => Err(format!("Unknown release policy: {other}")),
        }
    }
}

/// What happens to still-buffered items when a group is expired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutAction {
    /// Hand leftovers to the dispatcher's discard path
    #[default]
    Discard,
    /// Release leftovers in ascending order as one final run, gaps and all
    Flush,
}

impl std::fmt::Display for TimeoutAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeoutAction::Discard => write!(f, "discard"),
            TimeoutAction::Flush => write!(f, "flush"),
        }
    }
}
