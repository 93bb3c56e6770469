//! Selection of the server's ingest strategy.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which ingest strategy a server runs. Exactly one is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// Store every uploaded file and broadcast it.
    #[default]
    HashDiff,
    /// Store and broadcast only files newer than a known version.
    Versioned,
}

/// Unrecognised policy name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown sync policy: {0} (expected hash_diff or versioned)")]
pub struct UnknownPolicy(pub String);

impl FromStr for PolicyKind {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hash_diff" => Ok(PolicyKind::HashDiff),
            "versioned" => Ok(PolicyKind::Versioned),
            other => Err(UnknownPolicy(other.to_string())),
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyKind::HashDiff => write!(f, "hash_diff"),
            PolicyKind::Versioned => write!(f, "versioned"),
        }
    }
}
