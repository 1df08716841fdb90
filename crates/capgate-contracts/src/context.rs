//! Execution trust level and run identity.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GateError;

/// The trust tier of the current execution.
///
/// Only `Config` may call tools that declare `requires_trust`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecContext {
    /// Loading trusted configuration.
    Config,
    /// Ordinary script execution.
    Normal,
    /// Running under a test harness.
    Test,
    /// Untrusted user-supplied script.
    User,
}

impl ExecContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Normal => "normal",
            Self::Test => "test",
            Self::User => "user",
        }
    }
}

impl fmt::Display for ExecContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecContext {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "config" => Ok(Self::Config),
            "normal" => Ok(Self::Normal),
            "test" => Ok(Self::Test),
            "user" => Ok(Self::User),
            other => Err(GateError::Config {
                reason: format!("unknown execution context '{other}'"),
            }),
        }
    }
}

/// Unique identifier for one policy run.
///
/// Every built policy gets a fresh id; it appears in every gate log record
/// so the decisions of one run can be correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub uuid::Uuid);

impl RunId {
    /// Create a new, unique run ID.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
