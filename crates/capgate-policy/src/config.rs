//! TOML policy declarations.
//!
//! A `PolicyConfig` is deserialized from TOML and turned into a
//! [`PolicyBuilder`], so a declared policy gets exactly the same defaults as
//! one assembled in code: an absent `allow` list means nothing is allowed.
//!
//! Example:
//! ```toml
//! context = "user"
//! allow = ["tool.fs.*"]
//! deny = ["tool.fs.delete"]
//! grants = ["fs:read:/data/*"]
//!
//! [limits]
//! net_max_calls = 10
//!
//! [limits.budget_per_run_cents]
//! USD = 500
//! ```
//!
//! A registry snapshot for signature checks uses the same loader style:
//! ```toml
//! [[tools]]
//! name = "tool.fs.Read"
//! return_type = "string"
//! arg_count = 1
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use capgate_contracts::{
    context::ExecContext,
    error::{GateError, GateResult},
};
use capgate_core::{
    meter::Limits,
    registry::{SpecRegistry, ToolSignature},
};

use crate::{builder::PolicyBuilder, policy::ExecPolicy};

/// The top-level structure of a TOML policy file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Trust level the policy runs under.
    pub context: ExecContext,
    /// Allowed tool-name patterns. Absent or empty allows nothing.
    #[serde(default)]
    pub allow: Vec<String>,
    /// Denied tool-name patterns. Always checked before `allow`.
    #[serde(default)]
    pub deny: Vec<String>,
    /// Granted capabilities in `resource:verb[,verb][:scope[,scope]]` form.
    #[serde(default)]
    pub grants: Vec<String>,
    #[serde(default)]
    pub limits: Limits,
}

impl PolicyConfig {
    /// Parse `s` as a TOML policy.
    ///
    /// Returns `GateError::Config` if the TOML is malformed or does not match
    /// the `PolicyConfig` schema. Capability strings are checked in
    /// [`PolicyConfig::into_builder`].
    pub fn from_toml_str(s: &str) -> GateResult<Self> {
        toml::from_str(s).map_err(|e| GateError::Config {
            reason: format!("failed to parse policy TOML: {}", e),
        })
    }

    /// Read the file at `path` and parse it as a TOML policy.
    pub fn from_file(path: &Path) -> GateResult<Self> {
        Self::from_toml_str(&read_file(path, "policy")?)
    }

    /// Feed the declaration through a `PolicyBuilder`.
    ///
    /// Fails with `InvalidCapabilityFormat` on the first malformed grant.
    pub fn into_builder(self) -> GateResult<PolicyBuilder> {
        let mut builder = PolicyBuilder::new(self.context)
            .allow(&self.allow)
            .deny(&self.deny)
            .limits(self.limits);
        for grant in &self.grants {
            builder = builder.grant(grant)?;
        }
        debug!(
            context = %self.context,
            allow = self.allow.len(),
            deny = self.deny.len(),
            grants = self.grants.len(),
            "policy config loaded"
        );
        Ok(builder)
    }

    /// Build a ready-to-use policy with fresh counters.
    pub fn build(self) -> GateResult<ExecPolicy> {
        Ok(self.into_builder()?.build())
    }
}

/// A registry snapshot listing tool signatures.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub tools: Vec<ToolSignature>,
}

impl RegistryConfig {
    pub fn from_toml_str(s: &str) -> GateResult<Self> {
        toml::from_str(s).map_err(|e| GateError::Config {
            reason: format!("failed to parse registry TOML: {}", e),
        })
    }

    pub fn from_file(path: &Path) -> GateResult<Self> {
        Self::from_toml_str(&read_file(path, "registry")?)
    }

    pub fn into_registry(self) -> SpecRegistry {
        self.tools.into_iter().collect()
    }
}

fn read_file(path: &Path, what: &str) -> GateResult<String> {
    std::fs::read_to_string(path).map_err(|e| GateError::Config {
        reason: format!("failed to read {} file '{}': {}", what, path.display(), e),
    })
}
