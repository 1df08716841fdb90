//! The per-call tool description the gate evaluates.

use serde::{Deserialize, Serialize};

use crate::capability::Capability;

/// Everything the gate needs to know about one attempted tool call.
///
/// Built by the tool-invocation path from the registry's metadata before the
/// tool body runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolMeta {
    /// Fully-qualified tool name, e.g. `tool.fs.Read`.
    pub name: String,
    /// Only callable from a `Config` context when true.
    #[serde(default)]
    pub requires_trust: bool,
    /// Capabilities the call needs; each must be covered by a single grant.
    #[serde(default)]
    pub required_caps: Vec<Capability>,
    /// Declared side effects (informational, e.g. "fs.read", "net.egress").
    #[serde(default)]
    pub effects: Vec<String>,
    /// `sha256:<hex>` over the tool's signature as it was when the policy
    /// was authored. Absent or empty skips the comparison.
    #[serde(default)]
    pub signature_checksum: Option<String>,
}

impl ToolMeta {
    /// A descriptor with only a name set.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_caps(mut self, caps: impl IntoIterator<Item = Capability>) -> Self {
        self.required_caps.extend(caps);
        self
    }

    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.signature_checksum = Some(checksum.into());
        self
    }

    pub fn requiring_trust(mut self) -> Self {
        self.requires_trust = true;
        self
    }

    /// The declared checksum, treating an empty string as absent.
    pub fn declared_checksum(&self) -> Option<&str> {
        self.signature_checksum
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}
