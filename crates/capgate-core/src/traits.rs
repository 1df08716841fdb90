//! The trait seam between the gate and the tool registry.
//!
//! The gate never depends on the registry crate. Instead the registry's spec
//! type implements `ToolSpecProvider`, and the registry itself implements
//! `LiveSpecFetcher`; the caller injects it at call time.
//!
//! - `ToolSpecProvider` — the live shape of one tool (name, return type, arity)
//! - `LiveSpecFetcher`  — looks a tool's live spec up by name
//!
//! Both are `Send + Sync`: one registry serves every script task of a run.

use sha2::{Digest, Sha256};

/// Prefix of every signature checksum string.
pub const CHECKSUM_PREFIX: &str = "sha256:";

/// The shape of a tool as currently registered.
///
/// Only the three fields that go into the signature checksum are exposed;
/// a change to any of them invalidates checksums recorded earlier.
pub trait ToolSpecProvider: Send + Sync {
    /// Fully-qualified tool name, e.g. `tool.fs.Read`.
    fn full_name_for_checksum(&self) -> String;

    /// Declared return type as the registry spells it.
    fn return_type_for_checksum(&self) -> String;

    /// Number of declared arguments.
    fn arg_count_for_checksum(&self) -> usize;

    /// `sha256:<hex>` over `"{full_name}:{return_type}:{arg_count}"`.
    fn signature_checksum(&self) -> String {
        signature_checksum(
            &self.full_name_for_checksum(),
            &self.return_type_for_checksum(),
            self.arg_count_for_checksum(),
        )
    }
}

/// Looks up the live spec of a tool by its name.
///
/// Returning `None` means the registry has no such tool, which the gate
/// treats as an integrity failure (typo or tampering).
pub trait LiveSpecFetcher: Send + Sync {
    fn fetch_spec(&self, name: &str) -> Option<&dyn ToolSpecProvider>;
}

/// Compute the signature checksum for a tool shape.
pub fn signature_checksum(full_name: &str, return_type: &str, arg_count: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{full_name}:{return_type}:{arg_count}").as_bytes());
    format!("{CHECKSUM_PREFIX}{}", hex::encode(hasher.finalize()))
}
