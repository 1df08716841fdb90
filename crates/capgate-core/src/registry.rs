//! In-memory tool signature registry.
//!
//! `SpecRegistry` is the reference implementation of `LiveSpecFetcher`. The
//! runtime's real tool registry implements the trait on its own types; this
//! one backs the CLI and tests, and can be loaded from a registry snapshot.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::traits::{LiveSpecFetcher, ToolSpecProvider};

/// The checksum-relevant shape of one tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSignature {
    pub name: String,
    pub return_type: String,
    #[serde(default)]
    pub arg_count: usize,
}

impl ToolSignature {
    pub fn new(name: impl Into<String>, return_type: impl Into<String>, arg_count: usize) -> Self {
        Self {
            name: name.into(),
            return_type: return_type.into(),
            arg_count,
        }
    }
}

impl ToolSpecProvider for ToolSignature {
    fn full_name_for_checksum(&self) -> String {
        self.name.clone()
    }

    fn return_type_for_checksum(&self) -> String {
        self.return_type.clone()
    }

    fn arg_count_for_checksum(&self) -> usize {
        self.arg_count
    }
}

/// A name-keyed set of `ToolSignature`s. Lookups are exact.
#[derive(Debug, Clone, Default)]
pub struct SpecRegistry {
    specs: HashMap<String, ToolSignature>,
}

impl SpecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the signature registered under its name.
    pub fn register(&mut self, signature: ToolSignature) {
        self.specs.insert(signature.name.clone(), signature);
    }

    pub fn get(&self, name: &str) -> Option<&ToolSignature> {
        self.specs.get(name)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl FromIterator<ToolSignature> for SpecRegistry {
    fn from_iter<I: IntoIterator<Item = ToolSignature>>(iter: I) -> Self {
        let mut registry = Self::new();
        for signature in iter {
            registry.register(signature);
        }
        registry
    }
}

impl LiveSpecFetcher for SpecRegistry {
    fn fetch_spec(&self, name: &str) -> Option<&dyn ToolSpecProvider> {
        self.specs.get(name).map(|s| s as &dyn ToolSpecProvider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::signature_checksum;

    #[test]
    fn fetch_returns_registered_shape() {
        let registry: SpecRegistry = [ToolSignature::new("valid.tool", "string", 0)]
            .into_iter()
            .collect();

        let spec = registry.fetch_spec("valid.tool").unwrap();
        assert_eq!(spec.full_name_for_checksum(), "valid.tool");
        assert_eq!(spec.signature_checksum(), signature_checksum("valid.tool", "string", 0));
        assert!(registry.fetch_spec("Valid.Tool").is_none());
    }

    #[test]
    fn register_replaces_existing_entry() {
        let mut registry = SpecRegistry::new();
        registry.register(ToolSignature::new("t", "string", 0));
        registry.register(ToolSignature::new("t", "int", 2));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("t").unwrap().arg_count, 2);
    }
}
