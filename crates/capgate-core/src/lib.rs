//! # capgate-core
//!
//! The decision primitives the capgate policy gate is assembled from.
//!
//! This crate provides:
//! - Wildcard `Pattern`s compiled once and matched case-insensitively
//! - Resource-aware scope and capability satisfaction (`caps_satisfied`)
//! - The `GrantSet` metering envelope (budgets, net/fs, per-tool calls, sleep)
//! - The `ToolSpecProvider` / `LiveSpecFetcher` seam and signature checksums
//!
//! ## Usage
//!
//! ```rust,ignore
//! use capgate_core::{caps_satisfied, GrantSet, Limits};
//! ```

pub mod meter;
pub mod pattern;
pub mod registry;
pub mod scope;
pub mod traits;

pub use meter::{Counters, GrantSet, Limits};
pub use pattern::{Pattern, PatternKind};
pub use registry::{SpecRegistry, ToolSignature};
pub use scope::{caps_satisfied, scopes_satisfied, verbs_satisfied, CompiledGrant, ScopeMatcher};
pub use traits::{signature_checksum, LiveSpecFetcher, ToolSpecProvider};
