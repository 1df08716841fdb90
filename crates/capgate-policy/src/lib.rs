//! # capgate-policy
//!
//! The deny-by-default policy gate that decides, for every attempted tool
//! call in a sandboxed script run, whether the call may proceed.
//!
//! ## Overview
//!
//! A [`PolicyBuilder`] assembles an [`ExecPolicy`] for one run: trust
//! context, allow/deny name patterns, capability grants and limits. Before a
//! tool body executes, the invocation path calls [`can_call`], which checks
//! integrity, trust, allow/deny, capabilities and finally meters the call.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use capgate_contracts::{Capability, ExecContext, ToolMeta};
//! use capgate_policy::{can_call, PolicyBuilder};
//!
//! let policy = PolicyBuilder::new(ExecContext::Config)
//!     .allow(["tool.fs.*"])
//!     .grant("fs:read:/data/*")?
//!     .build();
//!
//! let call = ToolMeta::named("tool.fs.Read")
//!     .with_caps([Capability::parse("fs:read:/data/report.csv")?]);
//! can_call(&policy, &call, None)?;
//! ```
//!
//! Policies can also be declared in TOML, see [`PolicyConfig`].

pub mod builder;
pub mod config;
pub mod gate;
pub mod policy;

pub use builder::PolicyBuilder;
pub use config::{PolicyConfig, RegistryConfig};
pub use gate::can_call;
pub use policy::{AllowPolicy, ExecPolicy};

// ── Tests ─────────────────────────────────────────────────────────────────────
