//! # capgate-contracts
//!
//! Shared types and error contracts for the capgate tool-call policy gate.
//!
//! All crates in the workspace import from here. No decision logic lives in
//! this crate — only data definitions, their text forms and error types.

pub mod capability;
pub mod context;
pub mod error;
pub mod tool;

pub use capability::{Capability, Verb};
pub use context::{ExecContext, RunId};
pub use error::{GateError, GateResult};
pub use tool::ToolMeta;
