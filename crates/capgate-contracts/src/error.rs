//! Error types for the capgate decision pipeline.
//!
//! Every rejection the gate or the metering layer can produce is a distinct
//! `GateError` variant, so callers can tell "not trusted" apart from "not
//! capable" apart from "over budget" without parsing messages.

use thiserror::Error;

use crate::context::ExecContext;

/// The unified error type for capgate.
#[derive(Debug, Error)]
pub enum GateError {
    /// The tool requires a trusted context and the run is not in one.
    #[error("tool '{tool}' requires a trusted context, current context is '{context}'")]
    Trust { tool: String, context: ExecContext },

    /// The tool name was denied by the allow/deny lists.
    #[error("policy denied tool '{tool}': {reason}")]
    Policy { tool: String, reason: String },

    /// A required capability is not covered by any grant.
    #[error("capability '{capability}' required by tool '{tool}' is not granted")]
    Capability { tool: String, capability: String },

    /// The tool's identity or live shape does not match what was declared.
    ///
    /// This is the most severe class: it points at a registration bug or at
    /// tampering with the tool registry.
    #[error("integrity violation for tool '{tool}': {reason}")]
    Integrity { tool: String, reason: String },

    /// A budget charge would exceed the configured limit for its currency.
    #[error("budget exceeded for {currency}: requested {requested} cents, {spent} already spent, limit {limit}")]
    BudgetExceeded {
        currency: String,
        requested: u64,
        spent: u64,
        limit: u64,
    },

    /// A network operation would exceed the configured byte or call maximum.
    #[error("network limit exceeded: {reason}")]
    NetExceeded { reason: String },

    /// A filesystem operation would exceed the configured byte or call maximum.
    #[error("filesystem limit exceeded: {reason}")]
    FsExceeded { reason: String },

    /// The per-tool call quota is used up.
    #[error("tool '{tool}' exceeded its call limit of {limit}")]
    ToolExceeded { tool: String, limit: u64 },

    /// A requested sleep is longer than the configured maximum.
    #[error("sleep of {requested_secs:.3}s exceeds the maximum of {limit_secs}s")]
    TimeExceeded { requested_secs: f64, limit_secs: u64 },

    /// A capability string did not follow `resource:verb[,verb][:scope[,scope]]`.
    #[error("invalid capability format '{input}': {reason}")]
    InvalidCapabilityFormat { input: String, reason: String },

    /// A configuration file or value is missing or malformed.
    #[error("configuration error: {reason}")]
    Config { reason: String },
}

/// Convenience alias used throughout the capgate crates.
pub type GateResult<T> = Result<T, GateError>;
