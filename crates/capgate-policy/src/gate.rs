//! The ordered tool-call gate.
//!
//! `can_call` runs five stages in a fixed order and stops at the first
//! rejection:
//!
//!   Integrity → Trust → Allow/Deny → Capability → Metering
//!
//! Only the last stage mutates anything: an admitted call has already
//! consumed one unit of its per-tool quota when `can_call` returns `Ok`.

use tracing::{debug, error, warn};

use capgate_contracts::{
    context::ExecContext,
    error::{GateError, GateResult},
    tool::ToolMeta,
};
use capgate_core::{scope::first_covering_grant, traits::LiveSpecFetcher};

use crate::policy::ExecPolicy;

/// Decide whether `tool` may be called under `policy`.
///
/// # Stages
///
/// 1. Integrity: the name must be non-empty `[A-Za-z0-9_.]`. With a
///    `fetcher`, the tool must exist in the live registry and, when the
///    descriptor carries a checksum, the live signature must hash to it.
/// 2. Trust: `requires_trust` tools only run in `ExecContext::Config`.
/// 3. Allow/Deny: any deny match rejects, even against a `*` allow; then a
///    restricted allow list must match.
/// 4. Capability: every required capability must be covered by one grant.
/// 5. Metering: the per-tool call counter is incremented and checked.
///
/// Passing `None` for `fetcher` skips the registry lookup but keeps the
/// name check.
pub fn can_call(policy: &ExecPolicy, tool: &ToolMeta, fetcher: Option<&dyn LiveSpecFetcher>) -> GateResult<()> {
    let run_id = policy.run_id();
    debug!(run_id = %run_id, tool = %tool.name, context = %policy.context(), "gate evaluating tool call");

    // ── Stage 1: Integrity ───────────────────────────────────────────────────
    if let Err(e) = check_integrity(tool, fetcher) {
        error!(run_id = %run_id, tool = %tool.name, error = %e, "tool integrity check failed");
        return Err(e);
    }

    // ── Stage 2: Trust ───────────────────────────────────────────────────────
    if tool.requires_trust && policy.context() != ExecContext::Config {
        warn!(run_id = %run_id, tool = %tool.name, context = %policy.context(), "untrusted context for trusted tool");
        return Err(GateError::Trust {
            tool: tool.name.clone(),
            context: policy.context(),
        });
    }

    // ── Stage 3: Allow / Deny ────────────────────────────────────────────────
    if let Some(pattern) = policy.denied_by(&tool.name) {
        warn!(run_id = %run_id, tool = %tool.name, pattern = %pattern, "tool matched deny list");
        return Err(GateError::Policy {
            tool: tool.name.clone(),
            reason: format!("matched deny pattern '{pattern}'"),
        });
    }
    if !policy.allow().admits(&tool.name) {
        warn!(run_id = %run_id, tool = %tool.name, "tool not on allow list");
        return Err(GateError::Policy {
            tool: tool.name.clone(),
            reason: "not matched by any allow pattern".to_string(),
        });
    }

    // ── Stage 4: Capability ──────────────────────────────────────────────────
    let grants = policy.grants().grants();
    for need in &tool.required_caps {
        if first_covering_grant(need, grants).is_none() {
            warn!(run_id = %run_id, tool = %tool.name, capability = %need, "required capability not granted");
            return Err(GateError::Capability {
                tool: tool.name.clone(),
                capability: need.to_string(),
            });
        }
    }

    // ── Stage 5: Metering ────────────────────────────────────────────────────
    policy.grants().count_tool_call(&tool.name)?;

    debug!(run_id = %run_id, tool = %tool.name, "tool call admitted");
    Ok(())
}

fn check_integrity(tool: &ToolMeta, fetcher: Option<&dyn LiveSpecFetcher>) -> GateResult<()> {
    let violation = |reason: String| GateError::Integrity {
        tool: tool.name.clone(),
        reason,
    };

    if tool.name.is_empty() {
        return Err(violation("tool name is empty".to_string()));
    }
    if let Some(bad) = tool.name.chars().find(|c| !is_name_char(*c)) {
        return Err(violation(format!("tool name contains invalid character {bad:?}")));
    }

    let Some(fetcher) = fetcher else {
        return Ok(());
    };

    let spec = fetcher
        .fetch_spec(&tool.name)
        .ok_or_else(|| violation("tool is not present in the live registry".to_string()))?;

    if let Some(declared) = tool.declared_checksum() {
        let live = spec.signature_checksum();
        if live != declared {
            return Err(violation(format!(
                "signature checksum mismatch: declared {declared}, live {live}"
            )));
        }
    }
    Ok(())
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}
