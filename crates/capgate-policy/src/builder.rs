//! Fluent construction of deny-by-default policies.
//!
//! ```rust,ignore
//! use capgate_contracts::ExecContext;
//! use capgate_policy::PolicyBuilder;
//!
//! let policy = PolicyBuilder::new(ExecContext::User)
//!     .allow(["tool.fs.*"])
//!     .deny(["tool.fs.delete"])
//!     .grant("fs:read:/data/*")?
//!     .limit_per_run_cents("USD", 500)
//!     .limit_tool_calls("tool.fs.read", 10)
//!     .build();
//! ```

use std::collections::BTreeMap;

use tracing::debug;

use capgate_contracts::{
    capability::Capability,
    context::{ExecContext, RunId},
    error::GateResult,
};
use capgate_core::{
    meter::{GrantSet, Limits},
    pattern::Pattern,
};

use crate::policy::{AllowPolicy, ExecPolicy};

/// Assembles an [`ExecPolicy`].
///
/// Starts from an empty restricted allow list, so nothing is callable until
/// something is explicitly allowed.
#[derive(Debug, Clone)]
pub struct PolicyBuilder {
    context: ExecContext,
    allow: AllowPolicy,
    deny: Vec<Pattern>,
    grants: Vec<Capability>,
    limits: Limits,
}

impl PolicyBuilder {
    pub fn new(context: ExecContext) -> Self {
        Self {
            context,
            allow: AllowPolicy::Restricted(Vec::new()),
            deny: Vec::new(),
            grants: Vec::new(),
            limits: Limits::default(),
        }
    }

    /// Add allow patterns, skipping blanks and case-insensitive duplicates.
    ///
    /// On an unrestricted builder this switches back to a restricted list
    /// holding just these patterns.
    pub fn allow<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = match self.allow {
            AllowPolicy::Restricted(list) => list,
            AllowPolicy::Unrestricted => Vec::new(),
        };
        merge_patterns(&mut list, patterns);
        self.allow = AllowPolicy::Restricted(list);
        self
    }

    /// Add deny patterns, skipping blanks and case-insensitive duplicates.
    pub fn deny<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        merge_patterns(&mut self.deny, patterns);
        self
    }

    /// Replace the allow list wholesale. This is the only way to get
    /// [`AllowPolicy::Unrestricted`].
    pub fn allow_policy(mut self, allow: AllowPolicy) -> Self {
        self.allow = allow;
        self
    }

    /// Parse a `resource:verb[,verb][:scope[,scope]]` string and grant it.
    pub fn grant(self, capability: &str) -> GateResult<Self> {
        let cap = Capability::parse(capability)?;
        Ok(self.grant_cap(cap))
    }

    pub fn grant_cap(mut self, capability: Capability) -> Self {
        self.grants.push(capability);
        self
    }

    pub fn limit_per_run_cents(mut self, currency: &str, cents: u64) -> Self {
        set_keyed(&mut self.limits.budget_per_run_cents, currency, cents);
        self
    }

    pub fn limit_per_call_cents(mut self, currency: &str, cents: u64) -> Self {
        set_keyed(&mut self.limits.budget_per_call_cents, currency, cents);
        self
    }

    pub fn limit_net(mut self, max_bytes: u64, max_calls: u64) -> Self {
        self.limits.net_max_bytes = max_bytes;
        self.limits.net_max_calls = max_calls;
        self
    }

    pub fn limit_fs(mut self, max_bytes: u64, max_calls: u64) -> Self {
        self.limits.fs_max_bytes = max_bytes;
        self.limits.fs_max_calls = max_calls;
        self
    }

    pub fn limit_tool_calls(mut self, tool: &str, max_calls: u64) -> Self {
        set_keyed(&mut self.limits.tool_max_calls, tool, max_calls);
        self
    }

    pub fn limit_sleep_seconds(mut self, seconds: u64) -> Self {
        self.limits.time_max_sleep_seconds = seconds;
        self
    }

    /// Merge a whole `Limits` value; non-zero fields and map entries win.
    pub fn limits(mut self, limits: Limits) -> Self {
        for (k, v) in limits.budget_per_run_cents {
            set_keyed(&mut self.limits.budget_per_run_cents, &k, v);
        }
        for (k, v) in limits.budget_per_call_cents {
            set_keyed(&mut self.limits.budget_per_call_cents, &k, v);
        }
        for (k, v) in limits.tool_max_calls {
            set_keyed(&mut self.limits.tool_max_calls, &k, v);
        }
        let l = &mut self.limits;
        for (dst, src) in [
            (&mut l.net_max_bytes, limits.net_max_bytes),
            (&mut l.net_max_calls, limits.net_max_calls),
            (&mut l.fs_max_bytes, limits.fs_max_bytes),
            (&mut l.fs_max_calls, limits.fs_max_calls),
            (&mut l.time_max_sleep_seconds, limits.time_max_sleep_seconds),
        ] {
            if src > 0 {
                *dst = src;
            }
        }
        self
    }

    /// Finish the policy with a fresh run id and zeroed counters.
    pub fn build(self) -> ExecPolicy {
        let run_id = RunId::new();
        debug!(
            run_id = %run_id,
            context = %self.context,
            grants = self.grants.len(),
            deny = self.deny.len(),
            "policy built"
        );
        ExecPolicy {
            run_id,
            context: self.context,
            allow: self.allow,
            deny: self.deny,
            grants: GrantSet::new(self.grants, self.limits),
        }
    }
}

fn merge_patterns<I, S>(list: &mut Vec<Pattern>, patterns: I)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    for raw in patterns {
        let raw = raw.as_ref().trim();
        if raw.is_empty() {
            continue;
        }
        if !list.iter().any(|p| p.as_str().eq_ignore_ascii_case(raw)) {
            list.push(Pattern::new(raw));
        }
    }
}

/// Insert into a limits map, replacing an existing key that differs only by
/// case. `GrantSet` normalizes keys again when the policy is built.
fn set_keyed(map: &mut BTreeMap<String, u64>, key: &str, value: u64) {
    let key = key.trim();
    map.retain(|k, _| !k.eq_ignore_ascii_case(key));
    map.insert(key.to_string(), value);
}
