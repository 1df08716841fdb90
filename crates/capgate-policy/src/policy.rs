//! The execution policy carried by one run.
//!
//! An `ExecPolicy` is read-only once built, except for the counters inside its
//! `GrantSet`, which every admitted call and every metered operation updates
//! in place. Build a new policy per run; counters are never shared between
//! runs.

use capgate_contracts::{
    context::{ExecContext, RunId},
    error::GateResult,
    tool::ToolMeta,
};
use capgate_core::{meter::GrantSet, pattern::Pattern, traits::LiveSpecFetcher};

/// Which tool names the allow list admits.
///
/// The two states are distinct by construction: there is no way to confuse
/// "no allow list" with "an allow list that happens to be empty".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowPolicy {
    /// Every name not denied is allowed.
    Unrestricted,
    /// Only names matching one of these patterns are allowed. Empty means
    /// nothing is allowed.
    Restricted(Vec<Pattern>),
}

impl AllowPolicy {
    /// Return true if `name` passes the allow list (deny is checked separately).
    pub fn admits(&self, name: &str) -> bool {
        match self {
            Self::Unrestricted => true,
            Self::Restricted(patterns) => patterns.iter().any(|p| p.matches(name)),
        }
    }
}

impl Default for AllowPolicy {
    fn default() -> Self {
        Self::Restricted(Vec::new())
    }
}

/// The complete authority of one run: trust level, name lists, grants,
/// limits and live counters.
///
/// Construct through [`PolicyBuilder`](crate::builder::PolicyBuilder).
#[derive(Debug)]
pub struct ExecPolicy {
    pub(crate) run_id: RunId,
    pub(crate) context: ExecContext,
    pub(crate) allow: AllowPolicy,
    pub(crate) deny: Vec<Pattern>,
    pub(crate) grants: GrantSet,
}

impl ExecPolicy {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn context(&self) -> ExecContext {
        self.context
    }

    pub fn allow(&self) -> &AllowPolicy {
        &self.allow
    }

    pub fn deny(&self) -> &[Pattern] {
        &self.deny
    }

    /// Grants, limits and counters. The metering operations
    /// (`charge_budget`, `count_net`, ...) live here.
    pub fn grants(&self) -> &GrantSet {
        &self.grants
    }

    /// Return the first deny pattern matching `name`, if any.
    pub fn denied_by(&self, name: &str) -> Option<&Pattern> {
        self.deny.iter().find(|p| p.matches(name))
    }

    /// Run the gate for one tool call. See [`can_call`](crate::gate::can_call).
    pub fn can_call(&self, tool: &ToolMeta, fetcher: Option<&dyn LiveSpecFetcher>) -> GateResult<()> {
        crate::gate::can_call(self, tool, fetcher)
    }
}
