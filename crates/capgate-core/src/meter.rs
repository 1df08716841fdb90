//! Quantitative guardrails: limits, live counters and their enforcement.
//!
//! A `GrantSet` is the complete authority and budget envelope of one run:
//! the granted capabilities, the static `Limits`, and the `Counters`
//! accumulated so far. Every check-and-commit below runs under a single lock
//! acquisition, so one policy can be shared by concurrently executing script
//! tasks without two of them both squeezing under the same limit.
//!
//! A zero limit means "unlimited" throughout. A rejected operation never
//! mutates the counters.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use capgate_contracts::{
    capability::Capability,
    error::{GateError, GateResult},
};

use crate::scope::CompiledGrant;

/// Static ceilings for one run. All fields default to zero (unlimited).
///
/// Currency codes are upper-cased and tool names lower-cased when used as
/// keys, so lookups are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub budget_per_run_cents: BTreeMap<String, u64>,
    pub budget_per_call_cents: BTreeMap<String, u64>,
    pub net_max_bytes: u64,
    pub net_max_calls: u64,
    pub fs_max_bytes: u64,
    pub fs_max_calls: u64,
    pub tool_max_calls: BTreeMap<String, u64>,
    pub time_max_sleep_seconds: u64,
}

impl Limits {
    /// Re-key the maps with normalized currency codes and tool names.
    pub fn normalized(self) -> Self {
        Self {
            budget_per_run_cents: rekey(self.budget_per_run_cents, currency_key),
            budget_per_call_cents: rekey(self.budget_per_call_cents, currency_key),
            tool_max_calls: rekey(self.tool_max_calls, tool_key),
            ..self
        }
    }
}

fn rekey(map: BTreeMap<String, u64>, key: fn(&str) -> String) -> BTreeMap<String, u64> {
    map.into_iter().map(|(k, v)| (key(&k), v)).collect()
}

pub(crate) fn currency_key(currency: &str) -> String {
    currency.trim().to_ascii_uppercase()
}

pub(crate) fn tool_key(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

/// Live accumulators mirroring the shape of `Limits`.
///
/// Start zeroed and only grow for the lifetime of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub spent_cents: BTreeMap<String, u64>,
    pub net_bytes: u64,
    pub net_calls: u64,
    pub fs_bytes: u64,
    pub fs_calls: u64,
    pub tool_calls: BTreeMap<String, u64>,
}

/// Granted capabilities plus the limits and counters metered against them.
#[derive(Debug, Default)]
pub struct GrantSet {
    grants: Vec<CompiledGrant>,
    limits: Limits,
    counters: Mutex<Counters>,
}

impl GrantSet {
    /// Create a grant set with freshly zeroed counters.
    ///
    /// Grant scopes are compiled here, once for the lifetime of the run.
    pub fn new(grants: Vec<Capability>, limits: Limits) -> Self {
        Self {
            grants: grants.into_iter().map(CompiledGrant::new).collect(),
            limits: limits.normalized(),
            counters: Mutex::new(Counters::default()),
        }
    }

    pub fn grants(&self) -> &[CompiledGrant] {
        &self.grants
    }

    pub fn capabilities(&self) -> impl Iterator<Item = &Capability> {
        self.grants.iter().map(CompiledGrant::capability)
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// A snapshot of the counters as they are right now.
    pub fn counters(&self) -> Counters {
        self.lock().clone()
    }

    /// Counter updates are single arithmetic steps, so a panic elsewhere
    /// while the lock was held cannot leave them half-written.
    fn lock(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add `cents` to the run's spend in `currency`.
    ///
    /// Rejects with `BudgetExceeded`, leaving the spend untouched, if the
    /// new total would pass the per-run limit for that currency.
    pub fn charge_budget(&self, currency: &str, cents: u64) -> GateResult<()> {
        let currency = currency_key(currency);
        let limit = self.limits.budget_per_run_cents.get(&currency).copied().unwrap_or(0);

        let mut counters = self.lock();
        let spent = counters.spent_cents.get(&currency).copied().unwrap_or(0);
        let total = spent.saturating_add(cents);

        if limit > 0 && total > limit {
            warn!(currency = %currency, requested = cents, spent, limit, "budget charge rejected");
            return Err(GateError::BudgetExceeded {
                currency,
                requested: cents,
                spent,
                limit,
            });
        }

        counters.spent_cents.insert(currency.clone(), total);
        debug!(currency = %currency, charged = cents, total, "budget charged");
        Ok(())
    }

    /// Check a single charge against the per-call limit without recording it.
    pub fn check_per_call_budget(&self, currency: &str, cents: u64) -> GateResult<()> {
        let currency = currency_key(currency);
        let limit = self.limits.budget_per_call_cents.get(&currency).copied().unwrap_or(0);

        if limit > 0 && cents > limit {
            warn!(currency = %currency, requested = cents, limit, "per-call budget exceeded");
            return Err(GateError::BudgetExceeded {
                currency,
                requested: cents,
                spent: 0,
                limit,
            });
        }
        Ok(())
    }

    /// Record one network operation moving `bytes`.
    pub fn count_net(&self, bytes: u64) -> GateResult<()> {
        let mut counters = self.lock();
        let calls = counters.net_calls.saturating_add(1);
        let total = counters.net_bytes.saturating_add(bytes);

        check_io("net", calls, self.limits.net_max_calls, total, self.limits.net_max_bytes)
            .map_err(|reason| GateError::NetExceeded { reason })?;

        counters.net_calls = calls;
        counters.net_bytes = total;
        Ok(())
    }

    /// Record one filesystem operation moving `bytes`.
    pub fn count_fs(&self, bytes: u64) -> GateResult<()> {
        let mut counters = self.lock();
        let calls = counters.fs_calls.saturating_add(1);
        let total = counters.fs_bytes.saturating_add(bytes);

        check_io("fs", calls, self.limits.fs_max_calls, total, self.limits.fs_max_bytes)
            .map_err(|reason| GateError::FsExceeded { reason })?;

        counters.fs_calls = calls;
        counters.fs_bytes = total;
        Ok(())
    }

    /// Count one admitted call of `tool`.
    ///
    /// Tools without a configured limit are still counted but never
    /// rejected.
    pub fn count_tool_call(&self, tool: &str) -> GateResult<()> {
        let key = tool_key(tool);
        let limit = self.limits.tool_max_calls.get(&key).copied().unwrap_or(0);

        let mut counters = self.lock();
        let count = counters.tool_calls.get(&key).copied().unwrap_or(0).saturating_add(1);

        if limit > 0 && count > limit {
            warn!(tool = %tool, limit, "tool call limit reached");
            return Err(GateError::ToolExceeded {
                tool: tool.to_string(),
                limit,
            });
        }

        counters.tool_calls.insert(key, count);
        Ok(())
    }

    /// Check a requested sleep against the configured maximum.
    pub fn check_sleep(&self, requested: Duration) -> GateResult<()> {
        let limit = self.limits.time_max_sleep_seconds;
        if limit > 0 && requested > Duration::from_secs(limit) {
            warn!(requested_secs = requested.as_secs_f64(), limit, "sleep exceeds limit");
            return Err(GateError::TimeExceeded {
                requested_secs: requested.as_secs_f64(),
                limit_secs: limit,
            });
        }
        Ok(())
    }
}

fn check_io(kind: &str, calls: u64, max_calls: u64, bytes: u64, max_bytes: u64) -> Result<(), String> {
    if max_calls > 0 && calls > max_calls {
        warn!(kind, calls, max_calls, "call limit reached");
        return Err(format!("{calls} calls would exceed the maximum of {max_calls}"));
    }
    if max_bytes > 0 && bytes > max_bytes {
        warn!(kind, bytes, max_bytes, "byte limit reached");
        return Err(format!("{bytes} bytes would exceed the maximum of {max_bytes}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    fn limits() -> Limits {
        Limits {
            budget_per_run_cents: BTreeMap::from([("usd".to_string(), 100)]),
            budget_per_call_cents: BTreeMap::from([("USD".to_string(), 40)]),
            net_max_bytes: 1_000,
            net_max_calls: 3,
            fs_max_bytes: 500,
            fs_max_calls: 0,
            tool_max_calls: BTreeMap::from([("Tool.Once".to_string(), 1)]),
            time_max_sleep_seconds: 5,
        }
    }

    // ── budget ───────────────────────────────────────────────────────────────

    #[test]
    fn budget_accumulates_until_limit() {
        let gs = GrantSet::new(vec![], limits());
        gs.charge_budget("USD", 60).unwrap();
        gs.charge_budget("usd", 40).unwrap();

        match gs.charge_budget("USD", 1) {
            Err(GateError::BudgetExceeded { spent, limit, requested, .. }) => {
                assert_eq!(spent, 100);
                assert_eq!(limit, 100);
                assert_eq!(requested, 1);
            }
            other => panic!("expected BudgetExceeded, got {:?}", other),
        }
    }

    #[test]
    fn rejected_charge_does_not_mutate() {
        let gs = GrantSet::new(vec![], limits());
        gs.charge_budget("USD", 70).unwrap();
        assert!(gs.charge_budget("USD", 50).is_err());
        assert_eq!(gs.counters().spent_cents.get("USD"), Some(&70));

        // The remaining headroom is still usable.
        gs.charge_budget("USD", 30).unwrap();
        assert_eq!(gs.counters().spent_cents.get("USD"), Some(&100));
    }

    #[test]
    fn currency_without_limit_is_unlimited() {
        let gs = GrantSet::new(vec![], limits());
        gs.charge_budget("EUR", u64::MAX).unwrap();
        gs.charge_budget("EUR", 1).unwrap();
        assert_eq!(gs.counters().spent_cents.get("EUR"), Some(&u64::MAX));
    }

    #[test]
    fn per_call_budget_is_a_pure_check() {
        let gs = GrantSet::new(vec![], limits());
        gs.check_per_call_budget("usd", 40).unwrap();
        assert!(matches!(
            gs.check_per_call_budget("USD", 41),
            Err(GateError::BudgetExceeded { limit: 40, .. })
        ));
        assert!(gs.counters().spent_cents.is_empty());
    }

    // ── net / fs ─────────────────────────────────────────────────────────────

    #[test]
    fn net_calls_and_bytes_are_limited_together() {
        let gs = GrantSet::new(vec![], limits());
        gs.count_net(400).unwrap();
        gs.count_net(400).unwrap();

        // Bytes would reach 1_200 > 1_000.
        assert!(matches!(gs.count_net(400), Err(GateError::NetExceeded { .. })));
        let c = gs.counters();
        assert_eq!((c.net_calls, c.net_bytes), (2, 800));

        gs.count_net(0).unwrap();
        // Fourth call exceeds the call maximum even with zero bytes.
        assert!(matches!(gs.count_net(0), Err(GateError::NetExceeded { .. })));
        assert_eq!(gs.counters().net_calls, 3);
    }

    #[test]
    fn fs_unlimited_calls_limited_bytes() {
        let gs = GrantSet::new(vec![], limits());
        for _ in 0..10 {
            gs.count_fs(50).unwrap();
        }
        match gs.count_fs(1) {
            Err(GateError::FsExceeded { reason }) => assert!(reason.contains("501 bytes")),
            other => panic!("expected FsExceeded, got {:?}", other),
        }
        assert_eq!(gs.counters().fs_calls, 10);
    }

    // ── tool calls ───────────────────────────────────────────────────────────

    #[test]
    fn tool_limit_of_one_allows_exactly_one_call() {
        let gs = GrantSet::new(vec![], limits());
        gs.count_tool_call("tool.once").unwrap();
        match gs.count_tool_call("TOOL.ONCE") {
            Err(GateError::ToolExceeded { limit, .. }) => assert_eq!(limit, 1),
            other => panic!("expected ToolExceeded, got {:?}", other),
        }
        assert_eq!(gs.counters().tool_calls.get("tool.once"), Some(&1));
    }

    #[test]
    fn unlimited_tools_are_still_counted() {
        let gs = GrantSet::new(vec![], Limits::default());
        for _ in 0..5 {
            gs.count_tool_call("tool.free").unwrap();
        }
        assert_eq!(gs.counters().tool_calls.get("tool.free"), Some(&5));
    }

    // ── sleep ────────────────────────────────────────────────────────────────

    #[test]
    fn sleep_limit() {
        let gs = GrantSet::new(vec![], limits());
        gs.check_sleep(Duration::from_secs(5)).unwrap();
        assert!(matches!(
            gs.check_sleep(Duration::from_millis(5_001)),
            Err(GateError::TimeExceeded { limit_secs: 5, .. })
        ));

        let unlimited = GrantSet::new(vec![], Limits::default());
        unlimited.check_sleep(Duration::from_secs(86_400)).unwrap();
    }

    // ── concurrency ──────────────────────────────────────────────────────────

    #[test]
    fn concurrent_tool_calls_respect_limit() {
        let mut l = Limits::default();
        l.tool_max_calls.insert("tool.shared".to_string(), 25);
        let gs = Arc::new(GrantSet::new(vec![], l));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gs = Arc::clone(&gs);
                thread::spawn(move || {
                    (0..10)
                        .filter(|_| gs.count_tool_call("tool.shared").is_ok())
                        .count()
                })
            })
            .collect();

        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 25);
        assert_eq!(gs.counters().tool_calls.get("tool.shared"), Some(&25));
    }

    #[test]
    fn concurrent_budget_charges_never_overspend() {
        let mut l = Limits::default();
        l.budget_per_run_cents.insert("USD".to_string(), 1_000);
        let gs = Arc::new(GrantSet::new(vec![], l));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let gs = Arc::clone(&gs);
                thread::spawn(move || {
                    for _ in 0..100 {
                        let _ = gs.charge_budget("USD", 7);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let spent = gs.counters().spent_cents["USD"];
        assert!(spent <= 1_000);
        assert_eq!(spent, 994);
    }
}
