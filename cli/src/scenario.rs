//! Built-in walkthrough of the gate's five stages.
//!
//! Builds one user-context policy and a small registry, then pushes a fixed
//! list of calls through the gate, printing each verdict next to the
//! expected one. Returns `Ok(false)` if any verdict differs.

use tracing::info;

use capgate_contracts::{
    capability::Capability,
    context::ExecContext,
    error::{GateError, GateResult},
    tool::ToolMeta,
};
use capgate_core::{
    registry::{SpecRegistry, ToolSignature},
    traits::{signature_checksum, LiveSpecFetcher},
};
use capgate_policy::PolicyBuilder;

/// What a scenario step is expected to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Admit,
    Integrity,
    Trust,
    Policy,
    Capability,
    ToolExceeded,
}

impl Expect {
    fn of(result: &GateResult<()>) -> Option<Self> {
        match result {
            Ok(()) => Some(Self::Admit),
            Err(GateError::Integrity { .. }) => Some(Self::Integrity),
            Err(GateError::Trust { .. }) => Some(Self::Trust),
            Err(GateError::Policy { .. }) => Some(Self::Policy),
            Err(GateError::Capability { .. }) => Some(Self::Capability),
            Err(GateError::ToolExceeded { .. }) => Some(Self::ToolExceeded),
            Err(_) => None,
        }
    }
}

pub fn run() -> GateResult<bool> {
    print_banner();

    let policy = PolicyBuilder::new(ExecContext::User)
        .allow(["tool.fs.*", "tool.net.*", "sys.*"])
        .deny(["tool.fs.Delete"])
        .grant("fs:read:/data/*")?
        .grant("net:read:*.example.com:443")?
        .limit_tool_calls("tool.net.Get", 1)
        .build();

    let registry: SpecRegistry = [
        ToolSignature::new("tool.fs.Read", "bytes", 1),
        ToolSignature::new("tool.fs.Delete", "bool", 1),
        ToolSignature::new("tool.net.Get", "bytes", 2),
        ToolSignature::new("sys.Reload", "void", 0),
    ]
    .into_iter()
    .collect();
    let fetcher: &dyn LiveSpecFetcher = &registry;

    let read = |path: &str| -> GateResult<ToolMeta> {
        Ok(ToolMeta::named("tool.fs.Read")
            .with_caps([Capability::parse(&format!("fs:read:{path}"))?])
            .with_checksum(signature_checksum("tool.fs.Read", "bytes", 1)))
    };
    let get = |host: &str| -> GateResult<ToolMeta> {
        Ok(ToolMeta::named("tool.net.Get").with_caps([Capability::parse(&format!("net:read:{host}"))?]))
    };

    let steps: Vec<(&str, ToolMeta, Expect)> = vec![
        ("read under /data", read("/data/report.csv")?, Expect::Admit),
        ("read outside /data", read("/etc/passwd")?, Expect::Capability),
        (
            "stale signature",
            ToolMeta::named("tool.fs.Read").with_checksum(signature_checksum("tool.fs.Read", "bytes", 2)),
            Expect::Integrity,
        ),
        ("unregistered tool", ToolMeta::named("tool.fs.Shred"), Expect::Integrity),
        ("denied tool", ToolMeta::named("tool.fs.Delete"), Expect::Policy),
        ("trusted tool from user context", ToolMeta::named("sys.Reload").requiring_trust(), Expect::Trust),
        ("fetch allowed host", get("api.example.com:443")?, Expect::Admit),
        ("second fetch over quota", get("api.example.com:443")?, Expect::ToolExceeded),
    ];

    let mut all_matched = true;
    for (label, call, expected) in &steps {
        let result = policy.can_call(call, Some(fetcher));
        let got = Expect::of(&result);
        let matched = got == Some(*expected);
        all_matched &= matched;

        let detail = match &result {
            Ok(()) => "admitted".to_string(),
            Err(e) => e.to_string(),
        };
        println!(
            "  [{}] {:<32} expected {:<12} {}",
            if matched { "ok" } else { "!!" },
            label,
            format!("{expected:?}"),
            detail
        );
    }

    let counters = policy.grants().counters();
    info!(run_id = %policy.run_id(), tool_calls = ?counters.tool_calls, "scenario finished");
    println!();
    println!("Tool call counters: {:?}", counters.tool_calls);
    println!();
    Ok(all_matched)
}

fn print_banner() {
    println!();
    println!("capgate — Capability Policy Gate");
    println!("================================");
    println!();
    println!("Gate stages per tool call:");
    println!("  [1] Integrity: name format, live registry lookup, signature checksum");
    println!("  [2] Trust: trusted tools only from a config context");
    println!("  [3] Allow/Deny: deny always wins; allow list is deny-by-default");
    println!("  [4] Capability: each required capability covered by one grant");
    println!("  [5] Metering: per-tool call quota consumed on admission");
    println!();
}
