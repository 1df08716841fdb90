//! capgate — command-line front end for the tool-call policy gate.
//!
//! Evaluates tool calls against TOML policies, normalizes capability strings,
//! computes signature checksums, and runs a built-in walkthrough.
//!
//! Usage:
//!   capgate check --policy policy.toml --tool call.json [--registry tools.toml]
//!   capgate parse "net:read:*.example.com:443"
//!   capgate checksum valid.tool string 0
//!   capgate scenario

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use capgate_contracts::{
    capability::Capability,
    error::{GateError, GateResult},
    tool::ToolMeta,
};
use capgate_core::traits::{signature_checksum, LiveSpecFetcher};
use capgate_policy::{PolicyConfig, RegistryConfig};

mod scenario;

// ── CLI definition ────────────────────────────────────────────────────────────

/// capgate — capability-based policy gate for sandboxed tool calls.
#[derive(Parser)]
#[command(
    name = "capgate",
    about = "Evaluate tool calls against a capability policy",
    long_about = "Evaluates tool calls against a deny-by-default capability policy:\n\
                  integrity, trust, allow/deny, capability coverage and metering."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate one or more tool calls (JSON) against a TOML policy.
    Check {
        /// TOML policy file.
        #[arg(long)]
        policy: PathBuf,
        /// JSON file holding one tool descriptor or an array of them.
        #[arg(long)]
        tool: PathBuf,
        /// TOML registry snapshot; enables signature checks.
        #[arg(long)]
        registry: Option<PathBuf>,
    },
    /// Parse and print a capability in normalized form.
    Parse {
        capability: String,
    },
    /// Print the signature checksum of a tool shape.
    Checksum {
        name: String,
        return_type: String,
        arg_count: usize,
    },
    /// Walk through a built-in policy showing admitted and rejected calls.
    Scenario,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Initialize structured logging.  Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Check { policy, tool, registry } => run_check(&policy, &tool, registry.as_deref()),
        Command::Parse { capability } => run_parse(&capability),
        Command::Checksum { name, return_type, arg_count } => {
            println!("{}", signature_checksum(&name, &return_type, arg_count));
            Ok(true)
        }
        Command::Scenario => scenario::run(),
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(e) => {
            eprintln!("capgate error: {}", e);
            std::process::exit(1);
        }
    }
}

// ── Subcommands ───────────────────────────────────────────────────────────────

/// Returns `Ok(false)` when at least one call was rejected.
fn run_check(policy: &std::path::Path, tool: &std::path::Path, registry: Option<&std::path::Path>) -> GateResult<bool> {
    let policy = PolicyConfig::from_file(policy)?.build()?;
    let registry = registry
        .map(RegistryConfig::from_file)
        .transpose()?
        .map(RegistryConfig::into_registry);
    let fetcher = registry.as_ref().map(|r| r as &dyn LiveSpecFetcher);

    let calls = read_tool_calls(tool)?;
    let mut all_admitted = true;
    for call in &calls {
        match policy.can_call(call, fetcher) {
            Ok(()) => println!("ADMIT  {}", call.name),
            Err(e) => {
                all_admitted = false;
                println!("DENY   {}  ({})", call.name, e);
            }
        }
    }
    Ok(all_admitted)
}

fn run_parse(input: &str) -> GateResult<bool> {
    let cap = Capability::parse(input)?;
    println!("{cap}");
    Ok(true)
}

fn read_tool_calls(path: &std::path::Path) -> GateResult<Vec<ToolMeta>> {
    let contents = std::fs::read_to_string(path).map_err(|e| GateError::Config {
        reason: format!("failed to read tool file '{}': {}", path.display(), e),
    })?;
    let value: serde_json::Value = serde_json::from_str(&contents).map_err(|e| GateError::Config {
        reason: format!("failed to parse tool JSON: {}", e),
    })?;
    let calls = if value.is_array() {
        serde_json::from_value(value)
    } else {
        serde_json::from_value(value).map(|one: ToolMeta| vec![one])
    };
    calls.map_err(|e| GateError::Config {
        reason: format!("invalid tool descriptor: {}", e),
    })
}
