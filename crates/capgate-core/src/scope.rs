//! Scope and capability satisfaction.
//!
//! A requested capability is covered when a *single* grant has the same
//! resource, a superset of its verbs, and scopes that cover every requested
//! scope. Scope comparison depends on the resource class:
//!
//! | resource                                       | grant scope semantics                         |
//! |------------------------------------------------|-----------------------------------------------|
//! | `fs`                                           | shell glob, `*` does not cross `/`, no `..`   |
//! | `net`                                          | `host[:port]`, host wildcards, exact ports    |
//! | `env`, `secret(s)`, `model`, `sandbox`, `proc` | case-insensitive wildcard [`Pattern`]         |
//! | anything else                                  | `*`, case-insensitive exact, or `true`        |
//!
//! Grant scopes are compiled into [`ScopeMatcher`]s once, when a
//! [`CompiledGrant`] is built; requested scopes are matched against those.

use std::collections::BTreeSet;
use std::path::{Component, Path};

use globset::{GlobBuilder, GlobMatcher};
use tracing::warn;

use capgate_contracts::capability::{Capability, Verb};

use crate::pattern::Pattern;

/// A granted capability with its scopes compiled for matching.
#[derive(Debug, Clone)]
pub struct CompiledGrant {
    capability: Capability,
    scopes: Vec<ScopeMatcher>,
}

impl CompiledGrant {
    pub fn new(capability: Capability) -> Self {
        let scopes = capability
            .scopes()
            .iter()
            .map(|s| ScopeMatcher::compile(capability.resource(), s))
            .collect();
        Self { capability, scopes }
    }

    pub fn capability(&self) -> &Capability {
        &self.capability
    }

    pub fn scopes(&self) -> &[ScopeMatcher] {
        &self.scopes
    }

    /// Return true if this grant alone covers `need`.
    pub fn covers(&self, need: &Capability) -> bool {
        self.capability.resource() == need.resource()
            && verbs_satisfied(need.verbs(), self.capability.verbs())
            && scopes_satisfied(need.scopes(), &self.scopes)
    }
}

impl From<Capability> for CompiledGrant {
    fn from(capability: Capability) -> Self {
        Self::new(capability)
    }
}

/// One granted scope, compiled for its resource class.
#[derive(Debug, Clone)]
pub enum ScopeMatcher {
    /// `*` (any resource) or `true` (boolean capability on unknown resources).
    Any,
    /// `fs` glob.
    Glob(GlobMatcher),
    /// `net` host with an optional port (`None` or `*` accepts any port).
    Net { host: HostMatcher, port: Option<String> },
    /// `env`, `secret(s)`, `model`, `sandbox`, `proc`.
    Wildcard(Pattern),
    /// Any other resource: case-insensitive equality.
    Literal(String),
    /// A grant scope that failed to compile; matches nothing.
    Invalid,
}

/// The host half of a `net` grant scope.
#[derive(Debug, Clone)]
pub enum HostMatcher {
    /// `*.suffix`: the suffix itself and any subdomain of it (lower-cased).
    Subdomain(String),
    Pattern(Pattern),
}

impl ScopeMatcher {
    /// Compile `grant` according to the rules of `resource`.
    pub fn compile(resource: &str, grant: &str) -> Self {
        let grant = grant.trim();
        match resource {
            "fs" => compile_fs(grant),
            "net" => compile_net(grant),
            "env" | "secret" | "secrets" | "model" | "sandbox" | "proc" => {
                Self::Wildcard(Pattern::new(grant))
            }
            _ if grant == "*" || grant.eq_ignore_ascii_case("true") => Self::Any,
            _ => Self::Literal(grant.to_ascii_lowercase()),
        }
    }

    /// Decide whether this granted scope covers the requested scope `need`.
    pub fn matches(&self, need: &str) -> bool {
        let need = need.trim();
        match self {
            Self::Any => true,
            Self::Glob(glob) => !has_parent_dir(need) && glob.is_match(need),
            Self::Net { host, port } => {
                let (need_host, need_port) = split_host_port(need);
                if let (Some(np), Some(gp)) = (need_port, port.as_deref()) {
                    if gp != "*" && np != gp {
                        return false;
                    }
                }
                host.matches(need_host)
            }
            Self::Wildcard(pattern) => pattern.matches(need),
            Self::Literal(s) => need.eq_ignore_ascii_case(s),
            Self::Invalid => false,
        }
    }
}

impl HostMatcher {
    fn compile(grant: &str) -> Self {
        match grant.strip_prefix("*.") {
            Some(suffix) if !suffix.contains('*') => Self::Subdomain(suffix.to_ascii_lowercase()),
            _ => Self::Pattern(Pattern::new(grant)),
        }
    }

    fn matches(&self, need: &str) -> bool {
        match self {
            Self::Subdomain(suffix) => {
                let need = need.to_ascii_lowercase();
                need == *suffix
                    || (need.len() > suffix.len()
                        && need.ends_with(suffix.as_str())
                        && need.as_bytes()[need.len() - suffix.len() - 1] == b'.')
            }
            Self::Pattern(pattern) => pattern.matches(need),
        }
    }
}

/// Filesystem grants: `*` covers any path; anything else is a glob whose `*`
/// and `?` stop at path separators. An unparseable glob matches nothing.
fn compile_fs(grant: &str) -> ScopeMatcher {
    if grant == "*" {
        return ScopeMatcher::Any;
    }
    match GlobBuilder::new(grant).literal_separator(true).build() {
        Ok(glob) => ScopeMatcher::Glob(glob.compile_matcher()),
        Err(e) => {
            warn!(pattern = %grant, error = %e, "invalid fs scope glob; treating as no match");
            ScopeMatcher::Invalid
        }
    }
}

fn compile_net(grant: &str) -> ScopeMatcher {
    let (host, port) = split_host_port(grant);
    ScopeMatcher::Net {
        host: HostMatcher::compile(host),
        port: port.map(str::to_string),
    }
}

/// A `..` component would let a glob-matched path climb out of the granted
/// directory.
fn has_parent_dir(path: &str) -> bool {
    Path::new(path)
        .components()
        .any(|c| matches!(c, Component::ParentDir))
}

/// Return true if every needed capability is satisfied by some single grant.
///
/// An empty `needs` list is trivially satisfied.
pub fn caps_satisfied(needs: &[Capability], grants: &[CompiledGrant]) -> bool {
    needs.iter().all(|need| first_covering_grant(need, grants).is_some())
}

/// Return the first grant that covers `need` on its own, if any.
pub fn first_covering_grant<'a>(need: &Capability, grants: &'a [CompiledGrant]) -> Option<&'a CompiledGrant> {
    grants.iter().find(|grant| grant.covers(need))
}

/// Return true if every needed verb is present in `have`.
///
/// Verbs are normalized when parsed, so this is a plain subset check.
pub fn verbs_satisfied(need: &BTreeSet<Verb>, have: &BTreeSet<Verb>) -> bool {
    need.is_subset(have)
}

/// Return true if every needed scope is matched by at least one granted scope.
///
/// An empty `need` set passes: the capability only asks for the resource and
/// verbs, not for any particular target.
pub fn scopes_satisfied(need: &BTreeSet<String>, have: &[ScopeMatcher]) -> bool {
    need.iter().all(|n| have.iter().any(|h| h.matches(n)))
}

/// Compile `grant` for `resource` and test a single requested scope.
///
/// For one-off checks; the gate matches against [`CompiledGrant`]s.
pub fn scope_matches(resource: &str, need: &str, grant: &str) -> bool {
    ScopeMatcher::compile(resource, grant).matches(need)
}

/// Split `host[:port]`. Only a trailing run of digits (or `*`) counts as a
/// port, so bare IPv6 literals are left whole; `[v6]:port` is unwrapped.
fn split_host_port(s: &str) -> (&str, Option<&str>) {
    let s = s.trim();
    if let Some(rest) = s.strip_prefix('[') {
        if let Some((host, tail)) = rest.split_once(']') {
            let port = tail.strip_prefix(':').filter(|p| is_port(p));
            return (host, port);
        }
    }
    match s.rsplit_once(':') {
        Some((host, port)) if is_port(port) && !host.contains(':') => (host, Some(port)),
        _ => (s, None),
    }
}

fn is_port(p: &str) -> bool {
    p == "*" || (!p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cap(s: &str) -> Capability {
        Capability::parse(s).unwrap()
    }

    fn grants(items: &[&str]) -> Vec<CompiledGrant> {
        items.iter().map(|s| CompiledGrant::new(cap(s))).collect()
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn matchers(resource: &str, items: &[&str]) -> Vec<ScopeMatcher> {
        items.iter().map(|s| ScopeMatcher::compile(resource, s)).collect()
    }

    // ── fs ───────────────────────────────────────────────────────────────────

    #[test]
    fn fs_star_matches_any_path() {
        assert!(scope_matches("fs", "/etc/passwd", "*"));
        assert!(scope_matches("fs", "relative/file.txt", "*"));
    }

    #[test]
    fn fs_glob_stays_within_directory() {
        assert!(scope_matches("fs", "/data/x", "/data/*"));
        assert!(!scope_matches("fs", "/other/x", "/data/*"));
        assert!(!scope_matches("fs", "/data/nested/x", "/data/*"));
        assert!(scope_matches("fs", "/data/nested/x", "/data/**"));
        assert!(scope_matches("fs", "/data/report.csv", "/data/*.csv"));
    }

    #[test]
    fn fs_parent_dir_cannot_escape_grant() {
        assert!(!scope_matches("fs", "/data/..", "/data/*"));
        assert!(!scope_matches("fs", "/data/../etc/passwd", "/data/**"));
        assert!(!scope_matches("fs", "/data/sub/../../etc", "/data/**"));
        assert!(!caps_satisfied(
            &[cap("fs:read:/data/../etc/passwd")],
            &grants(&["fs:read:/data/**"])
        ));
        assert!(!caps_satisfied(&[cap("fs:read:/data/..")], &grants(&["fs:read:/data/*"])));
        // Dots inside names are not traversal.
        assert!(scope_matches("fs", "/data/..hidden", "/data/*"));
        assert!(scope_matches("fs", "/data/./x", "/data/**"));
    }

    #[test]
    fn fs_invalid_glob_matches_nothing() {
        assert!(matches!(ScopeMatcher::compile("fs", "/data/[x"), ScopeMatcher::Invalid));
        assert!(!scope_matches("fs", "/data/x", "/data/[x"));
    }

    // ── net ──────────────────────────────────────────────────────────────────

    #[test]
    fn net_wildcard_subdomain() {
        assert!(scope_matches("net", "api.example.com:443", "*.example.com"));
        assert!(scope_matches("net", "example.com", "*.example.com"));
        assert!(scope_matches("net", "API.Example.COM", "*.example.com"));
        assert!(!scope_matches("net", "badexample.com", "*.example.com"));
    }

    #[test]
    fn net_port_mismatch_fails() {
        assert!(!scope_matches("net", "api.example.com:443", "*.example.com:80"));
        assert!(scope_matches("net", "api.example.com:443", "*.example.com:443"));
        assert!(scope_matches("net", "api.example.com:443", "*.example.com:*"));
        // A port on only one side is not compared.
        assert!(scope_matches("net", "api.example.com", "*.example.com:443"));
    }

    #[test]
    fn net_host_forms() {
        assert!(scope_matches("net", "anything.io:8080", "*"));
        assert!(scope_matches("net", "10.0.0.7", "10.0.*"));
        assert!(scope_matches("net", "eu-1.api.example.com", "*.api.*.com"));
        assert!(!scope_matches("net", "example.org", "example.com"));
    }

    #[test]
    fn net_ipv6_literals() {
        assert_eq!(split_host_port("[::1]:8080"), ("::1", Some("8080")));
        assert_eq!(split_host_port("::1"), ("::1", None));
        assert!(scope_matches("net", "[::1]:8080", "::1"));
    }

    // ── string-like resources ────────────────────────────────────────────────

    #[test]
    fn env_and_secret_wildcards() {
        assert!(scope_matches("env", "HOME", "home"));
        assert!(scope_matches("env", "AWS_SECRET_KEY", "aws_*"));
        assert!(scope_matches("secrets", "github_token", "*TOKEN"));
        assert!(scope_matches("secret", "db-password-ro", "*password*"));
        assert!(!scope_matches("model", "gpt-large", "claude-*"));
    }

    #[test]
    fn unknown_resource_boolean_convention() {
        assert!(scope_matches("bus", "events", "*"));
        assert!(scope_matches("bus", "Events", "events"));
        assert!(scope_matches("budget", "anything", "true"));
        assert!(!scope_matches("bus", "events.audit", "events.*"));
    }

    // ── compiled grants ──────────────────────────────────────────────────────

    #[test]
    fn grant_scopes_compile_per_resource() {
        let g = CompiledGrant::new(cap("fs:read:/data/*,*"));
        assert_eq!(g.scopes().len(), 2);
        assert!(g.scopes().iter().any(|s| matches!(s, ScopeMatcher::Any)));
        assert!(g.scopes().iter().any(|s| matches!(s, ScopeMatcher::Glob(_))));

        let g = CompiledGrant::new(cap("net:read:*.example.com:443"));
        match &g.scopes()[0] {
            ScopeMatcher::Net { host: HostMatcher::Subdomain(s), port } => {
                assert_eq!(s, "example.com");
                assert_eq!(port.as_deref(), Some("443"));
            }
            other => panic!("expected Net subdomain matcher, got {:?}", other),
        }

        let g = CompiledGrant::new(cap("env:read:AWS_*"));
        assert!(matches!(g.scopes()[0], ScopeMatcher::Wildcard(_)));

        let g = CompiledGrant::new(cap("bus:publish:Events"));
        assert!(matches!(&g.scopes()[0], ScopeMatcher::Literal(s) if s == "events"));
    }

    // ── verbs & scopes ───────────────────────────────────────────────────────

    #[test]
    fn verbs_subset_check() {
        let have = cap("fs:read,write").verbs().clone();
        assert!(verbs_satisfied(cap("fs:READ").verbs(), &have));
        assert!(verbs_satisfied(&BTreeSet::new(), &have));
        assert!(!verbs_satisfied(cap("fs:read,delete").verbs(), &have));
    }

    #[test]
    fn empty_need_scopes_pass() {
        assert!(scopes_satisfied(&BTreeSet::new(), &[]));
        assert!(!scopes_satisfied(&set(&["/data/x"]), &[]));
    }

    #[test]
    fn every_need_scope_must_be_covered() {
        let have = matchers("fs", &["/data/*", "/tmp/*"]);
        assert!(scopes_satisfied(&set(&["/data/a", "/tmp/b"]), &have));
        assert!(!scopes_satisfied(&set(&["/data/a", "/etc/b"]), &have));
    }

    // ── caps_satisfied ───────────────────────────────────────────────────────

    #[test]
    fn caps_satisfied_when_all_conditions_hold() {
        let grants = grants(&["fs:read,write:/data/*"]);
        assert!(caps_satisfied(&[cap("fs:read:/data/x")], &grants));
    }

    #[test]
    fn caps_fail_when_any_condition_is_negated() {
        let grants = grants(&["fs:read:/data/*"]);
        // Resource differs.
        assert!(!caps_satisfied(&[cap("net:read:/data/x")], &grants));
        // Verb not granted.
        assert!(!caps_satisfied(&[cap("fs:write:/data/x")], &grants));
        // Scope not covered.
        assert!(!caps_satisfied(&[cap("fs:read:/other/x")], &grants));
    }

    #[test]
    fn a_single_grant_must_cover_the_whole_need() {
        // Read comes from one grant and write from another: not enough.
        let split = grants(&["fs:read:/data/*", "fs:write:/data/*"]);
        assert!(!caps_satisfied(&[cap("fs:read,write:/data/x")], &split));

        let both = grants(&["fs:read:/data/*", "fs:read,write:/data/*"]);
        let need = cap("fs:read,write:/data/x");
        assert_eq!(
            first_covering_grant(&need, &both).map(CompiledGrant::capability),
            Some(&cap("fs:read,write:/data/*"))
        );
    }

    #[test]
    fn no_needs_always_satisfied() {
        assert!(caps_satisfied(&[], &[]));
    }
}
