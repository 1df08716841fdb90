//! Capability-based access control types.
//!
//! A `Capability` is one unit of authority: "may perform any of these verbs
//! on resources matching any of these scopes within this resource class".
//! Grants and tool requirements are both expressed as capabilities, and the
//! compact text form `resource:verb[,verb...][:scope[,scope...]]` is used in
//! policy files, tool descriptors and logs.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{GateError, GateResult};

/// An action that can be performed on a resource.
///
/// Well-known verbs get their own variant; anything else is kept verbatim
/// (lower-cased) in `Other` so new tool categories need no code change.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Verb {
    Read,
    Write,
    Delete,
    List,
    Exec,
    Call,
    Connect,
    Spend,
    Publish,
    Subscribe,
    Other(String),
}

impl Verb {
    /// Parse a verb, ignoring case and surrounding whitespace.
    pub fn parse(s: &str) -> Self {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "read" => Self::Read,
            "write" => Self::Write,
            "delete" => Self::Delete,
            "list" => Self::List,
            "exec" => Self::Exec,
            "call" => Self::Call,
            "connect" => Self::Connect,
            "spend" => Self::Spend,
            "publish" => Self::Publish,
            "subscribe" => Self::Subscribe,
            _ => Self::Other(normalized),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Delete => "delete",
            Self::List => "list",
            Self::Exec => "exec",
            Self::Call => "call",
            Self::Connect => "connect",
            Self::Spend => "spend",
            Self::Publish => "publish",
            Self::Subscribe => "subscribe",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Verb {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<Verb> for String {
    fn from(v: Verb) -> Self {
        v.as_str().to_string()
    }
}

/// A unit of authority: resource class, permitted verbs and scopes.
///
/// The resource is an open, lower-cased string (`fs`, `net`, `env`, `model`,
/// `tool`, `secret`, `budget`, `bus`, ...). Scopes keep their original case
/// because filesystem paths are case-sensitive; resource-specific matchers
/// decide how to compare them.
///
/// Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Capability {
    resource: String,
    verbs: BTreeSet<Verb>,
    scopes: BTreeSet<String>,
}

impl Capability {
    /// Build a capability from its parts.
    ///
    /// The resource is trimmed and lower-cased, verbs are re-normalized and
    /// blank scopes are dropped. Parts that could not survive the text form
    /// are rejected: a blank resource or one containing `:` or `,`, an empty
    /// verb set, a verb containing `:` or `,`, and a scope containing `,`.
    pub fn new<S: Into<String>>(
        resource: &str,
        verbs: impl IntoIterator<Item = Verb>,
        scopes: impl IntoIterator<Item = S>,
    ) -> GateResult<Self> {
        let resource = resource.trim().to_ascii_lowercase();
        let verbs: BTreeSet<Verb> = verbs.into_iter().map(|v| Verb::parse(v.as_str())).collect();
        let scopes: BTreeSet<String> = scopes
            .into_iter()
            .map(|s| s.into().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let invalid = |reason: String| GateError::InvalidCapabilityFormat {
            input: format!("{resource}:{}", verbs.iter().map(Verb::as_str).collect::<Vec<_>>().join(",")),
            reason,
        };

        if resource.is_empty() {
            return Err(invalid("resource is empty".to_string()));
        }
        if resource.contains([':', ',']) {
            return Err(invalid(format!("resource '{resource}' contains a separator")));
        }
        if verbs.is_empty() {
            return Err(invalid("verb list is empty".to_string()));
        }
        if let Some(bad) = verbs.iter().find(|v| v.as_str().is_empty() || v.as_str().contains([':', ','])) {
            return Err(invalid(format!("verb '{bad}' is empty or contains a separator")));
        }
        if let Some(bad) = scopes.iter().find(|s| s.contains(',')) {
            return Err(invalid(format!("scope '{bad}' contains ','")));
        }

        Ok(Self { resource, verbs, scopes })
    }

    /// Parse the compact `resource:verb[,verb...][:scope[,scope...]]` form.
    ///
    /// Everything after the second colon is the scope list, so network
    /// scopes may carry a port (`net:read:*.example.com:443`).
    pub fn parse(input: &str) -> GateResult<Self> {
        let invalid = |reason: &str| GateError::InvalidCapabilityFormat {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let mut segments = input.trim().splitn(3, ':');
        let resource = segments.next().unwrap_or_default().trim();
        let verbs = segments
            .next()
            .ok_or_else(|| invalid("expected at least 'resource:verb'"))?;
        let scopes = segments.next().unwrap_or_default();

        if resource.is_empty() {
            return Err(invalid("resource is empty"));
        }

        let verbs: BTreeSet<Verb> = verbs
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(Verb::parse)
            .collect();
        if verbs.is_empty() {
            return Err(invalid("verb list is empty"));
        }

        Self::new(resource, verbs, scopes.split(','))
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn verbs(&self) -> &BTreeSet<Verb> {
        &self.verbs
    }

    pub fn scopes(&self) -> &BTreeSet<String> {
        &self.scopes
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verbs: Vec<&str> = self.verbs.iter().map(Verb::as_str).collect();
        write!(f, "{}:{}", self.resource, verbs.join(","))?;
        if !self.scopes.is_empty() {
            let scopes: Vec<&str> = self.scopes.iter().map(String::as_str).collect();
            write!(f, ":{}", scopes.join(","))?;
        }
        Ok(())
    }
}

impl FromStr for Capability {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Capability {
    type Error = GateError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Capability> for String {
    fn from(c: Capability) -> Self {
        c.to_string()
    }
}
