//! Access control types
//!
//! Core value types shared by the evaluator, the term sources and the guards.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Identifier of a taxonomy term
///
/// Deserializes from a number or a numeric string, since form submissions
/// carry term ids as strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TermId(u64);

impl TermId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(&self) -> u64 {
        self.0
    }

    /// Parse a term id from its textual form
    pub fn parse(s: &str) -> Option<Self> {
        s.trim().parse::<u64>().ok().map(Self)
    }
}

impl From<u64> for TermId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for TermId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(TermId(n)),
            Raw::Text(s) => TermId::parse(&s).ok_or_else(|| {
                serde::de::Error::custom(format!("invalid term id '{}'", s))
            }),
        }
    }
}

/// Collect term ids from anything yielding integers
pub fn term_set<I, T>(ids: I) -> BTreeSet<TermId>
where
    I: IntoIterator<Item = T>,
    T: Into<TermId>,
{
    ids.into_iter().map(Into::into).collect()
}

/// Reference to the resource (content item) being checked
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceRef {
    /// Numeric resource id, loaded directly
    Id(u64),
    /// Unique external id, resolved by property lookup
    Uuid(String),
}

impl ResourceRef {
    /// Parse a raw reference
    ///
    /// All-digit strings are numeric ids, other non-empty strings are
    /// unique external ids. Blank input means "no resource".
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if raw.bytes().all(|b| b.is_ascii_digit())
            && let Ok(id) = raw.parse::<u64>()
        {
            return Some(ResourceRef::Id(id));
        }
        Some(ResourceRef::Uuid(raw.to_string()))
    }
}

impl From<u64> for ResourceRef {
    fn from(id: u64) -> Self {
        ResourceRef::Id(id)
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceRef::Id(id) => write!(f, "{}", id),
            ResourceRef::Uuid(uuid) => write!(f, "uuid:{}", uuid),
        }
    }
}

/// Term ids currently attached to a resource through one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceTermSet {
    pub resource: ResourceRef,
    pub term_ids: BTreeSet<TermId>,
}

impl ResourceTermSet {
    pub fn new(resource: ResourceRef, term_ids: BTreeSet<TermId>) -> Self {
        Self { resource, term_ids }
    }

    /// Whether the resource carries no terms in the field
    pub fn is_untagged(&self) -> bool {
        self.term_ids.is_empty()
    }
}

/// Outcome of an access check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Access is granted
    Allow,
    /// Access is refused
    Deny,
    /// No opinion; other access checks decide
    Neutral,
}

impl Verdict {
    /// Map an evaluator result onto allow/deny
    pub const fn from_match(matched: bool) -> Self {
        if matched { Verdict::Allow } else { Verdict::Deny }
    }

    pub const fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allow)
    }

    pub const fn is_denied(&self) -> bool {
        matches!(self, Verdict::Deny)
    }

    pub const fn is_neutral(&self) -> bool {
        matches!(self, Verdict::Neutral)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Verdict::Allow => "allow",
            Verdict::Deny => "deny",
            Verdict::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
