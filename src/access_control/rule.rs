//! Access rules and their persisted configuration
//!
//! A [`RuleConfig`] is the stored shape of a rule, as produced by whatever
//! authoring surface edits it:
//!
//! ```toml
//! [guards.view.taxonomy_access]
//! vocabulary_id = "tags"
//! term_ids = [5, 7]
//! invert_terms = false
//! ```
//!
//! An [`AccessRule`] is the immutable value handed to the evaluator. Only an
//! active configuration (one with a vocabulary chosen) produces a rule.

use crate::access_control::evaluator;
use crate::access_control::types::TermId;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Rule evaluated against a resource's term ids
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRule {
    vocabulary_id: String,
    allowed_term_ids: BTreeSet<TermId>,
    invert: bool,
}

impl AccessRule {
    pub fn new(
        vocabulary_id: impl Into<String>,
        allowed_term_ids: impl IntoIterator<Item = TermId>,
        invert: bool,
    ) -> Self {
        Self {
            vocabulary_id: vocabulary_id.into(),
            allowed_term_ids: allowed_term_ids.into_iter().collect(),
            invert,
        }
    }

    /// Vocabulary the allow-list was chosen from (informational only)
    pub fn vocabulary_id(&self) -> &str {
        &self.vocabulary_id
    }

    pub fn allowed_term_ids(&self) -> &BTreeSet<TermId> {
        &self.allowed_term_ids
    }

    pub fn invert(&self) -> bool {
        self.invert
    }

    /// Evaluate this rule against a resource's term ids
    pub fn evaluate(&self, resource_term_ids: &BTreeSet<TermId>) -> bool {
        evaluator::evaluate(resource_term_ids, self)
    }
}

/// Selected term ids of a stored rule
///
/// Accepts either a list of ids or a checkbox map of `id => value`. Entries
/// whose value is unselected (`0`, `"0"`, `""`, `false`, `null`) are dropped,
/// so only selected ids survive into the stored rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TermSelection(BTreeSet<TermId>);

impl TermSelection {
    pub fn new(ids: impl IntoIterator<Item = TermId>) -> Self {
        Self(ids.into_iter().collect())
    }

    pub fn ids(&self) -> &BTreeSet<TermId> {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Build a selection from a raw submitted value
    pub fn from_value(value: &Value) -> Result<Self, String> {
        let mut ids = BTreeSet::new();
        match value {
            Value::Null => {}
            Value::Array(items) => {
                for item in items.iter().filter(|v| is_selected(v)) {
                    ids.insert(term_id_from_value(item)?);
                }
            }
            Value::Object(entries) => {
                for (key, _) in entries.iter().filter(|(_, v)| is_selected(v)) {
                    let id = TermId::parse(key)
                        .ok_or_else(|| format!("invalid term id '{}'", key))?;
                    ids.insert(id);
                }
            }
            other => return Err(format!("expected a list of term ids, got {}", other)),
        }
        Ok(Self(ids))
    }
}

impl<'de> Deserialize<'de> for TermSelection {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        TermSelection::from_value(&raw).map_err(serde::de::Error::custom)
    }
}

/// Checkbox semantics: unchecked boxes submit a falsy value
fn is_selected(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !(s.is_empty() || s == "0"),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

fn term_id_from_value(value: &Value) -> Result<TermId, String> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(TermId::new)
            .ok_or_else(|| format!("invalid term id {}", n)),
        Value::String(s) => TermId::parse(s).ok_or_else(|| format!("invalid term id '{}'", s)),
        other => Err(format!("invalid term id {}", other)),
    }
}

/// Stored rule: `{ vocabulary_id, term_ids, invert_terms }`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    /// Vocabulary the terms were picked from; empty means the rule is inactive
    pub vocabulary_id: String,

    /// Selected term ids
    pub term_ids: TermSelection,

    /// Grant access when the resource has none of the selected terms
    pub invert_terms: bool,
}

impl RuleConfig {
    pub fn new(
        vocabulary_id: impl Into<String>,
        term_ids: impl IntoIterator<Item = TermId>,
        invert_terms: bool,
    ) -> Self {
        Self {
            vocabulary_id: vocabulary_id.into(),
            term_ids: TermSelection::new(term_ids),
            invert_terms,
        }
    }

    /// Whether a vocabulary has been chosen
    pub fn is_active(&self) -> bool {
        !self.vocabulary_id.trim().is_empty()
    }

    /// The rule to evaluate, or `None` when no vocabulary is chosen
    pub fn to_rule(&self) -> Option<AccessRule> {
        if !self.is_active() {
            return None;
        }
        Some(AccessRule::new(
            self.vocabulary_id.trim(),
            self.term_ids.ids().iter().copied(),
            self.invert_terms,
        ))
    }

    /// Switch vocabulary; picking a different one clears the term selection
    pub fn with_vocabulary(mut self, vocabulary_id: impl Into<String>) -> Self {
        let vocabulary_id = vocabulary_id.into();
        if vocabulary_id.trim() != self.vocabulary_id.trim() {
            self.term_ids = TermSelection::default();
        }
        self.vocabulary_id = vocabulary_id;
        self
    }
}
