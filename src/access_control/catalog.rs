//! Vocabulary catalog
//!
//! Known vocabularies and their terms. Backs rule authoring: listing the
//! terms a rule can pick from, summarising a rule and validating stored rules
//! before they are put to use.

use crate::access_control::rule::RuleConfig;
use crate::access_control::types::TermId;
use crate::config::{TermConfig, VocabularyConfig};
use crate::error::ConfigError;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// Summary shown for a rule without a vocabulary or terms
pub const NO_TERMS_SELECTED: &str = "No terms selected";

/// One selectable term, in tree order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TermOption {
    pub id: TermId,
    pub name: String,
    pub depth: usize,
}

#[derive(Debug, Clone)]
struct Vocabulary {
    label: String,
    terms: Vec<TermConfig>,
}

/// Catalog of vocabularies keyed by id
#[derive(Debug, Clone, Default)]
pub struct VocabularyCatalog {
    vocabularies: HashMap<String, Vocabulary>,
}

impl VocabularyCatalog {
    pub fn new(vocabularies: &[VocabularyConfig]) -> Self {
        let vocabularies = vocabularies
            .iter()
            .map(|v| {
                (
                    v.id.clone(),
                    Vocabulary {
                        label: if v.label.is_empty() {
                            v.id.clone()
                        } else {
                            v.label.clone()
                        },
                        terms: v.terms.clone(),
                    },
                )
            })
            .collect();
        Self { vocabularies }
    }

    pub fn is_empty(&self) -> bool {
        self.vocabularies.is_empty()
    }

    /// Human-readable label of a vocabulary
    pub fn label(&self, vocabulary_id: &str) -> Option<&str> {
        self.vocabularies
            .get(vocabulary_id)
            .map(|v| v.label.as_str())
    }

    /// Labels of all vocabularies, sorted by id
    pub fn labels(&self) -> Vec<(&str, &str)> {
        let mut labels: Vec<_> = self
            .vocabularies
            .iter()
            .map(|(id, v)| (id.as_str(), v.label.as_str()))
            .collect();
        labels.sort_unstable();
        labels
    }

    /// Terms of a vocabulary in tree order (parents first, children indented)
    pub fn term_options(&self, vocabulary_id: &str) -> Result<Vec<TermOption>, ConfigError> {
        let vocabulary =
            self.vocabularies
                .get(vocabulary_id)
                .ok_or_else(|| ConfigError::UnknownVocabulary {
                    vocabulary: vocabulary_id.to_string(),
                })?;

        let known: BTreeSet<TermId> = vocabulary.terms.iter().map(|t| t.id).collect();
        let mut children: HashMap<Option<TermId>, Vec<&TermConfig>> = HashMap::new();
        for term in &vocabulary.terms {
            // A parent outside the vocabulary makes the term a root
            let parent = term.parent.filter(|p| known.contains(p));
            children.entry(parent).or_default().push(term);
        }

        let mut options = Vec::with_capacity(vocabulary.terms.len());
        let mut visited = BTreeSet::new();
        let mut stack: Vec<(&TermConfig, usize)> = children
            .get(&None)
            .map(|roots| roots.iter().rev().map(|t| (*t, 0)).collect())
            .unwrap_or_default();

        let mut pending = vocabulary.terms.iter();
        loop {
            while let Some((term, depth)) = stack.pop() {
                if !visited.insert(term.id) {
                    continue;
                }
                options.push(TermOption {
                    id: term.id,
                    name: term.name.clone(),
                    depth,
                });
                if let Some(kids) = children.get(&Some(term.id)) {
                    stack.extend(kids.iter().rev().map(|t| (*t, depth + 1)));
                }
            }

            // Terms on a parent cycle have no root; list them as roots
            match pending.find(|t| !visited.contains(&t.id)) {
                Some(term) => stack.push((term, 0)),
                None => break,
            }
        }

        Ok(options)
    }

    /// Short description of a stored rule
    pub fn summary_title(&self, rule: &RuleConfig) -> Result<String, ConfigError> {
        if rule.term_ids.is_empty() || !rule.is_active() {
            return Ok(NO_TERMS_SELECTED.to_string());
        }
        self.label(rule.vocabulary_id.trim())
            .map(str::to_string)
            .ok_or_else(|| ConfigError::UnknownVocabulary {
                vocabulary: rule.vocabulary_id.clone(),
            })
    }

    /// Check a stored rule against the catalog
    ///
    /// An inactive rule is always valid. An active rule must reference a
    /// known vocabulary and select at least one of its terms.
    pub fn validate_rule(&self, rule: &RuleConfig, field: &str) -> Result<(), ConfigError> {
        if !rule.is_active() {
            return Ok(());
        }

        let vocabulary_id = rule.vocabulary_id.trim();
        let vocabulary =
            self.vocabularies
                .get(vocabulary_id)
                .ok_or_else(|| ConfigError::UnknownVocabulary {
                    vocabulary: vocabulary_id.to_string(),
                })?;

        if rule.term_ids.is_empty() {
            return Err(ConfigError::EmptyTermSelection {
                field: field.to_string(),
            });
        }

        if let Some(stray) = rule
            .term_ids
            .ids()
            .iter()
            .find(|id| !vocabulary.terms.iter().any(|t| t.id == **id))
        {
            return Err(ConfigError::InvalidTermSelection {
                field: field.to_string(),
                vocabulary: vocabulary_id.to_string(),
                term: stray.get(),
            });
        }

        Ok(())
    }
}
