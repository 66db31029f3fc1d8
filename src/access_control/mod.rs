//! Access control module
//!
//! Decides whether a resource may be accessed based on the taxonomy terms
//! attached to it.
//!
//! ## Access Control Model
//!
//! A rule names a vocabulary, a set of allowed term ids and an invert flag.
//! A resource matches when at least one of its term ids is in the allowed
//! set. With `invert_terms` set, access is granted when the resource has
//! none of the selected terms instead.
//!
//! A rule without a vocabulary is inactive and makes no decision.
//!
//! ## Example Configuration
//!
//! ```toml
//! [guards.view.taxonomy_access]
//! vocabulary_id = "tags"
//! term_ids = [5, 7]
//! invert_terms = false
//! ```

pub mod catalog;
pub mod evaluator;
pub mod rule;
pub mod types;

pub use catalog::{NO_TERMS_SELECTED, TermOption, VocabularyCatalog};
pub use evaluator::evaluate;
pub use rule::{AccessRule, RuleConfig, TermSelection};
pub use types::{ResourceRef, ResourceTermSet, TermId, Verdict, term_set};
