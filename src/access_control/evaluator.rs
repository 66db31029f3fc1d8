//! Rule evaluation
//!
//! The single decision function shared by every guard. A resource matches a
//! rule when it carries at least one of the rule's allowed terms; the invert
//! flag negates that match. Vocabulary is not consulted: ids are compared
//! as-is.

use crate::access_control::rule::AccessRule;
use crate::access_control::types::TermId;
use std::collections::BTreeSet;
use tracing::trace;

/// Evaluate a rule against the term ids attached to a resource
///
/// Never fails. With an empty allow-list the raw match is always false, so
/// an inverted rule with nothing selected grants access to everything.
pub fn evaluate(resource_term_ids: &BTreeSet<TermId>, rule: &AccessRule) -> bool {
    let matched = !resource_term_ids.is_disjoint(rule.allowed_term_ids());
    let result = matched != rule.invert();

    trace!(
        vocabulary = rule.vocabulary_id(),
        resource_terms = resource_term_ids.len(),
        allowed_terms = rule.allowed_term_ids().len(),
        matched,
        invert = rule.invert(),
        result,
        "Evaluated taxonomy rule"
    );

    result
}
