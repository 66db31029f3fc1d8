//! Views argument validator
//!
//! Validates a contextual argument naming a resource: a numeric id or a
//! unique external id.

use super::{GuardKind, Lookup, TermLookup};
use crate::access_control::{ResourceRef, RuleConfig, Verdict};
use crate::config::GuardsConfig;
use crate::metrics::DecisionMetrics;
use crate::source::SharedTermSource;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Argument validator for a view
#[derive(Clone)]
pub struct ArgumentValidator {
    lookup: TermLookup,
    rule: RuleConfig,
}

impl ArgumentValidator {
    pub fn new(source: SharedTermSource, term_field: impl Into<String>, rule: RuleConfig) -> Self {
        Self {
            lookup: TermLookup::new(GuardKind::Argument, source, term_field.into()),
            rule,
        }
    }

    pub fn from_config(source: SharedTermSource, config: &GuardsConfig) -> Self {
        Self::new(
            source,
            config.argument.term_field.clone(),
            config.argument.taxonomy_access.clone(),
        )
    }

    pub fn with_metrics(mut self, metrics: Arc<DecisionMetrics>) -> Self {
        self.lookup.set_metrics(metrics);
        self
    }

    pub fn rule(&self) -> &RuleConfig {
        &self.rule
    }

    pub fn term_field(&self) -> &str {
        self.lookup.term_field()
    }

    /// Whether `argument` names a resource the rule accepts
    ///
    /// Without an active rule every argument is accepted. With one, a
    /// missing argument or a resource that cannot be loaded is rejected.
    pub async fn validate(&self, argument: Option<&str>) -> bool {
        let started = Instant::now();
        let Some(rule) = self.rule.to_rule() else {
            debug!("Argument rule has no vocabulary, argument accepted");
            self.lookup.record(None, Verdict::Allow, started, false);
            return true;
        };

        let Some(resource) = argument.and_then(ResourceRef::parse) else {
            debug!("No argument supplied, rejecting");
            self.lookup.record(None, Verdict::Deny, started, false);
            return false;
        };

        let (valid, lookup_failed) = match self.lookup.resolve(&resource).await {
            Lookup::Found(set) => (rule.evaluate(&set.term_ids), false),
            Lookup::Failed => (false, true),
        };

        debug!(resource = %resource, valid, "Argument validated");
        self.lookup.record(
            Some(&resource),
            Verdict::from_match(valid),
            started,
            lookup_failed,
        );
        valid
    }
}
