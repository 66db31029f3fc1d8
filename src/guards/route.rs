//! Route-level guard
//!
//! Runs for every route; only routes whose option map carries a
//! `taxonomy_access` rule are affected. Everything else stays neutral so
//! other access checks decide.

use super::{GuardKind, Lookup, ROUTE_OPTION_KEY, RequestContext, TermLookup};
use crate::access_control::{AccessRule, ResourceRef, RuleConfig, Verdict};
use crate::config::GuardsConfig;
use crate::metrics::DecisionMetrics;
use crate::source::SharedTermSource;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

/// Option map attached to a route
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteOptions(HashMap<String, Value>);

impl RouteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Attach a rule under `taxonomy_access`
    pub fn set_rule(&mut self, rule: &RuleConfig) {
        self.insert(
            ROUTE_OPTION_KEY,
            json!({
                "vocabulary_id": rule.vocabulary_id,
                "term_ids": rule.term_ids,
                "invert_terms": rule.invert_terms,
            }),
        );
    }

    /// Builder-style [`set_rule`](Self::set_rule)
    pub fn with_rule(mut self, rule: &RuleConfig) -> Self {
        self.set_rule(rule);
        self
    }

    /// The stored rule, if the key is present
    pub fn rule(&self) -> Option<Result<RuleConfig, serde_json::Error>> {
        self.get(ROUTE_OPTION_KEY)
            .map(|value| RuleConfig::deserialize(value))
    }
}

impl From<HashMap<String, Value>> for RouteOptions {
    fn from(map: HashMap<String, Value>) -> Self {
        Self(map)
    }
}

/// Route access check
#[derive(Clone)]
pub struct RouteGuard {
    lookup: TermLookup,
    resource_parameter: String,
}

impl RouteGuard {
    /// Create a guard reading `term_field` of the resource named by the
    /// `resource_parameter` request parameter
    pub fn new(
        source: SharedTermSource,
        term_field: impl Into<String>,
        resource_parameter: impl Into<String>,
    ) -> Self {
        Self {
            lookup: TermLookup::new(GuardKind::Route, source, term_field.into()),
            resource_parameter: resource_parameter.into(),
        }
    }

    pub fn from_config(source: SharedTermSource, config: &GuardsConfig) -> Self {
        Self::new(
            source,
            config.route.term_field.clone(),
            config.resource_parameter.clone(),
        )
    }

    pub fn with_metrics(mut self, metrics: Arc<DecisionMetrics>) -> Self {
        self.lookup.set_metrics(metrics);
        self
    }

    pub fn term_field(&self) -> &str {
        self.lookup.term_field()
    }

    /// Decide access to a route
    ///
    /// Neutral unless the route carries an active rule and the request names
    /// a resource that could be loaded; otherwise allow on match, deny on
    /// mismatch.
    pub async fn check(&self, options: &RouteOptions, request: &RequestContext) -> Verdict {
        let started = Instant::now();
        let (verdict, resource, lookup_failed) = self.decide(options, request).await;
        self.lookup
            .record(resource.as_ref(), verdict, started, lookup_failed);
        verdict
    }

    async fn decide(
        &self,
        options: &RouteOptions,
        request: &RequestContext,
    ) -> (Verdict, Option<ResourceRef>, bool) {
        let Some(rule) = self.route_rule(options) else {
            return (Verdict::Neutral, None, false);
        };

        let Some(resource) = request.resource(&self.resource_parameter) else {
            debug!(
                parameter = %self.resource_parameter,
                "No resource in request, route guard is neutral"
            );
            return (Verdict::Neutral, None, false);
        };

        let set = match self.lookup.resolve(&resource).await {
            Lookup::Found(set) => set,
            Lookup::Failed => return (Verdict::Neutral, Some(resource), true),
        };

        let verdict = Verdict::from_match(rule.evaluate(&set.term_ids));
        debug!(
            resource = %set.resource,
            field = %self.term_field(),
            verdict = %verdict,
            "Route access decided"
        );
        (verdict, Some(resource), false)
    }

    /// The active rule attached to the route, if any
    fn route_rule(&self, options: &RouteOptions) -> Option<AccessRule> {
        match options.rule()? {
            Ok(config) => {
                let rule = config.to_rule();
                if rule.is_none() {
                    debug!("Route rule has no vocabulary, route guard is neutral");
                }
                rule
            }
            Err(e) => {
                error!(error = %e, "Malformed {} route option", ROUTE_OPTION_KEY);
                None
            }
        }
    }
}
