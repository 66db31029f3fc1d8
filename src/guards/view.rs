//! Views access plugin

use super::{GuardKind, Lookup, RequestContext, RouteOptions, TermLookup};
use crate::access_control::{AccessRule, ResourceRef, RuleConfig, Verdict, VocabularyCatalog};
use crate::config::GuardsConfig;
use crate::error::ConfigError;
use crate::metrics::DecisionMetrics;
use crate::source::SharedTermSource;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Cache metadata for responses gated by a view access check
///
/// Decisions depend on the resource in the path, so they are never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CachePolicy {
    pub max_age: u32,
    pub contexts: Vec<&'static str>,
    pub tags: Vec<String>,
}

impl CachePolicy {
    /// `Cache-Control` header value for this policy
    pub fn header_value(&self) -> String {
        if self.max_age == 0 {
            "no-store, max-age=0".to_string()
        } else {
            format!("max-age={}", self.max_age)
        }
    }
}

/// Access plugin for a view display
#[derive(Clone)]
pub struct ViewAccessGuard {
    lookup: TermLookup,
    resource_parameter: String,
    rule: RuleConfig,
}

impl ViewAccessGuard {
    pub fn new(
        source: SharedTermSource,
        term_field: impl Into<String>,
        resource_parameter: impl Into<String>,
        rule: RuleConfig,
    ) -> Self {
        Self {
            lookup: TermLookup::new(GuardKind::ViewAccess, source, term_field.into()),
            resource_parameter: resource_parameter.into(),
            rule,
        }
    }

    pub fn from_config(source: SharedTermSource, config: &GuardsConfig) -> Self {
        Self::new(
            source,
            config.view.term_field.clone(),
            config.resource_parameter.clone(),
            config.view.taxonomy_access.clone(),
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

    /// Whether the current request may see the view
    ///
    /// An unconfigured rule lets everything through. With a rule, a request
    /// without a loadable resource is refused.
    pub async fn access(&self, request: &RequestContext) -> bool {
        let started = Instant::now();
        let Some(rule) = self.rule.to_rule() else {
            debug!("View rule has no vocabulary, access passes through");
            self.lookup.record(None, Verdict::Allow, started, false);
            return true;
        };

        let resource = request.resource(&self.resource_parameter);
        let (allowed, lookup_failed) = match &resource {
            None => (false, false),
            Some(resource) => self.evaluate(&rule, resource).await,
        };

        self.lookup.record(
            resource.as_ref(),
            Verdict::from_match(allowed),
            started,
            lookup_failed,
        );
        allowed
    }

    async fn evaluate(&self, rule: &AccessRule, resource: &ResourceRef) -> (bool, bool) {
        match self.lookup.resolve(resource).await {
            Lookup::Found(set) => {
                let allowed = rule.evaluate(&set.term_ids);
                debug!(resource = %set.resource, allowed, "View access decided");
                (allowed, false)
            }
            Lookup::Failed => (false, true),
        }
    }

    /// Hand this plugin's rule to the route guard
    ///
    /// Active rules are attached under `taxonomy_access`; an inactive rule
    /// leaves the route untouched so the route guard stays neutral.
    pub fn alter_route(&self, options: &mut RouteOptions) {
        if self.rule.is_active() {
            options.set_rule(&self.rule);
        }
    }

    /// Admin summary: the vocabulary label, or "No terms selected"
    pub fn summary(&self, catalog: &VocabularyCatalog) -> Result<String, ConfigError> {
        catalog.summary_title(&self.rule)
    }

    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy {
            max_age: 0,
            contexts: vec!["url.path", "views"],
            tags: Vec::new(),
        }
    }
}
