//! Decision service
//!
//! Owns the three guards, the configured route option maps and the metrics
//! they report to. One instance is shared by every request.

use crate::access_control::{RuleConfig, TermId, Verdict, VocabularyCatalog, evaluate};
use crate::config::AppConfig;
use crate::error::ConfigError;
use crate::guards::{
    ArgumentValidator, CachePolicy, ROUTE_OPTION_KEY, RequestContext, RouteGuard, RouteOptions,
    ViewAccessGuard,
};
use crate::metrics::DecisionMetrics;
use crate::source::SharedTermSource;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

/// Guards and route options behind the HTTP surface
pub struct DecisionService {
    name: String,
    route_guard: RouteGuard,
    view_guard: ViewAccessGuard,
    argument_validator: ArgumentValidator,
    routes: HashMap<String, RouteOptions>,
    catalog: VocabularyCatalog,
    metrics: Arc<DecisionMetrics>,
}

impl DecisionService {
    /// Build the service from configuration around a term source
    pub fn new(config: &AppConfig, source: SharedTermSource) -> Self {
        let metrics = Arc::new(DecisionMetrics::with_capacity(
            config.metrics.recent_decisions,
        ));
        let guards = &config.guards;

        let routes: HashMap<String, RouteOptions> = config
            .routes
            .iter()
            .map(|(name, options)| (name.clone(), RouteOptions::from(options.clone())))
            .collect();

        info!(
            source = source.source_type(),
            routes = routes.len(),
            vocabularies = config.vocabularies.len(),
            "Initialized decision service"
        );

        Self {
            name: config.server.name.clone(),
            route_guard: RouteGuard::from_config(source.clone(), guards)
                .with_metrics(metrics.clone()),
            view_guard: ViewAccessGuard::from_config(source.clone(), guards)
                .with_metrics(metrics.clone()),
            argument_validator: ArgumentValidator::from_config(source, guards)
                .with_metrics(metrics.clone()),
            routes,
            catalog: VocabularyCatalog::new(&config.vocabularies),
            metrics,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<DecisionMetrics> {
        &self.metrics
    }

    pub fn catalog(&self) -> &VocabularyCatalog {
        &self.catalog
    }

    /// Option map configured for `route`; unknown routes get an empty map
    pub fn route_options(&self, route: &str) -> RouteOptions {
        self.routes.get(route).cloned().unwrap_or_default()
    }

    /// Run the route guard for a named route
    pub async fn check_route(&self, route: &str, request: &RequestContext) -> Verdict {
        let options = self.route_options(route);
        if !options.contains(ROUTE_OPTION_KEY) {
            debug!(route, "Route has no taxonomy rule");
        }
        self.route_guard.check(&options, request).await
    }

    /// Run the views access plugin
    pub async fn view_access(&self, request: &RequestContext) -> bool {
        self.view_guard.access(request).await
    }

    /// Run the views argument validator
    pub async fn validate_argument(&self, argument: Option<&str>) -> bool {
        self.argument_validator.validate(argument).await
    }

    /// Evaluate a rule against a term set directly
    ///
    /// `None` when the rule is inactive.
    pub fn evaluate(&self, term_ids: &BTreeSet<TermId>, rule: &RuleConfig) -> Option<bool> {
        rule.to_rule().map(|rule| evaluate(term_ids, &rule))
    }

    /// Cache policy applied to every check response
    pub fn cache_policy(&self) -> CachePolicy {
        self.view_guard.cache_policy()
    }

    /// Admin summary of the view plugin's rule
    pub fn view_summary(&self) -> Result<String, ConfigError> {
        self.view_guard.summary(&self.catalog)
    }
}
