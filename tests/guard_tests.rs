//! Guard integration tests
//!
//! Runs the three guards against in-memory and failing term sources.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use taxonomy_access::access_control::{
    ResourceRef, ResourceTermSet, RuleConfig, TermId, Verdict, term_set,
};
use taxonomy_access::config::GuardsConfig;
use taxonomy_access::error::{LookupError, LookupResult};
use taxonomy_access::guards::{
    ArgumentValidator, RequestContext, RouteGuard, RouteOptions, ViewAccessGuard,
};
use taxonomy_access::metrics::DecisionMetrics;
use taxonomy_access::source::{InMemoryTermSource, SharedTermSource, TermSource};

// =============================================================================
// Test Helpers
// =============================================================================

const UUID: &str = "0b6c8a5e-1f2d-4e3a-9c7b-5d4e3f2a1b0c";

/// Resource 12 carries tags {5, 7} and model {3}; resource 13 is untagged
fn store() -> SharedTermSource {
    Arc::new(
        InMemoryTermSource::new()
            .with_resource(
                12,
                Some(UUID),
                [
                    ("field_tags", term_set([5u64, 7])),
                    ("field_model", term_set([3u64])),
                ],
            )
            .with_resource(
                13,
                None,
                [
                    ("field_tags", term_set(Vec::<u64>::new())),
                    ("field_model", term_set(Vec::<u64>::new())),
                ],
            ),
    )
}

/// Source that fails every lookup and counts calls
struct FailingSource {
    calls: AtomicUsize,
    not_found: bool,
}

impl FailingSource {
    fn new(not_found: bool) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            not_found,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TermSource for FailingSource {
    async fn resolve_term_ids(
        &self,
        resource: &ResourceRef,
        _field: &str,
    ) -> LookupResult<ResourceTermSet> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.not_found {
            Err(LookupError::NotFound {
                resource: resource.to_string(),
            })
        } else {
            Err(LookupError::Api {
                status: 503,
                message: "store unavailable".into(),
            })
        }
    }

    fn source_type(&self) -> &'static str {
        "failing"
    }
}

fn rule(vocabulary: &str, terms: &[u64], invert: bool) -> RuleConfig {
    RuleConfig::new(vocabulary, terms.iter().copied().map(TermId::new), invert)
}

fn node(id: &str) -> RequestContext {
    RequestContext::new().with_param("node", id)
}

// =============================================================================
// Route guard
// =============================================================================

mod route_guard {
    use super::*;

    fn guard(source: SharedTermSource) -> RouteGuard {
        RouteGuard::from_config(source, &GuardsConfig::default())
    }

    #[tokio::test]
    async fn test_reads_model_field_by_default() {
        let options = RouteOptions::new().with_rule(&rule("models", &[3], false));
        assert_eq!(guard(store()).term_field(), "field_model");
        assert_eq!(guard(store()).check(&options, &node("12")).await, Verdict::Allow);
        assert_eq!(guard(store()).check(&options, &node("13")).await, Verdict::Deny);
    }

    #[tokio::test]
    async fn test_no_option_is_neutral_without_lookup() {
        let failing = FailingSource::new(false);
        let guard = guard(failing.clone());

        for request in [node("12"), node(""), RequestContext::new()] {
            assert_eq!(
                guard.check(&RouteOptions::new(), &request).await,
                Verdict::Neutral
            );
        }
        assert_eq!(failing.calls(), 0);
    }

    #[tokio::test]
    async fn test_unresolvable_resource_is_neutral() {
        let options = RouteOptions::new().with_rule(&rule("models", &[3], false));

        assert_eq!(
            guard(store()).check(&options, &RequestContext::new()).await,
            Verdict::Neutral
        );
        assert_eq!(
            guard(store()).check(&options, &node("404")).await,
            Verdict::Neutral
        );
        assert_eq!(
            guard(FailingSource::new(false))
                .check(&options, &node("12"))
                .await,
            Verdict::Neutral
        );
    }

    #[tokio::test]
    async fn test_inactive_option_is_neutral() {
        let options = RouteOptions::new().with_rule(&rule("", &[3], false));
        assert_eq!(
            guard(store()).check(&options, &node("12")).await,
            Verdict::Neutral
        );
    }

    #[tokio::test]
    async fn test_inverted_untagged_resource_is_allowed() {
        let options = RouteOptions::new().with_rule(&rule("models", &[3], true));
        assert_eq!(guard(store()).check(&options, &node("13")).await, Verdict::Allow);
    }

    #[tokio::test]
    async fn test_uuid_parameter() {
        let options = RouteOptions::new().with_rule(&rule("models", &[3], false));
        assert_eq!(guard(store()).check(&options, &node(UUID)).await, Verdict::Allow);
    }

    #[tokio::test]
    async fn test_custom_resource_parameter() {
        let guard = RouteGuard::new(store(), "field_tags", "article");
        let options = RouteOptions::new().with_rule(&rule("tags", &[7], false));
        let request = RequestContext::new().with_param("article", "12");

        assert_eq!(guard.check(&options, &request).await, Verdict::Allow);
        assert_eq!(guard.check(&options, &node("12")).await, Verdict::Neutral);
    }
}

// =============================================================================
// Views access plugin
// =============================================================================

mod view_access {
    use super::*;

    fn guard(source: SharedTermSource, rule: RuleConfig) -> ViewAccessGuard {
        let mut config = GuardsConfig::default();
        config.view.taxonomy_access = rule;
        ViewAccessGuard::from_config(source, &config)
    }

    #[tokio::test]
    async fn test_reads_tags_field_by_default() {
        let guard = guard(store(), rule("tags", &[7, 9], false));
        assert_eq!(guard.term_field(), "field_tags");
        assert!(guard.access(&node("12")).await);
        assert!(!guard.access(&node("13")).await);
    }

    #[tokio::test]
    async fn test_no_resource_is_false_even_when_inverted() {
        let guard = guard(store(), rule("tags", &[1], true));
        assert!(!guard.access(&RequestContext::new()).await);
        assert!(!guard.access(&node("404")).await);
    }

    #[tokio::test]
    async fn test_load_error_is_false() {
        let failing = FailingSource::new(false);
        let guard = guard(failing.clone(), rule("tags", &[1], true));
        assert!(!guard.access(&node("12")).await);
        assert_eq!(failing.calls(), 1);
    }

    #[tokio::test]
    async fn test_alter_route_enforced_by_route_guard() {
        let view = guard(store(), rule("tags", &[5], false));
        let mut options = RouteOptions::new();
        view.alter_route(&mut options);

        let route = RouteGuard::new(store(), "field_tags", "node");
        assert_eq!(route.check(&options, &node("12")).await, Verdict::Allow);
        assert_eq!(route.check(&options, &node("13")).await, Verdict::Deny);
    }
}

// =============================================================================
// Argument validator
// =============================================================================

mod argument_validator {
    use super::*;

    fn validator(source: SharedTermSource, rule: RuleConfig) -> ArgumentValidator {
        let mut config = GuardsConfig::default();
        config.argument.taxonomy_access = rule;
        ArgumentValidator::from_config(source, &config)
    }

    #[tokio::test]
    async fn test_numeric_and_uuid_arguments() {
        let validator = validator(store(), rule("models", &[3], false));
        assert_eq!(validator.term_field(), "field_model");
        assert!(validator.validate(Some("12")).await);
        assert!(validator.validate(Some(UUID)).await);
        assert!(!validator.validate(Some("13")).await);
    }

    #[tokio::test]
    async fn test_failures_are_false() {
        let not_found = FailingSource::new(true);
        let validator = validator(not_found.clone(), rule("models", &[3], true));
        assert!(!validator.validate(Some("12")).await);
        assert!(!validator.validate(None).await);
        assert_eq!(not_found.calls(), 1);
    }
}

// =============================================================================
// Metrics
// =============================================================================

#[tokio::test]
async fn test_guards_share_metrics() {
    let metrics = Arc::new(DecisionMetrics::with_capacity(10));
    let options = RouteOptions::new().with_rule(&rule("models", &[3], false));

    let route = RouteGuard::new(store(), "field_model", "node").with_metrics(metrics.clone());
    let argument = ArgumentValidator::new(
        FailingSource::new(false),
        "field_model",
        rule("models", &[3], false),
    )
    .with_metrics(metrics.clone());

    route.check(&options, &node("12")).await;
    route.check(&RouteOptions::new(), &node("12")).await;
    argument.validate(Some("12")).await;

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.total_decisions, 3);
    assert_eq!(snapshot.total_lookup_failures, 1);
    assert_eq!(snapshot.recent_decisions[0].verdict, Verdict::Allow);
    assert_eq!(snapshot.recent_decisions[1].verdict, Verdict::Neutral);
    assert!(snapshot.recent_decisions[2].lookup_failed);
}
