//! Access guards
//!
//! Three thin adapters share one evaluator:
//!
//! - [`RouteGuard`]: route-level check driven by the `taxonomy_access` key
//!   of a route's option map, answering allow / deny / neutral
//! - [`ViewAccessGuard`]: views-style access plugin with its own rule
//! - [`ArgumentValidator`]: views-style argument validator
//!
//! Each guard resolves a resource through a [`TermSource`] and never fails:
//! lookup errors are logged and turned into the guard's "no resource"
//! outcome.
//!
//! [`TermSource`]: crate::source::TermSource

pub mod argument;
pub mod route;
pub mod view;

pub use argument::ArgumentValidator;
pub use route::{RouteGuard, RouteOptions};
pub use view::{CachePolicy, ViewAccessGuard};

use crate::access_control::{ResourceRef, ResourceTermSet, Verdict};
use crate::metrics::DecisionMetrics;
use crate::source::SharedTermSource;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, warn};

/// Route option key carrying a stored rule
pub const ROUTE_OPTION_KEY: &str = "taxonomy_access";

/// Request parameter holding the resource reference unless configured otherwise
pub const DEFAULT_RESOURCE_PARAMETER: &str = "node";

/// Which adapter made a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardKind {
    Route,
    ViewAccess,
    Argument,
}

impl GuardKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuardKind::Route => "route",
            GuardKind::ViewAccess => "view_access",
            GuardKind::Argument => "argument",
        }
    }
}

impl fmt::Display for GuardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request value sent either as a JSON string or a JSON number
#[derive(Deserialize)]
#[serde(untagged)]
enum RawParam {
    Number(u64),
    Text(String),
}

impl RawParam {
    fn into_string(self) -> String {
        match self {
            RawParam::Number(n) => n.to_string(),
            RawParam::Text(s) => s,
        }
    }
}

/// Deserialize an optional resource reference given as string or number
pub(crate) fn deserialize_param<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<RawParam>::deserialize(deserializer)?.map(RawParam::into_string))
}

fn deserialize_params<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = HashMap::<String, Option<RawParam>>::deserialize(deserializer)?;
    // null values count as absent parameters
    Ok(raw
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v.into_string())))
        .collect())
}

/// Parameters of the inbound request a guard runs for
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RequestContext {
    #[serde(default, deserialize_with = "deserialize_params")]
    params: HashMap<String, String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Raw parameter value
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// The resource named by parameter `name`
    ///
    /// Blank values and `"0"` count as absent.
    pub fn resource(&self, name: &str) -> Option<ResourceRef> {
        let raw = self.param(name)?.trim();
        if raw == "0" {
            return None;
        }
        ResourceRef::parse(raw)
    }
}

/// Resource lookup shared by the guards
#[derive(Clone)]
pub(crate) struct TermLookup {
    kind: GuardKind,
    source: SharedTermSource,
    term_field: String,
    metrics: Option<Arc<DecisionMetrics>>,
}

/// Result of one lookup attempt
pub(crate) enum Lookup {
    Found(ResourceTermSet),
    Failed,
}

impl TermLookup {
    pub(crate) fn new(kind: GuardKind, source: SharedTermSource, term_field: String) -> Self {
        Self {
            kind,
            source,
            term_field,
            metrics: None,
        }
    }

    pub(crate) fn set_metrics(&mut self, metrics: Arc<DecisionMetrics>) {
        self.metrics = Some(metrics);
    }

    pub(crate) fn term_field(&self) -> &str {
        &self.term_field
    }

    /// Resolve `resource`; failures are logged, never returned
    pub(crate) async fn resolve(&self, resource: &ResourceRef) -> Lookup {
        match self
            .source
            .resolve_term_ids(resource, &self.term_field)
            .await
        {
            Ok(set) => Lookup::Found(set),
            Err(e) if e.is_not_found() => {
                warn!(
                    guard = %self.kind,
                    resource = %resource,
                    source = self.source.source_type(),
                    "Resource not found"
                );
                Lookup::Failed
            }
            Err(e) => {
                error!(
                    guard = %self.kind,
                    resource = %resource,
                    field = %self.term_field,
                    source = self.source.source_type(),
                    error = %e,
                    "Failed to load resource terms"
                );
                Lookup::Failed
            }
        }
    }

    pub(crate) fn record(
        &self,
        resource: Option<&ResourceRef>,
        verdict: Verdict,
        started: Instant,
        lookup_failed: bool,
    ) {
        if let Some(metrics) = &self.metrics {
            let resource = resource.map(ToString::to_string);
            metrics.record(
                self.kind,
                resource.as_deref(),
                verdict,
                started.elapsed(),
                lookup_failed,
            );
        }
    }
}
