//! HTTP surface of the decision service
//!
//! JSON endpoints a host framework calls to run the guards out of process.
//! Check responses are never cacheable.

use crate::access_control::{RuleConfig, TermId, TermOption, Verdict};
use crate::guards::{RequestContext, deserialize_param};
use crate::metrics::MetricsSnapshot;
use crate::server::DecisionService;
use crate::util::find_available_port;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Default port for the decision service
pub const DEFAULT_HTTP_PORT: u16 = 20390;

/// Bind address of the decision service
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub bind: SocketAddr,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], DEFAULT_HTTP_PORT)),
        }
    }
}

impl HttpConfig {
    pub fn new(bind: SocketAddr) -> Self {
        Self { bind }
    }

    /// Create config from host and port strings
    pub fn from_host_port(host: &str, port: u16) -> Result<Self, std::net::AddrParseError> {
        let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
        Ok(Self::new(addr))
    }
}

type SharedService = Arc<DecisionService>;

#[derive(Debug, Serialize)]
struct HealthResponse<'a> {
    status: &'static str,
    name: &'a str,
    version: &'static str,
}

#[derive(Debug, Deserialize)]
struct EvaluateRequest {
    #[serde(default)]
    term_ids: BTreeSet<TermId>,
    #[serde(default)]
    rule: RuleConfig,
}

#[derive(Debug, Serialize)]
struct EvaluateResponse {
    result: Option<bool>,
}

#[derive(Debug, Serialize)]
struct RouteCheckResponse {
    verdict: Verdict,
}

#[derive(Debug, Serialize)]
struct ViewAccessResponse {
    access: bool,
}

#[derive(Debug, Default, Deserialize)]
struct ArgumentRequest {
    #[serde(default, deserialize_with = "deserialize_param")]
    argument: Option<String>,
}

#[derive(Debug, Serialize)]
struct ArgumentResponse {
    valid: bool,
}

#[derive(Debug, Serialize)]
struct VocabularyEntry<'a> {
    id: &'a str,
    label: &'a str,
}

#[derive(Debug, Serialize)]
struct TermOptionsResponse {
    vocabulary: String,
    terms: Vec<TermOption>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Build the router for a service
pub fn router(service: SharedService) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/evaluate", post(evaluate))
        .route("/v1/routes/{route}/check", post(check_route))
        .route("/v1/views/access", post(view_access))
        .route("/v1/views/argument", post(validate_argument))
        .route("/v1/vocabularies", get(list_vocabularies))
        .route("/v1/vocabularies/{vocabulary}/terms", get(vocabulary_terms))
        .route("/api/metrics", get(api_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Serve until Ctrl+C
///
/// Port discovery is used to find an available port if the configured port
/// is taken.
pub async fn run_http(service: SharedService, config: HttpConfig) -> anyhow::Result<()> {
    let host = config.bind.ip().to_string();
    let actual_port = find_available_port(&host, config.bind.port()).await?;
    let bind_addr = SocketAddr::new(config.bind.ip(), actual_port);

    let listener = TcpListener::bind(bind_addr).await?;
    info!(name = service.name(), "Decision service listening on http://{}", bind_addr);
    info!("Press Ctrl+C to stop the server");

    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Decision service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Received shutdown signal");
    }
}

fn no_store(service: &DecisionService) -> [(header::HeaderName, String); 1] {
    [(header::CACHE_CONTROL, service.cache_policy().header_value())]
}

async fn health(State(service): State<SharedService>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        name: service.name(),
        version: env!("CARGO_PKG_VERSION"),
    })
    .into_response()
}

async fn evaluate(
    State(service): State<SharedService>,
    Json(request): Json<EvaluateRequest>,
) -> impl IntoResponse {
    let result = service.evaluate(&request.term_ids, &request.rule);
    (no_store(&service), Json(EvaluateResponse { result }))
}

async fn check_route(
    State(service): State<SharedService>,
    Path(route): Path<String>,
    Json(request): Json<RequestContext>,
) -> impl IntoResponse {
    let verdict = service.check_route(&route, &request).await;
    (no_store(&service), Json(RouteCheckResponse { verdict }))
}

async fn view_access(
    State(service): State<SharedService>,
    Json(request): Json<RequestContext>,
) -> impl IntoResponse {
    let access = service.view_access(&request).await;
    (no_store(&service), Json(ViewAccessResponse { access }))
}

async fn validate_argument(
    State(service): State<SharedService>,
    Json(request): Json<ArgumentRequest>,
) -> impl IntoResponse {
    let valid = service.validate_argument(request.argument.as_deref()).await;
    (no_store(&service), Json(ArgumentResponse { valid }))
}

/// Vocabularies a rule can pick from, sorted by id
async fn list_vocabularies(State(service): State<SharedService>) -> impl IntoResponse {
    let vocabularies: Vec<VocabularyEntry<'_>> = service
        .catalog()
        .labels()
        .into_iter()
        .map(|(id, label)| VocabularyEntry { id, label })
        .collect();
    Json(vocabularies).into_response()
}

/// Term picker options of one vocabulary, in tree order
async fn vocabulary_terms(
    State(service): State<SharedService>,
    Path(vocabulary): Path<String>,
) -> impl IntoResponse {
    match service.catalog().term_options(&vocabulary) {
        Ok(terms) => Json(TermOptionsResponse { vocabulary, terms }).into_response(),
        Err(e) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

async fn api_metrics(State(service): State<SharedService>) -> Json<MetricsSnapshot> {
    Json(service.metrics().snapshot())
}
