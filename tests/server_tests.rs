//! Decision service HTTP tests
//!
//! Drives the router in-process with `tower::ServiceExt::oneshot`.

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use std::sync::Arc;
use taxonomy_access::access_control::term_set;
use taxonomy_access::config::load_config_from_str;
use taxonomy_access::server::{DecisionService, router};
use taxonomy_access::source::InMemoryTermSource;
use tower::ServiceExt;

const CONFIG: &str = r#"
[server]
name = "service-under-test"

[[vocabularies]]
id = "tags"
label = "Tags"
terms = [{ id = 5, name = "News" }, { id = 7, name = "Sports" }]

[[vocabularies]]
id = "models"
label = "Models"
terms = [{ id = 3, name = "Sedan" }, { id = 4, name = "Coupe" }]

[guards.view.taxonomy_access]
vocabulary_id = "tags"
term_ids = [7]

[guards.argument.taxonomy_access]
vocabulary_id = "models"
term_ids = [3]
invert_terms = true

[routes."entity.node.canonical".taxonomy_access]
vocabulary_id = "models"
term_ids = [3]
"#;

fn app() -> Router {
    let config = load_config_from_str(CONFIG).unwrap();
    let source = InMemoryTermSource::new()
        .with_resource(
            12,
            None,
            [
                ("field_tags", term_set([5u64, 7])),
                ("field_model", term_set([3u64])),
            ],
        )
        .with_resource(
            13,
            None,
            [
                ("field_tags", term_set([5u64])),
                ("field_model", term_set([4u64])),
            ],
        );
    router(Arc::new(DecisionService::new(&config, Arc::new(source))))
}

async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Option<String>, Value) {
    let request = Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

async fn get(app: Router, uri: &str) -> (StatusCode, Option<String>, Value) {
    let request = Request::get(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Option<String>, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let cache_control = response
        .headers()
        .get(header::CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, cache_control, body)
}

#[tokio::test]
async fn test_health() {
    let (status, _, body) = get(app(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["name"], "service-under-test");
}

#[tokio::test]
async fn test_evaluate_endpoint() {
    let (status, cache, body) = post_json(
        app(),
        "/v1/evaluate",
        json!({
            "term_ids": [5, 7],
            "rule": {"vocabulary_id": "tags", "term_ids": [1, 2], "invert_terms": true}
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(cache.as_deref(), Some("no-store, max-age=0"));
    assert_eq!(body["result"], true);
}

#[tokio::test]
async fn test_evaluate_inactive_rule() {
    let (_, _, body) = post_json(
        app(),
        "/v1/evaluate",
        json!({"term_ids": [5], "rule": {"term_ids": [5]}}),
    )
    .await;
    assert_eq!(body["result"], Value::Null);
}

#[tokio::test]
async fn test_route_check() {
    let uri = "/v1/routes/entity.node.canonical/check";

    let (status, cache, body) = post_json(app(), uri, json!({"params": {"node": "12"}})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cache.as_deref(), Some("no-store, max-age=0"));
    assert_eq!(body["verdict"], "allow");

    let (_, _, body) = post_json(app(), uri, json!({"params": {"node": "13"}})).await;
    assert_eq!(body["verdict"], "deny");

    let (_, _, body) = post_json(app(), uri, json!({"params": {}})).await;
    assert_eq!(body["verdict"], "neutral");
}

#[tokio::test]
async fn test_unknown_route_is_neutral() {
    let (_, _, body) = post_json(
        app(),
        "/v1/routes/user.login/check",
        json!({"params": {"node": "12"}}),
    )
    .await;
    assert_eq!(body["verdict"], "neutral");
}

#[tokio::test]
async fn test_view_access() {
    let (_, cache, body) =
        post_json(app(), "/v1/views/access", json!({"params": {"node": "12"}})).await;
    assert_eq!(cache.as_deref(), Some("no-store, max-age=0"));
    assert_eq!(body["access"], true);

    let (_, _, body) =
        post_json(app(), "/v1/views/access", json!({"params": {"node": "13"}})).await;
    assert_eq!(body["access"], false);

    let (_, _, body) = post_json(app(), "/v1/views/access", json!({})).await;
    assert_eq!(body["access"], false);
}

#[tokio::test]
async fn test_argument_validation() {
    // inverted rule: valid when the resource lacks model 3
    let (_, _, body) =
        post_json(app(), "/v1/views/argument", json!({"argument": "13"})).await;
    assert_eq!(body["valid"], true);

    let (_, _, body) =
        post_json(app(), "/v1/views/argument", json!({"argument": "12"})).await;
    assert_eq!(body["valid"], false);

    let (_, _, body) = post_json(app(), "/v1/views/argument", json!({})).await;
    assert_eq!(body["valid"], false);
}

#[tokio::test]
async fn test_numeric_resource_ids() {
    let (status, _, body) = post_json(app(), "/v1/views/argument", json!({"argument": 13})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);

    let (status, _, body) = post_json(
        app(),
        "/v1/routes/entity.node.canonical/check",
        json!({"params": {"node": 12}}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["verdict"], "allow");

    let (status, _, body) =
        post_json(app(), "/v1/views/access", json!({"params": {"node": 13}})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["access"], false);

    // null argument is no argument
    let (_, _, body) = post_json(app(), "/v1/views/argument", json!({"argument": null})).await;
    assert_eq!(body["valid"], false);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = app();
    post_json(
        app.clone(),
        "/v1/routes/entity.node.canonical/check",
        json!({"params": {"node": "12"}}),
    )
    .await;
    post_json(
        app.clone(),
        "/v1/views/access",
        json!({"params": {"node": "404"}}),
    )
    .await;

    let (status, _, body) = get(app, "/api/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_decisions"], 2);
    assert_eq!(body["total_lookup_failures"], 1);
    assert_eq!(body["recent_decisions"][0]["guard"], "route");
    assert_eq!(body["recent_decisions"][1]["guard"], "view_access");
}

#[tokio::test]
async fn test_vocabulary_listing() {
    let (status, _, body) = get(app(), "/v1/vocabularies").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!([
            {"id": "models", "label": "Models"},
            {"id": "tags", "label": "Tags"},
        ])
    );
}

#[tokio::test]
async fn test_vocabulary_terms() {
    let (status, _, body) = get(app(), "/v1/vocabularies/tags/terms").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["vocabulary"], "tags");
    assert_eq!(body["terms"][0]["id"], 5);
    assert_eq!(body["terms"][0]["name"], "News");
    assert_eq!(body["terms"][1]["depth"], 0);

    let (status, _, body) = get(app(), "/v1/vocabularies/colors/terms").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("colors"));
}

#[tokio::test]
async fn test_malformed_body_is_rejected() {
    let request = Request::post("/v1/evaluate")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _, _) = send(app(), request).await;
    assert!(status.is_client_error());
}
