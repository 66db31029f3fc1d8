//! Content store client
//!
//! Resolves resources through the content store's REST API. Resources are
//! fetched as JSON documents where every field is a list of items, and
//! entity reference items carry a `target_id`:
//!
//! ```json
//! {"nid": [{"value": 12}], "field_tags": [{"target_id": 5}, {"target_id": 7}]}
//! ```

use crate::access_control::{ResourceRef, ResourceTermSet, TermId};
use crate::config::StoreConfig;
use crate::error::{LookupError, LookupResult};
use crate::source::TermSource;
use crate::util::{QueryBuilder, SecretString};
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const MAX_BACKOFF_MS: u64 = 30_000;

/// Term source backed by the content store REST API
pub struct HttpTermSource {
    http: Client,
    base_url: String,
    token: Option<SecretString>,
    max_retries: u32,
}

impl HttpTermSource {
    /// Create a client from the `[store]` configuration
    pub fn new(config: &StoreConfig) -> LookupResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(format!("taxonomy-access/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(LookupError::Request)?;

        Ok(Self {
            http,
            base_url: config.base_url(),
            token: config.token.clone().filter(|t| !t.is_empty()),
            max_retries: config.max_retries,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authenticate(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header(AUTHORIZATION, token.bearer()),
            None => request,
        }
    }

    async fn execute(&self, request: RequestBuilder, resource: &str) -> LookupResult<Response> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(backoff_delay(attempt)).await;
                debug!("Retrying request (attempt {})", attempt + 1);
            }

            let req = request
                .try_clone()
                .ok_or_else(|| LookupError::InvalidResponse("Cannot clone request".to_string()))?;

            let error = match req.send().await {
                Ok(response) => match Self::handle_response(response, resource).await {
                    Ok(response) => return Ok(response),
                    Err(e) => e,
                },
                Err(e) => {
                    warn!("Request failed: {}", e);
                    LookupError::Request(e)
                }
            };

            let retry = is_retryable(&error);
            last_error = Some(error);
            if !retry {
                break;
            }
        }

        Err(last_error.unwrap_or_else(|| LookupError::InvalidResponse("Unknown error".to_string())))
    }

    async fn handle_response(response: Response, resource: &str) -> LookupResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(LookupError::from_response(status.as_u16(), resource, &body))
    }

    #[instrument(skip(self), fields(endpoint = %endpoint))]
    async fn get_json(&self, endpoint: &str, resource: &str) -> LookupResult<Value> {
        let request = self.authenticate(self.http.get(self.url(endpoint)));
        let response = self.execute(request, resource).await?;

        response
            .json()
            .await
            .map_err(|e| LookupError::InvalidResponse(format!("Failed to parse response: {}", e)))
    }

    /// Fetch the resource document for a reference
    async fn load_document(&self, resource: &ResourceRef) -> LookupResult<Value> {
        let label = resource.to_string();
        match resource {
            ResourceRef::Id(id) => {
                let query = QueryBuilder::new().param("_format", "json").build();
                self.get_json(&format!("/node/{}{}", id, query), &label).await
            }
            ResourceRef::Uuid(uuid) => {
                let query = QueryBuilder::new()
                    .param("uuid", uuid)
                    .param("_format", "json")
                    .build();
                let found = self.get_json(&format!("/node{}", query), &label).await?;

                let mut documents = match found {
                    Value::Array(documents) => documents,
                    other => {
                        return Err(LookupError::InvalidResponse(format!(
                            "Expected a list of resources, got {}",
                            json_kind(&other)
                        )));
                    }
                };
                if documents.len() > 1 {
                    warn!(
                        uuid = %uuid,
                        matches = documents.len(),
                        "External id matches several resources, using the first"
                    );
                }
                if documents.is_empty() {
                    return Err(LookupError::NotFound { resource: label });
                }
                Ok(documents.swap_remove(0))
            }
        }
    }
}

#[async_trait]
impl TermSource for HttpTermSource {
    async fn resolve_term_ids(
        &self,
        resource: &ResourceRef,
        field: &str,
    ) -> LookupResult<ResourceTermSet> {
        let document = self.load_document(resource).await?;
        let resolved = document_id(&document).map_or_else(|| resource.clone(), ResourceRef::Id);
        let term_ids = field_term_ids(&document, field).ok_or_else(|| {
            LookupError::MissingField {
                resource: resolved.to_string(),
                field: field.to_string(),
            }
        })??;

        debug!(
            resource = %resolved,
            field,
            count = term_ids.len(),
            "Resolved resource terms"
        );
        Ok(ResourceTermSet::new(resolved, term_ids))
    }

    fn source_type(&self) -> &'static str {
        "http"
    }
}

/// Exponential backoff before retry `attempt` (1-based), capped at 30s
fn backoff_delay(attempt: u32) -> Duration {
    let millis = 100u64.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
    Duration::from_millis(millis.min(MAX_BACKOFF_MS))
}

/// Determine whether an error is worth another attempt
fn is_retryable(error: &LookupError) -> bool {
    match error {
        LookupError::Request(e) => e.is_timeout() || e.is_connect(),
        LookupError::Api { status, .. } => *status >= 500,
        _ => false,
    }
}

/// The numeric id of a resource document (`nid`)
fn document_id(document: &Value) -> Option<u64> {
    match document.get("nid")? {
        Value::Array(items) => items.first().and_then(item_id),
        other => item_id(other),
    }
}

/// Term ids referenced by `field`, or `None` if the document lacks it
fn field_term_ids(document: &Value, field: &str) -> Option<LookupResult<BTreeSet<TermId>>> {
    let items = match document.as_object()?.get(field)? {
        Value::Null => return Some(Ok(BTreeSet::new())),
        Value::Array(items) => items.as_slice(),
        single => std::slice::from_ref(single),
    };

    Some(
        items
            .iter()
            .map(|item| {
                item_id(item).map(TermId::new).ok_or_else(|| {
                    LookupError::InvalidResponse(format!(
                        "Field '{}' holds a non-reference item: {}",
                        field, item
                    ))
                })
            })
            .collect(),
    )
}

/// Pull an id out of `{"target_id": 5}`, `{"value": 5}`, `5` or `"5"`
fn item_id(item: &Value) -> Option<u64> {
    match item {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Object(map) => map
            .get("target_id")
            .or_else(|| map.get("value"))
            .and_then(item_id),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access_control::term_set;
    use serde_json::json;

    #[test]
    fn test_backoff_delay_doubles_and_saturates() {
        assert_eq!(backoff_delay(1), Duration::from_millis(100));
        assert_eq!(backoff_delay(2), Duration::from_millis(200));
        assert_eq!(backoff_delay(4), Duration::from_millis(800));
        assert_eq!(backoff_delay(60), Duration::from_millis(MAX_BACKOFF_MS));
        assert_eq!(backoff_delay(u32::MAX), Duration::from_millis(MAX_BACKOFF_MS));
    }

    #[test]
    fn test_item_id_shapes() {
        assert_eq!(item_id(&json!({"target_id": 5})), Some(5));
        assert_eq!(item_id(&json!({"target_id": "7"})), Some(7));
        assert_eq!(item_id(&json!(9)), Some(9));
        assert_eq!(item_id(&json!(" 11 ")), Some(11));
        assert_eq!(item_id(&json!({"label": "x"})), None);
        assert_eq!(item_id(&json!(true)), None);
    }

    #[test]
    fn test_field_term_ids() {
        let doc = json!({
            "nid": [{"value": 12}],
            "field_tags": [{"target_id": 5}, {"target_id": 7}],
            "field_empty": [],
            "field_null": null
        });

        assert_eq!(
            field_term_ids(&doc, "field_tags").unwrap().unwrap(),
            term_set([5u64, 7])
        );
        assert!(field_term_ids(&doc, "field_empty").unwrap().unwrap().is_empty());
        assert!(field_term_ids(&doc, "field_null").unwrap().unwrap().is_empty());
        assert!(field_term_ids(&doc, "field_model").is_none());
    }

    #[test]
    fn test_field_with_garbage_item() {
        let doc = json!({"field_tags": [{"target_id": 5}, {"label": "oops"}]});
        let result = field_term_ids(&doc, "field_tags").unwrap();
        assert!(matches!(result, Err(LookupError::InvalidResponse(_))));
    }

    #[test]
    fn test_document_id() {
        assert_eq!(document_id(&json!({"nid": [{"value": 12}]})), Some(12));
        assert_eq!(document_id(&json!({"nid": 3})), Some(3));
        assert_eq!(document_id(&json!({"title": "x"})), None);
    }

    #[test]
    fn test_is_retryable() {
        assert!(is_retryable(&LookupError::Api {
            status: 503,
            message: "unavailable".into()
        }));
        assert!(!is_retryable(&LookupError::Api {
            status: 403,
            message: "forbidden".into()
        }));
        assert!(!is_retryable(&LookupError::NotFound {
            resource: "12".into()
        }));
    }

    #[test]
    fn test_blank_token_is_ignored() {
        let config = StoreConfig {
            url: "https://cms.example.com/".into(),
            token: Some(SecretString::new("   ")),
            ..Default::default()
        };
        let source = HttpTermSource::new(&config).unwrap();
        assert!(source.token.is_none());
        assert_eq!(source.url("/node/1"), "https://cms.example.com/node/1");
    }
}
