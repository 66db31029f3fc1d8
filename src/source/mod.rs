//! Term sources
//!
//! A term source resolves a resource reference to the term ids attached to
//! one of its fields. Guards receive a source at construction time and call
//! it once per check; results are never cached.

pub mod http;
pub mod memory;

pub use http::HttpTermSource;
pub use memory::InMemoryTermSource;

use crate::access_control::{ResourceRef, ResourceTermSet};
use crate::config::{StoreConfig, StoreKind};
use crate::error::LookupResult;
// async_trait required for dyn-compatibility with Arc<dyn TermSource>
use async_trait::async_trait;
use std::sync::Arc;

/// Resolves resources to their term ids
#[async_trait]
pub trait TermSource: Send + Sync {
    /// Load the resource and return the term ids held in `field`
    ///
    /// Numeric references are loaded directly; external ids are looked up
    /// by property and the first match wins. A resource without `field`
    /// is a load error, while an empty field yields an empty set.
    async fn resolve_term_ids(
        &self,
        resource: &ResourceRef,
        field: &str,
    ) -> LookupResult<ResourceTermSet>;

    /// Short description of the source (for logging)
    fn source_type(&self) -> &'static str;
}

/// Shared handle to a term source
pub type SharedTermSource = Arc<dyn TermSource>;

/// Create the term source selected by configuration
pub fn create_term_source(config: &StoreConfig) -> LookupResult<SharedTermSource> {
    match config.kind {
        StoreKind::Memory => Ok(Arc::new(InMemoryTermSource::from_config(
            &config.resources,
        ))),
        StoreKind::Http => Ok(Arc::new(HttpTermSource::new(config)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResourceConfig;
    use std::collections::HashMap;

    #[test]
    fn test_create_memory_source() {
        let config = StoreConfig {
            resources: vec![ResourceConfig {
                id: 1,
                uuid: None,
                fields: HashMap::new(),
            }],
            ..Default::default()
        };
        let source = create_term_source(&config).unwrap();
        assert_eq!(source.source_type(), "memory");
    }

    #[test]
    fn test_create_http_source() {
        let config = StoreConfig {
            kind: StoreKind::Http,
            url: "https://cms.example.com".to_string(),
            ..Default::default()
        };
        let source = create_term_source(&config).unwrap();
        assert_eq!(source.source_type(), "http");
    }
}
