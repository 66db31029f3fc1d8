//! In-memory term source
//!
//! Serves resources declared in configuration, or built up in tests.

use crate::access_control::{ResourceRef, ResourceTermSet, TermId};
use crate::config::ResourceConfig;
use crate::error::{LookupError, LookupResult};
use crate::source::TermSource;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use tracing::warn;

#[derive(Debug, Clone, Default)]
struct StoredResource {
    fields: HashMap<String, BTreeSet<TermId>>,
}

/// Term source backed by a map of resources
#[derive(Debug, Clone, Default)]
pub struct InMemoryTermSource {
    resources: HashMap<u64, StoredResource>,
    uuids: HashMap<String, Vec<u64>>,
}

impl InMemoryTermSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `[[store.resources]]` entries
    pub fn from_config(resources: &[ResourceConfig]) -> Self {
        let mut source = Self::new();
        for resource in resources {
            source.insert(
                resource.id,
                resource.uuid.as_deref(),
                resource
                    .fields
                    .iter()
                    .map(|(name, ids)| (name.as_str(), ids.iter().copied())),
            );
        }
        source
    }

    /// Add or replace a resource
    pub fn insert<'a, F, I>(&mut self, id: u64, uuid: Option<&str>, fields: F)
    where
        F: IntoIterator<Item = (&'a str, I)>,
        I: IntoIterator<Item = TermId>,
    {
        let fields = fields
            .into_iter()
            .map(|(name, ids)| (name.to_string(), ids.into_iter().collect()))
            .collect();
        self.resources.insert(id, StoredResource { fields });

        if let Some(uuid) = uuid {
            let ids = self.uuids.entry(uuid.to_string()).or_default();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with_resource<'a, F, I>(mut self, id: u64, uuid: Option<&str>, fields: F) -> Self
    where
        F: IntoIterator<Item = (&'a str, I)>,
        I: IntoIterator<Item = TermId>,
    {
        self.insert(id, uuid, fields);
        self
    }

    fn find(&self, resource: &ResourceRef) -> LookupResult<(u64, &StoredResource)> {
        let not_found = || LookupError::NotFound {
            resource: resource.to_string(),
        };

        let id = match resource {
            ResourceRef::Id(id) => *id,
            ResourceRef::Uuid(uuid) => {
                let matches = self.uuids.get(uuid).ok_or_else(not_found)?;
                if matches.len() > 1 {
                    warn!(
                        uuid = %uuid,
                        matches = matches.len(),
                        "External id matches several resources, using the first"
                    );
                }
                *matches.first().ok_or_else(not_found)?
            }
        };

        self.resources
            .get(&id)
            .map(|stored| (id, stored))
            .ok_or_else(not_found)
    }
}

#[async_trait]
impl TermSource for InMemoryTermSource {
    async fn resolve_term_ids(
        &self,
        resource: &ResourceRef,
        field: &str,
    ) -> LookupResult<ResourceTermSet> {
        let (id, stored) = self.find(resource)?;
        let term_ids = stored
            .fields
            .get(field)
            .cloned()
            .ok_or_else(|| LookupError::MissingField {
                resource: id.to_string(),
                field: field.to_string(),
            })?;

        Ok(ResourceTermSet::new(ResourceRef::Id(id), term_ids))
    }

    fn source_type(&self) -> &'static str {
        "memory"
    }
}
