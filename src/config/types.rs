//! Configuration types for taxonomy-access
//!
//! This module defines the configuration structure that can be loaded from
//! TOML files and/or environment variables.

use crate::access_control::{RuleConfig, TermId};
use crate::util::SecretString;
use serde::Deserialize;
use std::collections::HashMap;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Decision service settings
    pub server: ServerConfig,

    /// Where resources and their terms are read from
    pub store: StoreConfig,

    /// Guard settings and their rules
    pub guards: GuardsConfig,

    /// Route option maps keyed by route name
    pub routes: HashMap<String, HashMap<String, serde_json::Value>>,

    /// Known vocabularies
    pub vocabularies: Vec<VocabularyConfig>,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Decision metrics
    pub metrics: MetricsConfig,
}

/// Decision service configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP host
    pub host: String,

    /// HTTP port
    pub port: u16,

    /// Service name reported by the health endpoint
    pub name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 20390,
            name: "taxonomy-access".to_string(),
        }
    }
}

/// Term source selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Resources declared in `store.resources`
    #[default]
    Memory,
    /// Resources fetched from a content store over HTTP
    Http,
}

/// Content store configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Which term source to use
    pub kind: StoreKind,

    /// Content store base URL (e.g., `https://cms.example.com`)
    pub url: String,

    /// Bearer token for the content store (prefer env var TAXONOMY_ACCESS_STORE_TOKEN)
    pub token: Option<SecretString>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum retries for failed requests
    pub max_retries: u32,

    /// Resources served by the in-memory store
    pub resources: Vec<ResourceConfig>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::Memory,
            url: String::new(),
            token: None,
            timeout_secs: 10,
            max_retries: 2,
            resources: Vec::new(),
        }
    }
}

impl StoreConfig {
    /// Base URL without a trailing slash
    pub fn base_url(&self) -> String {
        self.url.trim_end_matches('/').to_string()
    }
}

/// A resource served by the in-memory store
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    pub id: u64,
    pub uuid: Option<String>,
    /// Term reference fields, e.g. `field_tags = [5, 7]`
    pub fields: HashMap<String, Vec<TermId>>,
}

/// Guard configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GuardsConfig {
    /// Request parameter carrying the resource reference
    pub resource_parameter: String,

    /// Route-level guard
    pub route: RouteGuardConfig,

    /// Views access plugin
    pub view: ViewGuardConfig,

    /// Views argument validator
    pub argument: ArgumentGuardConfig,
}

impl Default for GuardsConfig {
    fn default() -> Self {
        Self {
            resource_parameter: "node".to_string(),
            route: RouteGuardConfig::default(),
            view: ViewGuardConfig::default(),
            argument: ArgumentGuardConfig::default(),
        }
    }
}

/// Route guard configuration; its rules come from each route's option map
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RouteGuardConfig {
    /// Field holding the resource's terms
    pub term_field: String,
}

impl Default for RouteGuardConfig {
    fn default() -> Self {
        Self {
            term_field: "field_model".to_string(),
        }
    }
}

/// Views access plugin configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ViewGuardConfig {
    /// Field holding the resource's terms
    pub term_field: String,

    /// The rule enforced by the plugin
    pub taxonomy_access: RuleConfig,
}

impl Default for ViewGuardConfig {
    fn default() -> Self {
        Self {
            term_field: "field_tags".to_string(),
            taxonomy_access: RuleConfig::default(),
        }
    }
}

/// Views argument validator configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArgumentGuardConfig {
    /// Field holding the resource's terms
    pub term_field: String,

    /// The rule enforced by the validator
    pub taxonomy_access: RuleConfig,
}

impl Default for ArgumentGuardConfig {
    fn default() -> Self {
        Self {
            term_field: "field_model".to_string(),
            taxonomy_access: RuleConfig::default(),
        }
    }
}

/// A vocabulary and its terms
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VocabularyConfig {
    /// Machine name
    pub id: String,
    /// Human-readable label
    pub label: String,
    pub terms: Vec<TermConfig>,
}

/// A term within a vocabulary
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TermConfig {
    pub id: TermId,
    pub name: String,
    #[serde(default)]
    pub parent: Option<TermId>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Output format (pretty, json)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output
    #[default]
    Pretty,
    /// JSON structured output
    Json,
}

/// Decision metrics configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// How many recent decisions to keep
    pub recent_decisions: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            recent_decisions: 100,
        }
    }
}
