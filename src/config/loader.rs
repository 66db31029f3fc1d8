//! Configuration loader with layered sources
//!
//! Loads configuration from multiple sources with the following precedence
//! (highest to lowest):
//! 1. Environment variables (TAXONOMY_ACCESS_*)
//! 2. Configuration file (TOML)
//! 3. Default values

use crate::access_control::{RuleConfig, VocabularyCatalog};
use crate::config::types::{AppConfig, StoreKind};
use crate::error::ConfigError;
use crate::guards::ROUTE_OPTION_KEY;
use config::{Config, Environment, File, FileFormat};
use regex::Regex;
use std::path::Path;

/// Default configuration file paths to check (in order)
const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "taxonomy-access.toml",
    ".taxonomy-access.toml",
    "~/.config/taxonomy-access/config.toml",
    "/etc/taxonomy-access/config.toml",
];

/// Vocabulary ids are machine names
const MACHINE_NAME_PATTERN: &str = r"^[a-z0-9_]+$";

/// Load configuration from a TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from_str(toml_str, FileFormat::Toml))
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// Load configuration from files and environment
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. Start with defaults (handled by serde defaults on AppConfig)

    // 2. Add configuration file
    if let Some(path) = config_path {
        // Explicit path provided - must exist
        if !Path::new(path).exists() {
            return Err(ConfigError::Load(format!(
                "Configuration file not found: {}",
                path
            )));
        }
        builder = builder.add_source(File::new(path, FileFormat::Toml));
    } else {
        // Try default paths (first existing one wins)
        for path in DEFAULT_CONFIG_PATHS {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                builder = builder.add_source(File::new(&expanded, FileFormat::Toml));
                break;
            }
        }
    }

    // 3. Add environment variables with TAXONOMY_ACCESS_ prefix
    // e.g., TAXONOMY_ACCESS_STORE__URL, TAXONOMY_ACCESS_SERVER__PORT
    // Double underscore (__) maps to nested keys (store.url)
    builder = builder.add_source(
        Environment::with_prefix("TAXONOMY_ACCESS")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    // 4. Convenience variables for the content store
    if let Ok(token) = std::env::var("TAXONOMY_ACCESS_STORE_TOKEN") {
        builder = builder
            .set_override("store.token", token)
            .map_err(|e| ConfigError::Load(e.to_string()))?;
    }
    if let Ok(url) = std::env::var("CONTENT_STORE_URL") {
        builder = builder
            .set_override("store.url", url)
            .map_err(|e| ConfigError::Load(e.to_string()))?;
    }

    // Build and deserialize
    let config = builder
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// Validate configuration values
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.store.kind == StoreKind::Http {
        if config.store.url.is_empty() {
            return Err(ConfigError::Missing {
                field: "store.url (set CONTENT_STORE_URL environment variable)".to_string(),
            });
        }

        if !config.store.url.starts_with("http://") && !config.store.url.starts_with("https://")
        {
            return Err(ConfigError::Invalid {
                message: format!(
                    "store.url must start with http:// or https://, got: {}",
                    config.store.url
                ),
            });
        }
    }

    if config.store.timeout_secs == 0 {
        return Err(ConfigError::Invalid {
            message: "store.timeout_secs must be greater than 0".to_string(),
        });
    }

    if config.server.port == 0 {
        return Err(ConfigError::Invalid {
            message: "server.port must be greater than 0".to_string(),
        });
    }

    if config.guards.resource_parameter.is_empty() {
        return Err(ConfigError::Missing {
            field: "guards.resource_parameter".to_string(),
        });
    }

    validate_vocabularies(config)?;
    validate_rules(config)?;

    Ok(())
}

/// Validate vocabulary machine names and uniqueness
fn validate_vocabularies(config: &AppConfig) -> Result<(), ConfigError> {
    let machine_name = Regex::new(MACHINE_NAME_PATTERN).map_err(|e| ConfigError::Invalid {
        message: e.to_string(),
    })?;

    let mut seen = std::collections::HashSet::new();
    for vocabulary in &config.vocabularies {
        if !machine_name.is_match(&vocabulary.id) {
            return Err(ConfigError::Invalid {
                message: format!(
                    "vocabulary id '{}' must match {}",
                    vocabulary.id, MACHINE_NAME_PATTERN
                ),
            });
        }
        if !seen.insert(vocabulary.id.as_str()) {
            return Err(ConfigError::Invalid {
                message: format!("vocabulary '{}' is declared twice", vocabulary.id),
            });
        }
    }

    Ok(())
}

/// Validate every configured rule
fn validate_rules(config: &AppConfig) -> Result<(), ConfigError> {
    let catalog = VocabularyCatalog::new(&config.vocabularies);

    validate_rule(
        &catalog,
        &config.guards.view.taxonomy_access,
        "guards.view.taxonomy_access",
    )?;
    validate_rule(
        &catalog,
        &config.guards.argument.taxonomy_access,
        "guards.argument.taxonomy_access",
    )?;

    for (route, options) in &config.routes {
        if let Some(value) = options.get(ROUTE_OPTION_KEY) {
            let field = format!("routes.{}.{}", route, ROUTE_OPTION_KEY);
            let rule: RuleConfig =
                serde_json::from_value(value.clone()).map_err(|e| ConfigError::Invalid {
                    message: format!("{}: {}", field, e),
                })?;
            validate_rule(&catalog, &rule, &field)?;
        }
    }

    Ok(())
}

/// Check one rule; without declared vocabularies only the term selection is checked
fn validate_rule(
    catalog: &VocabularyCatalog,
    rule: &RuleConfig,
    field: &str,
) -> Result<(), ConfigError> {
    if catalog.is_empty() {
        if rule.is_active() && rule.term_ids.is_empty() {
            return Err(ConfigError::EmptyTermSelection {
                field: field.to_string(),
            });
        }
        return Ok(());
    }
    catalog.validate_rule(rule, field)
}
