//! Taxonomy-term access checks
//!
//! Grants or denies access to a content item depending on whether the
//! taxonomy terms attached to it intersect a configured allow-list, with an
//! optional inversion.
//!
//! ## Components
//!
//! - [`access_control`]: the rule model and the shared evaluator
//! - [`source`]: resolves a resource to its term ids (in memory or over HTTP)
//! - [`guards`]: route guard, views access plugin and views argument validator
//! - [`server`]: the guards as an HTTP decision service
//!
//! ## Decision
//!
//! ```text
//! matched = resource terms ∩ allowed terms ≠ ∅
//! result  = matched XOR invert
//! ```
//!
//! An unconfigured rule (no vocabulary) never denies: the route guard answers
//! neutral and the views adapters let everything through. A resource that is
//! missing from the request or cannot be loaded yields neutral for the route
//! guard and `false` for the views adapters.
//!
//! ## Example Configuration
//!
//! ```toml
//! [store]
//! kind = "http"
//! url = "https://cms.example.com"
//! # token from TAXONOMY_ACCESS_STORE_TOKEN env var
//!
//! [[vocabularies]]
//! id = "tags"
//! label = "Tags"
//! terms = [{ id = 5, name = "News" }, { id = 7, name = "Sports" }]
//!
//! [guards.view.taxonomy_access]
//! vocabulary_id = "tags"
//! term_ids = [5, 7]
//! invert_terms = false
//!
//! [routes."entity.node.canonical".taxonomy_access]
//! vocabulary_id = "tags"
//! term_ids = [7]
//! ```

pub mod access_control;
pub mod config;
pub mod error;
pub mod guards;
pub mod metrics;
pub mod server;
pub mod source;
pub mod util;

// Re-export main types
pub use access_control::{AccessRule, RuleConfig, TermId, Verdict, evaluate};
pub use config::{AppConfig, load_config};
pub use error::{AppError, Result};
pub use guards::{ArgumentValidator, RequestContext, RouteGuard, RouteOptions, ViewAccessGuard};
pub use server::DecisionService;
pub use source::{SharedTermSource, TermSource};
