//! Decision service
//!
//! Wraps the guards in a shared service and exposes it over HTTP.

pub mod handler;
pub mod http;

pub use handler::DecisionService;
pub use http::{DEFAULT_HTTP_PORT, HttpConfig, router, run_http};
