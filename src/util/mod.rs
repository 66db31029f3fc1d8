//! Utility functions shared across the crate.

mod secret;

pub use secret::SecretString;

use std::fmt::Display;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::warn;

/// Builder for URL query strings with percent-encoded values.
///
/// ```ignore
/// let query = QueryBuilder::new()
///     .param("uuid", "3f1c0a2e")
///     .param("_format", "json")
///     .build();
/// // "?uuid=3f1c0a2e&_format=json"
/// ```
#[derive(Default)]
pub struct QueryBuilder {
    params: Vec<(String, String)>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter
    pub fn param(mut self, key: &str, value: impl Display) -> Self {
        self.params.push((
            key.to_string(),
            urlencoding::encode(&value.to_string()).into_owned(),
        ));
        self
    }

    /// Render as `?k=v&...`, or an empty string when nothing was added
    pub fn build(self) -> String {
        if self.params.is_empty() {
            return String::new();
        }
        let pairs: Vec<String> = self
            .params
            .into_iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        format!("?{}", pairs.join("&"))
    }
}

/// Find a port to listen on, preferring `preferred`.
///
/// Tries the preferred port, then the next 10, then lets the OS pick.
pub async fn find_available_port(host: &str, preferred: u16) -> std::io::Result<u16> {
    let parse = |port: u16| -> std::io::Result<SocketAddr> {
        format!("{}:{}", host, port)
            .parse()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
    };

    if TcpListener::bind(parse(preferred)?).await.is_ok() {
        return Ok(preferred);
    }

    for offset in 1..=10 {
        let port = preferred.saturating_add(offset);
        if TcpListener::bind(parse(port)?).await.is_ok() {
            warn!(
                preferred,
                actual = port,
                "Preferred port unavailable, using alternate"
            );
            return Ok(port);
        }
    }

    let listener = TcpListener::bind(parse(0)?).await?;
    let port = listener.local_addr()?.port();
    warn!(preferred, actual = port, "Using OS-assigned port");
    Ok(port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_builder_empty() {
        assert_eq!(QueryBuilder::new().build(), "");
    }

    #[test]
    fn test_query_builder_encodes_values() {
        let query = QueryBuilder::new()
            .param("uuid", "a b/c")
            .param("_format", "json")
            .build();
        assert_eq!(query, "?uuid=a%20b%2Fc&_format=json");
    }

    #[tokio::test]
    async fn test_find_available_port_fallback() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let bound_port = listener.local_addr().unwrap().port();

        let port = find_available_port("127.0.0.1", bound_port).await.unwrap();
        assert_ne!(port, bound_port);

        drop(listener);
    }

    #[tokio::test]
    async fn test_find_available_port_invalid_host() {
        let result = find_available_port("invalid-host-format[", 8080).await;
        assert!(result.is_err());
    }
}
