// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for redisvl.
//!
//! # Example
//!
//! ```
//! use redisvl::SearchConfig;
//!
//! // Minimal config (uses defaults)
//! let config = SearchConfig::default();
//! assert_eq!(config.default_limit, 10);
//! assert_eq!(config.distance_alias, "vector_distance");
//!
//! // Full config
//! let config = SearchConfig {
//!     redis_url: Some("redis://localhost:6379".into()),
//!     index_prefix: Some("myapp:".into()),
//!     default_limit: 25,
//!     ..Default::default()
//! };
//! assert_eq!(config.index_name("users"), "myapp:users");
//! ```

use serde::Deserialize;

use crate::search::{DEFAULT_DISTANCE_ALIAS, DEFAULT_LIMIT};
use crate::transport::RetryConfig;

/// Configuration for index handles and the Redis transport.
///
/// All fields have defaults; `redis_url` is only needed when connecting
/// through [`SearchIndex::connect`](crate::SearchIndex::connect).
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Redis connection string (e.g., "redis://localhost:6379")
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Namespace prepended to every index name
    #[serde(default)]
    pub index_prefix: Option<String>,

    /// Page size for queries built through an index handle
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Name of the distance score on vector and range queries
    #[serde(default = "default_distance_alias")]
    pub distance_alias: String,

    /// Connection attempts before giving up
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: usize,
}

fn default_limit() -> usize { DEFAULT_LIMIT }
fn default_distance_alias() -> String { DEFAULT_DISTANCE_ALIAS.to_string() }
fn default_connect_attempts() -> usize { 5 }

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            index_prefix: None,
            default_limit: default_limit(),
            distance_alias: default_distance_alias(),
            connect_attempts: default_connect_attempts(),
        }
    }
}

impl SearchConfig {
    /// Engine-side name of an index
    pub fn index_name(&self, name: &str) -> String {
        format!("{}{}", self.index_prefix.as_deref().unwrap_or(""), name)
    }

    /// Retry policy for the initial connection
    pub fn connect_retry(&self) -> RetryConfig {
        RetryConfig::connect().with_attempts(self.connect_attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SearchConfig::default();
        assert!(config.redis_url.is_none());
        assert_eq!(config.default_limit, 10);
        assert_eq!(config.connect_attempts, 5);
        assert_eq!(config.index_name("users"), "users");
    }

    #[test]
    fn test_deserialize_partial() {
        let json = r#"{"redis_url": "redis://cache:6379", "distance_alias": "score"}"#;
        let config: SearchConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.redis_url.as_deref(), Some("redis://cache:6379"));
        assert_eq!(config.distance_alias, "score");
        assert_eq!(config.default_limit, 10);
    }

    #[test]
    fn test_connect_retry_from_config() {
        let config = SearchConfig {
            connect_attempts: 2,
            ..Default::default()
        };
        assert_eq!(config.connect_retry().attempts, 2);
    }
}
