// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Transport to the search engine.
//!
//! The compiler produces argument lists; a [`SearchTransport`] ships them to
//! the engine and hands back raw result rows. Documents travel the same way:
//! [`Document`] bodies are already laid out for the index's storage type.
//!
//! # Implementations
//!
//! - [`RedisTransport`]: `redis` connection manager with retry on connect
//! - [`MemoryTransport`]: in-process recorder for tests and dry runs

mod memory;
mod redis;
mod retry;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::QueryError;
use crate::schema::StorageType;
use crate::search::CompiledQuery;

pub use self::memory::MemoryTransport;
pub use self::redis::RedisTransport;
pub use self::retry::{retry, RetryConfig, Transient};

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Search engine error: {0}")]
    Command(String),
    #[error("Unexpected reply: {0}")]
    Protocol(String),
    #[error("Invalid record at position {position}: {reason}")]
    InvalidRecord { position: usize, reason: String },
    #[error(transparent)]
    Compile(#[from] QueryError),
}

/// One matching document: key plus returned attributes in reply order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchRow {
    pub id: String,
    pub fields: Vec<(String, Vec<u8>)>,
}

impl SearchRow {
    /// Raw value of a returned attribute
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_slice())
    }

    /// Attribute value as UTF-8 text
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| std::str::from_utf8(v).ok())
    }

    /// Row for a stored JSON document. Strings keep their raw text, other
    /// values are stored as JSON.
    pub(crate) fn from_json(key: &str, document: serde_json::Value) -> Self {
        let fields = match document {
            serde_json::Value::Object(map) => map
                .into_iter()
                .map(|(name, value)| match value {
                    serde_json::Value::String(s) => (name, s.into_bytes()),
                    other => (name, other.to_string().into_bytes()),
                })
                .collect(),
            other => vec![("$".to_string(), other.to_string().into_bytes())],
        };
        Self {
            id: key.to_string(),
            fields,
        }
    }
}

/// Document contents in the layout of the target storage type
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentBody {
    /// HSET field/value pairs
    Hash(Vec<(String, Vec<u8>)>),
    /// JSON.SET at the root path
    Json(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Full key, prefix included
    pub key: String,
    pub body: DocumentBody,
}

/// Raw FT.SEARCH reply
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchResults {
    /// Total matches, independent of LIMIT
    pub total: u64,
    pub rows: Vec<SearchRow>,
}

#[async_trait]
pub trait SearchTransport: Send + Sync {
    /// Issue FT.CREATE with pre-rendered arguments (index name first).
    async fn create_index(&self, args: &[String]) -> Result<(), TransportError>;

    /// Issue FT.DROPINDEX, optionally deleting the indexed documents.
    async fn drop_index(&self, name: &str, drop_documents: bool) -> Result<(), TransportError>;

    async fn index_exists(&self, name: &str) -> Result<bool, TransportError>;

    /// Issue FT.SEARCH with the compiled query and its parameters.
    async fn search(
        &self,
        index: &str,
        query: &CompiledQuery,
    ) -> Result<SearchResults, TransportError>;

    /// Write documents. HSET merges into an existing hash, JSON.SET
    /// replaces the whole document.
    async fn load(&self, documents: &[Document]) -> Result<(), TransportError>;

    /// Read one document back; `None` when the key does not exist.
    async fn fetch(
        &self,
        key: &str,
        storage: StorageType,
    ) -> Result<Option<SearchRow>, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_accessors() {
        let row = SearchRow {
            id: "user:1".into(),
            fields: vec![("user".into(), b"Sam".to_vec()), ("blob".into(), vec![0xff, 0xfe])],
        };
        assert_eq!(row.get("user"), Some(&b"Sam"[..]));
        assert_eq!(row.get_str("user"), Some("Sam"));
        assert_eq!(row.get_str("blob"), None);
        assert!(row.get("age").is_none());
    }

    #[test]
    fn test_json_row_keeps_strings_raw() {
        let document = serde_json::json!({"user": "Sam", "age": 30, "tags": ["a", "b"]});
        let row = SearchRow::from_json("user:1", document);
        assert_eq!(row.id, "user:1");
        assert_eq!(row.get_str("user"), Some("Sam"));
        assert_eq!(row.get_str("age"), Some("30"));
        assert_eq!(row.get_str("tags"), Some(r#"["a","b"]"#));

        let scalar = SearchRow::from_json("k", serde_json::json!(5));
        assert_eq!(scalar.get_str("$"), Some("5"));
    }

    #[test]
    fn test_compile_error_converts() {
        let err: TransportError = QueryError::InvalidK.into();
        assert!(matches!(err, TransportError::Compile(QueryError::InvalidK)));
    }
}
