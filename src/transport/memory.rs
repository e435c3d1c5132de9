// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{Document, DocumentBody, SearchResults, SearchRow, SearchTransport, TransportError};
use crate::schema::StorageType;
use crate::search::CompiledQuery;

/// In-process transport that records every command.
///
/// Index creation and deletion are tracked so `index_exists` answers
/// consistently; searches return queued replies, or an empty result.
/// Loaded documents are kept by key and removed by `drop_index` with
/// `drop_documents` when they fall under one of the index's prefixes.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    indexes: Mutex<HashMap<String, Vec<String>>>,
    searches: Mutex<Vec<(String, CompiledQuery)>>,
    replies: Mutex<VecDeque<SearchResults>>,
    documents: Mutex<HashMap<String, DocumentBody>>,
}

impl MemoryTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the reply for the next search
    pub fn push_reply(&self, reply: SearchResults) {
        self.replies.lock().push_back(reply);
    }

    /// FT.CREATE arguments recorded for an index
    #[must_use]
    pub fn create_args(&self, name: &str) -> Option<Vec<String>> {
        self.indexes.lock().get(name).cloned()
    }

    /// Every search issued so far, oldest first
    #[must_use]
    pub fn searches(&self) -> Vec<(String, CompiledQuery)> {
        self.searches.lock().clone()
    }

    /// Number of stored documents
    #[must_use]
    pub fn document_count(&self) -> usize {
        self.documents.lock().len()
    }
}

/// Key prefixes named by `PREFIX n p1 .. pn` in FT.CREATE arguments.
/// No PREFIX clause means the index covers every key.
fn key_prefixes(args: &[String]) -> Vec<String> {
    let schema_at = args.iter().position(|a| a == "SCHEMA").unwrap_or(args.len());
    let header = &args[..schema_at];

    let Some(at) = header.iter().position(|a| a == "PREFIX") else {
        return vec![String::new()];
    };
    let count = header
        .get(at + 1)
        .and_then(|n| n.parse::<usize>().ok())
        .unwrap_or(0);
    header.iter().skip(at + 2).take(count).cloned().collect()
}

#[async_trait]
impl SearchTransport for MemoryTransport {
    async fn create_index(&self, args: &[String]) -> Result<(), TransportError> {
        let name = args
            .first()
            .ok_or_else(|| TransportError::Command("FT.CREATE without index name".into()))?;

        let mut indexes = self.indexes.lock();
        if indexes.contains_key(name) {
            return Err(TransportError::Command("Index already exists".into()));
        }
        indexes.insert(name.clone(), args.to_vec());
        Ok(())
    }

    async fn drop_index(&self, name: &str, drop_documents: bool) -> Result<(), TransportError> {
        let args = self
            .indexes
            .lock()
            .remove(name)
            .ok_or_else(|| TransportError::Command("Unknown Index name".into()))?;

        if drop_documents {
            let prefixes = key_prefixes(&args);
            self.documents
                .lock()
                .retain(|key, _| !prefixes.iter().any(|p| key.starts_with(p.as_str())));
        }
        Ok(())
    }

    async fn index_exists(&self, name: &str) -> Result<bool, TransportError> {
        Ok(self.indexes.lock().contains_key(name))
    }

    async fn search(
        &self,
        index: &str,
        query: &CompiledQuery,
    ) -> Result<SearchResults, TransportError> {
        if !self.indexes.lock().contains_key(index) {
            return Err(TransportError::Command(format!("{}: no such index", index)));
        }
        self.searches.lock().push((index.to_string(), query.clone()));
        Ok(self.replies.lock().pop_front().unwrap_or_default())
    }

    async fn load(&self, documents: &[Document]) -> Result<(), TransportError> {
        let mut stored = self.documents.lock();
        for document in documents {
            let merged = match (stored.get_mut(&document.key), &document.body) {
                (Some(DocumentBody::Hash(existing)), DocumentBody::Hash(fields)) => {
                    for (name, value) in fields {
                        match existing.iter_mut().find(|(field, _)| field == name) {
                            Some(slot) => slot.1 = value.clone(),
                            None => existing.push((name.clone(), value.clone())),
                        }
                    }
                    true
                }
                (Some(DocumentBody::Json(_)), DocumentBody::Hash(_)) => {
                    return Err(TransportError::Command(format!(
                        "WRONGTYPE {} holds a JSON document",
                        document.key
                    )));
                }
                _ => false,
            };
            if !merged {
                stored.insert(document.key.clone(), document.body.clone());
            }
        }
        Ok(())
    }

    async fn fetch(
        &self,
        key: &str,
        storage: StorageType,
    ) -> Result<Option<SearchRow>, TransportError> {
        let stored = self.documents.lock();
        match (stored.get(key), storage) {
            (None, _) => Ok(None),
            (Some(DocumentBody::Hash(fields)), StorageType::Hash) => Ok(Some(SearchRow {
                id: key.to_string(),
                fields: fields.clone(),
            })),
            (Some(DocumentBody::Json(value)), StorageType::Json) => {
                Ok(Some(SearchRow::from_json(key, value.clone())))
            }
            (Some(_), _) => Err(TransportError::Command(format!(
                "WRONGTYPE {} holds a different storage type",
                key
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::IndexSchema;
    use crate::search::{FilterQuery, SearchQuery};

    fn hash(key: &str, fields: &[(&str, &str)]) -> Document {
        Document {
            key: key.to_string(),
            body: DocumentBody::Hash(
                fields
                    .iter()
                    .map(|(n, v)| (n.to_string(), v.as_bytes().to_vec()))
                    .collect(),
            ),
        }
    }

    #[tokio::test]
    async fn test_create_and_drop() {
        let transport = MemoryTransport::new();
        let args = vec!["idx".to_string(), "ON".into(), "HASH".into()];

        transport.create_index(&args).await.unwrap();
        assert!(transport.index_exists("idx").await.unwrap());
        assert_eq!(transport.create_args("idx").unwrap(), args);
        assert!(transport.create_index(&args).await.is_err());

        transport.drop_index("idx", false).await.unwrap();
        assert!(!transport.index_exists("idx").await.unwrap());
        assert!(transport.drop_index("idx", false).await.is_err());
    }

    #[tokio::test]
    async fn test_search_records_and_replies() {
        let transport = MemoryTransport::new();
        transport.create_index(&["idx".to_string()]).await.unwrap();

        let schema = IndexSchema::builder("idx").tag("t").build().unwrap();
        let compiled = FilterQuery::default().compile(&schema).unwrap();

        transport.push_reply(SearchResults {
            total: 3,
            rows: Vec::new(),
        });
        assert_eq!(transport.search("idx", &compiled).await.unwrap().total, 3);
        assert_eq!(transport.search("idx", &compiled).await.unwrap().total, 0);
        assert_eq!(transport.searches().len(), 2);

        assert!(transport.search("missing", &compiled).await.is_err());
    }

    #[tokio::test]
    async fn test_hash_load_merges_fields() {
        let transport = MemoryTransport::new();
        transport
            .load(&[hash("user:1", &[("user", "Sam"), ("age", "30")])])
            .await
            .unwrap();
        transport
            .load(&[hash("user:1", &[("age", "31"), ("job", "dentist")])])
            .await
            .unwrap();

        let row = transport.fetch("user:1", StorageType::Hash).await.unwrap().unwrap();
        assert_eq!(row.id, "user:1");
        assert_eq!(row.get_str("user"), Some("Sam"));
        assert_eq!(row.get_str("age"), Some("31"));
        assert_eq!(row.get_str("job"), Some("dentist"));

        assert!(transport.fetch("user:2", StorageType::Hash).await.unwrap().is_none());
        assert!(transport.fetch("user:1", StorageType::Json).await.is_err());
    }

    #[tokio::test]
    async fn test_json_load_replaces_document() {
        let transport = MemoryTransport::new();
        let doc = |value: serde_json::Value| Document {
            key: "doc:1".into(),
            body: DocumentBody::Json(value),
        };

        transport
            .load(&[doc(serde_json::json!({"title": "a", "year": 2001}))])
            .await
            .unwrap();
        transport.load(&[doc(serde_json::json!({"title": "b"}))]).await.unwrap();

        let row = transport.fetch("doc:1", StorageType::Json).await.unwrap().unwrap();
        assert_eq!(row.get_str("title"), Some("b"));
        assert!(row.get("year").is_none());

        assert!(transport.load(&[hash("doc:1", &[("x", "1")])]).await.is_err());
    }

    #[tokio::test]
    async fn test_drop_documents_follows_prefix() {
        let transport = MemoryTransport::new();
        let args: Vec<String> = ["users", "ON", "HASH", "PREFIX", "1", "user", "SCHEMA", "u", "TAG"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        transport.create_index(&args).await.unwrap();
        transport
            .load(&[hash("user:1", &[("u", "a")]), hash("other:1", &[("u", "b")])])
            .await
            .unwrap();

        transport.drop_index("users", true).await.unwrap();
        assert!(transport.fetch("user:1", StorageType::Hash).await.unwrap().is_none());
        assert!(transport.fetch("other:1", StorageType::Hash).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_drop_keeps_documents_without_flag() {
        let transport = MemoryTransport::new();
        transport.create_index(&["idx".to_string()]).await.unwrap();
        transport.load(&[hash("k", &[("u", "a")])]).await.unwrap();

        transport.drop_index("idx", false).await.unwrap();
        assert_eq!(transport.document_count(), 1);
    }

    #[test]
    fn test_key_prefixes() {
        let args = |s: &str| s.split(' ').map(String::from).collect::<Vec<_>>();
        assert_eq!(key_prefixes(&args("i ON HASH PREFIX 2 a b SCHEMA x TAG")), vec!["a", "b"]);
        assert_eq!(key_prefixes(&args("i ON HASH SCHEMA PREFIX TAG")), vec![""]);
    }
}
