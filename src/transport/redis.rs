// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Redis transport for RediSearch commands.
//!
//! ```text
//! FT.CREATE users ON HASH PREFIX 1 user SCHEMA user TAG SEPARATOR , ...
//! FT.SEARCH users "(@user:{Sam})=>[KNN 3 @v $vector AS d]" RETURN 2 user d ...
//!   PARAMS 2 vector <bytes>
//! FT.DROPINDEX users [DD]
//! FT._LIST
//! HSET user:1 user Sam age 30 ...        (pipelined per load)
//! JSON.SET doc:1 $ {"title": ...}
//! HGETALL user:1 / JSON.GET doc:1
//! ```
//!
//! Search replies are decoded from the RESP2 layout:
//! `[total, id, [field, value, ...], id, [...], ...]`, with the field arrays
//! absent under NOCONTENT.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{cmd, Client, Cmd, Pipeline, Value};
use tracing::debug;

use super::retry::{retry, RetryConfig};
use super::{Document, DocumentBody, SearchResults, SearchRow, SearchTransport, TransportError};
use crate::schema::StorageType;
use crate::search::CompiledQuery;

pub struct RedisTransport {
    connection: ConnectionManager,
}

impl RedisTransport {
    /// Connect with the default connection retry schedule.
    ///
    /// ```rust,no_run
    /// # use redisvl::transport::RedisTransport;
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let transport = RedisTransport::new("redis://localhost:6379").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn new(connection_string: &str) -> Result<Self, TransportError> {
        Self::with_retry(connection_string, &RetryConfig::connect()).await
    }

    pub async fn with_retry(
        connection_string: &str,
        config: &RetryConfig,
    ) -> Result<Self, TransportError> {
        let client = Client::open(connection_string)
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        let connection = retry("redis_connect", config, || async {
            ConnectionManager::new(client.clone()).await
        })
        .await
        .map_err(|e: redis::RedisError| TransportError::Connection(e.to_string()))?;

        Ok(Self { connection })
    }

    /// Get a clone of the connection manager
    pub fn connection(&self) -> ConnectionManager {
        self.connection.clone()
    }
}

pub(crate) fn create_command(args: &[String]) -> Cmd {
    let mut command = cmd("FT.CREATE");
    for arg in args {
        command.arg(arg);
    }
    command
}

pub(crate) fn drop_command(name: &str, drop_documents: bool) -> Cmd {
    let mut command = cmd("FT.DROPINDEX");
    command.arg(name);
    if drop_documents {
        command.arg("DD");
    }
    command
}

pub(crate) fn search_command(index: &str, query: &CompiledQuery) -> Cmd {
    let mut command = cmd("FT.SEARCH");
    command.arg(index);
    for arg in query.to_search_args() {
        command.arg(arg);
    }
    command
}

/// One HSET or JSON.SET per document, replies ignored.
pub(crate) fn load_pipeline(documents: &[Document]) -> Pipeline {
    let mut pipe = redis::pipe();
    for document in documents {
        match &document.body {
            DocumentBody::Hash(fields) => {
                pipe.cmd("HSET").arg(&document.key);
                for (name, value) in fields {
                    pipe.arg(name).arg(value.as_slice());
                }
            }
            DocumentBody::Json(value) => {
                pipe.cmd("JSON.SET").arg(&document.key).arg("$").arg(value.to_string());
            }
        }
        pipe.ignore();
    }
    pipe
}

pub(crate) fn fetch_command(key: &str, storage: StorageType) -> Cmd {
    let mut command = match storage {
        StorageType::Hash => cmd("HGETALL"),
        StorageType::Json => cmd("JSON.GET"),
    };
    command.arg(key);
    command
}

fn bytes_of(value: &Value) -> Option<Vec<u8>> {
    match value {
        Value::BulkString(bytes) => Some(bytes.clone()),
        Value::SimpleString(s) => Some(s.clone().into_bytes()),
        Value::Int(i) => Some(i.to_string().into_bytes()),
        Value::Double(d) => Some(d.to_string().into_bytes()),
        _ => None,
    }
}

fn string_of(value: &Value) -> Result<String, TransportError> {
    bytes_of(value)
        .and_then(|b| String::from_utf8(b).ok())
        .ok_or_else(|| TransportError::Protocol(format!("expected a string, got {:?}", value)))
}

/// Decode an FT.SEARCH reply.
pub(crate) fn parse_search_reply(reply: Value) -> Result<SearchResults, TransportError> {
    let items = match reply {
        Value::Array(items) => items,
        other => {
            return Err(TransportError::Protocol(format!(
                "expected an array reply, got {:?}",
                other
            )))
        }
    };

    let mut iter = items.into_iter().peekable();
    let total = match iter.next() {
        Some(Value::Int(n)) if n >= 0 => n as u64,
        other => {
            return Err(TransportError::Protocol(format!(
                "expected a result count, got {:?}",
                other
            )))
        }
    };

    let mut rows = Vec::new();
    while let Some(id) = iter.next() {
        let mut row = SearchRow {
            id: string_of(&id)?,
            fields: Vec::new(),
        };

        if let Some(Value::Array(_)) = iter.peek() {
            if let Some(Value::Array(pairs)) = iter.next() {
                for pair in pairs.chunks(2) {
                    let [name, value] = pair else {
                        return Err(TransportError::Protocol(format!(
                            "odd field list for document '{}'",
                            row.id
                        )));
                    };
                    let value = bytes_of(value).ok_or_else(|| {
                        TransportError::Protocol(format!("unsupported field value {:?}", value))
                    })?;
                    row.fields.push((string_of(name)?, value));
                }
            }
        }

        rows.push(row);
    }

    Ok(SearchResults { total, rows })
}

fn hash_row(key: &str, pairs: Vec<(Value, Value)>) -> Result<SearchRow, TransportError> {
    let mut row = SearchRow {
        id: key.to_string(),
        fields: Vec::with_capacity(pairs.len()),
    };
    for (name, value) in pairs {
        let value = bytes_of(&value).ok_or_else(|| {
            TransportError::Protocol(format!("unsupported hash value {:?}", value))
        })?;
        row.fields.push((string_of(&name)?, value));
    }
    Ok(row)
}

/// Decode an HGETALL or JSON.GET reply. A missing key is an empty hash or nil.
pub(crate) fn parse_fetch_reply(
    key: &str,
    storage: StorageType,
    reply: Value,
) -> Result<Option<SearchRow>, TransportError> {
    match (storage, reply) {
        (_, Value::Nil) => Ok(None),
        (StorageType::Hash, Value::Array(items)) if items.is_empty() => Ok(None),
        (StorageType::Hash, Value::Map(pairs)) if pairs.is_empty() => Ok(None),
        (StorageType::Hash, Value::Array(items)) => {
            if items.len() % 2 != 0 {
                return Err(TransportError::Protocol(format!("odd field list for '{}'", key)));
            }
            let mut items = items.into_iter();
            let mut pairs = Vec::new();
            while let (Some(name), Some(value)) = (items.next(), items.next()) {
                pairs.push((name, value));
            }
            hash_row(key, pairs).map(Some)
        }
        (StorageType::Hash, Value::Map(pairs)) => hash_row(key, pairs).map(Some),
        (StorageType::Json, reply) => {
            let text = string_of(&reply)?;
            let document: serde_json::Value = serde_json::from_str(&text).map_err(|e| {
                TransportError::Protocol(format!("invalid JSON for '{}': {}", key, e))
            })?;
            Ok(Some(SearchRow::from_json(key, document)))
        }
        (StorageType::Hash, other) => Err(TransportError::Protocol(format!(
            "expected a field list for '{}', got {:?}",
            key, other
        ))),
    }
}

#[async_trait]
impl SearchTransport for RedisTransport {
    async fn create_index(&self, args: &[String]) -> Result<(), TransportError> {
        let mut conn = self.connection.clone();
        let _: () = create_command(args)
            .query_async(&mut conn)
            .await
            .map_err(|e| TransportError::Command(e.to_string()))?;
        Ok(())
    }

    async fn drop_index(&self, name: &str, drop_documents: bool) -> Result<(), TransportError> {
        let mut conn = self.connection.clone();
        let _: () = drop_command(name, drop_documents)
            .query_async(&mut conn)
            .await
            .map_err(|e| TransportError::Command(e.to_string()))?;
        Ok(())
    }

    async fn index_exists(&self, name: &str) -> Result<bool, TransportError> {
        let conn = self.connection.clone();
        let indexes: Vec<String> = retry("ft_list", &RetryConfig::query(), || {
            let mut conn = conn.clone();
            async move { cmd("FT._LIST").query_async(&mut conn).await }
        })
        .await
        .map_err(|e: redis::RedisError| TransportError::Command(e.to_string()))?;

        Ok(indexes.iter().any(|i| i == name))
    }

    async fn search(
        &self,
        index: &str,
        query: &CompiledQuery,
    ) -> Result<SearchResults, TransportError> {
        debug!(index = %index, query = %query.query(), "FT.SEARCH");

        let conn = self.connection.clone();
        let command = search_command(index, query);
        let reply: Value = retry("ft_search", &RetryConfig::query(), || {
            let mut conn = conn.clone();
            let command = command.clone();
            async move { command.query_async(&mut conn).await }
        })
        .await
        .map_err(|e: redis::RedisError| TransportError::Command(e.to_string()))?;

        parse_search_reply(reply)
    }

    async fn load(&self, documents: &[Document]) -> Result<(), TransportError> {
        if documents.is_empty() {
            return Ok(());
        }
        debug!(documents = documents.len(), "Loading documents");

        let mut conn = self.connection.clone();
        let _: () = load_pipeline(documents)
            .query_async(&mut conn)
            .await
            .map_err(|e| TransportError::Command(e.to_string()))?;
        Ok(())
    }

    async fn fetch(
        &self,
        key: &str,
        storage: StorageType,
    ) -> Result<Option<SearchRow>, TransportError> {
        let conn = self.connection.clone();
        let command = fetch_command(key, storage);
        let reply: Value = retry("fetch", &RetryConfig::query(), || {
            let mut conn = conn.clone();
            let command = command.clone();
            async move { command.query_async(&mut conn).await }
        })
        .await
        .map_err(|e: redis::RedisError| TransportError::Command(e.to_string()))?;

        parse_fetch_reply(key, storage, reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{IndexSchema, VectorOptions};
    use crate::search::{SearchQuery, VectorQuery};

    fn bulk(s: &str) -> Value {
        Value::BulkString(s.as_bytes().to_vec())
    }

    #[test]
    fn test_drop_command_args() {
        let packed = drop_command("users", true).get_packed_command();
        let text = String::from_utf8_lossy(&packed);
        assert!(text.contains("FT.DROPINDEX"));
        assert!(text.contains("users"));
        assert!(text.contains("DD"));

        let packed = drop_command("users", false).get_packed_command();
        assert!(!String::from_utf8_lossy(&packed).contains("DD"));
    }

    #[test]
    fn test_create_command_args() {
        let args = vec!["users".to_string(), "ON".into(), "HASH".into(), "SCHEMA".into()];
        let packed = create_command(&args).get_packed_command();
        // *5 = command name + four arguments
        assert!(packed.starts_with(b"*5\r\n"));
    }

    #[test]
    fn test_search_command_carries_binary_params() {
        let schema = IndexSchema::builder("users")
            .tag("user")
            .vector("v", VectorOptions::flat(2))
            .build()
            .unwrap();
        let compiled = VectorQuery::new(&schema, "v", vec![0, 0, 0x80, 0x3f, 0xff, 0, 0, 0], 1)
            .unwrap()
            .compile(&schema)
            .unwrap();

        let packed = search_command("users", &compiled).get_packed_command();
        let needle = [0u8, 0, 0x80, 0x3f, 0xff, 0, 0, 0];
        assert!(packed.windows(needle.len()).any(|w| w == needle));
        assert!(packed.windows(6).any(|w| w == b"PARAMS"));
    }

    #[test]
    fn test_parse_reply_with_fields() {
        let reply = Value::Array(vec![
            Value::Int(2),
            bulk("user:1"),
            Value::Array(vec![
                bulk("user"),
                bulk("Sam"),
                bulk("vector_distance"),
                bulk("0.12"),
            ]),
            bulk("user:2"),
            Value::Array(vec![bulk("user"), bulk("Ana")]),
        ]);

        let results = parse_search_reply(reply).unwrap();
        assert_eq!(results.total, 2);
        assert_eq!(results.rows.len(), 2);
        assert_eq!(results.rows[0].id, "user:1");
        assert_eq!(results.rows[0].get_str("vector_distance"), Some("0.12"));
        assert_eq!(results.rows[1].get_str("user"), Some("Ana"));
    }

    #[test]
    fn test_parse_reply_nocontent() {
        let reply = Value::Array(vec![Value::Int(7), bulk("a"), bulk("b")]);
        let results = parse_search_reply(reply).unwrap();
        assert_eq!(results.total, 7);
        let ids: Vec<_> = results.rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(results.rows.iter().all(|r| r.fields.is_empty()));
    }

    #[test]
    fn test_parse_reply_count_only() {
        let results = parse_search_reply(Value::Array(vec![Value::Int(42)])).unwrap();
        assert_eq!(results.total, 42);
        assert!(results.rows.is_empty());
    }

    #[test]
    fn test_parse_reply_malformed() {
        assert!(matches!(parse_search_reply(Value::Nil), Err(TransportError::Protocol(_))));
        assert!(matches!(
            parse_search_reply(Value::Array(vec![bulk("x")])),
            Err(TransportError::Protocol(_))
        ));
        let odd = Value::Array(vec![Value::Int(1), bulk("a"), Value::Array(vec![bulk("user")])]);
        assert!(matches!(parse_search_reply(odd), Err(TransportError::Protocol(_))));
    }

    #[test]
    fn test_load_pipeline_per_storage() {
        let documents = vec![
            Document {
                key: "user:1".into(),
                body: DocumentBody::Hash(vec![
                    ("user".into(), b"Sam".to_vec()),
                    ("v".into(), vec![0, 0, 0x80, 0x3f]),
                ]),
            },
            Document {
                key: "doc:1".into(),
                body: DocumentBody::Json(serde_json::json!({"title": "a"})),
            },
        ];

        let packed = load_pipeline(&documents).get_packed_pipeline();
        let has = |needle: &[u8]| packed.windows(needle.len()).any(|w| w == needle);
        // HSET user:1 user Sam v <blob> = six bulk strings
        assert!(packed.starts_with(b"*6\r\n$4\r\nHSET\r\n"));
        assert!(has(&[0, 0, 0x80, 0x3f]));
        assert!(has(b"JSON.SET"));
        assert!(has(br#"{"title":"a"}"#));
    }

    #[test]
    fn test_fetch_command_per_storage() {
        let packed = fetch_command("user:1", StorageType::Hash).get_packed_command();
        assert!(String::from_utf8_lossy(&packed).contains("HGETALL"));
        let packed = fetch_command("doc:1", StorageType::Json).get_packed_command();
        assert!(String::from_utf8_lossy(&packed).contains("JSON.GET"));
    }

    #[test]
    fn test_parse_fetch_hash() {
        let reply = Value::Array(vec![bulk("user"), bulk("Sam"), bulk("age"), Value::Int(30)]);
        let row = parse_fetch_reply("user:1", StorageType::Hash, reply).unwrap().unwrap();
        assert_eq!(row.id, "user:1");
        assert_eq!(row.get_str("user"), Some("Sam"));
        assert_eq!(row.get_str("age"), Some("30"));

        let missing = parse_fetch_reply("user:2", StorageType::Hash, Value::Array(Vec::new()));
        assert!(missing.unwrap().is_none());

        let odd = Value::Array(vec![bulk("user")]);
        assert!(matches!(
            parse_fetch_reply("user:1", StorageType::Hash, odd),
            Err(TransportError::Protocol(_))
        ));
    }

    #[test]
    fn test_parse_fetch_json() {
        let reply = bulk(r#"{"title":"a","year":2001}"#);
        let row = parse_fetch_reply("doc:1", StorageType::Json, reply).unwrap().unwrap();
        assert_eq!(row.get_str("title"), Some("a"));
        assert_eq!(row.get_str("year"), Some("2001"));

        assert!(parse_fetch_reply("doc:2", StorageType::Json, Value::Nil).unwrap().is_none());
        assert!(matches!(
            parse_fetch_reply("doc:1", StorageType::Json, bulk("{not json")),
            Err(TransportError::Protocol(_))
        ));
    }
}
