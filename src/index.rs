// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Index handle: a schema bound to a transport.
//!
//! # Example
//!
//! ```rust,no_run
//! # use redisvl::{SearchConfig, SearchIndex};
//! # use redisvl::schema::{IndexSchema, VectorOptions};
//! # use redisvl::search::FilterExpression;
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let schema = IndexSchema::builder("users")
//!     .prefix("user")
//!     .tag("user")
//!     .numeric("age")
//!     .vector("user_embedding", VectorOptions::hnsw(3))
//!     .build()?;
//!
//! let config = SearchConfig {
//!     redis_url: Some("redis://localhost:6379".into()),
//!     ..Default::default()
//! };
//! let index = SearchIndex::connect(schema, config).await?;
//! index.create(false, false).await?;
//!
//! let query = index
//!     .vector_query("user_embedding", &[0.1, 0.1, 0.5], 3)?
//!     .with_filter(FilterExpression::numeric_greater_than("age", 10.0)?);
//! let results = index.search(&query).await?;
//! println!("{} matches", results.total);
//!
//! let record = serde_json::json!({"id": "7", "user": "Sam", "age": 30});
//! if let serde_json::Value::Object(record) = record {
//!     index.load([record], "id").await?;
//! }
//! if let Some(row) = index.fetch("7").await? {
//!     println!("{:?}", row.get_str("user"));
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, info};

use crate::config::SearchConfig;
use crate::error::QueryError;
use crate::metrics;
use crate::schema::{FieldType, IndexSchema, StorageType};
use crate::search::{
    CountQuery, FilterExpression, FilterQuery, RangeQuery, SearchQuery, VectorQuery,
};
use crate::transport::{
    Document, DocumentBody, RedisTransport, SearchResults, SearchRow, SearchTransport,
    TransportError,
};

/// One document to load, as a JSON object
pub type Record = serde_json::Map<String, Value>;

/// A schema bound to a transport
pub struct SearchIndex {
    schema: Arc<IndexSchema>,
    transport: Arc<dyn SearchTransport>,
    config: SearchConfig,
}

impl SearchIndex {
    pub fn new(
        schema: impl Into<Arc<IndexSchema>>,
        transport: Arc<dyn SearchTransport>,
        config: SearchConfig,
    ) -> Self {
        Self {
            schema: schema.into(),
            transport,
            config,
        }
    }

    /// Connect to `config.redis_url` and bind the schema.
    pub async fn connect(
        schema: impl Into<Arc<IndexSchema>>,
        config: SearchConfig,
    ) -> Result<Self, TransportError> {
        let url = config
            .redis_url
            .clone()
            .ok_or_else(|| TransportError::Connection("redis_url not configured".into()))?;
        let transport = RedisTransport::with_retry(&url, &config.connect_retry()).await?;
        Ok(Self::new(schema, Arc::new(transport), config))
    }

    pub fn schema(&self) -> &IndexSchema {
        &self.schema
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Engine-side index name, namespace included
    pub fn name(&self) -> String {
        self.config.index_name(self.schema.name())
    }

    /// Full document key for an id
    pub fn key(&self, id: &str) -> String {
        self.schema.key(id)
    }

    /// Create the index. An existing index is kept unless `overwrite`, in
    /// which case it is dropped first (with its documents if `drop_documents`).
    pub async fn create(
        &self,
        overwrite: bool,
        drop_documents: bool,
    ) -> Result<(), TransportError> {
        let name = self.name();

        if self.exists().await? {
            if !overwrite {
                info!(index = %name, "Index already exists, not overwriting");
                return Ok(());
            }
            info!(index = %name, "Index already exists, overwriting");
            self.delete(drop_documents).await?;
        }

        let args = self
            .schema
            .to_index_definition()
            .to_ft_create_args_with_namespace(self.config.index_prefix.as_deref());
        debug!(
            index = %name,
            prefix = %self.schema.prefix(),
            fields = self.schema.fields().len(),
            "Creating search index"
        );

        let result = self.transport.create_index(&args).await;
        metrics::record_index_operation("create", result.is_ok());
        result?;

        info!(index = %name, "Search index created");
        Ok(())
    }

    /// Drop the index, optionally deleting the indexed documents.
    pub async fn delete(&self, drop_documents: bool) -> Result<(), TransportError> {
        let name = self.name();
        let result = self.transport.drop_index(&name, drop_documents).await;
        metrics::record_index_operation("drop", result.is_ok());
        result?;

        info!(index = %name, drop_documents, "Search index dropped");
        Ok(())
    }

    pub async fn exists(&self) -> Result<bool, TransportError> {
        let result = self.transport.index_exists(&self.name()).await;
        metrics::record_index_operation("info", result.is_ok());
        result
    }

    /// Compile `query` against this index's schema and run it.
    ///
    /// Compile errors surface as [`TransportError::Compile`] before any
    /// command is sent.
    pub async fn search<Q>(&self, query: &Q) -> Result<SearchResults, TransportError>
    where
        Q: SearchQuery + ?Sized,
    {
        let start = Instant::now();
        let result = match query.compile(&self.schema) {
            Ok(compiled) => self.transport.search(&self.name(), &compiled).await,
            Err(e) => Err(e.into()),
        };

        metrics::record_search(result.is_ok());
        metrics::record_search_latency(start.elapsed());
        if let Ok(results) = &result {
            debug!(
                index = %self.name(),
                kind = query.kind(),
                total = results.total,
                "Search complete"
            );
        }
        result
    }

    /// Write records under `schema.key(record[key_field])`.
    ///
    /// Hash storage writes one HSET per record, JSON storage one JSON.SET of
    /// the whole record. The key field stays in the stored document. Nothing
    /// is sent unless every record is valid. Returns the written keys in
    /// input order.
    pub async fn load<I>(&self, records: I, key_field: &str) -> Result<Vec<String>, TransportError>
    where
        I: IntoIterator<Item = Record>,
    {
        self.load_with(records, key_field, |record| record).await
    }

    /// [`load`](Self::load), passing each record through `preprocess` first.
    pub async fn load_with<I, F>(
        &self,
        records: I,
        key_field: &str,
        mut preprocess: F,
    ) -> Result<Vec<String>, TransportError>
    where
        I: IntoIterator<Item = Record>,
        F: FnMut(Record) -> Record,
    {
        let documents = records
            .into_iter()
            .enumerate()
            .map(|(position, record)| self.document(position, preprocess(record), key_field))
            .collect::<Result<Vec<_>, _>>()?;
        let keys: Vec<String> = documents.iter().map(|d| d.key.clone()).collect();

        let result = self.transport.load(&documents).await;
        metrics::record_index_operation("load", result.is_ok());
        result?;

        info!(index = %self.name(), documents = keys.len(), "Documents loaded");
        Ok(keys)
    }

    /// Stored document for `id`, or `None` when the key does not exist.
    pub async fn fetch(&self, id: &str) -> Result<Option<SearchRow>, TransportError> {
        let key = self.key(id);
        let result = self.transport.fetch(&key, self.schema.storage_type()).await;
        metrics::record_index_operation("fetch", result.is_ok());
        if let Ok(row) = &result {
            debug!(key = %key, found = row.is_some(), "Fetched document");
        }
        result
    }

    fn document(
        &self,
        position: usize,
        record: Record,
        key_field: &str,
    ) -> Result<Document, TransportError> {
        let invalid = |reason: String| TransportError::InvalidRecord { position, reason };

        let id = match record.get(key_field) {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(other) => {
                return Err(invalid(format!(
                    "key field '{}' must be a non-empty string or a number, got {}",
                    key_field, other
                )))
            }
            None => return Err(invalid(format!("missing key field '{}'", key_field))),
        };

        let body = match self.schema.storage_type() {
            StorageType::Json => DocumentBody::Json(Value::Object(record)),
            StorageType::Hash => DocumentBody::Hash(self.hash_fields(record).map_err(invalid)?),
        };
        Ok(Document {
            key: self.key(&id),
            body,
        })
    }

    /// Flatten a record into HSET pairs. Nulls are skipped; tag lists are
    /// joined with the field's separator; vectors are encoded as blobs.
    fn hash_fields(&self, record: Record) -> Result<Vec<(String, Vec<u8>)>, String> {
        let mut fields = Vec::with_capacity(record.len());

        for (name, value) in record {
            let field_type = self.schema.field(&name).map(|f| &f.field_type);
            let bytes = match (value, field_type) {
                (Value::Null, _) => continue,
                (Value::String(s), _) => s.into_bytes(),
                (Value::Number(n), _) => n.to_string().into_bytes(),
                (Value::Bool(b), _) => if b { b"1".to_vec() } else { b"0".to_vec() },
                (Value::Array(items), Some(FieldType::Vector(options))) => {
                    let values: Vec<f64> = items
                        .iter()
                        .map(Value::as_f64)
                        .collect::<Option<_>>()
                        .ok_or_else(|| format!("vector field '{}' must hold numbers", name))?;
                    if values.len() != options.dims {
                        return Err(format!(
                            "vector field '{}' has {} values, expected {}",
                            name,
                            values.len(),
                            options.dims
                        ));
                    }
                    options.datatype.encode(&values)
                }
                (Value::Array(items), field_type) => {
                    let separator = match field_type {
                        Some(FieldType::Tag(options)) => options.separator,
                        _ => ',',
                    };
                    let tags: Vec<&str> = items
                        .iter()
                        .map(Value::as_str)
                        .collect::<Option<_>>()
                        .ok_or_else(|| format!("list field '{}' must hold strings", name))?;
                    tags.join(&separator.to_string()).into_bytes()
                }
                (Value::Object(_), _) => {
                    return Err(format!("field '{}' is an object; use JSON storage", name))
                }
            };
            fields.push((name, bytes));
        }

        if fields.is_empty() {
            return Err("record has no storable fields".to_string());
        }
        Ok(fields)
    }

    /// Number of documents matching `filter`
    pub async fn count(&self, filter: FilterExpression) -> Result<u64, TransportError> {
        self.search(&CountQuery::new(filter)).await.map(|r| r.total)
    }

    /// Filter query with the configured page size
    pub fn filter_query(&self, filter: FilterExpression) -> FilterQuery {
        FilterQuery::new(filter).paging(0, self.config.default_limit)
    }

    /// KNN query with the configured alias and page size
    pub fn vector_query(
        &self,
        field: &str,
        vector: &[f64],
        k: usize,
    ) -> Result<VectorQuery, QueryError> {
        Ok(VectorQuery::from_f64(&self.schema, field, vector, k)?
            .distance_alias(self.config.distance_alias.clone())
            .paging(0, self.config.default_limit))
    }

    /// Range query with the configured alias and page size
    pub fn range_query(
        &self,
        field: &str,
        vector: &[f64],
        distance_threshold: f64,
    ) -> Result<RangeQuery, QueryError> {
        Ok(RangeQuery::from_f64(&self.schema, field, vector, distance_threshold)?
            .distance_alias(self.config.distance_alias.clone())
            .paging(0, self.config.default_limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::schema::VectorOptions;
    use crate::transport::MemoryTransport;

    fn schema() -> IndexSchema {
        IndexSchema::builder("users")
            .prefix("user")
            .tag("user")
            .numeric("age")
            .vector("user_embedding", VectorOptions::hnsw(3))
            .build()
            .unwrap()
    }

    fn index_with(config: SearchConfig) -> (SearchIndex, Arc<MemoryTransport>) {
        let transport = Arc::new(MemoryTransport::new());
        let index = SearchIndex::new(schema(), transport.clone(), config);
        (index, transport)
    }

    #[tokio::test]
    async fn test_create_is_idempotent_without_overwrite() {
        let (index, transport) = index_with(SearchConfig::default());

        index.create(false, false).await.unwrap();
        index.create(false, false).await.unwrap();
        assert!(index.exists().await.unwrap());
        assert_eq!(transport.create_args("users").unwrap()[0], "users");
    }

    #[tokio::test]
    async fn test_overwrite_recreates() {
        let (index, _transport) = index_with(SearchConfig::default());
        index.create(false, false).await.unwrap();
        index.create(true, true).await.unwrap();
        assert!(index.exists().await.unwrap());

        index.delete(false).await.unwrap();
        assert!(!index.exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_namespace_applies_to_index_name() {
        let (index, transport) = index_with(SearchConfig {
            index_prefix: Some("app:".into()),
            ..Default::default()
        });
        index.create(false, false).await.unwrap();
        assert_eq!(index.name(), "app:users");
        assert!(transport.create_args("app:users").is_some());
        assert_eq!(index.key("7"), "user:7");
    }

    #[tokio::test]
    async fn test_search_sends_compiled_query() {
        let (index, transport) = index_with(SearchConfig::default());
        index.create(false, false).await.unwrap();

        let query = index
            .vector_query("user_embedding", &[0.1, 0.1, 0.5], 3)
            .unwrap()
            .with_filter(FilterExpression::tag_equals("user", "Sam").unwrap());
        index.search(&query).await.unwrap();

        let searches = transport.searches();
        assert_eq!(searches.len(), 1);
        assert_eq!(searches[0].0, "users");
        assert_eq!(
            searches[0].1.query(),
            "@user:{Sam}=>[KNN 3 @user_embedding $vector AS vector_distance]"
        );
    }

    #[tokio::test]
    async fn test_compile_error_never_reaches_transport() {
        let (index, transport) = index_with(SearchConfig::default());
        index.create(false, false).await.unwrap();

        let query = index.filter_query(FilterExpression::tag_equals("nope", "x").unwrap());
        let err = index.search(&query).await.unwrap_err();
        assert!(matches!(err, TransportError::Compile(QueryError::UnknownField(_))));
        assert!(transport.searches().is_empty());
    }

    #[tokio::test]
    async fn test_count_uses_total() {
        let (index, transport) = index_with(SearchConfig::default());
        index.create(false, false).await.unwrap();
        transport.push_reply(SearchResults {
            total: 9,
            rows: Vec::new(),
        });

        let filter = FilterExpression::numeric_less_than("age", 30.0).unwrap();
        let count = index.count(filter).await.unwrap();
        assert_eq!(count, 9);
        assert!(transport.searches()[0].1.command().contains("NOCONTENT"));
    }

    #[tokio::test]
    async fn test_query_defaults_come_from_config() {
        let (index, _transport) = index_with(SearchConfig {
            default_limit: 3,
            distance_alias: "score".into(),
            ..Default::default()
        });

        let compiled = index
            .range_query("user_embedding", &[0.0, 0.0, 1.0], 0.3)
            .unwrap()
            .compile(index.schema())
            .unwrap();
        assert!(compiled.command().ends_with("SORTBY score ASC DIALECT 2 LIMIT 0 3"));

        let compiled = index
            .filter_query(FilterExpression::match_all())
            .compile(index.schema())
            .unwrap();
        assert!(compiled.command().ends_with("LIMIT 0 3"));
    }

    #[tokio::test]
    async fn test_connect_requires_url() {
        let err = SearchIndex::connect(schema(), SearchConfig::default()).await.err().unwrap();
        assert!(matches!(err, TransportError::Connection(_)));
    }

    fn record(value: serde_json::Value) -> Record {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {}", other),
        }
    }

    fn default_prefix_index() -> (SearchIndex, Arc<MemoryTransport>) {
        let schema = IndexSchema::builder("my_index").tag("test").build().unwrap();
        let transport = Arc::new(MemoryTransport::new());
        let index = SearchIndex::new(schema, transport.clone(), SearchConfig::default());
        (index, transport)
    }

    #[tokio::test]
    async fn test_load_and_fetch() {
        let (index, _transport) = default_prefix_index();
        index.create(false, false).await.unwrap();

        let keys = index
            .load([record(json!({"id": "1", "test": "foo"}))], "id")
            .await
            .unwrap();
        assert_eq!(keys, vec!["rvl:1"]);

        let row = index.fetch("1").await.unwrap().unwrap();
        assert_eq!(row.id, "rvl:1");
        assert_eq!(row.get_str("test"), Some("foo"));
        assert_eq!(row.get_str("id"), Some("1"));

        index.delete(true).await.unwrap();
        assert!(!index.exists().await.unwrap());
        assert!(index.fetch("1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_load_preprocess() {
        let (index, _transport) = default_prefix_index();
        index.create(false, false).await.unwrap();

        let data = [record(json!({"id": "1", "test": "foo"}))];
        index
            .load_with(data, "id", |mut record| {
                record.insert("test".into(), json!("bar"));
                record
            })
            .await
            .unwrap();

        let row = index.fetch("1").await.unwrap().unwrap();
        assert_eq!(row.get_str("test"), Some("bar"));
    }

    #[tokio::test]
    async fn test_load_requires_key_field() {
        let (index, transport) = default_prefix_index();
        index.create(false, false).await.unwrap();

        let data = [
            record(json!({"id": "1", "test": "foo"})),
            record(json!({"test": "bar"})),
        ];
        let err = index.load(data, "id").await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidRecord { position: 1, .. }));
        assert_eq!(transport.document_count(), 0);

        for bad in [json!(""), json!(null), json!(["1"]), json!({"a": 1})] {
            let data = [record(json!({"id": bad, "test": "x"}))];
            assert!(matches!(
                index.load(data, "id").await,
                Err(TransportError::InvalidRecord { position: 0, .. })
            ));
        }

        let keys = index.load([record(json!({"id": 42, "test": "x"}))], "id").await.unwrap();
        assert_eq!(keys, vec!["rvl:42"]);
    }

    #[tokio::test]
    async fn test_hash_encoding_follows_schema() {
        let (index, transport) = index_with(SearchConfig::default());
        let data = [record(json!({
            "id": 7,
            "user": ["a", "b"],
            "age": 30.5,
            "active": true,
            "nickname": null,
            "user_embedding": [0.0, 1.0, 0.5],
        }))];
        index.load(data, "id").await.unwrap();

        let row = transport.fetch("user:7", StorageType::Hash).await.unwrap().unwrap();
        assert_eq!(row.get_str("user"), Some("a,b"));
        assert_eq!(row.get_str("age"), Some("30.5"));
        assert_eq!(row.get_str("active"), Some("1"));
        assert!(row.get("nickname").is_none());

        let expected: Vec<u8> = [0.0f32, 1.0, 0.5].iter().flat_map(|v| v.to_le_bytes()).collect();
        assert_eq!(row.get("user_embedding"), Some(expected.as_slice()));
    }

    #[tokio::test]
    async fn test_hash_rejects_unstorable_values() {
        let (index, _transport) = index_with(SearchConfig::default());
        let cases = [
            json!({"id": "1", "user_embedding": [0.0, 1.0]}),
            json!({"id": "1", "user_embedding": ["x", "y", "z"]}),
            json!({"id": "1", "meta": {"a": 1}}),
            json!({"id": "1", "user": [1, 2]}),
        ];
        for case in cases {
            let err = index.load([record(case)], "id").await.unwrap_err();
            assert!(matches!(err, TransportError::InvalidRecord { .. }));
        }
    }

    #[tokio::test]
    async fn test_json_storage_keeps_record_shape() {
        let schema = IndexSchema::builder("docs")
            .prefix("doc")
            .storage(StorageType::Json)
            .tag("title")
            .build()
            .unwrap();
        let transport = Arc::new(MemoryTransport::new());
        let index = SearchIndex::new(schema, transport.clone(), SearchConfig::default());

        let data = [record(json!({"id": "a", "title": "x", "meta": {"year": 2001}}))];
        index.load(data, "id").await.unwrap();

        let row = index.fetch("a").await.unwrap().unwrap();
        assert_eq!(row.id, "doc:a");
        assert_eq!(row.get_str("title"), Some("x"));
        assert_eq!(row.get_str("meta"), Some(r#"{"year":2001}"#));
    }
}
