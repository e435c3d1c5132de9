// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Query Builder
//!
//! Assembles a filter expression, an optional vector clause and the
//! result-shaping clauses into a [`CompiledQuery`]: one command string plus
//! the out-of-band parameters the command refers to.
//!
//! # Clause Order
//!
//! The grammar is positional, so the order is fixed:
//!
//! ```text
//! {filter}[=>[KNN k @field $vector AS alias]]
//!   RETURN n f.. SORTBY f ASC|DESC DIALECT 2 LIMIT off lim
//! ```
//!
//! # Example
//!
//! ```rust
//! use redisvl::schema::{IndexSchema, VectorOptions};
//! use redisvl::search::{FilterExpression, SearchQuery, VectorQuery};
//!
//! let schema = IndexSchema::builder("users")
//!     .tag("user")
//!     .numeric("age")
//!     .vector("user_embedding", VectorOptions::hnsw(3))
//!     .build()
//!     .unwrap();
//!
//! let filter = FilterExpression::tag_equals("user", "Sam").unwrap();
//! let query = VectorQuery::from_f64(&schema, "user_embedding", &[0.1, 0.1, 0.5], 3)
//!     .unwrap()
//!     .with_filter(filter)
//!     .return_fields(["user", "age"]);
//!
//! let compiled = query.compile(&schema).unwrap();
//! assert_eq!(
//!     compiled.command(),
//!     "@user:{Sam}=>[KNN 3 @user_embedding $vector AS vector_distance] \
//!      RETURN 3 user age vector_distance SORTBY vector_distance ASC DIALECT 2 LIMIT 0 10"
//! );
//! assert_eq!(compiled.params()["vector"].len(), 12);
//! ```

use std::collections::BTreeMap;

use tracing::debug;

use super::escape::{format_number, MATCH_ALL};
use super::filter::FilterExpression;
use crate::error::QueryError;
use crate::metrics;
use crate::schema::{is_identifier, FieldKind, IndexSchema};

/// Protocol dialect emitted with every query
pub const DEFAULT_DIALECT: u32 = 2;
/// Alias for the distance score of vector and range queries
pub const DEFAULT_DISTANCE_ALIAS: &str = "vector_distance";
/// Page size when none is requested
pub const DEFAULT_LIMIT: usize = 10;

/// Parameter carrying the query vector
pub const VECTOR_PARAM: &str = "vector";
/// Parameter carrying the range query radius
pub const DISTANCE_THRESHOLD_PARAM: &str = "distance_threshold";

/// Sort request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortBy {
    pub field: String,
    pub ascending: bool,
}

impl SortBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ascending: true,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ascending: false,
        }
    }
}

/// Output of query compilation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledQuery {
    query: String,
    clauses: Vec<String>,
    params: BTreeMap<String, Vec<u8>>,
}

impl CompiledQuery {
    /// The query expression: filter plus any vector clause
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Result-shaping tokens following the query expression
    pub fn clauses(&self) -> &[String] {
        &self.clauses
    }

    pub fn params(&self) -> &BTreeMap<String, Vec<u8>> {
        &self.params
    }

    /// Full command string: query expression then clauses, space separated.
    pub fn command(&self) -> String {
        if self.clauses.is_empty() {
            return self.query.clone();
        }
        format!("{} {}", self.query, self.clauses.join(" "))
    }

    /// FT.SEARCH arguments after the index name, with a trailing PARAMS
    /// block when parameters are bound.
    pub fn to_search_args(&self) -> Vec<Vec<u8>> {
        let capacity = 2 + self.clauses.len() + 2 * self.params.len();
        let mut args: Vec<Vec<u8>> = Vec::with_capacity(capacity);
        args.push(self.query.clone().into_bytes());
        args.extend(self.clauses.iter().map(|c| c.clone().into_bytes()));

        if !self.params.is_empty() {
            args.push(b"PARAMS".to_vec());
            args.push((self.params.len() * 2).to_string().into_bytes());
            for (name, value) in &self.params {
                args.push(name.clone().into_bytes());
                args.push(value.clone());
            }
        }
        args
    }
}

/// Anything that compiles into a [`CompiledQuery`] against a schema.
pub trait SearchQuery: Send + Sync {
    /// Metric label for this query type
    fn kind(&self) -> &'static str;

    /// Build the command string and parameters, or fail without output.
    fn compile(&self, schema: &IndexSchema) -> Result<CompiledQuery, QueryError>;
}

/// Settings shared by every query type
#[derive(Debug, Clone, PartialEq)]
struct QueryOptions {
    filter: FilterExpression,
    return_fields: Option<Vec<String>>,
    sort_by: Option<SortBy>,
    offset: usize,
    limit: usize,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            filter: FilterExpression::match_all(),
            return_fields: None,
            sort_by: None,
            offset: 0,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl QueryOptions {
    /// Requested return fields, or every declared non-vector field;
    /// `alias` is appended once when given.
    fn resolve_return_fields(&self, schema: &IndexSchema, alias: Option<&str>) -> Vec<String> {
        let mut fields: Vec<String> = match &self.return_fields {
            Some(fields) => fields.clone(),
            None => schema
                .fields()
                .iter()
                .filter(|f| f.kind() != FieldKind::Vector)
                .map(|f| f.name.clone())
                .collect(),
        };
        if let Some(alias) = alias {
            if !fields.iter().any(|f| f == alias) {
                fields.push(alias.to_string());
            }
        }
        fields
    }

    /// Names spliced into the command must be plain identifiers; the sort
    /// field must be declared or be the alias.
    fn check(&self, schema: &IndexSchema, alias: Option<&str>) -> Result<(), QueryError> {
        let requested = self.return_fields.iter().flatten().map(String::as_str);
        for name in alias.into_iter().chain(requested) {
            if !is_identifier(name) {
                return Err(QueryError::InvalidIdentifier(name.to_string()));
            }
        }

        if let Some(sort) = &self.sort_by {
            let is_alias = alias.is_some_and(|a| a == sort.field);
            if !is_alias && schema.field(&sort.field).is_none() {
                return Err(QueryError::InvalidSortField(sort.field.clone()));
            }
        }
        Ok(())
    }

    /// RETURN, SORTBY, DIALECT, LIMIT in that order.
    fn clauses(&self, return_fields: Vec<String>, default_sort: Option<SortBy>) -> Vec<String> {
        let mut clauses = Vec::new();

        if !return_fields.is_empty() {
            clauses.push("RETURN".to_string());
            clauses.push(return_fields.len().to_string());
            clauses.extend(return_fields);
        }

        if let Some(sort) = self.sort_by.clone().or(default_sort) {
            clauses.push("SORTBY".to_string());
            clauses.push(sort.field);
            clauses.push(if sort.ascending { "ASC" } else { "DESC" }.to_string());
        }

        clauses.push("DIALECT".to_string());
        clauses.push(DEFAULT_DIALECT.to_string());
        clauses.push("LIMIT".to_string());
        clauses.push(self.offset.to_string());
        clauses.push(self.limit.to_string());
        clauses
    }
}

/// Builder methods shared by every query type.
macro_rules! query_options {
    () => {
        /// Restrict results with a filter expression (default match-all).
        pub fn with_filter(mut self, filter: FilterExpression) -> Self {
            self.options.filter = filter;
            self
        }

        /// Fields to return (default: every declared non-vector field).
        pub fn return_fields<I, S>(mut self, fields: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            self.options.return_fields = Some(fields.into_iter().map(Into::into).collect());
            self
        }

        pub fn sort_by(mut self, field: impl Into<String>, ascending: bool) -> Self {
            self.options.sort_by = Some(SortBy {
                field: field.into(),
                ascending,
            });
            self
        }

        /// Result window: skip `offset` rows, return at most `limit`.
        pub fn paging(mut self, offset: usize, limit: usize) -> Self {
            self.options.offset = offset;
            self.options.limit = limit;
            self
        }

        pub fn filter(&self) -> &FilterExpression {
            &self.options.filter
        }
    };
}

/// Run `build` under the compile metrics and log the outcome.
fn instrumented(
    kind: &'static str,
    build: impl FnOnce() -> Result<CompiledQuery, QueryError>,
) -> Result<CompiledQuery, QueryError> {
    let _timer = metrics::CompileTimer::new(kind);
    let result = build();
    metrics::record_compile(kind, result.is_ok());
    match &result {
        Ok(compiled) => debug!(kind, query = %compiled.query(), "Compiled query"),
        Err(e) => debug!(kind, error = %e, "Query compilation failed"),
    }
    result
}

/// Filter-only search
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterQuery {
    options: QueryOptions,
}

impl FilterQuery {
    pub fn new(filter: FilterExpression) -> Self {
        Self {
            options: QueryOptions {
                filter,
                ..Default::default()
            },
        }
    }

    query_options!();
}

impl SearchQuery for FilterQuery {
    fn kind(&self) -> &'static str {
        "filter"
    }

    fn compile(&self, schema: &IndexSchema) -> Result<CompiledQuery, QueryError> {
        instrumented(self.kind(), || {
            let query = self.options.filter.compile(schema)?;
            self.options.check(schema, None)?;
            let fields = self.options.resolve_return_fields(schema, None);

            Ok(CompiledQuery {
                query,
                clauses: self.options.clauses(fields, None),
                params: BTreeMap::new(),
            })
        })
    }
}

/// Checked vector payload for one vector field
#[derive(Debug, Clone, PartialEq)]
struct VectorTarget {
    field: String,
    bytes: Vec<u8>,
    alias: String,
}

impl VectorTarget {
    fn new(schema: &IndexSchema, field: &str, bytes: Vec<u8>) -> Result<Self, QueryError> {
        let target = Self {
            field: field.to_string(),
            bytes,
            alias: DEFAULT_DISTANCE_ALIAS.to_string(),
        };
        target.check(schema)?;
        Ok(target)
    }

    fn from_f64(schema: &IndexSchema, field: &str, values: &[f64]) -> Result<Self, QueryError> {
        let options = schema.require_vector(field)?;
        Self::new(schema, field, options.datatype.encode(values))
    }

    /// Field must be a vector field and the payload must match its byte length.
    fn check(&self, schema: &IndexSchema) -> Result<(), QueryError> {
        let options = schema.require_vector(&self.field)?;
        if self.bytes.len() != options.byte_len() {
            return Err(QueryError::VectorDimensionMismatch {
                field: self.field.clone(),
                expected: options.byte_len(),
                actual: self.bytes.len(),
            });
        }
        Ok(())
    }
}

/// K-nearest-neighbour search, optionally pre-filtered
#[derive(Debug, Clone, PartialEq)]
pub struct VectorQuery {
    options: QueryOptions,
    target: VectorTarget,
    k: usize,
}

impl VectorQuery {
    /// Build from raw vector bytes. The byte length must equal
    /// `dims × sizeof(datatype)` of the field.
    pub fn new(
        schema: &IndexSchema,
        field: impl AsRef<str>,
        vector: Vec<u8>,
        k: usize,
    ) -> Result<Self, QueryError> {
        if k == 0 {
            return Err(QueryError::InvalidK);
        }
        Ok(Self {
            options: QueryOptions::default(),
            target: VectorTarget::new(schema, field.as_ref(), vector)?,
            k,
        })
    }

    /// Build from numbers, encoded with the field's declared datatype.
    pub fn from_f64(
        schema: &IndexSchema,
        field: impl AsRef<str>,
        vector: &[f64],
        k: usize,
    ) -> Result<Self, QueryError> {
        if k == 0 {
            return Err(QueryError::InvalidK);
        }
        Ok(Self {
            options: QueryOptions::default(),
            target: VectorTarget::from_f64(schema, field.as_ref(), vector)?,
            k,
        })
    }

    pub fn from_f32(
        schema: &IndexSchema,
        field: impl AsRef<str>,
        vector: &[f32],
        k: usize,
    ) -> Result<Self, QueryError> {
        let widened: Vec<f64> = vector.iter().map(|&v| f64::from(v)).collect();
        Self::from_f64(schema, field, &widened, k)
    }

    /// Name the emitted distance score (default `vector_distance`).
    pub fn distance_alias(mut self, alias: impl Into<String>) -> Self {
        self.target.alias = alias.into();
        self
    }

    pub fn k(&self) -> usize {
        self.k
    }

    query_options!();
}

impl SearchQuery for VectorQuery {
    fn kind(&self) -> &'static str {
        "vector"
    }

    fn compile(&self, schema: &IndexSchema) -> Result<CompiledQuery, QueryError> {
        instrumented(self.kind(), || {
            let filter = self.options.filter.compile(schema)?;
            self.target.check(schema)?;
            let alias = self.target.alias.as_str();
            self.options.check(schema, Some(alias))?;

            let query = format!(
                "{}=>[KNN {} @{} ${} AS {}]",
                filter, self.k, self.target.field, VECTOR_PARAM, alias
            );
            let fields = self.options.resolve_return_fields(schema, Some(alias));
            let mut params = BTreeMap::new();
            params.insert(VECTOR_PARAM.to_string(), self.target.bytes.clone());

            Ok(CompiledQuery {
                query,
                clauses: self.options.clauses(fields, Some(SortBy::asc(alias))),
                params,
            })
        })
    }
}

/// Every document within a distance threshold of the query vector
#[derive(Debug, Clone, PartialEq)]
pub struct RangeQuery {
    options: QueryOptions,
    target: VectorTarget,
    distance_threshold: f64,
}

impl RangeQuery {
    pub fn new(
        schema: &IndexSchema,
        field: impl AsRef<str>,
        vector: Vec<u8>,
        distance_threshold: f64,
    ) -> Result<Self, QueryError> {
        check_threshold(distance_threshold)?;
        Ok(Self {
            options: QueryOptions::default(),
            target: VectorTarget::new(schema, field.as_ref(), vector)?,
            distance_threshold,
        })
    }

    pub fn from_f64(
        schema: &IndexSchema,
        field: impl AsRef<str>,
        vector: &[f64],
        distance_threshold: f64,
    ) -> Result<Self, QueryError> {
        check_threshold(distance_threshold)?;
        Ok(Self {
            options: QueryOptions::default(),
            target: VectorTarget::from_f64(schema, field.as_ref(), vector)?,
            distance_threshold,
        })
    }

    pub fn distance_alias(mut self, alias: impl Into<String>) -> Self {
        self.target.alias = alias.into();
        self
    }

    pub fn distance_threshold(&self) -> f64 {
        self.distance_threshold
    }

    query_options!();
}

fn check_threshold(threshold: f64) -> Result<(), QueryError> {
    if !threshold.is_finite() || threshold < 0.0 {
        return Err(QueryError::InvalidDistanceThreshold(threshold));
    }
    Ok(())
}

impl SearchQuery for RangeQuery {
    fn kind(&self) -> &'static str {
        "range"
    }

    fn compile(&self, schema: &IndexSchema) -> Result<CompiledQuery, QueryError> {
        instrumented(self.kind(), || {
            let filter = self.options.filter.compile(schema)?;
            self.target.check(schema)?;
            let alias = self.target.alias.as_str();
            self.options.check(schema, Some(alias))?;

            let range = format!(
                "@{}:[VECTOR_RANGE ${} ${}]=>{{$YIELD_DISTANCE_AS: {}}}",
                self.target.field, DISTANCE_THRESHOLD_PARAM, VECTOR_PARAM, alias
            );
            let query = if filter == MATCH_ALL {
                range
            } else {
                format!("({} {})", filter, range)
            };

            let fields = self.options.resolve_return_fields(schema, Some(alias));
            let mut params = BTreeMap::new();
            params.insert(VECTOR_PARAM.to_string(), self.target.bytes.clone());
            params.insert(
                DISTANCE_THRESHOLD_PARAM.to_string(),
                format_number(self.distance_threshold).into_bytes(),
            );

            Ok(CompiledQuery {
                query,
                clauses: self.options.clauses(fields, Some(SortBy::asc(alias))),
                params,
            })
        })
    }
}

/// Number of documents matching a filter
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CountQuery {
    filter: FilterExpression,
}

impl CountQuery {
    pub fn new(filter: FilterExpression) -> Self {
        Self { filter }
    }

    pub fn filter(&self) -> &FilterExpression {
        &self.filter
    }
}

impl SearchQuery for CountQuery {
    fn kind(&self) -> &'static str {
        "count"
    }

    fn compile(&self, schema: &IndexSchema) -> Result<CompiledQuery, QueryError> {
        instrumented(self.kind(), || {
            let query = self.filter.compile(schema)?;
            let clauses = vec![
                "NOCONTENT".to_string(),
                "DIALECT".to_string(),
                DEFAULT_DIALECT.to_string(),
                "LIMIT".to_string(),
                "0".to_string(),
                "0".to_string(),
            ];
            Ok(CompiledQuery {
                query,
                clauses,
                params: BTreeMap::new(),
            })
        })
    }
}
