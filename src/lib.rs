// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # redisvl
//!
//! Declarative index schemas and hybrid filter/vector query compilation for
//! RediSearch.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Schema Model                         │
//! │  • IndexSchema: name, key prefix, storage, typed fields    │
//! │  • Built in code or deserialised from a declarative source │
//! └─────────────────────────────────────────────────────────────┘
//!                 │                               │
//!        (type-checks filters)            (FT.CREATE payload)
//!                 ▼                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Query Compiler                          │
//! │  • FilterExpression: tag/numeric/geo/text, AND/OR/NOT      │
//! │  • Filter/Vector/Range/Count queries → CompiledQuery       │
//! │  • Pure, deterministic, thread-safe                        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                  (command string + params)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Transport                            │
//! │  • SearchTransport trait, Redis connection manager         │
//! │  • Document load (HSET / JSON.SET) and fetch               │
//! │  • Retry with exponential backoff                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
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
//! let filter = FilterExpression::tag_equals("user", "Sam")
//!     .unwrap()
//!     .and(FilterExpression::numeric_greater_than("age", 10.0).unwrap());
//!
//! let compiled = VectorQuery::from_f64(&schema, "user_embedding", &[0.1, 0.1, 0.5], 3)
//!     .unwrap()
//!     .with_filter(filter)
//!     .return_fields(["user", "age"])
//!     .compile(&schema)
//!     .unwrap();
//!
//! assert_eq!(
//!     compiled.command(),
//!     "(@user:{Sam} @age:[(10 +inf])=>[KNN 3 @user_embedding $vector AS vector_distance] \
//!      RETURN 3 user age vector_distance SORTBY vector_distance ASC DIALECT 2 LIMIT 0 10"
//! );
//! ```
//!
//! ## Configuration
//!
//! See [`SearchConfig`] for all configuration options.
//!
//! ## Modules
//!
//! - [`schema`]: Index schemas, field options, registry, generator
//! - [`search`]: Escaping, filter expressions, query compilation, FT.CREATE payload
//! - [`transport`]: Engine transport (Redis, in-memory) and retry
//! - [`index`]: [`SearchIndex`] handle tying the three together
//! - [`metrics`]: `metrics` crate instrumentation

pub mod config;
pub mod error;
pub mod index;
pub mod metrics;
pub mod schema;
pub mod search;
pub mod transport;

pub use config::SearchConfig;
pub use error::{QueryError, SchemaError};
pub use index::{Record, SearchIndex};
pub use schema::{FieldDefinition, FieldType, IndexSchema, SchemaRegistry, StorageType};
pub use search::{
    CompiledQuery, CountQuery, FilterExpression, FilterQuery, RangeQuery, SearchQuery, VectorQuery,
};
pub use transport::{RedisTransport, RetryConfig, SearchResults, SearchTransport, TransportError};
