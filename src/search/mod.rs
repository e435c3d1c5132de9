// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Search Infrastructure
//!
//! Filter expressions and query compilation for RediSearch.
//!
//! # Architecture
//!
//! ```text
//! FilterExpression (tree of typed predicates)
//!     ↓  compile(schema)       field + type checks, escaping
//! FilterQuery / VectorQuery / RangeQuery / CountQuery
//!     ↓  compile(schema)
//! CompiledQuery { query, clauses, params }  →  FT.SEARCH
//!
//! IndexSchema → IndexDefinition            →  FT.CREATE
//! ```
//!
//! # Query Language (RediSearch dialect 2)
//!
//! ```text
//! *                            - Match all
//! @tags:{rust|database}        - Tag membership (OR)
//! @age:[(25 +inf]              - Numeric range, ( marks exclusive
//! @loc:[-122.4 37.7 5 km]      - Geo radius
//! @title:engineer              - Full text
//! @title:engin*                - Prefix match
//! (a b)                        - AND
//! (a | b)                      - OR
//! (-a)                         - NOT
//! a=>[KNN 3 @vec $vector AS d] - K nearest neighbours, pre-filtered by a
//! ```

mod escape;
mod filter;
mod index_definition;
mod query;

pub use escape::{
    escape_tag, escape_text, format_geo, format_number, format_numeric_bound, BoundSide, GeoUnit,
    MATCH_ALL,
};
pub use filter::{FilterExpression, NumericBound, Predicate};
pub use index_definition::IndexDefinition;
pub use query::{
    CompiledQuery, CountQuery, FilterQuery, RangeQuery, SearchQuery, SortBy, VectorQuery,
    DEFAULT_DIALECT, DEFAULT_DISTANCE_ALIAS, DEFAULT_LIMIT, DISTANCE_THRESHOLD_PARAM, VECTOR_PARAM,
};
