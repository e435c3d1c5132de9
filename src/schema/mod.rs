// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Index schema model.
//!
//! Describes an index once (name, key prefix, storage mode and typed
//! fields) and is then shared, read-only, by index creation and by query
//! compilation, which checks every filter against the declared field types.
//!
//! # Example
//!
//! ```rust
//! use redisvl::schema::{IndexSchema, FieldDefinition, VectorOptions, StorageType};
//!
//! let schema = IndexSchema::builder("products")
//!     .prefix("product")
//!     .storage(StorageType::Hash)
//!     .field(FieldDefinition::tag("category"))
//!     .field(FieldDefinition::numeric("price").sortable())
//!     .text("description")
//!     .vector("embedding", VectorOptions::flat(384))
//!     .build()
//!     .unwrap();
//!
//! assert!(schema.field("price").unwrap().sortable);
//! ```

mod fields;
mod generator;
mod index;
mod registry;
mod source;

pub use fields::{
    DistanceMetric, FieldDefinition, FieldKind, FieldType, HnswParams, TagOptions, TextOptions,
    VectorAlgorithm, VectorDataType, VectorOptions, MAX_VECTOR_DIMS,
};
pub(crate) use fields::is_identifier;
pub use generator::SchemaGenerator;
pub use index::{
    IndexSchema, IndexSchemaBuilder, StorageType, DEFAULT_KEY_SEPARATOR, DEFAULT_PREFIX,
};
pub use registry::SchemaRegistry;
pub use source::{
    FieldsSource, IndexSource, PlainFieldSource, SchemaSource, TagFieldSource, TextFieldSource,
    VectorFieldSource,
};
