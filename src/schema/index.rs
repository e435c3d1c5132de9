// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Index schema: name, key layout, storage mode and ordered fields.
//!
//! A schema is validated once by [`IndexSchemaBuilder::build`] and is
//! immutable afterwards. Changing it means going back through
//! [`IndexSchema::into_builder`] and building again.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use super::fields::{FieldDefinition, FieldKind, VectorOptions};
use super::source::SchemaSource;
use crate::error::{QueryError, SchemaError};
use crate::search::IndexDefinition;

/// Default key prefix for new indexes
pub const DEFAULT_PREFIX: &str = "rvl";

/// Default separator between key prefix and document id
pub const DEFAULT_KEY_SEPARATOR: &str = ":";

/// How documents are stored under the index prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum StorageType {
    #[default]
    Hash,
    Json,
}

impl StorageType {
    pub fn redis_keyword(&self) -> &'static str {
        match self {
            StorageType::Hash => "HASH",
            StorageType::Json => "JSON",
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageType::Hash => write!(f, "hash"),
            StorageType::Json => write!(f, "json"),
        }
    }
}

impl FromStr for StorageType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hash" => Ok(StorageType::Hash),
            "json" => Ok(StorageType::Json),
            _ => Err(SchemaError::UnknownOption {
                kind: "storage type",
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for StorageType {
    type Error = SchemaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Validated, immutable index schema
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSchema {
    name: String,
    prefix: String,
    key_separator: String,
    storage_type: StorageType,
    fields: Vec<FieldDefinition>,
    positions: HashMap<String, usize>,
}

impl IndexSchema {
    /// Start declaring a schema for the named index
    pub fn builder(name: impl Into<String>) -> IndexSchemaBuilder {
        IndexSchemaBuilder::new(name)
    }

    /// Build from the declarative `{ index: {...}, fields: {...} }` shape.
    pub fn from_source(source: SchemaSource) -> Result<Self, SchemaError> {
        source.into_builder()?.build()
    }

    /// Build from a JSON document in the declarative shape.
    pub fn from_json_str(json: &str) -> Result<Self, SchemaError> {
        let source: SchemaSource =
            serde_json::from_str(json).map_err(|e| SchemaError::Parse(e.to_string()))?;
        Self::from_source(source)
    }

    /// Build from an already-parsed JSON value in the declarative shape.
    pub fn from_json_value(value: serde_json::Value) -> Result<Self, SchemaError> {
        let source: SchemaSource =
            serde_json::from_value(value).map_err(|e| SchemaError::Parse(e.to_string()))?;
        Self::from_source(source)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn key_separator(&self) -> &str {
        &self.key_separator
    }

    pub fn storage_type(&self) -> StorageType {
        self.storage_type
    }

    /// Fields in declaration order
    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    /// Look up a declared field by name
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.positions.get(name).map(|&i| &self.fields[i])
    }

    /// Full document key for an id: `{prefix}{separator}{id}`, or just the id
    /// when the prefix is empty.
    pub fn key(&self, id: &str) -> String {
        if self.prefix.is_empty() {
            id.to_string()
        } else if self.prefix.ends_with(&self.key_separator) {
            format!("{}{}", self.prefix, id)
        } else {
            format!("{}{}{}", self.prefix, self.key_separator, id)
        }
    }

    /// Re-run every schema check.
    pub fn validate(&self) -> Result<(), SchemaError> {
        validate_parts(&self.name, &self.prefix, self.storage_type, &self.fields).map(|_| ())
    }

    /// The ordered field list with types and options, as handed to the
    /// index-creation collaborator.
    pub fn to_index_definition(&self) -> IndexDefinition {
        IndexDefinition::from_schema(self)
    }

    /// Turn back into a builder for an explicit rebuild
    pub fn into_builder(self) -> IndexSchemaBuilder {
        IndexSchemaBuilder {
            name: self.name,
            prefix: self.prefix,
            key_separator: self.key_separator,
            storage_type: self.storage_type,
            fields: self.fields,
        }
    }

    /// Resolve a field and check that it has the expected type.
    pub(crate) fn require_field(
        &self,
        name: &str,
        expected: FieldKind,
    ) -> Result<&FieldDefinition, QueryError> {
        let field = self
            .field(name)
            .ok_or_else(|| QueryError::UnknownField(name.to_string()))?;
        if field.kind() != expected {
            return Err(QueryError::TypeMismatch {
                field: name.to_string(),
                expected,
                actual: field.kind(),
            });
        }
        Ok(field)
    }

    pub(crate) fn require_vector(&self, name: &str) -> Result<&VectorOptions, QueryError> {
        let field = self.require_field(name, FieldKind::Vector)?;
        // require_field guarantees a vector field here
        field
            .vector_options()
            .ok_or_else(|| QueryError::UnknownField(name.to_string()))
    }
}

/// Fluent schema declaration
///
/// ```
/// use redisvl::schema::{IndexSchema, VectorOptions, DistanceMetric};
///
/// let schema = IndexSchema::builder("users")
///     .prefix("user")
///     .tag("user")
///     .numeric("age")
///     .vector("user_embedding", VectorOptions::hnsw(3).metric(DistanceMetric::Cosine))
///     .build()
///     .unwrap();
///
/// assert_eq!(schema.fields().len(), 3);
/// assert_eq!(schema.key("42"), "user:42");
/// ```
#[derive(Debug, Clone)]
pub struct IndexSchemaBuilder {
    name: String,
    prefix: String,
    key_separator: String,
    storage_type: StorageType,
    fields: Vec<FieldDefinition>,
}

impl IndexSchemaBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: DEFAULT_PREFIX.to_string(),
            key_separator: DEFAULT_KEY_SEPARATOR.to_string(),
            storage_type: StorageType::default(),
            fields: Vec::new(),
        }
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn key_separator(mut self, separator: impl Into<String>) -> Self {
        self.key_separator = separator.into();
        self
    }

    pub fn storage(mut self, storage_type: StorageType) -> Self {
        self.storage_type = storage_type;
        self
    }

    /// Add a fully specified field
    pub fn field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    pub fn tag(self, name: impl Into<String>) -> Self {
        self.field(FieldDefinition::tag(name))
    }

    pub fn text(self, name: impl Into<String>) -> Self {
        self.field(FieldDefinition::text(name))
    }

    pub fn numeric(self, name: impl Into<String>) -> Self {
        self.field(FieldDefinition::numeric(name))
    }

    pub fn geo(self, name: impl Into<String>) -> Self {
        self.field(FieldDefinition::geo(name))
    }

    pub fn vector(self, name: impl Into<String>, options: VectorOptions) -> Self {
        self.field(FieldDefinition::vector(name, options))
    }

    /// Validate and freeze the schema
    pub fn build(self) -> Result<IndexSchema, SchemaError> {
        let positions = validate_parts(&self.name, &self.prefix, self.storage_type, &self.fields)?;
        Ok(IndexSchema {
            name: self.name,
            prefix: self.prefix,
            key_separator: self.key_separator,
            storage_type: self.storage_type,
            fields: self.fields,
            positions,
        })
    }
}

fn validate_parts(
    name: &str,
    prefix: &str,
    storage_type: StorageType,
    fields: &[FieldDefinition],
) -> Result<HashMap<String, usize>, SchemaError> {
    if name.trim().is_empty() {
        return Err(SchemaError::EmptyIndexName);
    }
    if storage_type == StorageType::Hash && prefix.is_empty() {
        return Err(SchemaError::MissingPrefix);
    }

    let mut positions = HashMap::with_capacity(fields.len());
    for (i, field) in fields.iter().enumerate() {
        field.validate()?;
        if storage_type == StorageType::Hash && field.path.is_some() {
            return Err(SchemaError::InvalidOption {
                field: field.name.clone(),
                option: "path",
                reason: "paths are only valid for json storage".to_string(),
            });
        }
        if positions.insert(field.name.clone(), i).is_some() {
            return Err(SchemaError::DuplicateField(field.name.clone()));
        }
    }

    Ok(positions)
}
