// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types for schema construction and query compilation.
//!
//! Every error here is a local validation failure. Nothing is retried and
//! nothing is recovered internally: the caller gets the offending field or
//! value back and no query text is produced.

use thiserror::Error;

use crate::schema::FieldKind;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("Index name must not be empty")]
    EmptyIndexName,
    #[error("Invalid field name '{0}': only letters, digits and '_' are allowed")]
    InvalidFieldName(String),
    #[error("Duplicate field name '{0}'")]
    DuplicateField(String),
    #[error("Hash storage requires a non-empty key prefix")]
    MissingPrefix,
    #[error("Invalid option '{option}' on field '{field}': {reason}")]
    InvalidOption {
        field: String,
        option: &'static str,
        reason: String,
    },
    #[error("Unknown {kind} '{value}'")]
    UnknownOption { kind: &'static str, value: String },
    #[error("Unable to determine field type for '{field}'")]
    UnknownFieldType { field: String },
    #[error("Invalid schema source: {0}")]
    Parse(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("Field '{0}' is not declared in the schema")]
    UnknownField(String),
    #[error("Field '{field}' is declared as {actual}, expected {expected}")]
    TypeMismatch {
        field: String,
        expected: FieldKind,
        actual: FieldKind,
    },
    #[error("Invalid numeric range on '{field}': {reason}")]
    InvalidRange { field: String, reason: String },
    #[error("Invalid geo filter on '{field}': {reason}")]
    InvalidGeo { field: String, reason: String },
    #[error("Vector for '{field}' is {actual} bytes, expected {expected}")]
    VectorDimensionMismatch {
        field: String,
        expected: usize,
        actual: usize,
    },
    #[error("K must be at least 1")]
    InvalidK,
    #[error("Distance threshold must be a non-negative number, got {0}")]
    InvalidDistanceThreshold(f64),
    #[error("Empty value for field '{0}'")]
    EmptyValue(String),
    #[error("Cannot negate an expression that matches everything")]
    NegatedMatchAll,
    #[error("Cannot sort by '{0}': not a declared field")]
    InvalidSortField(String),
    #[error("Invalid name '{0}': only ASCII letters, digits and '_' are allowed")]
    InvalidIdentifier(String),
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_field() {
        let err = QueryError::UnknownField("colour".into());
        assert!(err.to_string().contains("colour"));

        let err = QueryError::TypeMismatch {
            field: "age".into(),
            expected: FieldKind::Tag,
            actual: FieldKind::Numeric,
        };
        assert_eq!(err.to_string(), "Field 'age' is declared as numeric, expected tag");
    }

    #[test]
    fn test_schema_error_converts() {
        let err: QueryError = SchemaError::DuplicateField("user".into()).into();
        assert!(matches!(err, QueryError::Schema(SchemaError::DuplicateField(_))));
    }
}
