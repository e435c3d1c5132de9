// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Infer field declarations from sample metadata.
//!
//! ```text
//! number, bool, or string parsing as a number → numeric
//! array of strings (empty included)            → tag
//! any other string                             → text
//! null / "" / object / mixed array             → unknown (skipped, or error if strict)
//! ```

use serde_json::{Map, Value};
use tracing::warn;

use super::source::{FieldsSource, PlainFieldSource, TagFieldSource, TextFieldSource};
use super::FieldKind;
use crate::error::SchemaError;

/// Builds numeric/tag/text declarations from one metadata record.
#[derive(Debug, Default, Clone, Copy)]
pub struct SchemaGenerator;

impl SchemaGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Classify each key of `metadata`. Keys that cannot be classified are
    /// skipped with a warning, or rejected when `strict` is set.
    pub fn generate(
        &self,
        metadata: &Map<String, Value>,
        strict: bool,
    ) -> Result<FieldsSource, SchemaError> {
        let mut fields = FieldsSource::default();

        for (key, value) in metadata {
            match Self::infer(value) {
                Some(FieldKind::Numeric) => fields.numeric.push(PlainFieldSource {
                    name: key.clone(),
                    ..Default::default()
                }),
                Some(FieldKind::Tag) => fields.tag.push(TagFieldSource {
                    name: key.clone(),
                    ..Default::default()
                }),
                Some(FieldKind::Text) => fields.text.push(TextFieldSource {
                    name: key.clone(),
                    ..Default::default()
                }),
                _ => {
                    if strict {
                        return Err(SchemaError::UnknownFieldType { field: key.clone() });
                    }
                    warn!(field = %key, value = %value, "Unable to determine field type, skipping");
                }
            }
        }

        Ok(fields)
    }

    fn infer(value: &Value) -> Option<FieldKind> {
        match value {
            Value::Number(_) | Value::Bool(_) => Some(FieldKind::Numeric),
            Value::String(s) if s.is_empty() => None,
            Value::String(s) if s.trim().parse::<f64>().is_ok() => Some(FieldKind::Numeric),
            Value::String(_) => Some(FieldKind::Text),
            Value::Array(items) if items.iter().all(Value::is_string) => Some(FieldKind::Tag),
            _ => None,
        }
    }
}
