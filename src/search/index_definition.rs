// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Index Definition
//!
//! The index-creation payload derived from a schema: index metadata plus the
//! ordered field list, renderable as FT.CREATE arguments.
//!
//! # RediSearch Index Creation
//!
//! ```text
//! FT.CREATE users
//!   ON HASH
//!   PREFIX 1 user
//!   SCHEMA
//!     user TAG SEPARATOR ,
//!     age NUMERIC SORTABLE
//!     user_embedding VECTOR HNSW 14 TYPE FLOAT32 DIM 3 DISTANCE_METRIC COSINE
//!       M 16 EF_CONSTRUCTION 200 EF_RUNTIME 10 EPSILON 0.01
//! ```
//!
//! JSON storage indexes each field by path: `$.age AS age NUMERIC`.

use super::escape::format_number;
use crate::schema::{
    FieldDefinition, FieldType, IndexSchema, StorageType, VectorAlgorithm, VectorOptions,
};

/// Index creation payload
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDefinition {
    pub name: String,
    /// Key prefix this index covers (empty covers every key)
    pub prefix: String,
    pub storage_type: StorageType,
    /// Fields in declaration order
    pub fields: Vec<FieldDefinition>,
}

impl IndexDefinition {
    pub fn from_schema(schema: &IndexSchema) -> Self {
        Self {
            name: schema.name().to_string(),
            prefix: schema.prefix().to_string(),
            storage_type: schema.storage_type(),
            fields: schema.fields().to_vec(),
        }
    }

    /// Generate the FT.CREATE command arguments
    pub fn to_ft_create_args(&self) -> Vec<String> {
        self.to_ft_create_args_with_namespace(None)
    }

    /// Generate FT.CREATE args with the index name prefixed by `namespace`.
    pub fn to_ft_create_args_with_namespace(&self, namespace: Option<&str>) -> Vec<String> {
        let mut args = vec![
            format!("{}{}", namespace.unwrap_or(""), self.name),
            "ON".to_string(),
            self.storage_type.redis_keyword().to_string(),
        ];

        if !self.prefix.is_empty() {
            args.push("PREFIX".to_string());
            args.push("1".to_string());
            args.push(self.prefix.clone());
        }

        args.push("SCHEMA".to_string());
        for field in &self.fields {
            args.extend(field_args(field, self.storage_type));
        }

        args
    }
}

fn field_args(field: &FieldDefinition, storage: StorageType) -> Vec<String> {
    let mut args = match storage {
        StorageType::Hash => vec![field.name.clone()],
        StorageType::Json => vec![
            field
                .path
                .clone()
                .unwrap_or_else(|| format!("$.{}", field.name)),
            "AS".to_string(),
            field.name.clone(),
        ],
    };
    args.push(field.kind().redis_keyword().to_string());

    match &field.field_type {
        FieldType::Tag(options) => {
            args.push("SEPARATOR".to_string());
            args.push(options.separator.to_string());
            if options.case_sensitive {
                args.push("CASESENSITIVE".to_string());
            }
        }
        FieldType::Text(options) => {
            args.push("WEIGHT".to_string());
            args.push(format_number(options.weight));
            if options.no_stem {
                args.push("NOSTEM".to_string());
            }
            if let Some(matcher) = &options.phonetic_matcher {
                args.push("PHONETIC".to_string());
                args.push(matcher.clone());
            }
            if options.withsuffixtrie {
                args.push("WITHSUFFIXTRIE".to_string());
            }
        }
        FieldType::Numeric | FieldType::Geo => {}
        FieldType::Vector(options) => args.extend(vector_args(options)),
    }

    if field.sortable {
        args.push("SORTABLE".to_string());
    }

    if field.no_index {
        args.push("NOINDEX".to_string());
    }

    args
}

/// `ALG count attr value ...` where count is the number of attribute tokens.
fn vector_args(options: &VectorOptions) -> Vec<String> {
    let mut attrs = vec![
        "TYPE".to_string(),
        options.datatype.redis_keyword().to_string(),
        "DIM".to_string(),
        options.dims.to_string(),
        "DISTANCE_METRIC".to_string(),
        options.distance_metric.redis_keyword().to_string(),
    ];

    if let Some(cap) = options.initial_cap {
        attrs.push("INITIAL_CAP".to_string());
        attrs.push(cap.to_string());
    }

    match &options.algorithm {
        VectorAlgorithm::Flat { block_size } => {
            if let Some(size) = block_size {
                attrs.push("BLOCK_SIZE".to_string());
                attrs.push(size.to_string());
            }
        }
        VectorAlgorithm::Hnsw(params) => {
            attrs.extend([
                "M".to_string(),
                params.m.to_string(),
                "EF_CONSTRUCTION".to_string(),
                params.ef_construction.to_string(),
                "EF_RUNTIME".to_string(),
                params.ef_runtime.to_string(),
                "EPSILON".to_string(),
                format_number(params.epsilon),
            ]);
        }
    }

    let mut args = vec![options.algorithm.redis_keyword().to_string(), attrs.len().to_string()];
    args.extend(attrs);
    args
}
