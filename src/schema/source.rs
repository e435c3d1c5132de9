// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Declarative schema source.
//!
//! The structural shape a loader (YAML, JSON, a config service...) must
//! produce before a schema can be built:
//!
//! ```text
//! index:
//!   name: user_index
//!   prefix: user            # default "rvl"; null means no prefix
//!   key_separator: ":"      # default ":"
//!   storage_type: hash      # hash | json
//! fields:
//!   tag:     [{ name: user }]
//!   text:    [{ name: job, weight: 2.0 }]
//!   numeric: [{ name: age, sortable: true }]
//!   geo:     [{ name: location }]
//!   vector:  [{ name: embedding, dims: 3, algorithm: hnsw, distance_metric: cosine }]
//! ```
//!
//! Any `serde` data format can feed these types.

use serde::Deserialize;

use super::fields::{
    DistanceMetric, FieldDefinition, FieldType, HnswParams, TagOptions, TextOptions,
    VectorAlgorithm, VectorDataType, VectorOptions,
};
use super::index::{IndexSchemaBuilder, StorageType, DEFAULT_KEY_SEPARATOR, DEFAULT_PREFIX};
use crate::error::SchemaError;

#[derive(Debug, Clone, Deserialize)]
pub struct SchemaSource {
    pub index: IndexSource,
    #[serde(default)]
    pub fields: FieldsSource,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexSource {
    pub name: String,
    #[serde(default = "default_prefix")]
    pub prefix: Option<String>,
    #[serde(default = "default_key_separator")]
    pub key_separator: Option<String>,
    #[serde(default)]
    pub storage_type: StorageType,
}

fn default_prefix() -> Option<String> {
    Some(DEFAULT_PREFIX.to_string())
}

fn default_key_separator() -> Option<String> {
    Some(DEFAULT_KEY_SEPARATOR.to_string())
}

/// Field declarations grouped by type
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FieldsSource {
    #[serde(default)]
    pub tag: Vec<TagFieldSource>,
    #[serde(default)]
    pub text: Vec<TextFieldSource>,
    #[serde(default)]
    pub numeric: Vec<PlainFieldSource>,
    #[serde(default)]
    pub geo: Vec<PlainFieldSource>,
    #[serde(default)]
    pub vector: Vec<VectorFieldSource>,
}

impl FieldsSource {
    pub fn is_empty(&self) -> bool {
        self.tag.is_empty()
            && self.text.is_empty()
            && self.numeric.is_empty()
            && self.geo.is_empty()
            && self.vector.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TagFieldSource {
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub separator: Option<String>,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default)]
    pub sortable: bool,
    #[serde(default)]
    pub no_index: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TextFieldSource {
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub no_stem: bool,
    #[serde(default)]
    pub phonetic_matcher: Option<String>,
    #[serde(default)]
    pub withsuffixtrie: bool,
    #[serde(default)]
    pub sortable: bool,
    #[serde(default)]
    pub no_index: bool,
}

/// Numeric and geo fields carry no type-specific options
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PlainFieldSource {
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub sortable: bool,
    #[serde(default)]
    pub no_index: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VectorFieldSource {
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
    pub dims: usize,
    pub algorithm: String,
    #[serde(default)]
    pub datatype: VectorDataType,
    #[serde(default)]
    pub distance_metric: DistanceMetric,
    #[serde(default)]
    pub initial_cap: Option<usize>,
    #[serde(default)]
    pub block_size: Option<usize>,
    #[serde(default)]
    pub m: Option<usize>,
    #[serde(default)]
    pub ef_construction: Option<usize>,
    #[serde(default)]
    pub ef_runtime: Option<usize>,
    #[serde(default)]
    pub epsilon: Option<f64>,
}

impl SchemaSource {
    /// Convert into a builder; nothing is validated until `build()`.
    pub fn into_builder(self) -> Result<IndexSchemaBuilder, SchemaError> {
        let mut builder = IndexSchemaBuilder::new(self.index.name)
            .prefix(self.index.prefix.unwrap_or_default())
            .key_separator(
                self.index
                    .key_separator
                    .unwrap_or_else(|| DEFAULT_KEY_SEPARATOR.to_string()),
            )
            .storage(self.index.storage_type);

        for field in self.fields.into_definitions()? {
            builder = builder.field(field);
        }
        Ok(builder)
    }
}

impl FieldsSource {
    /// Field definitions in group order: tag, text, numeric, geo, vector.
    pub fn into_definitions(self) -> Result<Vec<FieldDefinition>, SchemaError> {
        let mut out = Vec::new();

        for tag in self.tag {
            let separator = match tag.separator.as_deref() {
                None => TagOptions::default().separator,
                Some(s) => single_char(&tag.name, s)?,
            };
            let field_type = FieldType::Tag(TagOptions {
                separator,
                case_sensitive: tag.case_sensitive,
            });
            out.push(finish(tag.name, tag.path, field_type, tag.sortable, tag.no_index));
        }

        for text in self.text {
            let field_type = FieldType::Text(TextOptions {
                weight: text.weight.unwrap_or(1.0),
                no_stem: text.no_stem,
                phonetic_matcher: text.phonetic_matcher,
                withsuffixtrie: text.withsuffixtrie,
            });
            out.push(finish(text.name, text.path, field_type, text.sortable, text.no_index));
        }

        for numeric in self.numeric {
            out.push(finish(
                numeric.name,
                numeric.path,
                FieldType::Numeric,
                numeric.sortable,
                numeric.no_index,
            ));
        }

        for geo in self.geo {
            out.push(finish(geo.name, geo.path, FieldType::Geo, geo.sortable, geo.no_index));
        }

        for vector in self.vector {
            let field_type = FieldType::Vector(vector_options(&vector)?);
            out.push(finish(vector.name, vector.path, field_type, false, false));
        }

        Ok(out)
    }
}

fn finish(
    name: String,
    path: Option<String>,
    field_type: FieldType,
    sortable: bool,
    no_index: bool,
) -> FieldDefinition {
    FieldDefinition {
        name,
        path,
        field_type,
        sortable,
        no_index,
    }
}

fn single_char(field: &str, s: &str) -> Result<char, SchemaError> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(SchemaError::InvalidOption {
            field: field.to_string(),
            option: "separator",
            reason: format!("must be exactly one character, got '{}'", s),
        }),
    }
}

fn vector_options(source: &VectorFieldSource) -> Result<VectorOptions, SchemaError> {
    let algorithm = match source.algorithm.to_ascii_lowercase().as_str() {
        "flat" => {
            let hnsw_only = [
                ("m", source.m.is_some()),
                ("ef_construction", source.ef_construction.is_some()),
                ("ef_runtime", source.ef_runtime.is_some()),
                ("epsilon", source.epsilon.is_some()),
            ];
            if let Some(&(option, _)) = hnsw_only.iter().find(|(_, set)| *set) {
                return Err(SchemaError::InvalidOption {
                    field: source.name.clone(),
                    option,
                    reason: "only valid for hnsw".to_string(),
                });
            }
            VectorAlgorithm::Flat {
                block_size: source.block_size,
            }
        }
        "hnsw" => {
            if source.block_size.is_some() {
                return Err(SchemaError::InvalidOption {
                    field: source.name.clone(),
                    option: "block_size",
                    reason: "only valid for flat".to_string(),
                });
            }
            let defaults = HnswParams::default();
            VectorAlgorithm::Hnsw(HnswParams {
                m: source.m.unwrap_or(defaults.m),
                ef_construction: source.ef_construction.unwrap_or(defaults.ef_construction),
                ef_runtime: source.ef_runtime.unwrap_or(defaults.ef_runtime),
                epsilon: source.epsilon.unwrap_or(defaults.epsilon),
            })
        }
        _ => {
            return Err(SchemaError::UnknownOption {
                kind: "vector algorithm",
                value: source.algorithm.clone(),
            })
        }
    };

    Ok(VectorOptions {
        dims: source.dims,
        algorithm,
        datatype: source.datatype,
        distance_metric: source.distance_metric,
        initial_cap: source.initial_cap,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> SchemaSource {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_index_defaults() {
        let source = parse(json!({"index": {"name": "idx"}}));
        assert_eq!(source.index.prefix.as_deref(), Some("rvl"));
        assert_eq!(source.index.key_separator.as_deref(), Some(":"));
        assert_eq!(source.index.storage_type, StorageType::Hash);
        assert!(source.fields.is_empty());
    }

    #[test]
    fn test_null_prefix_means_empty() {
        let source = parse(json!({
            "index": {"name": "idx", "prefix": null, "storage_type": "json"}
        }));
        let schema = source.into_builder().unwrap().build().unwrap();
        assert_eq!(schema.prefix(), "");
    }

    #[test]
    fn test_group_order() {
        let source = parse(json!({
            "index": {"name": "idx"},
            "fields": {
                "vector": [{"name": "v", "dims": 2, "algorithm": "flat"}],
                "geo": [{"name": "g"}],
                "numeric": [{"name": "n"}],
                "text": [{"name": "t"}],
                "tag": [{"name": "a"}]
            }
        }));
        let fields = source.fields.into_definitions().unwrap();
        let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a", "t", "n", "g", "v"]);
    }

    #[test]
    fn test_hnsw_params() {
        let source = parse(json!({
            "index": {"name": "idx"},
            "fields": {"vector": [{
                "name": "v", "dims": 4, "algorithm": "HNSW",
                "m": 32, "ef_runtime": 50, "datatype": "float64", "distance_metric": "ip"
            }]}
        }));
        let fields = source.fields.into_definitions().unwrap();
        let options = fields[0].vector_options().unwrap();
        assert_eq!(options.datatype, VectorDataType::Float64);
        assert_eq!(options.distance_metric, DistanceMetric::Ip);
        match &options.algorithm {
            VectorAlgorithm::Hnsw(p) => {
                assert_eq!(p.m, 32);
                assert_eq!(p.ef_construction, 200);
                assert_eq!(p.ef_runtime, 50);
            }
            other => panic!("Expected HNSW, got {:?}", other),
        }
    }

    #[test]
    fn test_algorithm_specific_options_checked() {
        let source = parse(json!({
            "index": {"name": "idx"},
            "fields": {"vector": [{"name": "v", "dims": 4, "algorithm": "flat", "m": 8}]}
        }));
        assert!(matches!(
            source.fields.into_definitions(),
            Err(SchemaError::InvalidOption { option: "m", .. })
        ));

        let source = parse(json!({
            "index": {"name": "idx"},
            "fields": {"vector": [{"name": "v", "dims": 4, "algorithm": "ivf"}]}
        }));
        assert!(matches!(
            source.fields.into_definitions(),
            Err(SchemaError::UnknownOption { kind: "vector algorithm", .. })
        ));
    }

    #[test]
    fn test_tag_separator_single_char() {
        let source = parse(json!({
            "index": {"name": "idx"},
            "fields": {"tag": [{"name": "t", "separator": "||"}]}
        }));
        assert!(source.fields.into_definitions().is_err());

        let source = parse(json!({
            "index": {"name": "idx"},
            "fields": {"tag": [{"name": "t", "separator": "|", "case_sensitive": true}]}
        }));
        let fields = source.fields.into_definitions().unwrap();
        assert_eq!(
            fields[0].field_type,
            FieldType::Tag(TagOptions {
                separator: '|',
                case_sensitive: true
            })
        );
    }
}
