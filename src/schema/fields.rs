// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Field definitions and per-type options.
//!
//! ```text
//! tag      separator, case_sensitive
//! text     weight, no_stem, phonetic_matcher, withsuffixtrie
//! numeric  -
//! geo      -
//! vector   dims, distance_metric, datatype, initial_cap,
//!          FLAT { block_size } | HNSW { m, ef_construction, ef_runtime, epsilon }
//! ```

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::SchemaError;

/// Field type without its options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Tag,
    Text,
    Numeric,
    Geo,
    Vector,
}

impl FieldKind {
    /// Keyword used in FT.CREATE
    pub fn redis_keyword(&self) -> &'static str {
        match self {
            FieldKind::Tag => "TAG",
            FieldKind::Text => "TEXT",
            FieldKind::Numeric => "NUMERIC",
            FieldKind::Geo => "GEO",
            FieldKind::Vector => "VECTOR",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Tag => write!(f, "tag"),
            FieldKind::Text => write!(f, "text"),
            FieldKind::Numeric => write!(f, "numeric"),
            FieldKind::Geo => write!(f, "geo"),
            FieldKind::Vector => write!(f, "vector"),
        }
    }
}

/// Options for tag fields
#[derive(Debug, Clone, PartialEq)]
pub struct TagOptions {
    /// Separator between tags in a stored value (default `,`)
    pub separator: char,
    /// Keep the original letter case when indexing
    pub case_sensitive: bool,
}

impl Default for TagOptions {
    fn default() -> Self {
        Self {
            separator: ',',
            case_sensitive: false,
        }
    }
}

/// Options for full-text fields
#[derive(Debug, Clone, PartialEq)]
pub struct TextOptions {
    /// Relevance weight (default 1.0)
    pub weight: f64,
    /// Disable stemming
    pub no_stem: bool,
    /// Phonetic matcher, e.g. `dm:en`
    pub phonetic_matcher: Option<String>,
    /// Keep a suffix trie for contains/suffix queries
    pub withsuffixtrie: bool,
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            weight: 1.0,
            no_stem: false,
            phonetic_matcher: None,
            withsuffixtrie: false,
        }
    }
}

/// Vector distance metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    L2,
    Ip,
}

impl DistanceMetric {
    pub fn redis_keyword(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "COSINE",
            DistanceMetric::L2 => "L2",
            DistanceMetric::Ip => "IP",
        }
    }
}

impl FromStr for DistanceMetric {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" => Ok(DistanceMetric::Cosine),
            "l2" => Ok(DistanceMetric::L2),
            "ip" => Ok(DistanceMetric::Ip),
            _ => Err(SchemaError::UnknownOption {
                kind: "distance metric",
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for DistanceMetric {
    type Error = SchemaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Field names and aliases: non-empty `[A-Za-z0-9_]`
pub(crate) fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Largest vector dimension the engine accepts
pub const MAX_VECTOR_DIMS: usize = 32_768;

/// Element type of stored vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum VectorDataType {
    #[default]
    Float32,
    Float64,
}

impl VectorDataType {
    /// Size of one element in bytes
    pub fn size_bytes(&self) -> usize {
        match self {
            VectorDataType::Float32 => 4,
            VectorDataType::Float64 => 8,
        }
    }

    pub fn redis_keyword(&self) -> &'static str {
        match self {
            VectorDataType::Float32 => "FLOAT32",
            VectorDataType::Float64 => "FLOAT64",
        }
    }

    /// Encode values as the little-endian blob the engine expects.
    pub fn encode(&self, values: &[f64]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(values.len().saturating_mul(self.size_bytes()));
        for v in values {
            match self {
                VectorDataType::Float32 => bytes.extend_from_slice(&(*v as f32).to_le_bytes()),
                VectorDataType::Float64 => bytes.extend_from_slice(&v.to_le_bytes()),
            }
        }
        bytes
    }
}

impl FromStr for VectorDataType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "float32" => Ok(VectorDataType::Float32),
            "float64" => Ok(VectorDataType::Float64),
            _ => Err(SchemaError::UnknownOption {
                kind: "vector datatype",
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for VectorDataType {
    type Error = SchemaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// HNSW graph tuning
#[derive(Debug, Clone, PartialEq)]
pub struct HnswParams {
    /// Max outgoing edges per node per layer
    pub m: usize,
    pub ef_construction: usize,
    pub ef_runtime: usize,
    /// Relative radius boundary for range queries
    pub epsilon: f64,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            ef_runtime: 10,
            epsilon: 0.01,
        }
    }
}

/// Vector indexing algorithm with its tuning
#[derive(Debug, Clone, PartialEq)]
pub enum VectorAlgorithm {
    /// Brute-force (exact) search
    Flat { block_size: Option<usize> },
    /// Approximate nearest neighbour graph
    Hnsw(HnswParams),
}

impl VectorAlgorithm {
    pub fn redis_keyword(&self) -> &'static str {
        match self {
            VectorAlgorithm::Flat { .. } => "FLAT",
            VectorAlgorithm::Hnsw(_) => "HNSW",
        }
    }
}

/// Options for vector fields
#[derive(Debug, Clone, PartialEq)]
pub struct VectorOptions {
    pub dims: usize,
    pub algorithm: VectorAlgorithm,
    pub datatype: VectorDataType,
    pub distance_metric: DistanceMetric,
    /// Initial index capacity hint
    pub initial_cap: Option<usize>,
}

impl VectorOptions {
    /// FLAT vector field with cosine distance over float32
    pub fn flat(dims: usize) -> Self {
        Self {
            dims,
            algorithm: VectorAlgorithm::Flat { block_size: None },
            datatype: VectorDataType::default(),
            distance_metric: DistanceMetric::default(),
            initial_cap: None,
        }
    }

    /// HNSW vector field with default graph parameters
    pub fn hnsw(dims: usize) -> Self {
        Self {
            algorithm: VectorAlgorithm::Hnsw(HnswParams::default()),
            ..Self::flat(dims)
        }
    }

    pub fn metric(mut self, metric: DistanceMetric) -> Self {
        self.distance_metric = metric;
        self
    }

    pub fn datatype(mut self, datatype: VectorDataType) -> Self {
        self.datatype = datatype;
        self
    }

    pub fn initial_cap(mut self, cap: usize) -> Self {
        self.initial_cap = Some(cap);
        self
    }

    pub fn algorithm(mut self, algorithm: VectorAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Expected byte length of one vector. Saturates, so an unvalidated
    /// oversized `dims` can never match a real payload.
    pub fn byte_len(&self) -> usize {
        self.dims.saturating_mul(self.datatype.size_bytes())
    }
}

/// Field type tagged with its options
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Tag(TagOptions),
    Text(TextOptions),
    Numeric,
    Geo,
    Vector(VectorOptions),
}

impl FieldType {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldType::Tag(_) => FieldKind::Tag,
            FieldType::Text(_) => FieldKind::Text,
            FieldType::Numeric => FieldKind::Numeric,
            FieldType::Geo => FieldKind::Geo,
            FieldType::Vector(_) => FieldKind::Vector,
        }
    }
}

/// A single declared field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefinition {
    /// Attribute name used in queries
    pub name: String,
    /// JSON path for JSON storage (defaults to `$.{name}`)
    pub path: Option<String>,
    pub field_type: FieldType,
    pub sortable: bool,
    /// Keep the field for sorting/returning only
    pub no_index: bool,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            path: None,
            field_type,
            sortable: false,
            no_index: false,
        }
    }

    pub fn tag(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Tag(TagOptions::default()))
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Text(TextOptions::default()))
    }

    pub fn numeric(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Numeric)
    }

    pub fn geo(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Geo)
    }

    pub fn vector(name: impl Into<String>, options: VectorOptions) -> Self {
        Self::new(name, FieldType::Vector(options))
    }

    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    pub fn no_index(mut self) -> Self {
        self.no_index = true;
        self
    }

    /// Index the value found at a custom JSON path
    pub fn at(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn kind(&self) -> FieldKind {
        self.field_type.kind()
    }

    /// Vector options, if this is a vector field
    pub fn vector_options(&self) -> Option<&VectorOptions> {
        match &self.field_type {
            FieldType::Vector(options) => Some(options),
            _ => None,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), SchemaError> {
        if !is_identifier(&self.name) {
            return Err(SchemaError::InvalidFieldName(self.name.clone()));
        }

        match &self.field_type {
            FieldType::Tag(options) => {
                if options.separator.is_whitespace() {
                    return Err(self.invalid("separator", "must not be whitespace"));
                }
            }
            FieldType::Text(options) => {
                if !options.weight.is_finite() || options.weight <= 0.0 {
                    let reason = format!("must be > 0, got {}", options.weight);
                    return Err(self.invalid("weight", reason));
                }
            }
            FieldType::Numeric | FieldType::Geo => {}
            FieldType::Vector(options) => {
                if options.dims == 0 || options.dims > MAX_VECTOR_DIMS {
                    return Err(self.invalid(
                        "dims",
                        format!("must be between 1 and {}, got {}", MAX_VECTOR_DIMS, options.dims),
                    ));
                }
                if options.initial_cap == Some(0) {
                    return Err(self.invalid("initial_cap", "must be > 0"));
                }
                match &options.algorithm {
                    VectorAlgorithm::Flat { block_size } => {
                        if *block_size == Some(0) {
                            return Err(self.invalid("block_size", "must be > 0"));
                        }
                    }
                    VectorAlgorithm::Hnsw(params) => {
                        if params.m == 0 {
                            return Err(self.invalid("m", "must be > 0"));
                        }
                        if params.ef_construction == 0 {
                            return Err(self.invalid("ef_construction", "must be > 0"));
                        }
                        if params.ef_runtime == 0 {
                            return Err(self.invalid("ef_runtime", "must be > 0"));
                        }
                        if !params.epsilon.is_finite() || params.epsilon <= 0.0 {
                            return Err(self.invalid("epsilon", "must be > 0"));
                        }
                    }
                }
            }
        }

        Ok(())
    }

    fn invalid(&self, option: &'static str, reason: impl Into<String>) -> SchemaError {
        SchemaError::InvalidOption {
            field: self.name.clone(),
            option,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_options_case_insensitive() {
        assert_eq!("COSINE".parse::<DistanceMetric>().unwrap(), DistanceMetric::Cosine);
        assert_eq!("l2".parse::<DistanceMetric>().unwrap(), DistanceMetric::L2);
        assert_eq!("Ip".parse::<DistanceMetric>().unwrap(), DistanceMetric::Ip);
        assert_eq!("FLOAT64".parse::<VectorDataType>().unwrap(), VectorDataType::Float64);
        assert!("manhattan".parse::<DistanceMetric>().is_err());
        assert!("int8".parse::<VectorDataType>().is_err());
    }

    #[test]
    fn test_vector_byte_len() {
        assert_eq!(VectorOptions::hnsw(3).byte_len(), 12);
        assert_eq!(VectorOptions::flat(3).datatype(VectorDataType::Float64).byte_len(), 24);
    }

    #[test]
    fn test_encode_little_endian() {
        let bytes = VectorDataType::Float32.encode(&[1.0, 0.5]);
        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[..4], &1.0f32.to_le_bytes());
        assert_eq!(&bytes[4..], &0.5f32.to_le_bytes());

        let bytes = VectorDataType::Float64.encode(&[0.25]);
        assert_eq!(bytes, 0.25f64.to_le_bytes().to_vec());
    }

    #[test]
    fn test_validate_rejects_zero_dims() {
        let field = FieldDefinition::vector("embedding", VectorOptions::flat(0));
        assert!(matches!(
            field.validate(),
            Err(SchemaError::InvalidOption { option: "dims", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_oversized_dims() {
        for dims in [MAX_VECTOR_DIMS + 1, usize::MAX / 2, usize::MAX] {
            let field = FieldDefinition::vector("embedding", VectorOptions::flat(dims));
            assert!(matches!(
                field.validate(),
                Err(SchemaError::InvalidOption { option: "dims", .. })
            ));
        }
        let field = FieldDefinition::vector("embedding", VectorOptions::flat(MAX_VECTOR_DIMS));
        assert!(field.validate().is_ok());
    }

    #[test]
    fn test_byte_len_saturates() {
        assert_eq!(VectorOptions::flat(usize::MAX / 2).byte_len(), usize::MAX);
    }

    #[test]
    fn test_validate_rejects_bad_hnsw_params() {
        let options = VectorOptions::hnsw(8).algorithm(VectorAlgorithm::Hnsw(HnswParams {
            m: 0,
            ..Default::default()
        }));
        let field = FieldDefinition::vector("embedding", options);
        assert!(matches!(
            field.validate(),
            Err(SchemaError::InvalidOption { option: "m", .. })
        ));
    }

    #[test]
    fn test_validate_field_names() {
        assert!(FieldDefinition::tag("user_id").validate().is_ok());
        assert!(FieldDefinition::tag("").validate().is_err());
        assert!(FieldDefinition::tag("user id").validate().is_err());
        assert!(FieldDefinition::tag("a}b").validate().is_err());
        assert!(FieldDefinition::tag("名前").validate().is_err());
        assert!(FieldDefinition::tag("café").validate().is_err());
        assert!(FieldDefinition::tag("Field_2").validate().is_ok());
    }

    #[test]
    fn test_validate_text_weight() {
        let field = FieldDefinition::new(
            "body",
            FieldType::Text(TextOptions {
                weight: 0.0,
                ..Default::default()
            }),
        );
        assert!(field.validate().is_err());
    }
}
