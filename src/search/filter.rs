// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Filter expressions - typed predicates combined with AND / OR / NOT.
//!
//! Predicates validate their operands when constructed and their field
//! against the schema when compiled. Expressions are immutable; children are
//! reference-counted so one sub-expression can be shared by many queries.
//!
//! # Example
//!
//! ```rust
//! use redisvl::schema::IndexSchema;
//! use redisvl::search::FilterExpression;
//!
//! let schema = IndexSchema::builder("users")
//!     .tag("user")
//!     .numeric("age")
//!     .build()
//!     .unwrap();
//!
//! let filter = FilterExpression::tag_equals("user", "Sam")
//!     .unwrap()
//!     .and(FilterExpression::numeric_greater_than("age", 10.0).unwrap());
//!
//! assert_eq!(filter.compile(&schema).unwrap(), "(@user:{Sam} @age:[(10 +inf])");
//! ```
//!
//! # Grouping
//!
//! ```text
//! and(a, b)             → (a b)
//! or(a, b)              → (a | b)
//! and(and(a, b), c)     → (a b c)          same-operator chains flatten
//! or(and(a, b), c)      → ((a b) | c)      mixed nesting always parenthesised
//! and(MatchAll, a)      → a                MatchAll is elided
//! and(MatchAll, MatchAll) → *
//! negate(a)             → (-a)
//! ```

use std::sync::{Arc, OnceLock};

use super::escape::{
    escape_tag, escape_text, format_geo, format_numeric_bound, BoundSide, GeoUnit, MATCH_ALL,
};
use crate::error::QueryError;
use crate::schema::{FieldKind, IndexSchema};

/// One end of a numeric range
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericBound {
    Unbounded,
    Inclusive(f64),
    Exclusive(f64),
}

impl NumericBound {
    fn value(&self) -> Option<f64> {
        match self {
            NumericBound::Unbounded => None,
            NumericBound::Inclusive(v) | NumericBound::Exclusive(v) => Some(*v),
        }
    }
}

/// A single typed filter condition on one field
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `@field:{v1|v2}` - matches any of the values
    TagMatch { field: String, values: Vec<String> },
    /// `@field:[lower upper]`
    NumericRange {
        field: String,
        lower: NumericBound,
        upper: NumericBound,
    },
    /// `@field:[lon lat radius unit]`
    GeoRadius {
        field: String,
        lon: f64,
        lat: f64,
        radius: f64,
        unit: GeoUnit,
    },
    /// `@field:pattern`, or `@field:pattern*` when fuzzy
    TextMatch {
        field: String,
        pattern: String,
        fuzzy: bool,
    },
    /// `*`
    MatchAll,
}

impl Predicate {
    pub fn tag_match<I, S>(field: impl Into<String>, values: I) -> Result<Self, QueryError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let predicate = Predicate::TagMatch {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        };
        predicate.check_operands()?;
        Ok(predicate)
    }

    pub fn numeric_range(
        field: impl Into<String>,
        lower: NumericBound,
        upper: NumericBound,
    ) -> Result<Self, QueryError> {
        let predicate = Predicate::NumericRange {
            field: field.into(),
            lower,
            upper,
        };
        predicate.check_operands()?;
        Ok(predicate)
    }

    pub fn geo_radius(
        field: impl Into<String>,
        lon: f64,
        lat: f64,
        radius: f64,
        unit: GeoUnit,
    ) -> Result<Self, QueryError> {
        let predicate = Predicate::GeoRadius {
            field: field.into(),
            lon,
            lat,
            radius,
            unit,
        };
        predicate.check_operands()?;
        Ok(predicate)
    }

    pub fn text_match(
        field: impl Into<String>,
        pattern: impl Into<String>,
        fuzzy: bool,
    ) -> Result<Self, QueryError> {
        let predicate = Predicate::TextMatch {
            field: field.into(),
            pattern: pattern.into(),
            fuzzy,
        };
        predicate.check_operands()?;
        Ok(predicate)
    }

    /// Field this predicate filters on; `None` for MatchAll.
    pub fn field(&self) -> Option<&str> {
        match self {
            Predicate::TagMatch { field, .. }
            | Predicate::NumericRange { field, .. }
            | Predicate::GeoRadius { field, .. }
            | Predicate::TextMatch { field, .. } => Some(field),
            Predicate::MatchAll => None,
        }
    }

    fn expected_kind(&self) -> Option<FieldKind> {
        match self {
            Predicate::TagMatch { .. } => Some(FieldKind::Tag),
            Predicate::NumericRange { .. } => Some(FieldKind::Numeric),
            Predicate::GeoRadius { .. } => Some(FieldKind::Geo),
            Predicate::TextMatch { .. } => Some(FieldKind::Text),
            Predicate::MatchAll => None,
        }
    }

    /// Render the grammar fragment after checking the field against the schema.
    pub fn compile(&self, schema: &IndexSchema) -> Result<String, QueryError> {
        self.check_operands()?;
        if let (Some(field), Some(kind)) = (self.field(), self.expected_kind()) {
            schema.require_field(field, kind)?;
        }

        let fragment = match self {
            Predicate::TagMatch { field, values } => {
                let tags = values
                    .iter()
                    .map(|v| escape_tag(v))
                    .collect::<Vec<_>>()
                    .join("|");
                format!("@{}:{{{}}}", field, tags)
            }
            Predicate::NumericRange { field, lower, upper } => format!(
                "@{}:[{} {}]",
                field,
                format_numeric_bound(lower, BoundSide::Lower),
                format_numeric_bound(upper, BoundSide::Upper)
            ),
            Predicate::GeoRadius {
                field,
                lon,
                lat,
                radius,
                unit,
            } => format!("@{}:[{}]", field, format_geo(*lon, *lat, *radius, *unit)),
            Predicate::TextMatch {
                field,
                pattern,
                fuzzy,
            } => {
                let mut escaped = escape_text(pattern.trim(), *fuzzy);
                if *fuzzy && !escaped.contains(['*', '%']) {
                    escaped.push('*');
                }
                if escaped.contains(char::is_whitespace) {
                    format!("@{}:({})", field, escaped)
                } else {
                    format!("@{}:{}", field, escaped)
                }
            }
            Predicate::MatchAll => MATCH_ALL.to_string(),
        };

        Ok(fragment)
    }

    fn check_operands(&self) -> Result<(), QueryError> {
        match self {
            Predicate::TagMatch { field, values } => {
                if values.is_empty() || values.iter().any(|v| v.is_empty()) {
                    return Err(QueryError::EmptyValue(field.clone()));
                }
            }
            Predicate::NumericRange { field, lower, upper } => {
                let invalid = |reason: String| QueryError::InvalidRange {
                    field: field.clone(),
                    reason,
                };
                for v in [lower.value(), upper.value()].into_iter().flatten() {
                    if !v.is_finite() {
                        return Err(invalid(format!("bound {} is not a finite number", v)));
                    }
                }
                if let (Some(lo), Some(hi)) = (lower.value(), upper.value()) {
                    if lo > hi {
                        let reason = format!("lower bound {} exceeds upper bound {}", lo, hi);
                        return Err(invalid(reason));
                    }
                    let both_inclusive = matches!(
                        (lower, upper),
                        (NumericBound::Inclusive(_), NumericBound::Inclusive(_))
                    );
                    if lo == hi && !both_inclusive {
                        return Err(invalid(format!("range ({} {}) is empty", lo, hi)));
                    }
                }
            }
            Predicate::GeoRadius {
                field,
                lon,
                lat,
                radius,
                ..
            } => {
                let invalid = |reason: String| QueryError::InvalidGeo {
                    field: field.clone(),
                    reason,
                };
                if !(-180.0..=180.0).contains(lon) {
                    return Err(invalid(format!("longitude {} outside [-180, 180]", lon)));
                }
                if !(-90.0..=90.0).contains(lat) {
                    return Err(invalid(format!("latitude {} outside [-90, 90]", lat)));
                }
                if !radius.is_finite() || *radius <= 0.0 {
                    return Err(invalid(format!("radius {} must be > 0", radius)));
                }
            }
            Predicate::TextMatch { field, pattern, .. } => {
                if pattern.trim().is_empty() {
                    return Err(QueryError::EmptyValue(field.clone()));
                }
            }
            Predicate::MatchAll => {}
        }
        Ok(())
    }
}

/// Boolean combinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    And,
    Or,
}

/// Immutable expression tree over predicates
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpression {
    Predicate(Predicate),
    And(Arc<FilterExpression>, Arc<FilterExpression>),
    Or(Arc<FilterExpression>, Arc<FilterExpression>),
    Not(Arc<FilterExpression>),
}

impl Default for FilterExpression {
    fn default() -> Self {
        Self::match_all()
    }
}

impl From<Predicate> for FilterExpression {
    fn from(predicate: Predicate) -> Self {
        FilterExpression::Predicate(predicate)
    }
}

impl FilterExpression {
    /// The neutral filter: matches every document
    pub fn match_all() -> Self {
        FilterExpression::Predicate(Predicate::MatchAll)
    }

    /// `@field:{value}`
    pub fn tag_equals(
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, QueryError> {
        Predicate::tag_match(field, [value.into()]).map(Self::from)
    }

    /// `@field:{v1|v2|...}` - any of the values
    pub fn tag_in<I, S>(field: impl Into<String>, values: I) -> Result<Self, QueryError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Predicate::tag_match(field, values).map(Self::from)
    }

    /// `(-@field:{value})`
    pub fn tag_not_equals(
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, QueryError> {
        Self::tag_equals(field, value).map(Self::negate)
    }

    pub fn numeric_range(
        field: impl Into<String>,
        lower: NumericBound,
        upper: NumericBound,
    ) -> Result<Self, QueryError> {
        Predicate::numeric_range(field, lower, upper).map(Self::from)
    }

    /// `@field:[v v]`
    pub fn numeric_equals(field: impl Into<String>, value: f64) -> Result<Self, QueryError> {
        Self::numeric_range(field, NumericBound::Inclusive(value), NumericBound::Inclusive(value))
    }

    /// `(-@field:[v v])`
    pub fn numeric_not_equals(field: impl Into<String>, value: f64) -> Result<Self, QueryError> {
        Self::numeric_equals(field, value).map(Self::negate)
    }

    /// `@field:[(v +inf]`
    pub fn numeric_greater_than(field: impl Into<String>, value: f64) -> Result<Self, QueryError> {
        Self::numeric_range(field, NumericBound::Exclusive(value), NumericBound::Unbounded)
    }

    /// `@field:[v +inf]`
    pub fn numeric_greater_or_equal(
        field: impl Into<String>,
        value: f64,
    ) -> Result<Self, QueryError> {
        Self::numeric_range(field, NumericBound::Inclusive(value), NumericBound::Unbounded)
    }

    /// `@field:[-inf (v]`
    pub fn numeric_less_than(field: impl Into<String>, value: f64) -> Result<Self, QueryError> {
        Self::numeric_range(field, NumericBound::Unbounded, NumericBound::Exclusive(value))
    }

    /// `@field:[-inf v]`
    pub fn numeric_less_or_equal(field: impl Into<String>, value: f64) -> Result<Self, QueryError> {
        Self::numeric_range(field, NumericBound::Unbounded, NumericBound::Inclusive(value))
    }

    /// `@field:[lower upper]`, both ends inclusive
    pub fn numeric_between(
        field: impl Into<String>,
        lower: f64,
        upper: f64,
    ) -> Result<Self, QueryError> {
        Self::numeric_range(field, NumericBound::Inclusive(lower), NumericBound::Inclusive(upper))
    }

    /// Documents within `radius` of (`lon`, `lat`)
    pub fn geo_radius(
        field: impl Into<String>,
        lon: f64,
        lat: f64,
        radius: f64,
        unit: GeoUnit,
    ) -> Result<Self, QueryError> {
        Predicate::geo_radius(field, lon, lat, radius, unit).map(Self::from)
    }

    /// Full-text match; multi-word patterns become phrases
    pub fn text_match(
        field: impl Into<String>,
        pattern: impl Into<String>,
    ) -> Result<Self, QueryError> {
        Predicate::text_match(field, pattern, false).map(Self::from)
    }

    /// Full-text match honouring `*` / `%` wildcards, prefix-matching otherwise
    pub fn text_fuzzy(
        field: impl Into<String>,
        pattern: impl Into<String>,
    ) -> Result<Self, QueryError> {
        Predicate::text_match(field, pattern, true).map(Self::from)
    }

    pub fn text_not_equals(
        field: impl Into<String>,
        pattern: impl Into<String>,
    ) -> Result<Self, QueryError> {
        Self::text_match(field, pattern).map(Self::negate)
    }

    /// Combine with AND
    pub fn and(self, other: FilterExpression) -> Self {
        FilterExpression::And(Arc::new(self), Arc::new(other))
    }

    /// Combine with OR
    pub fn or(self, other: FilterExpression) -> Self {
        FilterExpression::Or(Arc::new(self), Arc::new(other))
    }

    /// Negate expression
    pub fn negate(self) -> Self {
        FilterExpression::Not(Arc::new(self))
    }

    /// AND over every expression; MatchAll when empty.
    pub fn all_of<I: IntoIterator<Item = FilterExpression>>(expressions: I) -> Self {
        balanced(expressions.into_iter().collect(), FilterExpression::and)
    }

    /// OR over every expression; MatchAll when empty.
    pub fn any_of<I: IntoIterator<Item = FilterExpression>>(expressions: I) -> Self {
        balanced(expressions.into_iter().collect(), FilterExpression::or)
    }

    /// Compile to a query string, checking every predicate against the schema.
    ///
    /// Pure: the same tree and schema always give the same string.
    pub fn compile(&self, schema: &IndexSchema) -> Result<String, QueryError> {
        Ok(self.render(schema)?.unwrap_or_else(|| MATCH_ALL.to_string()))
    }

    /// Check every predicate against the schema without keeping the output.
    pub fn validate(&self, schema: &IndexSchema) -> Result<(), QueryError> {
        self.render(schema).map(|_| ())
    }

    /// `None` means the subtree reduced to match-all and was elided.
    fn render(&self, schema: &IndexSchema) -> Result<Option<String>, QueryError> {
        match self {
            FilterExpression::Predicate(Predicate::MatchAll) => Ok(None),
            FilterExpression::Predicate(predicate) => predicate.compile(schema).map(Some),
            FilterExpression::And(..) => self.render_group(Combinator::And, schema),
            FilterExpression::Or(..) => self.render_group(Combinator::Or, schema),
            FilterExpression::Not(inner) => match inner.render(schema)? {
                Some(fragment) => Ok(Some(format!("(-{})", fragment))),
                None => Err(QueryError::NegatedMatchAll),
            },
        }
    }

    fn render_group(
        &self,
        op: Combinator,
        schema: &IndexSchema,
    ) -> Result<Option<String>, QueryError> {
        let mut operands = Vec::new();
        self.flatten(op, &mut operands);

        let mut parts = Vec::with_capacity(operands.len());
        for operand in operands {
            if let Some(fragment) = operand.render(schema)? {
                parts.push(fragment);
            }
        }

        let separator = match op {
            Combinator::And => " ",
            Combinator::Or => " | ",
        };

        Ok(match parts.len() {
            0 => None,
            1 => parts.pop(),
            _ => Some(format!("({})", parts.join(separator))),
        })
    }

    /// Collect the operands of a chain of `op` nodes, left to right.
    fn flatten<'a>(&'a self, op: Combinator, out: &mut Vec<&'a FilterExpression>) {
        match (self, op) {
            (FilterExpression::And(left, right), Combinator::And)
            | (FilterExpression::Or(left, right), Combinator::Or) => {
                left.flatten(op, out);
                right.flatten(op, out);
            }
            _ => out.push(self),
        }
    }
}

/// Join pairwise, level by level, keeping operand order. Depth stays
/// logarithmic and flattening renders it exactly like a left fold.
fn balanced(
    mut nodes: Vec<FilterExpression>,
    join: fn(FilterExpression, FilterExpression) -> FilterExpression,
) -> FilterExpression {
    while nodes.len() > 1 {
        let mut next = Vec::with_capacity(nodes.len().div_ceil(2));
        let mut pending = nodes.into_iter();
        while let Some(left) = pending.next() {
            next.push(match pending.next() {
                Some(right) => join(left, right),
                None => left,
            });
        }
        nodes = next;
    }
    nodes.pop().unwrap_or_default()
}

/// Placeholder swapped into a node's child slots while it is torn down
fn detached() -> Arc<FilterExpression> {
    static LEAF: OnceLock<Arc<FilterExpression>> = OnceLock::new();
    LEAF.get_or_init(|| Arc::new(FilterExpression::match_all())).clone()
}

// Unlinks uniquely owned children onto a heap stack so dropping a deep
// chain never recurses.
impl Drop for FilterExpression {
    fn drop(&mut self) {
        let mut stack = Vec::new();
        self.detach_children(&mut stack);
        while let Some(child) = stack.pop() {
            if let Ok(mut node) = Arc::try_unwrap(child) {
                node.detach_children(&mut stack);
            }
        }
    }
}

impl FilterExpression {
    fn detach_children(&mut self, out: &mut Vec<Arc<FilterExpression>>) {
        match self {
            FilterExpression::And(left, right) | FilterExpression::Or(left, right) => {
                out.push(std::mem::replace(left, detached()));
                out.push(std::mem::replace(right, detached()));
            }
            FilterExpression::Not(inner) => out.push(std::mem::replace(inner, detached())),
            FilterExpression::Predicate(_) => {}
        }
    }
}
