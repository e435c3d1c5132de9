// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Value Escaper
//!
//! Formats scalar operands for embedding in the RediSearch query grammar.
//! All predicate rendering goes through here so quoting rules live in one
//! place: a tag value containing `}` must never close the tag clause early.
//!
//! ```text
//! escape_tag("a b,c")              → a\ b\,c
//! format_numeric_bound(>10)        → (10
//! format_numeric_bound(unbounded)  → -inf | +inf
//! format_geo(-122.4, 37.7, 5, km)  → -122.400000 37.700000 5 km
//! escape_text("hel*", fuzzy)       → hel*
//! escape_text("hel*", exact)       → hel\*
//! ```

use std::fmt;

use super::filter::NumericBound;

/// Match-all query token
pub const MATCH_ALL: &str = "*";

/// Which end of a numeric range a bound sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundSide {
    Lower,
    Upper,
}

/// Distance unit for geo radius filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeoUnit {
    M,
    #[default]
    Km,
    Mi,
    Ft,
}

impl fmt::Display for GeoUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeoUnit::M => write!(f, "m"),
            GeoUnit::Km => write!(f, "km"),
            GeoUnit::Mi => write!(f, "mi"),
            GeoUnit::Ft => write!(f, "ft"),
        }
    }
}

fn is_tag_reserved(c: char) -> bool {
    c.is_whitespace()
        || matches!(
            c,
            '{' | '}' | '[' | ']' | '"' | '\'' | ':' | ';' | '!' | '@' | '#' | '$' | '%' | '^'
                | '&' | '*' | '(' | ')' | '-' | '+' | '=' | '~' | ',' | '.' | '<' | '>' | '/'
                | '\\' | '|'
        )
}

fn is_text_reserved(c: char) -> bool {
    matches!(
        c,
        '@' | ':' | '|' | '(' | ')' | '[' | ']' | '{' | '}' | '-' | '+' | '~' | '!' | '"' | '\''
            | ';' | '$' | '\\' | '='
    )
}

/// Backslash-escape every character the tag grammar reserves, including
/// whitespace.
pub fn escape_tag(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if is_tag_reserved(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Render a number verbatim: shortest round-trip decimal, never exponent
/// notation.
pub fn format_number(value: f64) -> String {
    value.to_string()
}

/// Render one end of a numeric range.
pub fn format_numeric_bound(bound: &NumericBound, side: BoundSide) -> String {
    match (bound, side) {
        (NumericBound::Unbounded, BoundSide::Lower) => "-inf".to_string(),
        (NumericBound::Unbounded, BoundSide::Upper) => "+inf".to_string(),
        (NumericBound::Inclusive(v), _) => format_number(*v),
        (NumericBound::Exclusive(v), _) => format!("({}", format_number(*v)),
    }
}

/// Render a geo radius operand. Coordinates always carry six decimals so the
/// output does not depend on float round-tripping.
pub fn format_geo(lon: f64, lat: f64, radius: f64, unit: GeoUnit) -> String {
    format!("{:.6} {:.6} {} {}", lon, lat, format_number(radius), unit)
}

/// Escape a full-text pattern. Whitespace is kept so multi-word patterns
/// stay phrases. With `fuzzy`, `*` and `%` are wildcard markers and pass
/// through; otherwise they are literal and escaped.
pub fn escape_text(pattern: &str, fuzzy: bool) -> String {
    let mut escaped = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        let wildcard = c == '*' || c == '%';
        if is_text_reserved(c) || (wildcard && !fuzzy) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
