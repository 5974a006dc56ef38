//! Field-name heuristics used by the realistic flavor.

use std::sync::OnceLock;

use regex::Regex;

use crate::provider::SemanticKind;

/// Numeric value shape inferred from a field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericShape {
    Currency,
    Age,
    Quantity,
    Rating,
    Percent,
    Year,
    Generic,
}

impl NumericShape {
    /// Default `(min, max)` for the shape when the field declares no bounds.
    pub fn default_range(self) -> (f64, f64) {
        match self {
            NumericShape::Currency => (1.0, 1000.0),
            NumericShape::Age => (18.0, 90.0),
            NumericShape::Quantity => (0.0, 100.0),
            NumericShape::Rating => (1.0, 5.0),
            NumericShape::Percent => (0.0, 100.0),
            NumericShape::Year => (1950.0, 2030.0),
            NumericShape::Generic => (1.0, 10_000.0),
        }
    }

    pub fn default_decimal_places(self) -> Option<u32> {
        match self {
            NumericShape::Currency => Some(2),
            _ => None,
        }
    }
}

/// Temporal value shape inferred from a field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalShape {
    Timestamp,
    Date,
    BirthDate,
}

const TEXT_RULES: &[(&str, SemanticKind)] = &[
    (r"e_?mail", SemanticKind::Email),
    (r"(^|_)(user_?name|login|handle|nickname)($|_)", SemanticKind::Username),
    (r"(^|_)(first|given)_?name($|_)", SemanticKind::FirstName),
    (r"(^|_)(last|family|sur)_?name($|_)", SemanticKind::LastName),
    (r"(^|_)(company|organization|organisation|employer|brand|vendor)($|_)", SemanticKind::Company),
    (r"(^|_)(city|town)($|_)", SemanticKind::City),
    (r"(^|_)(address|street)($|_)", SemanticKind::StreetAddress),
    (r"(^|_)country($|_)", SemanticKind::Country),
    (r"(^|_)(zip|postal|postcode|zip_code|postal_code)($|_)", SemanticKind::PostalCode),
    (r"(^|_)(phone|mobile|tel|telephone)($|_)", SemanticKind::Phone),
    (r"(^|_)(url|website|homepage|link)($|_)", SemanticKind::Url),
    (r"(^|_)(job|occupation|position|profession)($|_)", SemanticKind::JobTitle),
    (r"(^|_)slug($|_)", SemanticKind::Slug),
    (r"(^|_)colou?r($|_)", SemanticKind::Color),
    (r"(^|_)(title|headline|subject|caption)($|_)", SemanticKind::Sentence),
    (
        r"(^|_)(description|bio|body|content|summary|notes?|comment|text|message)($|_)",
        SemanticKind::Paragraph,
    ),
    (r"(^|_)(full_)?name($|_)|(^|_)(author|owner|contact|customer)($|_)", SemanticKind::FullName),
];

const NUMERIC_RULES: &[(&str, NumericShape)] = &[
    (r"(^|_)(price|cost|amount|total|subtotal|balance|salary|fee|revenue)s?($|_)", NumericShape::Currency),
    (r"(^|_)age($|_)", NumericShape::Age),
    (r"(^|_)(qty|quantity|count|stock|inventory)($|_)", NumericShape::Quantity),
    (r"(^|_)(rating|score|stars)($|_)", NumericShape::Rating),
    (r"(^|_)(percent|percentage|pct|ratio|rate)($|_)", NumericShape::Percent),
    (r"(^|_)year($|_)", NumericShape::Year),
];

const TIMESTAMP_PATTERN: &str = r"(_at$|(^|_)(time|timestamp|datetime|created|updated|modified)($|_))";
const BIRTH_PATTERN: &str = r"(^|_)(birth|dob|birthday|born)($|_)";

fn compile<T: Copy>(rules: &[(&str, T)]) -> Vec<(Regex, T)> {
    rules
        .iter()
        .filter_map(|(pattern, value)| Regex::new(pattern).ok().map(|regex| (regex, *value)))
        .collect()
}

fn text_rules() -> &'static [(Regex, SemanticKind)] {
    static RULES: OnceLock<Vec<(Regex, SemanticKind)>> = OnceLock::new();
    RULES.get_or_init(|| compile(TEXT_RULES))
}

fn numeric_rules() -> &'static [(Regex, NumericShape)] {
    static RULES: OnceLock<Vec<(Regex, NumericShape)>> = OnceLock::new();
    RULES.get_or_init(|| compile(NUMERIC_RULES))
}

fn temporal_rules() -> &'static [(Regex, TemporalShape)] {
    static RULES: OnceLock<Vec<(Regex, TemporalShape)>> = OnceLock::new();
    RULES.get_or_init(|| {
        compile(&[
            (BIRTH_PATTERN, TemporalShape::BirthDate),
            (TIMESTAMP_PATTERN, TemporalShape::Timestamp),
        ])
    })
}

/// Lowercase snake_case form of a field name (`createdAt` -> `created_at`).
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for ch in name.chars() {
        if ch.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
            prev_lower = false;
        } else if ch.is_alphanumeric() {
            out.push(ch);
            prev_lower = true;
        } else {
            if !out.ends_with('_') {
                out.push('_');
            }
            prev_lower = false;
        }
    }
    out.trim_matches('_').to_string()
}

pub fn semantic_kind(name: &str) -> Option<SemanticKind> {
    let name = normalize_name(name);
    text_rules()
        .iter()
        .find(|(regex, _)| regex.is_match(&name))
        .map(|(_, kind)| *kind)
}

pub fn numeric_shape(name: &str) -> NumericShape {
    let name = normalize_name(name);
    numeric_rules()
        .iter()
        .find(|(regex, _)| regex.is_match(&name))
        .map(|(_, shape)| *shape)
        .unwrap_or(NumericShape::Generic)
}

pub fn temporal_shape(name: &str) -> TemporalShape {
    let name = normalize_name(name);
    temporal_rules()
        .iter()
        .find(|(regex, _)| regex.is_match(&name))
        .map(|(_, shape)| *shape)
        .unwrap_or(TemporalShape::Date)
}

/// Probability of `true` for boolean flags; `is_active`-style flags lean true.
pub fn boolean_bias(name: &str) -> f64 {
    let name = normalize_name(name);
    let positive = ["active", "enabled", "verified", "visible", "published", "available"];
    if positive.iter().any(|word| name.split('_').any(|part| part == *word)) {
        0.8
    } else if name.split('_').any(|part| part == "deleted" || part == "archived") {
        0.1
    } else {
        0.5
    }
}
