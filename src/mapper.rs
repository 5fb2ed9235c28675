//! Canonical field mapping.
//!
//! Maps arbitrary raw column names onto the fixed canonical sales schema
//! using an ordered regex rule list. Rules are tested in precedence order
//! and the first match wins; no further rules are consulted for that
//! column. Each column is classified independently of every other column,
//! so two raw columns can legitimately claim the same canonical field.
//! That ambiguity is resolved (and surfaced) by [`build_column_map`], not
//! by the classifier.

use std::{collections::BTreeMap, fmt, sync::OnceLock};

use heck::ToSnakeCase;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const MATCH_BASE_CONFIDENCE: f64 = 0.5;
pub const PATTERN_MATCH_BONUS: f64 = 0.4;

/// The fixed set of semantic roles a raw column may be mapped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    OrderId,
    Product,
    Timestamp,
    Quantity,
    Price,
    Revenue,
    Channel,
    City,
    State,
    Zip,
    SourceFile,
    OriginalColumn,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 12] = [
        CanonicalField::OrderId,
        CanonicalField::Product,
        CanonicalField::Timestamp,
        CanonicalField::Quantity,
        CanonicalField::Price,
        CanonicalField::Revenue,
        CanonicalField::Channel,
        CanonicalField::City,
        CanonicalField::State,
        CanonicalField::Zip,
        CanonicalField::SourceFile,
        CanonicalField::OriginalColumn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::OrderId => "order_id",
            CanonicalField::Product => "product",
            CanonicalField::Timestamp => "timestamp",
            CanonicalField::Quantity => "quantity",
            CanonicalField::Price => "price",
            CanonicalField::Revenue => "revenue",
            CanonicalField::Channel => "channel",
            CanonicalField::City => "city",
            CanonicalField::State => "state",
            CanonicalField::Zip => "zip",
            CanonicalField::SourceFile => "source_file",
            CanonicalField::OriginalColumn => "original_column",
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classification result for a single raw column name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInference {
    pub original_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_name: Option<CanonicalField>,
    pub confidence: f64,
    pub reason: String,
}

/// Canonical field → raw column name, after folding the inference set.
pub type ColumnMap = BTreeMap<CanonicalField, String>;

/// Two raw columns claimed the same canonical field; the later one won.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingWarning {
    pub field: CanonicalField,
    pub kept: String,
    pub discarded: String,
}

impl fmt::Display for MappingWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Columns '{}' and '{}' both map to {}; keeping '{}'",
            self.discarded, self.kept, self.field, self.kept
        )
    }
}

struct MappingRule {
    field: CanonicalField,
    pattern: Regex,
    token: &'static str,
}

// Precedence order matters: the first rule whose pattern matches wins.
// `order_date` maps to order_id, not timestamp, because the order_id rule
// is tested first. source_file and original_column are bookkeeping fields
// with no name rule of their own.
const RULE_PATTERNS: &[(CanonicalField, &str)] = &[
    (CanonicalField::OrderId, r"order|invoice|receipt|transaction|txn"),
    (CanonicalField::Product, r"product|item|sku|title"),
    (CanonicalField::Timestamp, r"date|time|timestamp|created|day"),
    (CanonicalField::Quantity, r"qty|quantity|units_sold|num_units"),
    (CanonicalField::Price, r"price|unit_cost|cost|rate"),
    (CanonicalField::Revenue, r"revenue|amount|total|gross|sales$"),
    (CanonicalField::Channel, r"channel|source|medium|platform|store"),
    (CanonicalField::City, r"city|town|municipality"),
    (CanonicalField::State, r"state|province|region"),
    (CanonicalField::Zip, r"zip|postal|postcode"),
];

fn rules() -> &'static [MappingRule] {
    static RULES: OnceLock<Vec<MappingRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        RULE_PATTERNS
            .iter()
            .map(|&(field, token)| MappingRule {
                field,
                pattern: Regex::new(token).expect("rule patterns are literals"),
                token,
            })
            .collect()
    })
}

/// Unifies `OrderDate`, `order date`, and `order-date` before rule
/// matching.
pub fn normalize_header(name: &str) -> String {
    name.trim().to_snake_case()
}

/// Classifies one raw column name. Pure and total: every input produces a
/// result, possibly with no canonical assignment.
pub fn infer(column_name: &str) -> ColumnInference {
    let normalized = normalize_header(column_name);
    for rule in rules() {
        if rule.pattern.is_match(&normalized) {
            return ColumnInference {
                original_name: column_name.to_string(),
                canonical_name: Some(rule.field),
                confidence: MATCH_BASE_CONFIDENCE + PATTERN_MATCH_BONUS,
                reason: format!("'{normalized}' matched /{}/ for {}", rule.token, rule.field),
            };
        }
    }
    ColumnInference {
        original_name: column_name.to_string(),
        canonical_name: None,
        confidence: 0.0,
        reason: format!("'{normalized}' matched no canonical pattern"),
    }
}

/// Folds a set of column inferences into a canonical-field → raw-column
/// map. When several columns claim the same field the later one overwrites
/// the earlier, and the collision is reported rather than silently
/// dropped.
pub fn build_column_map(inferences: &[ColumnInference]) -> (ColumnMap, Vec<MappingWarning>) {
    let mut map = ColumnMap::new();
    let mut warnings = Vec::new();
    for inference in inferences {
        let Some(field) = inference.canonical_name else {
            continue;
        };
        if let Some(previous) = map.insert(field, inference.original_name.clone()) {
            warnings.push(MappingWarning {
                field,
                kept: inference.original_name.clone(),
                discarded: previous,
            });
        }
    }
    (map, warnings)
}
