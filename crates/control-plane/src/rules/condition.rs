//! Condition tree evaluation.
//!
//! A condition tree is a single `{field, operator, value}` condition or an
//! array of conditions combined with implicit AND. Evaluation is pure: the
//! record is never mutated and identical inputs give identical results.
//!
//! Operators are persisted as strings and parsed into the closed
//! [`ConditionOperator`] set at evaluation time; an unknown operator is a
//! hard evaluation error, not a silent false, since it marks a rule that
//! validation should have rejected.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// A single condition against one record field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    /// Dot-separated field path into the record.
    pub field: String,

    /// Operator name; parsed at evaluation time.
    pub operator: String,

    /// Comparison value; ignored by is_null/is_not_null.
    #[serde(default)]
    pub value: serde_json::Value,
}

/// A condition tree: one condition or an implicit-AND list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionTree {
    /// Single condition.
    Single(Condition),
    /// All conditions must hold.
    All(Vec<Condition>),
}

impl ConditionTree {
    /// The conditions in evaluation order.
    pub fn conditions(&self) -> &[Condition] {
        match self {
            Self::Single(condition) => std::slice::from_ref(condition),
            Self::All(conditions) => conditions,
        }
    }
}

/// Supported condition operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
    Contains,
    StartsWith,
    EndsWith,
    In,
    NotIn,
    IsNull,
    IsNotNull,
    MatchesRegex,
}

impl ConditionOperator {
    /// Parse an operator name. Unknown names are an evaluation error.
    pub fn parse(name: &str) -> AppResult<Self> {
        match name {
            "equals" => Ok(Self::Equals),
            "not_equals" => Ok(Self::NotEquals),
            "greater_than" => Ok(Self::GreaterThan),
            "less_than" => Ok(Self::LessThan),
            "greater_than_or_equal" => Ok(Self::GreaterThanOrEqual),
            "less_than_or_equal" => Ok(Self::LessThanOrEqual),
            "contains" => Ok(Self::Contains),
            "starts_with" => Ok(Self::StartsWith),
            "ends_with" => Ok(Self::EndsWith),
            "in" => Ok(Self::In),
            "not_in" => Ok(Self::NotIn),
            "is_null" => Ok(Self::IsNull),
            "is_not_null" => Ok(Self::IsNotNull),
            "matches_regex" => Ok(Self::MatchesRegex),
            other => Err(AppError::Evaluation(format!(
                "unknown condition operator '{}'",
                other
            ))),
        }
    }
}

/// Condition evaluator over JSON records.
#[derive(Debug, Clone, Default)]
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// Create a new condition evaluator.
    pub fn new() -> Self {
        Self
    }

    /// Evaluate a condition tree against a record (implicit AND).
    pub fn evaluate(&self, tree: &ConditionTree, record: &serde_json::Value) -> AppResult<bool> {
        for condition in tree.conditions() {
            if !self.evaluate_condition(condition, record)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Evaluate a single condition against a record.
    pub fn evaluate_condition(
        &self,
        condition: &Condition,
        record: &serde_json::Value,
    ) -> AppResult<bool> {
        let operator = ConditionOperator::parse(&condition.operator)?;
        let actual = lookup_path(record, &condition.field);
        let expected = &condition.value;

        let result = match operator {
            ConditionOperator::Equals => actual == *expected,
            ConditionOperator::NotEquals => actual != *expected,
            ConditionOperator::GreaterThan => {
                compare_values(&actual, expected) == Some(Ordering::Greater)
            }
            ConditionOperator::LessThan => {
                compare_values(&actual, expected) == Some(Ordering::Less)
            }
            ConditionOperator::GreaterThanOrEqual => matches!(
                compare_values(&actual, expected),
                Some(Ordering::Greater) | Some(Ordering::Equal)
            ),
            ConditionOperator::LessThanOrEqual => matches!(
                compare_values(&actual, expected),
                Some(Ordering::Less) | Some(Ordering::Equal)
            ),
            ConditionOperator::Contains => contains(&actual, expected),
            ConditionOperator::StartsWith => {
                string_pair(&actual, expected).is_some_and(|(a, b)| a.starts_with(&b))
            }
            ConditionOperator::EndsWith => {
                string_pair(&actual, expected).is_some_and(|(a, b)| a.ends_with(&b))
            }
            ConditionOperator::In => membership(&actual, expected).unwrap_or(false),
            ConditionOperator::NotIn => !membership(&actual, expected).unwrap_or(false),
            ConditionOperator::IsNull => actual.is_null(),
            ConditionOperator::IsNotNull => !actual.is_null(),
            ConditionOperator::MatchesRegex => {
                let pattern = expected.as_str().ok_or_else(|| {
                    AppError::Evaluation(format!(
                        "matches_regex on field '{}' requires a string pattern",
                        condition.field
                    ))
                })?;
                let re = regex::Regex::new(pattern).map_err(|e| {
                    AppError::Evaluation(format!("invalid regex pattern '{}': {}", pattern, e))
                })?;
                actual.as_str().is_some_and(|s| re.is_match(s))
            }
        };

        Ok(result)
    }
}

/// Dot-path lookup into a record. Missing intermediate nodes resolve to
/// null instead of erroring.
fn lookup_path(record: &serde_json::Value, path: &str) -> serde_json::Value {
    let mut current = record;
    for segment in path.split('.') {
        match current {
            serde_json::Value::Object(map) => match map.get(segment) {
                Some(value) => current = value,
                None => return serde_json::Value::Null,
            },
            serde_json::Value::Array(items) => match segment.parse::<usize>().ok() {
                Some(index) if index < items.len() => current = &items[index],
                _ => return serde_json::Value::Null,
            },
            _ => return serde_json::Value::Null,
        }
    }
    current.clone()
}

/// Ordering comparison: numeric when both sides are numbers (exact integer
/// paths before float fallback), lexicographic over string renderings
/// otherwise. Never errors on type mismatch.
fn compare_values(lhs: &serde_json::Value, rhs: &serde_json::Value) -> Option<Ordering> {
    if let (serde_json::Value::Number(a), serde_json::Value::Number(b)) = (lhs, rhs) {
        if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
            return Some(a.cmp(&b));
        }
        if let (Some(a), Some(b)) = (a.as_u64(), b.as_u64()) {
            return Some(a.cmp(&b));
        }
        return a.as_f64()?.partial_cmp(&b.as_f64()?);
    }
    Some(render(lhs).cmp(&render(rhs)))
}

/// String rendering used for lexicographic fallback comparison.
fn render(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `contains`: case-insensitive substring for strings, membership for
/// arrays, false for anything else.
fn contains(actual: &serde_json::Value, expected: &serde_json::Value) -> bool {
    match actual {
        serde_json::Value::String(haystack) => expected
            .as_str()
            .is_some_and(|needle| haystack.to_lowercase().contains(&needle.to_lowercase())),
        serde_json::Value::Array(items) => items.contains(expected),
        _ => false,
    }
}

/// Both sides as lowercase strings, for starts_with / ends_with.
fn string_pair(actual: &serde_json::Value, expected: &serde_json::Value) -> Option<(String, String)> {
    Some((
        actual.as_str()?.to_lowercase(),
        expected.as_str()?.to_lowercase(),
    ))
}

/// Membership of the field value in an array-valued `value`. None when the
/// expected value is not an array.
fn membership(actual: &serde_json::Value, expected: &serde_json::Value) -> Option<bool> {
    expected.as_array().map(|items| items.contains(actual))
}
