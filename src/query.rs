use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Highest assigned private-use codepoint. Bounding a range on
/// `[prefix, prefix + SENTINEL]` matches every string starting with
/// `prefix`, which is how text search is emulated over a store that
/// only understands equality and ordered comparison.
pub const TEXT_SEARCH_SENTINEL: char = '\u{f8ff}';

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Timestamp(chrono::DateTime<chrono::Utc>),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            FieldValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        match self {
            FieldValue::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Numeric view used by the aggregation projection. Ints widen to f64.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Int(i) => Some(*i as f64),
            FieldValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Ordered comparison between same-variant values. Mismatched variants
    /// are incomparable and never satisfy a range constraint.
    pub fn compare(&self, other: &FieldValue) -> Option<Ordering> {
        match (self, other) {
            (FieldValue::String(a), FieldValue::String(b)) => Some(a.cmp(b)),
            (FieldValue::Int(a), FieldValue::Int(b)) => Some(a.cmp(b)),
            (FieldValue::Float(a), FieldValue::Float(b)) => a.partial_cmp(b),
            (FieldValue::Bool(a), FieldValue::Bool(b)) => Some(a.cmp(b)),
            (FieldValue::Timestamp(a), FieldValue::Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl From<FieldValue> for serde_json::Value {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Null => serde_json::Value::Null,
            FieldValue::Bool(b) => serde_json::Value::Bool(b),
            FieldValue::Int(i) => serde_json::Value::from(i),
            FieldValue::Float(f) => serde_json::Value::from(f),
            FieldValue::String(s) => serde_json::Value::String(s),
            FieldValue::Timestamp(t) => serde_json::Value::String(t.to_rfc3339()),
        }
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => FieldValue::Null,
            serde_json::Value::Bool(b) => FieldValue::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    FieldValue::Int(i)
                } else {
                    FieldValue::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            // JSON has no timestamp type: RFC 3339 strings revive as
            // Timestamp so every store hands back the same variant it was
            // given.
            serde_json::Value::String(s) => match chrono::DateTime::parse_from_rfc3339(&s) {
                Ok(t) => FieldValue::Timestamp(t.with_timezone(&chrono::Utc)),
                Err(_) => FieldValue::String(s),
            },
            // Arrays and objects are not indexable field values; they
            // round-trip through their JSON text form.
            other => FieldValue::String(other.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(FieldValue::from(value))
    }
}

// Helper trait to convert types to FieldValue
pub trait ToFieldValue {
    fn to_field_value(&self) -> FieldValue;
}

impl ToFieldValue for FieldValue {
    fn to_field_value(&self) -> FieldValue {
        self.clone()
    }
}

impl ToFieldValue for String {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::String(self.clone())
    }
}

impl ToFieldValue for &str {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::String(self.to_string())
    }
}

impl ToFieldValue for i64 {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::Int(*self)
    }
}

impl ToFieldValue for i32 {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::Int(*self as i64)
    }
}

impl ToFieldValue for f64 {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::Float(*self)
    }
}

impl ToFieldValue for f32 {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::Float(*self as f64)
    }
}

impl ToFieldValue for bool {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::Bool(*self)
    }
}

impl ToFieldValue for chrono::DateTime<chrono::Utc> {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::Timestamp(*self)
    }
}

impl ToFieldValue for uuid::Uuid {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::String(self.to_string())
    }
}

/// The only operators the remote store evaluates natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Equal,
    GreaterThanOrEqual,
    LessThanOrEqual,
}

/// One `(field, operator, value)` triple. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub field: String,
    pub comparison: Comparison,
    pub value: FieldValue,
}

impl Constraint {
    pub fn new(field: impl Into<String>, comparison: Comparison, value: FieldValue) -> Self {
        Self {
            field: field.into(),
            comparison,
            value,
        }
    }

    /// Compile a lookup key into native constraints.
    ///
    /// `"field"` yields one equality constraint. `"field__icontains"`
    /// yields the closed range `[value, value + sentinel]`, bounding on a
    /// successor string to approximate a prefix/contains match. Any other
    /// `__suffix` falls back to equality on the bare field name.
    pub fn compile(key: &str, value: impl ToFieldValue) -> Vec<Constraint> {
        let value = value.to_field_value();
        match key.split_once("__") {
            Some((field, "icontains")) => {
                let needle = match &value {
                    FieldValue::String(s) => s.clone(),
                    other => serde_json::Value::from(other.clone())
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_default(),
                };
                let mut upper = needle.clone();
                upper.push(TEXT_SEARCH_SENTINEL);
                vec![
                    Constraint::new(field, Comparison::GreaterThanOrEqual, FieldValue::String(needle)),
                    Constraint::new(field, Comparison::LessThanOrEqual, FieldValue::String(upper)),
                ]
            }
            Some((field, _)) => vec![Constraint::new(field, Comparison::Equal, value)],
            None => vec![Constraint::new(key, Comparison::Equal, value)],
        }
    }

    /// Evaluate the constraint against one field value in process. Used by
    /// the memory adapter; the sqlite adapter pushes this down to SQL.
    pub fn matches(&self, actual: &FieldValue) -> bool {
        match self.comparison {
            Comparison::Equal => actual == &self.value,
            Comparison::GreaterThanOrEqual => matches!(
                actual.compare(&self.value),
                Some(Ordering::Greater) | Some(Ordering::Equal)
            ),
            Comparison::LessThanOrEqual => matches!(
                actual.compare(&self.value),
                Some(Ordering::Less) | Some(Ordering::Equal)
            ),
        }
    }
}

/// Composable predicate held in OR-of-ANDs form: each branch is a
/// conjunction of constraints, branches are alternatives. Predicates are
/// never mutated after creation; every combinator returns a new value.
#[derive(Debug, Clone, PartialEq)]
pub struct Q {
    branches: Vec<Vec<Constraint>>,
}

impl Q {
    /// The empty conjunction — matches everything.
    pub fn all() -> Self {
        Self {
            branches: vec![Vec::new()],
        }
    }

    pub fn eq(field: impl Into<String>, value: impl ToFieldValue) -> Self {
        Self {
            branches: vec![vec![Constraint::new(
                field,
                Comparison::Equal,
                value.to_field_value(),
            )]],
        }
    }

    /// Prefix/contains text search compiled to a closed range pair.
    pub fn contains(field: impl Into<String>, value: impl ToFieldValue) -> Self {
        let field = field.into();
        Self {
            branches: vec![Constraint::compile(&format!("{}__icontains", field), value)],
        }
    }

    /// Build from a Django-style lookup key (`"name"`, `"name__icontains"`).
    pub fn key(key: &str, value: impl ToFieldValue) -> Self {
        Self {
            branches: vec![Constraint::compile(key, value)],
        }
    }

    /// Conjunction: distributes over branches. Right-hand constraints are
    /// appended after left-hand ones, so repeated fields stay in a stable
    /// order and both sides reach the store.
    pub fn and(&self, other: &Q) -> Q {
        let mut branches = Vec::with_capacity(self.branches.len() * other.branches.len());
        for left in &self.branches {
            for right in &other.branches {
                let mut merged = left.clone();
                merged.extend(right.iter().cloned());
                branches.push(merged);
            }
        }
        Q { branches }
    }

    /// Disjunction: keeps both sides as separate branches. Materialization
    /// runs one native fetch per branch and merges client-side, deduplicated
    /// by document id.
    pub fn or(&self, other: &Q) -> Q {
        let mut branches = self.branches.clone();
        branches.extend(other.branches.iter().cloned());
        Q { branches }
    }

    pub fn branches(&self) -> &[Vec<Constraint>] {
        &self.branches
    }

    pub(crate) fn into_branches(self) -> Vec<Vec<Constraint>> {
        self.branches
    }
}

impl std::ops::BitAnd for Q {
    type Output = Q;

    fn bitand(self, rhs: Q) -> Q {
        self.and(&rhs)
    }
}

impl std::ops::BitOr for Q {
    type Output = Q;

    fn bitor(self, rhs: Q) -> Q {
        self.or(&rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_key_compiles_to_single_equality() {
        let constraints = Constraint::compile("status", "active");
        assert_eq!(constraints.len(), 1);
        assert_eq!(constraints[0].field, "status");
        assert_eq!(constraints[0].comparison, Comparison::Equal);
        assert_eq!(constraints[0].value, FieldValue::String("active".into()));
    }

    #[test]
    fn icontains_compiles_to_range_pair() {
        let constraints = Constraint::compile("name__icontains", "bob");
        assert_eq!(constraints.len(), 2);
        assert_eq!(constraints[0].field, "name");
        assert_eq!(constraints[0].comparison, Comparison::GreaterThanOrEqual);
        assert_eq!(constraints[0].value, FieldValue::String("bob".into()));
        assert_eq!(constraints[1].field, "name");
        assert_eq!(constraints[1].comparison, Comparison::LessThanOrEqual);
        assert_eq!(
            constraints[1].value,
            FieldValue::String(format!("bob{}", TEXT_SEARCH_SENTINEL))
        );
    }

    #[test]
    fn unknown_suffix_falls_back_to_equality() {
        let constraints = Constraint::compile("age__gte_typo", 21);
        assert_eq!(constraints.len(), 1);
        assert_eq!(constraints[0].field, "age");
        assert_eq!(constraints[0].comparison, Comparison::Equal);
    }

    #[test]
    fn and_distributes_over_branches() {
        let q = (Q::eq("a", 1) | Q::eq("b", 2)) & Q::eq("c", 3);
        assert_eq!(q.branches().len(), 2);
        for branch in q.branches() {
            assert_eq!(branch.len(), 2);
            assert_eq!(branch[1].field, "c");
        }
    }

    #[test]
    fn or_keeps_both_sides() {
        let q = Q::eq("a", 1) | Q::eq("a", 2);
        assert_eq!(q.branches().len(), 2);
    }

    #[test]
    fn range_matching_honours_sentinel_bound() {
        let constraints = Constraint::compile("name__icontains", "ali");
        let hit = FieldValue::String("alice".into());
        let miss = FieldValue::String("bob".into());
        assert!(constraints.iter().all(|c| c.matches(&hit)));
        assert!(!constraints.iter().all(|c| c.matches(&miss)));
    }

    #[test]
    fn timestamps_revive_from_json_strings() {
        let original = FieldValue::Timestamp(
            "2024-05-01T12:00:00Z".parse::<chrono::DateTime<chrono::Utc>>().unwrap(),
        );
        let json = serde_json::to_string(&original).unwrap();
        let back: FieldValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn plain_strings_stay_strings() {
        let back: FieldValue = serde_json::from_str("\"alice\"").unwrap();
        assert_eq!(back, FieldValue::String("alice".into()));
    }

    #[test]
    fn mismatched_variants_never_match_ranges() {
        let c = Constraint::new("age", Comparison::GreaterThanOrEqual, FieldValue::Int(10));
        assert!(!c.matches(&FieldValue::String("20".into())));
    }
}
