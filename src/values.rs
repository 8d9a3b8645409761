use std::collections::HashMap;

use serde::Serialize;

use crate::{
    query::FieldValue,
    record::{FieldMap, Record},
};

/// Aggregate applied per group by the `values` projection.
///
/// `Count` is the historical default: the projection reports group
/// cardinality under `dcount` no matter what the caller meant. `Sum` and
/// `Avg` genuinely fold the named numeric field; non-numeric and missing
/// values are skipped, and an average over zero numeric values is `Null`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Aggregate {
    Count,
    Sum(String),
    Avg(String),
}

/// One projection row: the group's key fields plus the aggregate outputs.
/// `dcount` is always present.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GroupRow {
    #[serde(flatten)]
    fields: FieldMap,
}

impl GroupRow {
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn dcount(&self) -> u64 {
        self.fields
            .get("dcount")
            .and_then(FieldValue::as_int)
            .unwrap_or(0) as u64
    }

    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }
}

/// Partition `records` by the tuple of the named fields' values and fold
/// each group with `aggregate`. Missing fields key as `Null`. Groups come
/// back in first-seen key order.
pub fn group_records(records: &[Record], fields: &[&str], aggregate: &Aggregate) -> Vec<GroupRow> {
    let mut order: Vec<Vec<FieldValue>> = Vec::new();
    let mut groups: HashMap<String, Vec<&Record>> = HashMap::new();

    for record in records {
        let key: Vec<FieldValue> = fields.iter().map(|f| record.value_of(f)).collect();
        // FieldValue is not hashable (floats); the serialized tuple is the
        // lookup key.
        let tag = serde_json::to_string(&key).unwrap_or_default();
        groups
            .entry(tag.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(record);
    }

    order
        .into_iter()
        .map(|key| {
            let tag = serde_json::to_string(&key).unwrap_or_default();
            let members = &groups[&tag];

            let mut row: FieldMap = fields
                .iter()
                .map(|f| f.to_string())
                .zip(key.into_iter())
                .collect();
            row.insert("dcount".to_string(), FieldValue::Int(members.len() as i64));

            match aggregate {
                Aggregate::Count => {}
                Aggregate::Sum(field) => {
                    let sum: f64 = members
                        .iter()
                        .filter_map(|r| r.value_of(field).as_number())
                        .sum();
                    row.insert("dsum".to_string(), FieldValue::Float(sum));
                }
                Aggregate::Avg(field) => {
                    let numbers: Vec<f64> = members
                        .iter()
                        .filter_map(|r| r.value_of(field).as_number())
                        .collect();
                    let avg = if numbers.is_empty() {
                        FieldValue::Null
                    } else {
                        FieldValue::Float(numbers.iter().sum::<f64>() / numbers.len() as f64)
                    };
                    row.insert("davg".to_string(), avg);
                }
            }

            GroupRow { fields: row }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ToFieldValue;

    fn record(id: &str, pairs: &[(&str, FieldValue)]) -> Record {
        let fields = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        Record::new(id, fields)
    }

    #[test]
    fn groups_cover_distinct_keys_and_counts_sum_to_input() {
        let records = vec![
            record("1", &[("k", "a".to_field_value())]),
            record("2", &[("k", "a".to_field_value())]),
            record("3", &[("k", "b".to_field_value())]),
        ];

        let rows = group_records(&records, &["k"], &Aggregate::Count);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows.iter().map(GroupRow::dcount).sum::<u64>(), 3);

        let a = rows
            .iter()
            .find(|r| r.get("k").and_then(FieldValue::as_str) == Some("a"))
            .unwrap();
        assert_eq!(a.dcount(), 2);
        let b = rows
            .iter()
            .find(|r| r.get("k").and_then(FieldValue::as_str) == Some("b"))
            .unwrap();
        assert_eq!(b.dcount(), 1);
    }

    #[test]
    fn multi_field_keys_form_tuples() {
        let records = vec![
            record("1", &[("a", 1.to_field_value()), ("b", "x".to_field_value())]),
            record("2", &[("a", 1.to_field_value()), ("b", "y".to_field_value())]),
            record("3", &[("a", 1.to_field_value()), ("b", "x".to_field_value())]),
        ];

        let rows = group_records(&records, &["a", "b"], &Aggregate::Count);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("a"), Some(&FieldValue::Int(1)));
        assert_eq!(rows[0].get("b"), Some(&FieldValue::String("x".into())));
        assert_eq!(rows[0].dcount(), 2);
    }

    #[test]
    fn missing_fields_group_under_null() {
        let records = vec![
            record("1", &[("k", "a".to_field_value())]),
            record("2", &[]),
        ];

        let rows = group_records(&records, &["k"], &Aggregate::Count);
        assert_eq!(rows.len(), 2);
        let null_row = rows.iter().find(|r| r.get("k") == Some(&FieldValue::Null));
        assert!(null_row.is_some());
    }

    #[test]
    fn sum_and_avg_fold_numeric_fields() {
        let records = vec![
            record("1", &[("k", "a".to_field_value()), ("n", 10.to_field_value())]),
            record("2", &[("k", "a".to_field_value()), ("n", 20.to_field_value())]),
            record("3", &[("k", "a".to_field_value()), ("n", "nan".to_field_value())]),
        ];

        let sums = group_records(&records, &["k"], &Aggregate::Sum("n".into()));
        assert_eq!(sums[0].get("dsum"), Some(&FieldValue::Float(30.0)));
        assert_eq!(sums[0].dcount(), 3);

        let avgs = group_records(&records, &["k"], &Aggregate::Avg("n".into()));
        assert_eq!(avgs[0].get("davg"), Some(&FieldValue::Float(15.0)));
    }

    #[test]
    fn avg_over_no_numbers_is_null() {
        let records = vec![record("1", &[("k", "a".to_field_value())])];
        let rows = group_records(&records, &["k"], &Aggregate::Avg("n".into()));
        assert_eq!(rows[0].get("davg"), Some(&FieldValue::Null));
    }

    #[test]
    fn first_seen_key_order() {
        let records = vec![
            record("1", &[("k", "b".to_field_value())]),
            record("2", &[("k", "a".to_field_value())]),
            record("3", &[("k", "b".to_field_value())]),
        ];

        let rows = group_records(&records, &["k"], &Aggregate::Count);
        assert_eq!(rows[0].get("k").and_then(FieldValue::as_str), Some("b"));
        assert_eq!(rows[1].get("k").and_then(FieldValue::as_str), Some("a"));
    }
}
