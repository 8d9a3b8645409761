use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::query::FieldValue;

/// Field name → value mapping of one document.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// One materialized document: a dynamic bag of fields plus its identity.
/// Records are built once — by materialization or by `create` — and never
/// mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    id: String,
    #[serde(flatten)]
    fields: FieldMap,
}

impl Record {
    pub fn new(id: impl Into<String>, fields: FieldMap) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Field value with the identity visible under `"id"`, the way the raw
    /// document carried it. Missing fields read as `Null`.
    pub fn value_of(&self, field: &str) -> FieldValue {
        if field == "id" {
            return FieldValue::String(self.id.clone());
        }
        self.fields.get(field).cloned().unwrap_or(FieldValue::Null)
    }

    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }
}
