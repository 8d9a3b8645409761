use std::sync::Arc;

use uuid::Uuid;

use crate::{
    connector::Connector,
    error::Error,
    query::{FieldValue, Q},
    queryset::QuerySet,
    record::{FieldMap, Record},
    values::{Aggregate, GroupRow},
};

/// Entry point for one named collection: a stateless factory for deferred
/// queries plus the direct write paths. One instance per logical entity
/// type is typical; cloning is cheap.
#[derive(Clone)]
pub struct Collection {
    name: String,
    connector: Arc<Connector>,
}

impl Collection {
    pub fn new(name: impl Into<String>, connector: Arc<Connector>) -> Self {
        Self {
            name: name.into(),
            connector,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Insert a new document with a generated identity and return it as a
    /// Record — exactly the supplied fields plus `id`, no read-back of
    /// server-computed state. Offline, the Record is returned without
    /// persisting.
    pub async fn create(&self, fields: FieldMap) -> Result<Record, Error> {
        let id = Uuid::new_v4().to_string();

        if let Some(handle) = self.connector.handle().await {
            // The identity is merged into the stored document itself, so
            // `id` filters work as ordinary field constraints.
            let mut document = fields.clone();
            document.insert("id".to_string(), FieldValue::String(id.clone()));
            handle.set_document(&self.name, &id, &document).await?;
        } else {
            tracing::debug!(collection = %self.name, "offline create; not persisted");
        }

        Ok(Record::new(id, fields))
    }

    /// Unconstrained deferred query over the collection.
    pub async fn all(&self) -> QuerySet {
        QuerySet::new(&self.name, self.connector.handle().await)
    }

    /// Deferred query constrained by `q`.
    pub async fn filter(&self, q: Q) -> QuerySet {
        self.all().await.filter(q)
    }

    /// Single-record lookup. `Error::NotFound` when nothing matches; the
    /// first match in store-return order otherwise.
    pub async fn get(&self, q: Q) -> Result<Record, Error> {
        self.filter(q).await.get_first().await
    }

    /// Grouped projection over the whole collection (`dcount` per group).
    pub async fn values(&self, fields: &[&str]) -> Result<Vec<GroupRow>, Error> {
        self.all().await.values(fields).await
    }

    pub async fn values_agg(
        &self,
        fields: &[&str],
        aggregate: &Aggregate,
    ) -> Result<Vec<GroupRow>, Error> {
        self.all().await.values_agg(fields, aggregate).await
    }

    /// Delete every document in the collection. Always collection-wide:
    /// filters built from this manager never narrow it. Fail-fast on the
    /// first storage error; offline it is a no-op.
    pub async fn delete_all(&self) -> Result<usize, Error> {
        self.all().await.delete().await
    }
}

/// Literal document builder.
///
/// ```rust,ignore
/// let doc = fields! { "name" => "alice", "age" => 34 };
/// users.create(doc).await?;
/// ```
#[macro_export]
macro_rules! fields {
    () => {
        $crate::record::FieldMap::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        use $crate::query::ToFieldValue;
        let mut map = $crate::record::FieldMap::new();
        $(
            map.insert($key.to_string(), $value.to_field_value());
        )+
        map
    }};
}
