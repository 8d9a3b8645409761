use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use metrics::histogram;
use tokio::sync::OnceCell;

use crate::{
    error::Error,
    query::{Q, ToFieldValue},
    record::Record,
    values::{group_records, Aggregate, GroupRow},
    Adapter,
};

/// Deferred query over one collection.
///
/// A `QuerySet` accumulates a predicate and materializes its result set at
/// most once; every refinement (`filter`, `all`) returns a new instance
/// with a fresh, empty cache and never touches the receiver. On an absent
/// connection handle (soft-offline) materialization yields an empty list
/// rather than failing.
pub struct QuerySet {
    collection: String,
    handle: Option<Arc<dyn Adapter>>,
    predicate: Q,
    cache: OnceCell<Vec<Record>>,
}

impl QuerySet {
    pub(crate) fn new(collection: impl Into<String>, handle: Option<Arc<dyn Adapter>>) -> Self {
        Self {
            collection: collection.into(),
            handle,
            predicate: Q::all(),
            cache: OnceCell::new(),
        }
    }

    fn with_predicate(&self, predicate: Q) -> Self {
        Self {
            collection: self.collection.clone(),
            handle: self.handle.clone(),
            predicate,
            cache: OnceCell::new(),
        }
    }

    /// Refine with a predicate. Returns a new unmaterialized QuerySet.
    pub fn filter(&self, q: Q) -> Self {
        self.with_predicate(self.predicate.and(&q))
    }

    /// Refine with a Django-style lookup key (`"name"`, `"name__icontains"`).
    pub fn filter_key(&self, key: &str, value: impl ToFieldValue) -> Self {
        self.filter(Q::key(key, value))
    }

    pub fn where_eq(&self, field: &str, value: impl ToFieldValue) -> Self {
        self.filter(Q::eq(field, value))
    }

    pub fn where_contains(&self, field: &str, value: impl ToFieldValue) -> Self {
        self.filter(Q::contains(field, value))
    }

    /// No-op refinement: a new QuerySet with the same predicate and a fresh
    /// cache.
    pub fn all(&self) -> Self {
        self.with_predicate(self.predicate.clone())
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn predicate(&self) -> &Q {
        &self.predicate
    }

    /// Materialize (at most once) and return the cached records.
    pub async fn fetch(&self) -> Result<&[Record], Error> {
        let records = self
            .cache
            .get_or_try_init(|| self.materialize())
            .await?;
        Ok(records)
    }

    async fn materialize(&self) -> Result<Vec<Record>, Error> {
        let Some(handle) = &self.handle else {
            return Ok(Vec::new());
        };

        let start = Instant::now();
        let mut seen: HashSet<String> = HashSet::new();
        let mut records = Vec::new();

        // One native fetch per OR branch; results merge client-side,
        // deduplicated by document id in first-seen order.
        for branch in self.predicate.branches() {
            let documents = handle.stream_documents(&self.collection, branch).await?;
            for (id, fields) in documents {
                if seen.insert(id.clone()) {
                    records.push(Record::new(id, fields));
                }
            }
        }

        histogram!("corpus.fetch.duration_ms", "collection" => self.collection.clone())
            .record(start.elapsed().as_millis() as f64);
        tracing::debug!(
            collection = %self.collection,
            records = records.len(),
            branches = self.predicate.branches().len(),
            "materialized queryset"
        );

        Ok(records)
    }

    pub async fn count(&self) -> Result<usize, Error> {
        Ok(self.fetch().await?.len())
    }

    pub async fn len(&self) -> Result<usize, Error> {
        self.count().await
    }

    pub async fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.fetch().await?.is_empty())
    }

    /// First record in store-return order, or `None`.
    pub async fn first(&self) -> Result<Option<Record>, Error> {
        Ok(self.fetch().await?.first().cloned())
    }

    /// Refine with `q`, then return the first match. `Error::NotFound` is
    /// the sole signal of "no such record"; extra matches are silently
    /// ignored.
    pub async fn get(&self, q: Q) -> Result<Record, Error> {
        self.filter(q).get_first().await
    }

    /// First record of this QuerySet, or `Error::NotFound`.
    pub async fn get_first(&self) -> Result<Record, Error> {
        self.first().await?.ok_or(Error::NotFound)
    }

    /// Group the materialized records by the named fields and report each
    /// group's cardinality as `dcount`. Count is all this projection ever
    /// reports; callers needing a real sum or average use [`values_agg`].
    ///
    /// [`values_agg`]: QuerySet::values_agg
    pub async fn values(&self, fields: &[&str]) -> Result<Vec<GroupRow>, Error> {
        self.values_agg(fields, &Aggregate::Count).await
    }

    /// Grouping projection with an explicit aggregate.
    pub async fn values_agg(
        &self,
        fields: &[&str],
        aggregate: &Aggregate,
    ) -> Result<Vec<GroupRow>, Error> {
        let records = self.fetch().await?;
        Ok(group_records(records, fields, aggregate))
    }

    /// Materialize, then delete every matched document by identity.
    ///
    /// Fail-fast: the loop aborts on the first storage error and propagates
    /// it; documents already deleted stay deleted. Returns the number of
    /// documents deleted. No-op on an absent handle.
    pub async fn delete(&self) -> Result<usize, Error> {
        let Some(handle) = self.handle.clone() else {
            return Ok(0);
        };

        let records = self.fetch().await?;
        let mut deleted = 0;
        for record in records {
            handle.delete_document(&self.collection, record.id()).await?;
            deleted += 1;
        }

        tracing::debug!(
            collection = %self.collection,
            deleted,
            "deleted queryset records"
        );
        Ok(deleted)
    }
}
