pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

use async_trait::async_trait;
pub use memory::MemoryAdapter;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteAdapter;

use crate::{error::Error, query::Constraint, record::FieldMap};

/// -----------------------------
/// Storage contract
/// -----------------------------
///
/// The remote store offers per-collection document storage keyed by string
/// identity: full-document overwrite, delete by identity, and a streaming
/// read of all documents matching a conjunction of equality/range
/// constraints. Nothing else — no OR, no joins, no server-side aggregates.
#[async_trait]
pub trait Adapter: Send + Sync + 'static {
    /// Set or overwrite the full document under `id`.
    async fn set_document(
        &self,
        collection: &str,
        id: &str,
        fields: &FieldMap,
    ) -> Result<(), Error>;

    /// Delete one document by identity. Deleting an absent id is not an
    /// error.
    async fn delete_document(&self, collection: &str, id: &str) -> Result<(), Error>;

    /// Fetch every document in `collection` satisfying all `constraints`,
    /// as `(id, fields)` pairs in the store's return order.
    async fn stream_documents(
        &self,
        collection: &str,
        constraints: &[Constraint],
    ) -> Result<Vec<(String, FieldMap)>, Error>;
}
