use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::{error::Error, query::Constraint, record::FieldMap, Adapter};

#[derive(Clone, Default)]
struct MemoryStore {
    // collection → id → fields; BTreeMap keeps return order deterministic.
    collections: Arc<Mutex<HashMap<String, BTreeMap<String, FieldMap>>>>,
}

/// In-process store evaluating constraints over a `Mutex`-guarded map.
/// Doubles as the test store: `fetch_calls` counts `stream_documents`
/// invocations so tests can assert materialize-once behavior.
#[derive(Default)]
pub struct MemoryAdapter {
    store: MemoryStore,
    fetch_calls: AtomicUsize,
    set_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn set_calls(&self) -> usize {
        self.set_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// Number of documents currently stored in `collection`.
    pub fn document_count(&self, collection: &str) -> usize {
        let collections = self.store.collections.lock().unwrap();
        collections.get(collection).map_or(0, BTreeMap::len)
    }
}

#[async_trait]
impl Adapter for MemoryAdapter {
    async fn set_document(
        &self,
        collection: &str,
        id: &str,
        fields: &FieldMap,
    ) -> Result<(), Error> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        let mut collections = self.store.collections.lock().unwrap();
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), fields.clone());
        Ok(())
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<(), Error> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let mut collections = self.store.collections.lock().unwrap();
        if let Some(documents) = collections.get_mut(collection) {
            documents.remove(id);
        }
        Ok(())
    }

    async fn stream_documents(
        &self,
        collection: &str,
        constraints: &[Constraint],
    ) -> Result<Vec<(String, FieldMap)>, Error> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let collections = self.store.collections.lock().unwrap();
        let Some(documents) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let matching = documents
            .iter()
            .filter(|(_, fields)| {
                constraints.iter().all(|constraint| {
                    fields
                        .get(&constraint.field)
                        .is_some_and(|value| constraint.matches(value))
                })
            })
            .map(|(id, fields)| (id.clone(), fields.clone()))
            .collect();

        Ok(matching)
    }
}
