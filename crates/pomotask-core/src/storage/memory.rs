//! In-process record store.
//!
//! Useful for tests and for embedding the core without a database file.
//! Failure injection lets callers exercise the error paths of the timer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::query::Query;
use super::{merge_fields, Collection, Document, Fields, RecordStore, StateSlot};
use crate::error::StoreError;

#[derive(Default)]
struct Inner {
    /// Insertion-ordered documents per collection.
    records: HashMap<Collection, Vec<Document>>,
    slots: HashMap<String, String>,
}

/// Mutex-guarded in-memory store.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    next_id: AtomicU64,
    fail_writes: AtomicBool,
    fail_slots: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent record write fail with a backend error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent slot read/write fail.
    pub fn fail_slots(&self, fail: bool) {
        self.fail_slots.store(fail, Ordering::SeqCst);
    }

    /// Total number of documents across all owners in a collection.
    pub fn len(&self, collection: Collection) -> usize {
        self.lock().records.get(&collection).map_or(0, Vec::len)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_writes(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::QueryFailed("injected write failure".into()));
        }
        Ok(())
    }

    fn check_slots(&self) -> Result<(), StoreError> {
        if self.fail_slots.load(Ordering::SeqCst) {
            return Err(StoreError::QueryFailed("injected slot failure".into()));
        }
        Ok(())
    }
}

fn missing(collection: Collection, id: &str) -> StoreError {
    StoreError::MissingRecord {
        collection: collection.to_string(),
        id: id.to_string(),
    }
}

impl RecordStore for MemoryStore {
    fn create(
        &self,
        collection: Collection,
        owner_id: &str,
        fields: Fields,
    ) -> Result<String, StoreError> {
        self.check_writes()?;
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("{}-{n}", collection.as_str());
        self.lock()
            .records
            .entry(collection)
            .or_default()
            .push(Document {
                id: id.clone(),
                owner_id: owner_id.to_string(),
                fields,
            });
        Ok(id)
    }

    fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self
            .lock()
            .records
            .get(&collection)
            .and_then(|docs| docs.iter().find(|d| d.id == id).cloned()))
    }

    fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        let docs = self
            .lock()
            .records
            .get(&query.collection)
            .cloned()
            .unwrap_or_default();
        Ok(query.apply(docs))
    }

    fn update(&self, collection: Collection, id: &str, patch: Fields) -> Result<(), StoreError> {
        self.check_writes()?;
        let mut inner = self.lock();
        let doc = inner
            .records
            .get_mut(&collection)
            .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
            .ok_or_else(|| missing(collection, id))?;
        merge_fields(&mut doc.fields, patch);
        Ok(())
    }

    fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        self.check_writes()?;
        let mut inner = self.lock();
        let docs = inner
            .records
            .get_mut(&collection)
            .ok_or_else(|| missing(collection, id))?;
        let before = docs.len();
        docs.retain(|d| d.id != id);
        if docs.len() == before {
            return Err(missing(collection, id));
        }
        Ok(())
    }
}

impl StateSlot for MemoryStore {
    fn slot_get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check_slots()?;
        Ok(self.lock().slots.get(key).cloned())
    }

    fn slot_set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.check_slots()?;
        self.lock().slots.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn slot_remove(&self, key: &str) -> Result<(), StoreError> {
        self.check_slots()?;
        self.lock().slots.remove(key);
        Ok(())
    }
}
