//! In-memory store for dry runs and tests.
//!
//! This provides a [`Store`] backed by a `HashMap`. The store is [`Clone`] and every clone (and
//! every session handed out by its [`Connector`] implementation) shares the same map, so a writer
//! and a reader connected through the same instance observe each other's data. Submitted batches
//! are recorded so tests can inspect exactly what a workload sent.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::{BoxedStore, Connector, PreparedBatch, Store, StoreError, StoreResult};

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<u64, u64>,
    batches: Vec<Vec<(u64, u64)>>,
    reads: u64,
}

/// A [`Store`] and [`Connector`] keeping all records in process memory.
#[derive(Clone, Debug, Default)]
pub struct InMemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value stored for `key`, if any.
    pub fn get(&self, key: u64) -> Option<u64> {
        self.inner.lock().unwrap().records.get(&key).copied()
    }

    /// Returns the number of distinct keys stored.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().records.len()
    }

    /// Returns `true` if no key has been written.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().records.is_empty()
    }

    /// Returns a copy of every batch submitted so far, in submission order.
    pub fn batches(&self) -> Vec<Vec<(u64, u64)>> {
        self.inner.lock().unwrap().batches.clone()
    }

    /// Returns the number of point reads served.
    pub fn reads(&self) -> u64 {
        self.inner.lock().unwrap().reads
    }
}

#[async_trait::async_trait]
impl Connector for InMemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn connect(&self) -> StoreResult<BoxedStore> {
        Ok(Box::new(self.clone()))
    }
}

#[async_trait::async_trait]
impl Store for InMemoryStore {
    async fn execute_batch(&mut self, batch: PreparedBatch) -> StoreResult<()> {
        let PreparedBatch::Entries { entries, .. } = batch else {
            return Err(StoreError::write(
                "unsupported batch",
                "the in-memory store only executes raw entries",
            ));
        };

        // Yield like a network round trip would, so tight loops cannot starve other tasks.
        tokio::task::yield_now().await;
        let mut inner = self.inner.lock().unwrap();
        inner.records.extend(entries.iter().copied());
        inner.batches.push(entries);
        Ok(())
    }

    async fn point_read(&mut self, key: u64) -> StoreResult<u64> {
        tokio::task::yield_now().await;
        let mut inner = self.inner.lock().unwrap();
        inner.reads += 1;
        Ok(inner.records.contains_key(&key) as u64)
    }
}
