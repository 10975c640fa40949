//! Key-value backend abstraction.
//!
//! The graph store only needs three operations from its backend: batched
//! upserts, batched deletes by key, and a consistent read of one partition.
//! Retries, throttling and per-request size limits belong to implementations
//! of [`KvClient`], never to the store.

mod chunked;
mod memory;

use std::sync::Arc;

use crate::error::StoreError;
use crate::storage::{ConsumedCapacity, Record, RecordKey};

pub use chunked::{ChunkedKv, DEFAULT_CHUNK_SIZE};
pub use memory::{KvCalls, MemoryKv};

/// Wide-column backend holding physical records.
pub trait KvClient: Send + Sync {
    /// Upserts every record; identical keys overwrite.
    fn batch_put(&self, records: Vec<Record>) -> Result<ConsumedCapacity, StoreError>;

    /// Deletes every key; keys that do not exist are ignored.
    fn batch_delete(&self, keys: Vec<RecordKey>) -> Result<ConsumedCapacity, StoreError>;

    /// Strongly consistent read of every record whose `field` equals `value`.
    fn query_by_id(
        &self,
        field: &str,
        value: &str,
    ) -> Result<(Vec<Record>, ConsumedCapacity), StoreError>;
}

impl<C: KvClient + ?Sized> KvClient for Arc<C> {
    fn batch_put(&self, records: Vec<Record>) -> Result<ConsumedCapacity, StoreError> {
        (**self).batch_put(records)
    }

    fn batch_delete(&self, keys: Vec<RecordKey>) -> Result<ConsumedCapacity, StoreError> {
        (**self).batch_delete(keys)
    }

    fn query_by_id(
        &self,
        field: &str,
        value: &str,
    ) -> Result<(Vec<Record>, ConsumedCapacity), StoreError> {
        (**self).query_by_id(field, value)
    }
}
