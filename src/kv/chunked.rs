use tracing::{debug, warn};

use super::KvClient;
use crate::error::StoreError;
use crate::storage::{ConsumedCapacity, Record, RecordKey};

/// Per-request item limit of common wide-column backends.
pub const DEFAULT_CHUNK_SIZE: usize = 25;

/// Splits batched writes into fixed-size requests for backends that cap them.
///
/// Chunks are sent one after another in input order. The first failing chunk
/// aborts the rest; chunks already sent stay applied, so callers see the same
/// all-or-error contract as an unchunked backend but may observe a prefix of
/// the batch on failure.
#[derive(Debug)]
pub struct ChunkedKv<C> {
    inner: C,
    chunk_size: usize,
}

impl<C: KvClient> ChunkedKv<C> {
    /// Wraps `inner` with [`DEFAULT_CHUNK_SIZE`].
    pub fn new(inner: C) -> Self {
        Self::with_chunk_size(inner, DEFAULT_CHUNK_SIZE)
    }

    /// A chunk size of zero is treated as one.
    pub fn with_chunk_size(inner: C, chunk_size: usize) -> Self {
        Self {
            inner,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Largest request sent to the inner client.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// The wrapped client.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    fn send_chunks<T>(
        &self,
        op: &'static str,
        items: Vec<T>,
        mut send: impl FnMut(&C, Vec<T>) -> Result<ConsumedCapacity, StoreError>,
    ) -> Result<ConsumedCapacity, StoreError> {
        let total = items.len();
        let mut consumed = ConsumedCapacity::default();
        let mut sent = 0;
        let mut items = items.into_iter().peekable();
        while items.peek().is_some() {
            let chunk: Vec<T> = items.by_ref().take(self.chunk_size).collect();
            let len = chunk.len();
            match send(&self.inner, chunk) {
                Ok(cc) => consumed += cc,
                Err(err) => {
                    warn!(op, sent, total, "chunked request aborted");
                    return Err(err);
                }
            }
            sent += len;
        }
        debug!(op, total, chunk_size = self.chunk_size, "chunked request complete");
        Ok(consumed)
    }
}

impl<C: KvClient> KvClient for ChunkedKv<C> {
    fn batch_put(&self, records: Vec<Record>) -> Result<ConsumedCapacity, StoreError> {
        self.send_chunks("batch_put", records, |inner, chunk| inner.batch_put(chunk))
    }

    fn batch_delete(&self, keys: Vec<RecordKey>) -> Result<ConsumedCapacity, StoreError> {
        self.send_chunks("batch_delete", keys, |inner, chunk| inner.batch_delete(chunk))
    }

    fn query_by_id(
        &self,
        field: &str,
        value: &str,
    ) -> Result<(Vec<Record>, ConsumedCapacity), StoreError> {
        self.inner.query_by_id(field, value)
    }
}
