use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use tracing::trace;

use super::KvClient;
use crate::error::StoreError;
use crate::storage::{ConsumedCapacity, Record, RecordKey, FIELD_ID};

const READ_UNIT_BYTES: usize = 4096;

/// Number of calls a [`MemoryKv`] has served, failed calls included.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KvCalls {
    /// `batch_put` calls.
    pub batch_puts: u64,
    /// `batch_delete` calls.
    pub batch_deletes: u64,
    /// `query_by_id` calls.
    pub queries: u64,
}

/// Ordered in-memory table keyed by `(id, rng)`.
///
/// Capacity is reported the way a provisioned backend would: one write unit
/// per record written or deleted, and one read unit per started 4 KiB of
/// returned data with a minimum of one per query.
#[derive(Debug, Default)]
pub struct MemoryKv {
    rows: RwLock<BTreeMap<RecordKey, Record>>,
    failures: Mutex<VecDeque<StoreError>>,
    batch_puts: AtomicU64,
    batch_deletes: AtomicU64,
    queries: AtomicU64,
}

impl MemoryKv {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next call fail with `err`. Queued failures are consumed in
    /// order, one per call.
    pub fn fail_next(&self, err: StoreError) {
        self.failures.lock().push_back(err);
    }

    /// Calls served so far.
    pub fn calls(&self) -> KvCalls {
        KvCalls {
            batch_puts: self.batch_puts.load(Ordering::Relaxed),
            batch_deletes: self.batch_deletes.load(Ordering::Relaxed),
            queries: self.queries.load(Ordering::Relaxed),
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// True when no records are stored.
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// All keys in `(id, rng)` order.
    pub fn keys(&self) -> Vec<RecordKey> {
        self.rows.read().keys().cloned().collect()
    }

    /// Every record in `(id, rng)` order.
    pub fn records(&self) -> Vec<Record> {
        self.rows.read().values().cloned().collect()
    }

    /// True when a record with `key` is stored.
    pub fn contains(&self, key: &RecordKey) -> bool {
        self.rows.read().contains_key(key)
    }

    fn take_failure(&self) -> Result<(), StoreError> {
        match self.failures.lock().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl KvClient for MemoryKv {
    fn batch_put(&self, records: Vec<Record>) -> Result<ConsumedCapacity, StoreError> {
        self.batch_puts.fetch_add(1, Ordering::Relaxed);
        self.take_failure()?;
        let keyed = records
            .into_iter()
            .map(|record| match record.key() {
                Some(key) => Ok((key, record)),
                None => Err(StoreError::Rejected(
                    "record is missing its partition or sort key".into(),
                )),
            })
            .collect::<Result<Vec<_>, _>>()?;
        let written = keyed.len();
        let mut rows = self.rows.write();
        for (key, record) in keyed {
            rows.insert(key, record);
        }
        trace!(written, "memory kv batch put");
        Ok(ConsumedCapacity::write(written as f64))
    }

    fn batch_delete(&self, keys: Vec<RecordKey>) -> Result<ConsumedCapacity, StoreError> {
        self.batch_deletes.fetch_add(1, Ordering::Relaxed);
        self.take_failure()?;
        let requested = keys.len();
        let mut rows = self.rows.write();
        for key in &keys {
            rows.remove(key);
        }
        trace!(requested, "memory kv batch delete");
        Ok(ConsumedCapacity::write(requested as f64))
    }

    fn query_by_id(
        &self,
        field: &str,
        value: &str,
    ) -> Result<(Vec<Record>, ConsumedCapacity), StoreError> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        self.take_failure()?;
        if field != FIELD_ID {
            return Err(StoreError::Rejected(format!(
                "'{field}' is not the partition key"
            )));
        }
        let rows = self.rows.read();
        let start = RecordKey {
            id: value.to_string(),
            range: String::new(),
        };
        let records: Vec<Record> = rows
            .range(start..)
            .take_while(|(key, _)| key.id == value)
            .map(|(_, record)| record.clone())
            .collect();
        drop(rows);

        let bytes: usize = records
            .iter()
            .map(|r| serde_json::to_vec(r).map(|v| v.len()).unwrap_or(0))
            .sum();
        let units = bytes.div_ceil(READ_UNIT_BYTES).max(1);
        Ok((records, ConsumedCapacity::read(units as f64)))
    }
}
