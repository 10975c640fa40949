//! Request-scoped batching and deduplication of node reads.
//!
//! Resolving a page of edges into full nodes turns into many independent
//! `get(id)` calls. A [`NodeLoader`] created for one inbound request gathers
//! those calls into batches, runs each batch's reads in parallel, and
//! remembers every ID it has seen so no node is read twice per request.

mod batch;

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::Serialize;

use crate::error::Result;
use crate::model::Node;

pub use batch::{LoadResult, NodeLoader};

/// Anything that can read a single node by ID.
pub trait NodeGetter: Send + Sync {
    /// Returns `Ok(None)` when the node does not exist.
    fn get(&self, id: &str) -> Result<Option<Node>>;
}

impl<G: NodeGetter + ?Sized> NodeGetter for Arc<G> {
    fn get(&self, id: &str) -> Result<Option<Node>> {
        (**self).get(id)
    }
}

/// Default number of IDs that fire a batch immediately.
pub const DEFAULT_MAX_BATCH: usize = 10;
/// Default delay between a batch's first ID and its fetch.
pub const DEFAULT_WAIT: Duration = Duration::from_millis(1);

/// Batching policy of a [`NodeLoader`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoaderConfig {
    /// A batch fires as soon as it holds this many IDs.
    pub max_batch: usize,
    /// Otherwise it fires this long after its first ID arrived.
    pub wait: Duration,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_batch: DEFAULT_MAX_BATCH,
            wait: DEFAULT_WAIT,
        }
    }
}

impl LoaderConfig {
    /// Sets the batch size; zero is treated as one.
    pub fn max_batch(mut self, max_batch: usize) -> Self {
        self.max_batch = max_batch.max(1);
        self
    }

    /// Sets how long a partial batch waits.
    pub fn wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }
}

/// Work done by one loader over the lifetime of a request.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct LoaderStats {
    /// Batches fetched.
    pub fetches_made: u64,
    /// Individual node reads performed.
    pub nodes_loaded: u64,
    /// When the loader was created.
    pub started_at: SystemTime,
    /// Time from creation until the stats were taken.
    pub elapsed: Duration,
}
