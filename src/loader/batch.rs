use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Instant, SystemTime};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use super::{LoaderConfig, LoaderStats, NodeGetter};
use crate::error::{GraphError, LoadError};
use crate::model::Node;

/// Outcome of loading one ID: the node, `None` when it does not exist, or
/// the error its read failed with.
pub type LoadResult = std::result::Result<Option<Arc<Node>>, LoadError>;

/// Batches and memoizes node reads for a single request.
///
/// Create one per inbound request and pass it to everything that resolves
/// nodes for that request; never share one between requests, since cached
/// results are never invalidated.
pub struct NodeLoader<G> {
    inner: Arc<Inner<G>>,
    started_at: SystemTime,
    started: Instant,
}

struct Inner<G> {
    getter: G,
    config: LoaderConfig,
    state: Mutex<State>,
    fetches_made: AtomicU64,
    nodes_loaded: AtomicU64,
}

#[derive(Default)]
struct State {
    cache: HashMap<String, Arc<Slot>>,
    pending: Option<Batch>,
    next_batch: u64,
}

struct Batch {
    id: u64,
    keys: Vec<String>,
    slots: Vec<Arc<Slot>>,
}

#[derive(Default)]
struct Slot {
    result: Mutex<Option<LoadResult>>,
    ready: Condvar,
}

impl Slot {
    fn fill(&self, result: LoadResult) {
        *self.result.lock() = Some(result);
        self.ready.notify_all();
    }

    fn wait(&self) -> LoadResult {
        let mut result = self.result.lock();
        loop {
            if let Some(result) = result.as_ref() {
                return result.clone();
            }
            self.ready.wait(&mut result);
        }
    }
}

impl<G: NodeGetter + 'static> NodeLoader<G> {
    /// A loader reading through `getter`; `max_batch` of zero is treated as one.
    pub fn new(getter: G, config: LoaderConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                getter,
                config: LoaderConfig {
                    max_batch: config.max_batch.max(1),
                    ..config
                },
                state: Mutex::new(State::default()),
                fetches_made: AtomicU64::new(0),
                nodes_loaded: AtomicU64::new(0),
            }),
            started_at: SystemTime::now(),
            started: Instant::now(),
        }
    }

    /// Loads one node, joining whichever batch is pending.
    pub fn load(&self, id: &str) -> LoadResult {
        Inner::enqueue(&self.inner, id).wait()
    }

    /// Loads many nodes; results line up with `ids`.
    ///
    /// `nodes[i]` is `None` when the node does not exist or when `errs[i]`
    /// holds the error its read failed with.
    pub fn load_all<S: AsRef<str>>(&self, ids: &[S]) -> (Vec<Option<Arc<Node>>>, Vec<Option<LoadError>>) {
        let slots: Vec<Arc<Slot>> = ids
            .iter()
            .map(|id| Inner::enqueue(&self.inner, id.as_ref()))
            .collect();

        let mut nodes = Vec::with_capacity(slots.len());
        let mut errs = Vec::with_capacity(slots.len());
        for slot in slots {
            match slot.wait() {
                Ok(node) => {
                    nodes.push(node);
                    errs.push(None);
                }
                Err(err) => {
                    nodes.push(None);
                    errs.push(Some(err));
                }
            }
        }
        (nodes, errs)
    }

    /// Work done so far.
    pub fn stats(&self) -> LoaderStats {
        LoaderStats {
            fetches_made: self.inner.fetches_made.load(Ordering::Relaxed),
            nodes_loaded: self.inner.nodes_loaded.load(Ordering::Relaxed),
            started_at: self.started_at,
            elapsed: self.started.elapsed(),
        }
    }

    /// Ends the request and returns what the loader did during it.
    pub fn finish(self) -> LoaderStats {
        let stats = self.stats();
        debug!(
            fetches = stats.fetches_made,
            nodes = stats.nodes_loaded,
            elapsed_us = stats.elapsed.as_micros() as u64,
            "node loader finished"
        );
        stats
    }
}

impl<G: NodeGetter + 'static> Inner<G> {
    fn enqueue(this: &Arc<Self>, id: &str) -> Arc<Slot> {
        let (slot, full) = {
            let mut state = this.state.lock();
            if let Some(slot) = state.cache.get(id) {
                trace!(id, "node loader cache hit");
                return Arc::clone(slot);
            }
            let slot = Arc::new(Slot::default());
            state.cache.insert(id.to_string(), Arc::clone(&slot));

            let mut batch = match state.pending.take() {
                Some(batch) => batch,
                None => {
                    let batch_id = state.next_batch;
                    state.next_batch += 1;
                    Self::start_timer(this, batch_id);
                    Batch {
                        id: batch_id,
                        keys: Vec::new(),
                        slots: Vec::new(),
                    }
                }
            };
            batch.keys.push(id.to_string());
            batch.slots.push(Arc::clone(&slot));
            if batch.keys.len() >= this.config.max_batch {
                (slot, Some(batch))
            } else {
                state.pending = Some(batch);
                (slot, None)
            }
        };

        if let Some(batch) = full {
            let inner = Arc::clone(this);
            thread::spawn(move || inner.fetch(batch, "full"));
        }
        slot
    }

    fn start_timer(this: &Arc<Self>, batch_id: u64) {
        let inner = Arc::clone(this);
        let wait = this.config.wait;
        thread::spawn(move || {
            thread::sleep(wait);
            let batch = {
                let mut state = inner.state.lock();
                match state.pending.as_ref() {
                    Some(batch) if batch.id == batch_id => state.pending.take(),
                    _ => None,
                }
            };
            if let Some(batch) = batch {
                inner.fetch(batch, "timer");
            }
        });
    }

    /// Reads every key of the batch in parallel and fills their slots once
    /// all reads have finished.
    fn fetch(&self, batch: Batch, reason: &'static str) {
        self.fetches_made.fetch_add(1, Ordering::Relaxed);
        debug!(batch = batch.id, size = batch.keys.len(), reason, "fetching node batch");

        let results: Vec<LoadResult> = thread::scope(|scope| {
            let handles: Vec<_> = batch
                .keys
                .iter()
                .map(|key| {
                    scope.spawn(move || {
                        let result = self.getter.get(key);
                        self.nodes_loaded.fetch_add(1, Ordering::Relaxed);
                        result
                    })
                })
                .collect();
            handles
                .into_iter()
                .zip(&batch.keys)
                .map(|(handle, key)| match handle.join() {
                    Ok(Ok(node)) => Ok(node.map(Arc::new)),
                    Ok(Err(err)) => Err(LoadError::from(err)),
                    Err(_) => Err(LoadError::from(GraphError::FetchPanicked(key.clone()))),
                })
                .collect()
        });

        for (slot, result) in batch.slots.iter().zip(results) {
            slot.fill(result);
        }
    }
}
