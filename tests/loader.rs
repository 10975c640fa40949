#![allow(missing_docs)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use kvgraph::{
    GraphError, GraphStore, LoaderConfig, MemoryKv, Node, NodeGetter, NodeLoader, Result,
    StoreError,
};

/// Node source that counts reads and fails for IDs it was told to.
#[derive(Default)]
struct FakeGetter {
    nodes: HashMap<String, Node>,
    failing: HashMap<String, String>,
    gets: AtomicUsize,
}

impl FakeGetter {
    fn with_nodes(ids: &[&str]) -> Self {
        Self {
            nodes: ids
                .iter()
                .map(|id| (id.to_string(), Node::new(*id)))
                .collect(),
            ..Self::default()
        }
    }

    fn failing(mut self, id: &str, message: &str) -> Self {
        self.failing.insert(id.into(), message.into());
        self
    }

    fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

impl NodeGetter for FakeGetter {
    fn get(&self, id: &str) -> Result<Option<Node>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.failing.get(id) {
            return Err(GraphError::Store {
                context: "FakeGetter::get",
                source: StoreError::Unavailable(message.clone()),
            });
        }
        Ok(self.nodes.get(id).cloned())
    }
}

/// Long enough that a test's IDs always land in the same batch.
fn slow_config(max_batch: usize) -> LoaderConfig {
    LoaderConfig::default()
        .max_batch(max_batch)
        .wait(Duration::from_millis(50))
}

#[test]
fn empty_input_makes_no_fetches() {
    let getter = Arc::new(FakeGetter::default());
    let loader = NodeLoader::new(Arc::clone(&getter), LoaderConfig::default());

    let ids: [&str; 0] = [];
    let (nodes, errs) = loader.load_all(&ids);
    assert!(nodes.is_empty());
    assert!(errs.is_empty());
    assert_eq!(loader.finish().fetches_made, 0);
    assert_eq!(getter.gets(), 0);
}

#[test]
fn loads_a_single_node() {
    let getter = Arc::new(FakeGetter::with_nodes(&["a"]));
    let loader = NodeLoader::new(Arc::clone(&getter), LoaderConfig::default());

    let node = loader.load("a").unwrap().expect("a exists");
    assert_eq!(node.id, "a");
    let stats = loader.finish();
    assert_eq!(stats.fetches_made, 1);
    assert_eq!(stats.nodes_loaded, 1);
}

#[test]
fn loads_several_nodes_in_one_batch() {
    let getter = Arc::new(FakeGetter::with_nodes(&["a", "b"]));
    let loader = NodeLoader::new(Arc::clone(&getter), slow_config(10));

    let (nodes, errs) = loader.load_all(&["a", "b"]);
    let ids: Vec<&str> = nodes
        .iter()
        .map(|n| n.as_ref().map(|n| n.id.as_str()).unwrap_or_default())
        .collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert!(errs.iter().all(Option::is_none));
    assert_eq!(loader.stats().fetches_made, 1);
    assert_eq!(getter.gets(), 2);
}

#[test]
fn unknown_ids_are_absent_not_errors() {
    let getter = Arc::new(FakeGetter::with_nodes(&["a"]));
    let loader = NodeLoader::new(getter, slow_config(10));

    let (nodes, errs) = loader.load_all(&["a", "missing"]);
    assert!(nodes[0].is_some());
    assert!(nodes[1].is_none());
    assert!(errs.iter().all(Option::is_none));
}

#[test]
fn errors_are_isolated_per_key() {
    let getter = Arc::new(FakeGetter::with_nodes(&["a", "c"]).failing("b", "boom"));
    let loader = NodeLoader::new(getter, slow_config(10));

    let (nodes, errs) = loader.load_all(&["a", "b", "c"]);
    assert!(nodes[0].is_some());
    assert!(nodes[1].is_none());
    assert!(nodes[2].is_some());
    assert!(errs[0].is_none());
    assert!(errs[2].is_none());
    let err = errs[1].as_ref().expect("b failed");
    assert!(err.to_string().contains("boom"));
    assert!(matches!(err.inner(), GraphError::Store { .. }));
}

#[test]
fn duplicate_ids_are_read_once() {
    let getter = Arc::new(FakeGetter::with_nodes(&["a"]));
    let loader = NodeLoader::new(Arc::clone(&getter), slow_config(10));

    let (nodes, errs) = loader.load_all(&["a", "a"]);
    assert_eq!(nodes.len(), 2);
    assert!(nodes.iter().all(Option::is_some));
    assert!(errs.iter().all(Option::is_none));
    assert_eq!(getter.gets(), 1);
}

#[test]
fn full_batches_fire_without_waiting_for_the_timer() {
    let ids: Vec<String> = (0..12).map(|i| format!("n{i}")).collect();
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let getter = Arc::new(FakeGetter::with_nodes(&id_refs));
    let loader = NodeLoader::new(Arc::clone(&getter), slow_config(10));

    let (nodes, errs) = loader.load_all(&ids);
    assert!(nodes.iter().all(Option::is_some));
    assert!(errs.iter().all(Option::is_none));

    let stats = loader.finish();
    assert_eq!(stats.fetches_made, 2);
    assert_eq!(stats.nodes_loaded, 12);
    assert_eq!(getter.gets(), 12);
}

#[test]
fn results_are_memoized_across_calls() {
    let getter = Arc::new(FakeGetter::with_nodes(&["a", "b"]).failing("x", "down"));
    let loader = NodeLoader::new(Arc::clone(&getter), LoaderConfig::default());

    loader.load_all(&["a", "x"]);
    let (nodes, errs) = loader.load_all(&["a", "b", "x"]);
    assert!(nodes[0].is_some());
    assert!(nodes[1].is_some());
    assert!(errs[2].is_some());
    // Only "b" was new on the second call; the failure for "x" is cached.
    assert_eq!(getter.gets(), 3);
}

#[test]
fn concurrent_callers_share_batches() {
    let getter = Arc::new(FakeGetter::with_nodes(&["a", "b", "c"]));
    let loader = NodeLoader::new(Arc::clone(&getter), slow_config(10));

    std::thread::scope(|scope| {
        for id in ["a", "b", "c", "a"] {
            let loader = &loader;
            scope.spawn(move || {
                let node = loader.load(id).unwrap().expect("exists");
                assert_eq!(node.id, id);
            });
        }
    });
    assert_eq!(getter.gets(), 3);
    assert_eq!(loader.stats().fetches_made, 1);
}

#[test]
fn resolves_nodes_from_a_graph_store() {
    let store = Arc::new(GraphStore::new(MemoryKv::new()));
    store.put(&[Node::new("a"), Node::new("b")]).unwrap();
    let loader = NodeLoader::new(Arc::clone(&store), slow_config(10));

    let (nodes, errs) = loader.load_all(&["a", "b", "c"]);
    assert!(errs.iter().all(Option::is_none));
    assert_eq!(nodes.iter().filter(|n| n.is_some()).count(), 2);
    assert_eq!(store.client().calls().queries, 3);
}
