//! Directed graph storage on a wide-column key-value store.
//!
//! A node, its typed data and both directions of each of its edges are stored
//! as records that share the node's ID as partition key. [`GraphStore`] turns
//! nodes into records and back, [`NodeLoader`] batches the per-request node
//! reads made while resolving edges.

#![warn(missing_docs)]

/// TOML configuration.
pub mod config;
/// Cursor pagination over edge lists.
pub mod connection;
/// Error types.
pub mod error;
/// Key-value backends.
pub mod kv;
/// Request-scoped node batching.
pub mod loader;
/// Nodes and edges.
pub mod model;
/// Record mapping and the graph store.
pub mod storage;

pub use config::{Config, ConfigError};
pub use error::{DecodeError, GraphError, LoadError, Result, StoreError};
pub use kv::{ChunkedKv, KvClient, MemoryKv};
pub use loader::{LoaderConfig, LoaderStats, NodeGetter, NodeLoader};
pub use model::{Edge, Node};
pub use storage::{
    ConsumedCapacity, Data, DataKind, DataTypeRegistry, DataValue, GraphStore, RangeField,
    Record, RecordKey,
};
