//! Graph storage engine over a wide-column key-value backend.
//!
//! Nodes, their typed data and both directions of every edge are spread over
//! physical records that share the node's ID as partition key and are told
//! apart by an encoded sort key.

/// Sort-key codec for the six record kinds.
pub mod range;

/// Physical records and the conversion from nodes and edges into them.
pub mod record;

mod data;
mod metrics;
mod registry;
mod store;

pub use data::{Attributes, Data, DataKind, DataValue, TypedData};
pub use metrics::ConsumedCapacity;
pub use range::RangeField;
pub use record::{Record, RecordKey, FIELD_DATA_TYPE, FIELD_ID, FIELD_RANGE};
pub use registry::DataTypeRegistry;
pub use store::GraphStore;
