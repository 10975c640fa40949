use tracing::{debug, trace, warn};

use super::data::Data;
use super::metrics::{CapacityMeter, ConsumedCapacity};
use super::range::RangeField;
use super::record::{
    convert_node_data_to_records, convert_node_edges_to_records, convert_to_records, edge_keys,
    Record, RecordKey, FIELD_ID,
};
use super::registry::DataTypeRegistry;
use crate::error::{DecodeError, GraphError, Result};
use crate::kv::KvClient;
use crate::loader::NodeGetter;
use crate::model::{Edge, Node};

/// Graph storage on top of a wide-column [`KvClient`].
///
/// Every operation issues at most one read and one batched write against the
/// client. Nothing coordinates concurrent operations on the same node: a
/// delete computes its keys from a read taken just before the write, so an
/// edge added in between is not removed with it.
#[derive(Debug)]
pub struct GraphStore<C> {
    client: C,
    registry: DataTypeRegistry,
    capacity: CapacityMeter,
}

impl<C: KvClient> GraphStore<C> {
    /// A store with an empty registry.
    pub fn new(client: C) -> Self {
        Self::with_registry(client, DataTypeRegistry::new())
    }

    /// A store decoding data with `registry`.
    pub fn with_registry(client: C, registry: DataTypeRegistry) -> Self {
        Self {
            client,
            registry,
            capacity: CapacityMeter::default(),
        }
    }

    /// The backend.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Kinds this store decodes.
    pub fn registry(&self) -> &DataTypeRegistry {
        &self.registry
    }

    /// Registration needs exclusive access, so it happens before the store
    /// is shared with a loader.
    pub fn registry_mut(&mut self) -> &mut DataTypeRegistry {
        &mut self.registry
    }

    /// Capacity consumed by every successful call so far.
    pub fn capacity(&self) -> ConsumedCapacity {
        self.capacity.snapshot()
    }

    /// Returns the totals and starts counting from zero.
    pub fn reset_capacity(&self) -> ConsumedCapacity {
        self.capacity.reset()
    }

    /// Upserts nodes with their data and both sides of every edge.
    pub fn put(&self, nodes: &[Node]) -> Result<()> {
        let mut records = Vec::new();
        for node in nodes {
            if node.id.is_empty() {
                return Err(GraphError::MissingNodeId);
            }
            validate_edges(&node.children)?;
            validate_edges(&node.parents)?;
            records.extend(convert_to_records(node)?);
        }
        debug!(nodes = nodes.len(), records = records.len(), "put nodes");
        self.batch_put("GraphStore::put", records)
    }

    /// Upserts node data without touching the node's marker or edges.
    pub fn put_node_data(&self, id: &str, data: &Data) -> Result<()> {
        if id.is_empty() {
            return Err(GraphError::MissingNodeId);
        }
        let records = convert_node_data_to_records(id, data)?;
        debug!(id, records = records.len(), "put node data");
        self.batch_put("GraphStore::put_node_data", records)
    }

    /// Upserts edges from `parent` to each edge's node, both directions.
    pub fn put_edges(&self, parent: &str, edges: &[Edge]) -> Result<()> {
        if parent.is_empty() {
            return Err(GraphError::MissingNodeId);
        }
        validate_edges(edges)?;
        let records = convert_node_edges_to_records(parent, edges, &[])?;
        debug!(parent, edges = edges.len(), records = records.len(), "put edges");
        self.batch_put("GraphStore::put_edges", records)
    }

    /// Upserts data on the `parent -> child` edge, creating the edge if needed.
    pub fn put_edge_data(&self, parent: &str, child: &str, data: Data) -> Result<()> {
        if parent.is_empty() || child.is_empty() {
            return Err(GraphError::MissingNodeId);
        }
        self.put_edges(parent, &[Edge::new(child).with_data_map(data)])
    }

    /// Reads a node and folds its records into a [`Node`].
    ///
    /// Returns `Ok(None)` when the partition holds no node marker.
    pub fn get(&self, id: &str) -> Result<Option<Node>> {
        if id.is_empty() {
            return Ok(None);
        }
        let (records, consumed) = self
            .client
            .query_by_id(FIELD_ID, id)
            .map_err(|err| {
                warn!(id, error = %err, "query failed");
                GraphError::store("GraphStore::get: failed to query records", err)
            })?;
        self.capacity.record(consumed);

        let mut node = Node::default();
        for record in records {
            self.populate_node(&mut node, record)
                .map_err(|err| GraphError::decode("GraphStore::get", err))?;
        }
        if node.id.is_empty() {
            trace!(id, "node not found");
            return Ok(None);
        }
        Ok(Some(node))
    }

    /// Removes a node, its data and both sides of all its edges.
    ///
    /// Deleting a node that does not exist succeeds without writing.
    pub fn delete(&self, id: &str) -> Result<()> {
        let Some(node) = self.get(id)? else {
            debug!(id, "delete skipped; node not found");
            return Ok(());
        };

        let mut keys = vec![RecordKey::new(&node.id, &RangeField::Node)];
        for data_type in node.data.data_types() {
            keys.push(RecordKey::new(
                &node.id,
                &RangeField::NodeData {
                    data_type: data_type.to_string(),
                },
            ));
        }
        for child in &node.children {
            keys.extend(edge_keys(&node.id, &child.id, &child.data));
        }
        for parent in &node.parents {
            keys.extend(edge_keys(&parent.id, &node.id, &parent.data));
        }
        debug!(id, keys = keys.len(), "delete node");
        self.batch_delete("GraphStore::delete", keys)
    }

    /// Removes the `parent -> child` edge and its data from both partitions.
    ///
    /// Other edges of `parent` are untouched. A missing parent or edge is not
    /// an error.
    pub fn delete_edge(&self, parent: &str, child: &str) -> Result<()> {
        let Some(node) = self.get(parent)? else {
            debug!(parent, child, "delete edge skipped; parent not found");
            return Ok(());
        };
        let Some(edge) = node.child(child) else {
            debug!(parent, child, "delete edge skipped; edge not found");
            return Ok(());
        };
        let keys = edge_keys(&node.id, &edge.id, &edge.data);
        debug!(parent, child, keys = keys.len(), "delete edge");
        self.batch_delete("GraphStore::delete_edge", keys)
    }

    fn populate_node(&self, node: &mut Node, record: Record) -> std::result::Result<(), DecodeError> {
        let field = record.range_field()?;
        trace!(range = %field, "fold record");
        match field {
            RangeField::Node => {
                node.id = record
                    .id()
                    .ok_or(DecodeError::MissingPartitionKey)?
                    .to_string();
            }
            RangeField::NodeData { .. } => {
                let (data_type, attrs) = record.into_data_parts()?;
                let value = self.registry.decode(&data_type, attrs)?;
                node.data.insert_value(data_type, value);
            }
            RangeField::Child { child } => {
                node.child_mut(&child);
            }
            RangeField::ChildData { child, .. } => {
                let (data_type, attrs) = record.into_data_parts()?;
                let value = self.registry.decode(&data_type, attrs)?;
                node.child_mut(&child).data.insert_value(data_type, value);
            }
            RangeField::Parent { parent } => {
                node.parent_mut(&parent);
            }
            RangeField::ParentData { parent, .. } => {
                let (data_type, attrs) = record.into_data_parts()?;
                let value = self.registry.decode(&data_type, attrs)?;
                node.parent_mut(&parent).data.insert_value(data_type, value);
            }
        }
        Ok(())
    }

    fn batch_put(&self, context: &'static str, records: Vec<Record>) -> Result<()> {
        let consumed = self.client.batch_put(records).map_err(|err| {
            warn!(context, error = %err, "batch put failed");
            GraphError::store(context, err)
        })?;
        self.capacity.record(consumed);
        Ok(())
    }

    fn batch_delete(&self, context: &'static str, keys: Vec<RecordKey>) -> Result<()> {
        let consumed = self.client.batch_delete(keys).map_err(|err| {
            warn!(context, error = %err, "batch delete failed");
            GraphError::store(context, err)
        })?;
        self.capacity.record(consumed);
        Ok(())
    }
}

impl<C: KvClient> NodeGetter for GraphStore<C> {
    fn get(&self, id: &str) -> Result<Option<Node>> {
        GraphStore::get(self, id)
    }
}

fn validate_edges(edges: &[Edge]) -> Result<()> {
    if edges.iter().any(|e| e.id.is_empty()) {
        return Err(GraphError::MissingNodeId);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::kv::MemoryKv;
    use crate::storage::{DataKind, Record, FIELD_RANGE};
    use serde::{Deserialize, Serialize};
    use serde_json::Value;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct TestEdgeData {
        field: i64,
    }

    impl DataKind for TestEdgeData {
        const DATA_TYPE: &'static str = "testEdgeData";
    }

    fn store() -> GraphStore<MemoryKv> {
        let mut store = GraphStore::new(MemoryKv::new());
        store.registry_mut().register::<TestEdgeData>();
        store
    }

    #[test]
    fn put_writes_forward_and_mirror_records() {
        let store = store();
        let node = Node::new("parentNode")
            .with_children([Edge::new("childNode").with_data(TestEdgeData { field: 123 })]);
        store.put(&[node]).unwrap();

        let keys: Vec<(String, String)> = store
            .client()
            .keys()
            .into_iter()
            .map(|k| (k.id, k.range))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("childNode".into(), "parent/parentNode".into()),
                ("childNode".into(), "parent/parentNode/data/testEdgeData".into()),
                ("parentNode".into(), "child/childNode".into()),
                ("parentNode".into(), "child/childNode/data/testEdgeData".into()),
                ("parentNode".into(), "node".into()),
            ]
        );
        assert_eq!(store.client().calls().batch_puts, 1);
    }

    #[test]
    fn empty_ids_fail_before_any_call() {
        let store = store();
        assert!(matches!(store.put(&[Node::new("")]), Err(GraphError::MissingNodeId)));
        assert!(matches!(
            store.put(&[Node::new("a").with_children([Edge::new("")])]),
            Err(GraphError::MissingNodeId)
        ));
        assert!(matches!(
            store.put_node_data("", &Data::new()),
            Err(GraphError::MissingNodeId)
        ));
        assert!(matches!(
            store.put_edges("", &[Edge::new("b")]),
            Err(GraphError::MissingNodeId)
        ));
        assert!(matches!(
            store.put_edge_data("a", "", Data::new()),
            Err(GraphError::MissingNodeId)
        ));
        assert_eq!(store.client().calls().batch_puts, 0);
    }

    #[test]
    fn get_folds_records_in_any_order() {
        let store = store();
        let mut data_first = Record::new(
            "p",
            &RangeField::ChildData {
                child: "c".into(),
                data_type: "testEdgeData".into(),
            },
        );
        let mut attrs = data_first.clone().into_attributes();
        attrs.insert("t".into(), Value::String("testEdgeData".into()));
        attrs.insert("field".into(), Value::from(7));
        data_first = Record::from_attributes(attrs);
        store
            .client()
            .batch_put(vec![
                data_first,
                Record::new("p", &RangeField::Child { child: "c".into() }),
                Record::new("p", &RangeField::Node),
            ])
            .unwrap();

        let node = store.get("p").unwrap().expect("node");
        assert_eq!(node.children.len(), 1);
        assert_eq!(
            node.child("c").unwrap().data.get::<TestEdgeData>(),
            Some(&TestEdgeData { field: 7 })
        );
    }

    #[test]
    fn get_without_marker_is_not_found() {
        let store = store();
        store
            .client()
            .batch_put(vec![Record::new("c", &RangeField::Parent { parent: "p".into() })])
            .unwrap();
        assert!(store.get("c").unwrap().is_none());
        assert!(store.get("").unwrap().is_none());
    }

    #[test]
    fn undecodable_records_abort_get() {
        let store = store();
        let mut attrs = Record::new("a", &RangeField::Node).into_attributes();
        attrs.insert(FIELD_RANGE.into(), Value::String("garbage".into()));
        store
            .client()
            .batch_put(vec![
                Record::new("a", &RangeField::Node),
                Record::from_attributes(attrs),
            ])
            .unwrap();

        let err = store.get("a").unwrap_err();
        assert!(matches!(
            err,
            GraphError::Decode {
                context: "GraphStore::get",
                source: DecodeError::UnknownRangeField(_)
            }
        ));
    }

    #[test]
    fn store_errors_are_wrapped_and_not_counted() {
        let store = store();
        store
            .client()
            .fail_next(StoreError::Unavailable("down".into()));
        let err = store.put(&[Node::new("a")]).unwrap_err();
        assert!(matches!(err, GraphError::Store { context: "GraphStore::put", .. }));
        assert_eq!(store.capacity(), ConsumedCapacity::default());
    }

    #[test]
    fn delete_of_missing_node_does_not_write() {
        let store = store();
        store.delete("nope").unwrap();
        store.delete_edge("nope", "other").unwrap();
        assert_eq!(store.client().calls().batch_deletes, 0);
    }

    #[test]
    fn capacity_accumulates_across_calls() {
        let store = store();
        store.put(&[Node::new("a")]).unwrap();
        store.get("a").unwrap();
        let cc = store.capacity();
        assert_eq!(cc.write, 1.0);
        assert_eq!(cc.read, 1.0);
        assert_eq!(cc.total, 2.0);
    }
}
