use serde::Serialize;

use crate::storage::{Data, DataKind};

/// A graph vertex: its typed data plus the edges recorded on its partition.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Node {
    /// Partition key of the node's records.
    pub id: String,
    /// Typed values attached to the node.
    pub data: Data,
    /// Edges to nodes below this one.
    pub children: Vec<Edge>,
    /// Edges from nodes above this one.
    pub parents: Vec<Edge>,
}

impl Node {
    /// A node with no data or edges.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Adds a typed value, replacing any of the same kind.
    pub fn with_data<T: DataKind>(mut self, value: T) -> Self {
        self.data.insert(value);
        self
    }

    /// Appends child edges.
    pub fn with_children(mut self, children: impl IntoIterator<Item = Edge>) -> Self {
        self.children.extend(children);
        self
    }

    /// Appends parent edges.
    pub fn with_parents(mut self, parents: impl IntoIterator<Item = Edge>) -> Self {
        self.parents.extend(parents);
        self
    }

    /// The edge to child `id`.
    pub fn child(&self, id: &str) -> Option<&Edge> {
        self.children.iter().find(|e| e.id == id)
    }

    /// The edge from parent `id`.
    pub fn parent(&self, id: &str) -> Option<&Edge> {
        self.parents.iter().find(|e| e.id == id)
    }

    pub(crate) fn child_mut(&mut self, id: &str) -> &mut Edge {
        find_or_insert(&mut self.children, id)
    }

    pub(crate) fn parent_mut(&mut self, id: &str) -> &mut Edge {
        find_or_insert(&mut self.parents, id)
    }
}

/// A relationship to another node, seen from one side.
///
/// `id` is the other node's ID; whether that node is a child or a parent
/// depends on which list of [`Node`] holds the edge.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Edge {
    /// ID of the node at the other end.
    pub id: String,
    /// Typed values attached to the edge.
    pub data: Data,
}

impl Edge {
    /// An edge to `id` without data.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            data: Data::new(),
        }
    }

    /// Adds a typed value, replacing any of the same kind.
    pub fn with_data<T: DataKind>(mut self, value: T) -> Self {
        self.data.insert(value);
        self
    }

    /// Replaces the edge's data.
    pub fn with_data_map(mut self, data: Data) -> Self {
        self.data = data;
        self
    }
}

fn find_or_insert<'a>(edges: &'a mut Vec<Edge>, id: &str) -> &'a mut Edge {
    let index = match edges.iter().position(|e| e.id == id) {
        Some(index) => index,
        None => {
            edges.push(Edge::new(id));
            edges.len() - 1
        }
    };
    &mut edges[index]
}
