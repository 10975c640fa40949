//! Cursor pagination over a node's edge lists.
//!
//! A cursor is the base64 encoding of an edge's node ID, so it stays opaque
//! to clients while remaining stable across reads of the same node.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Serialize;

use crate::error::{GraphError, Result};
use crate::model::Edge;

/// Position of a page within the full edge list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    /// Edges exist before the page.
    pub has_previous_page: bool,
    /// Edges exist after the page.
    pub has_next_page: bool,
    /// Cursor of the first edge on the page.
    pub start_cursor: Option<String>,
    /// Cursor of the last edge on the page.
    pub end_cursor: Option<String>,
}

/// Opaque cursor for an edge's node ID.
pub fn encode_cursor(id: &str) -> String {
    STANDARD.encode(id.as_bytes())
}

/// Recovers the node ID from a cursor.
pub fn decode_cursor(cursor: &str) -> Result<String> {
    let bytes = STANDARD
        .decode(cursor)
        .map_err(|err| GraphError::InvalidCursor(err.to_string()))?;
    String::from_utf8(bytes).map_err(|err| GraphError::InvalidCursor(err.to_string()))
}

/// Returns at most `first` edges following the edge named by `after`.
///
/// `first == 0` means no limit. A cursor that does not decode, or names an
/// edge not in the list, is ignored and the page starts at the beginning.
pub fn slice_edges<'a>(edges: &'a [Edge], first: usize, after: Option<&str>) -> (&'a [Edge], PageInfo) {
    let mut info = PageInfo::default();

    let mut start = 0;
    if let Some(after_id) = after.and_then(|cursor| decode_cursor(cursor).ok()) {
        if let Some(index) = edges.iter().position(|e| e.id == after_id) {
            start = index + 1;
            info.has_previous_page = true;
        }
    }

    let mut end = edges.len();
    if first > 0 {
        end = start.saturating_add(first).min(edges.len());
        info.has_next_page = end < edges.len();
    }

    let page = &edges[start..end];
    if let (Some(first_edge), Some(last_edge)) = (page.first(), page.last()) {
        info.start_cursor = Some(encode_cursor(&first_edge.id));
        info.end_cursor = Some(encode_cursor(&last_edge.id));
    }
    (page, info)
}
