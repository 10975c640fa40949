//! Sort-key encoding for the six physical record kinds.
//!
//! Every record of a node shares the node's ID as its partition key; the sort
//! key (the `rng` attribute) says which relation the record belongs to. Fields
//! are percent-escaped per segment so IDs and type names may contain `/`,
//! `%` or non-ASCII text.

use std::fmt;
use std::str::FromStr;

use crate::error::DecodeError;

const TAG_NODE: &str = "node";
const TAG_CHILD: &str = "child";
const TAG_PARENT: &str = "parent";
const TAG_DATA: &str = "data";
const SEPARATOR: char = '/';

/// Logical kind of a physical record, as carried in its sort key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RangeField {
    /// Marker record proving the node exists.
    Node,
    /// One typed data value attached to the node.
    NodeData {
        /// Type name of the stored value.
        data_type: String,
    },
    /// Marker for an edge to a child.
    Child {
        /// ID of the child node.
        child: String,
    },
    /// One typed data value attached to an edge to a child.
    ChildData {
        /// ID of the child node.
        child: String,
        /// Type name of the stored value.
        data_type: String,
    },
    /// Marker for an edge from a parent.
    Parent {
        /// ID of the parent node.
        parent: String,
    },
    /// One typed data value attached to an edge from a parent.
    ParentData {
        /// ID of the parent node.
        parent: String,
        /// Type name of the stored value.
        data_type: String,
    },
}

impl RangeField {
    /// Encodes the field into its sort-key string.
    pub fn encode(&self) -> String {
        match self {
            RangeField::Node => encode_segments(&[TAG_NODE]),
            RangeField::NodeData { data_type } => {
                encode_segments(&[TAG_NODE, TAG_DATA, data_type])
            }
            RangeField::Child { child } => encode_segments(&[TAG_CHILD, child]),
            RangeField::ChildData { child, data_type } => {
                encode_segments(&[TAG_CHILD, child, TAG_DATA, data_type])
            }
            RangeField::Parent { parent } => encode_segments(&[TAG_PARENT, parent]),
            RangeField::ParentData { parent, data_type } => {
                encode_segments(&[TAG_PARENT, parent, TAG_DATA, data_type])
            }
        }
    }

    /// Decodes a sort-key string.
    ///
    /// Returns `None` for anything that is not exactly one of the six shapes:
    /// unknown tags, wrong segment counts, empty segments and malformed escapes
    /// are all rejected rather than guessed at.
    pub fn decode(s: &str) -> Option<Self> {
        let parts = decode_segments(s)?;
        match parts.as_slice() {
            [tag] if tag == TAG_NODE => Some(RangeField::Node),
            [tag, data, data_type] if tag == TAG_NODE && data == TAG_DATA => {
                Some(RangeField::NodeData {
                    data_type: data_type.clone(),
                })
            }
            [tag, child] if tag == TAG_CHILD => Some(RangeField::Child {
                child: child.clone(),
            }),
            [tag, child, data, data_type] if tag == TAG_CHILD && data == TAG_DATA => {
                Some(RangeField::ChildData {
                    child: child.clone(),
                    data_type: data_type.clone(),
                })
            }
            [tag, parent] if tag == TAG_PARENT => Some(RangeField::Parent {
                parent: parent.clone(),
            }),
            [tag, parent, data, data_type] if tag == TAG_PARENT && data == TAG_DATA => {
                Some(RangeField::ParentData {
                    parent: parent.clone(),
                    data_type: data_type.clone(),
                })
            }
            _ => None,
        }
    }
}

impl fmt::Display for RangeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for RangeField {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RangeField::decode(s).ok_or_else(|| DecodeError::UnknownRangeField(s.to_string()))
    }
}

fn encode_segments(segments: &[&str]) -> String {
    let mut out = String::new();
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 {
            out.push(SEPARATOR);
        }
        escape_into(segment, &mut out);
    }
    out
}

fn decode_segments(s: &str) -> Option<Vec<String>> {
    s.split(SEPARATOR)
        .map(|segment| {
            if segment.is_empty() {
                return None;
            }
            unescape(segment)
        })
        .collect()
}

// Path-segment rules: unreserved characters plus the sub-delimiters that are
// legal inside a segment pass through, everything else is %XX.
fn is_unescaped(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(b, b'-' | b'_' | b'.' | b'~' | b'$' | b'&' | b'+' | b':' | b'=' | b'@')
}

fn escape_into(segment: &str, out: &mut String) {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    for &b in segment.as_bytes() {
        if is_unescaped(b) {
            out.push(b as char);
        } else {
            out.push('%');
            out.push(HEX[(b >> 4) as usize] as char);
            out.push(HEX[(b & 0x0F) as usize] as char);
        }
    }
}

fn unescape(segment: &str) -> Option<String> {
    let bytes = segment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hi = hex_value(*bytes.get(i + 1)?)?;
            let lo = hex_value(*bytes.get(i + 2)?)?;
            out.push((hi << 4) | lo);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
