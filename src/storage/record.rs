use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::data::{Attributes, Data, DataValue};
use super::range::RangeField;
use crate::error::{DecodeError, GraphError, Result};
use crate::model::{Edge, Node};

/// Partition key attribute.
pub const FIELD_ID: &str = "id";
/// Sort key attribute holding an encoded [`RangeField`].
pub const FIELD_RANGE: &str = "rng";
/// Type name attribute, present on data records only.
pub const FIELD_DATA_TYPE: &str = "t";

/// One physical row: partition key, sort key and the remaining attributes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    attributes: Attributes,
}

impl Record {
    /// A record holding only its key attributes.
    pub fn new(id: &str, range: &RangeField) -> Self {
        let mut attributes = Attributes::new();
        attributes.insert(FIELD_ID.to_string(), Value::String(id.to_string()));
        attributes.insert(FIELD_RANGE.to_string(), Value::String(range.encode()));
        Self { attributes }
    }

    /// Wraps attributes as returned by a backend.
    pub fn from_attributes(attributes: Attributes) -> Self {
        Self { attributes }
    }

    /// All attributes, keys included.
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Unwraps the attribute map.
    pub fn into_attributes(self) -> Attributes {
        self.attributes
    }

    /// One attribute by name.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.attributes.get(field)
    }

    /// The partition key.
    pub fn id(&self) -> Option<&str> {
        self.attributes.get(FIELD_ID).and_then(Value::as_str)
    }

    /// The encoded sort key.
    pub fn range(&self) -> Option<&str> {
        self.attributes.get(FIELD_RANGE).and_then(Value::as_str)
    }

    /// The type name of a data record.
    pub fn data_type(&self) -> Option<&str> {
        self.attributes.get(FIELD_DATA_TYPE).and_then(Value::as_str)
    }

    /// Partition and sort key of this record, when both are present.
    pub fn key(&self) -> Option<RecordKey> {
        Some(RecordKey {
            id: self.id()?.to_string(),
            range: self.range()?.to_string(),
        })
    }

    /// Decodes the sort key into the record's kind.
    pub fn range_field(&self) -> std::result::Result<RangeField, DecodeError> {
        let value = self
            .attributes
            .get(FIELD_RANGE)
            .ok_or(DecodeError::MissingRangeField)?;
        let encoded = value.as_str().ok_or(DecodeError::RangeFieldNotString)?;
        encoded.parse()
    }

    /// Splits a data record into its type name and the value's own fields.
    pub(crate) fn into_data_parts(mut self) -> std::result::Result<(String, Attributes), DecodeError> {
        let data_type = match self.attributes.remove(FIELD_DATA_TYPE) {
            Some(Value::String(data_type)) => data_type,
            _ => return Err(DecodeError::MissingDataType),
        };
        self.attributes.remove(FIELD_ID);
        self.attributes.remove(FIELD_RANGE);
        Ok((data_type, self.attributes))
    }
}

/// Partition and sort key identifying one record.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    /// Partition key.
    pub id: String,
    /// Encoded sort key.
    pub range: String,
}

impl RecordKey {
    /// Key of the record of kind `range` in partition `id`.
    pub fn new(id: impl Into<String>, range: &RangeField) -> Self {
        Self {
            id: id.into(),
            range: range.encode(),
        }
    }
}

impl From<RecordKey> for Record {
    fn from(key: RecordKey) -> Self {
        let mut attributes = Attributes::new();
        attributes.insert(FIELD_ID.to_string(), Value::String(key.id));
        attributes.insert(FIELD_RANGE.to_string(), Value::String(key.range));
        Record { attributes }
    }
}

/// Marker record proving the node exists.
pub fn new_node_record(id: &str) -> Record {
    Record::new(id, &RangeField::Node)
}

/// Attributes owned by the record itself; data values may not use them.
const RESERVED_FIELDS: [&str; 3] = [FIELD_ID, FIELD_RANGE, FIELD_DATA_TYPE];

/// Builds a data record: the value's fields plus the key and type fields.
///
/// A value with a field named like one of the key or type attributes is
/// rejected, since it could not be read back.
pub fn new_data_record(id: &str, range: &RangeField, data_type: &str, value: &DataValue) -> Result<Record> {
    let mut attributes = value.to_attributes()?;
    if let Some(field) = RESERVED_FIELDS.iter().find(|f| attributes.contains_key(**f)) {
        return Err(GraphError::Serialization(serde::ser::Error::custom(format!(
            "data of type '{data_type}' uses reserved attribute '{field}'"
        ))));
    }
    attributes.insert(FIELD_ID.to_string(), Value::String(id.to_string()));
    attributes.insert(FIELD_RANGE.to_string(), Value::String(range.encode()));
    attributes.insert(
        FIELD_DATA_TYPE.to_string(),
        Value::String(data_type.to_string()),
    );
    Ok(Record { attributes })
}

/// Records for `parent -> child` on the parent's partition.
pub fn new_child_records(parent: &str, child: &str, data: &Data) -> Result<Vec<Record>> {
    let mut records = Vec::with_capacity(1 + data.len());
    records.push(Record::new(
        parent,
        &RangeField::Child {
            child: child.to_string(),
        },
    ));
    for (data_type, value) in data {
        let range = RangeField::ChildData {
            child: child.to_string(),
            data_type: data_type.clone(),
        };
        records.push(new_data_record(parent, &range, data_type, value)?);
    }
    Ok(records)
}

/// Records for `parent -> child` on the child's partition.
pub fn new_parent_records(parent: &str, child: &str, data: &Data) -> Result<Vec<Record>> {
    let mut records = Vec::with_capacity(1 + data.len());
    records.push(Record::new(
        child,
        &RangeField::Parent {
            parent: parent.to_string(),
        },
    ));
    for (data_type, value) in data {
        let range = RangeField::ParentData {
            parent: parent.to_string(),
            data_type: data_type.clone(),
        };
        records.push(new_data_record(child, &range, data_type, value)?);
    }
    Ok(records)
}

/// One data record per entry of the node's data.
pub fn convert_node_data_to_records(id: &str, data: &Data) -> Result<Vec<Record>> {
    data.iter()
        .map(|(data_type, value)| {
            let range = RangeField::NodeData {
                data_type: data_type.clone(),
            };
            new_data_record(id, &range, data_type, value)
        })
        .collect()
}

/// Every record of a node: marker, data and both sides of its edges.
pub fn convert_to_records(node: &Node) -> Result<Vec<Record>> {
    let mut records = vec![new_node_record(&node.id)];
    records.extend(convert_node_data_to_records(&node.id, &node.data)?);
    records.extend(convert_node_edges_to_records(
        &node.id,
        &node.children,
        &node.parents,
    )?);
    Ok(records)
}

/// Emits both sides of every edge.
///
/// A child edge of `id` is written as a Child record set on `id` and as a
/// Parent record set on the child; a parent edge is the same relationship
/// seen from below. Edge data is copied onto both sides.
pub fn convert_node_edges_to_records(id: &str, children: &[Edge], parents: &[Edge]) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    for child in children {
        records.extend(new_child_records(id, &child.id, &child.data)?);
        records.extend(new_parent_records(id, &child.id, &child.data)?);
    }
    for parent in parents {
        records.extend(new_parent_records(&parent.id, id, &parent.data)?);
        records.extend(new_child_records(&parent.id, id, &parent.data)?);
    }
    Ok(records)
}

/// Keys of every record written for `parent -> child` with the given data.
pub(crate) fn edge_keys(parent: &str, child: &str, data: &Data) -> Vec<RecordKey> {
    let mut keys = Vec::with_capacity(2 + 2 * data.len());
    keys.push(RecordKey::new(
        parent,
        &RangeField::Child {
            child: child.to_string(),
        },
    ));
    keys.push(RecordKey::new(
        child,
        &RangeField::Parent {
            parent: parent.to_string(),
        },
    ));
    for data_type in data.data_types() {
        keys.push(RecordKey::new(
            parent,
            &RangeField::ChildData {
                child: child.to_string(),
                data_type: data_type.to_string(),
            },
        ));
        keys.push(RecordKey::new(
            child,
            &RangeField::ParentData {
                parent: parent.to_string(),
                data_type: data_type.to_string(),
            },
        ));
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DataKind;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Connection {
        #[serde(rename = "connectionType")]
        kind: String,
    }

    impl DataKind for Connection {
        const DATA_TYPE: &'static str = "connection";
    }

    fn keys(records: &[Record]) -> Vec<(String, String)> {
        records
            .iter()
            .map(|r| (r.id().unwrap().to_string(), r.range().unwrap().to_string()))
            .collect()
    }

    #[test]
    fn node_record_is_a_bare_marker() {
        let record = new_node_record("a");
        assert_eq!(record.attributes().len(), 2);
        assert_eq!(record.range(), Some("node"));
        assert_eq!(record.data_type(), None);
    }

    #[test]
    fn data_record_carries_fields_and_type() {
        let value = DataValue::typed(Connection {
            kind: "wifi".into(),
        });
        let range = RangeField::NodeData {
            data_type: "connection".into(),
        };
        let record = new_data_record("a", &range, "connection", &value).unwrap();
        assert_eq!(record.id(), Some("a"));
        assert_eq!(record.range(), Some("node/data/connection"));
        assert_eq!(record.data_type(), Some("connection"));
        assert_eq!(
            record.get("connectionType"),
            Some(&Value::String("wifi".into()))
        );
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Tag {
        t: String,
    }

    impl DataKind for Tag {
        const DATA_TYPE: &'static str = "tag";
    }

    #[test]
    fn data_using_reserved_attributes_is_rejected() {
        let range = RangeField::NodeData {
            data_type: "tag".into(),
        };
        let value = DataValue::typed(Tag { t: "blue".into() });
        let err = new_data_record("a", &range, "tag", &value).unwrap_err();
        assert!(matches!(err, GraphError::Serialization(_)));
        assert!(err.to_string().contains("reserved attribute 't'"));

        for field in [FIELD_ID, FIELD_RANGE] {
            let mut attrs = Attributes::new();
            attrs.insert(field.to_string(), Value::from("x"));
            let value = DataValue::Untyped(attrs);
            assert!(new_data_record("a", &range, "raw", &value).is_err());
        }
    }

    #[test]
    fn parent_edges_emit_mirror_child_records() {
        let parent = Edge::new("router").with_data(Connection {
            kind: "wifi".into(),
        });
        let records = convert_node_edges_to_records("mac", &[], &[parent]).unwrap();
        assert_eq!(
            keys(&records),
            vec![
                ("mac".into(), "parent/router".into()),
                ("mac".into(), "parent/router/data/connection".into()),
                ("router".into(), "child/mac".into()),
                ("router".into(), "child/mac/data/connection".into()),
            ]
        );
    }

    #[test]
    fn edge_keys_cover_both_sides_and_data() {
        let data = Data::of(Connection {
            kind: "wifi".into(),
        });
        let keys = edge_keys("p", "c", &data);
        let rendered: Vec<(&str, &str)> = keys
            .iter()
            .map(|k| (k.id.as_str(), k.range.as_str()))
            .collect();
        assert_eq!(
            rendered,
            vec![
                ("p", "child/c"),
                ("c", "parent/p"),
                ("p", "child/c/data/connection"),
                ("c", "parent/p/data/connection"),
            ]
        );
    }

    #[test]
    fn data_parts_strip_key_fields() {
        let value = DataValue::typed(Connection {
            kind: "wifi".into(),
        });
        let range = RangeField::ChildData {
            child: "c".into(),
            data_type: "connection".into(),
        };
        let record = new_data_record("p", &range, "connection", &value).unwrap();
        let (data_type, attrs) = record.into_data_parts().unwrap();
        assert_eq!(data_type, "connection");
        assert_eq!(attrs.len(), 1);
        assert!(attrs.contains_key("connectionType"));
    }

    #[test]
    fn range_field_reports_missing_and_malformed_keys() {
        let mut attrs = Attributes::new();
        attrs.insert(FIELD_ID.into(), Value::String("a".into()));
        let record = Record::from_attributes(attrs.clone());
        assert!(matches!(record.range_field(), Err(DecodeError::MissingRangeField)));

        attrs.insert(FIELD_RANGE.into(), Value::Null);
        let record = Record::from_attributes(attrs.clone());
        assert!(matches!(record.range_field(), Err(DecodeError::RangeFieldNotString)));

        attrs.insert(FIELD_RANGE.into(), Value::String("garbage".into()));
        let record = Record::from_attributes(attrs);
        assert!(matches!(record.range_field(), Err(DecodeError::UnknownRangeField(_))));
    }
}
