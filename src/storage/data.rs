use std::any::Any;
use std::collections::btree_map::{self, BTreeMap};
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::{GraphError, Result};

/// Attribute map of a physical record or of one data value.
pub type Attributes = serde_json::Map<String, Value>;

/// A typed value that can be attached to nodes and edges.
///
/// `DATA_TYPE` is the stable discriminant written to the record's type field
/// and used as the key in [`Data`]. Changing it orphans stored values, which
/// then decode as [`DataValue::Untyped`].
pub trait DataKind:
    Serialize + DeserializeOwned + Clone + fmt::Debug + PartialEq + Send + Sync + 'static
{
    /// Discriminant stored alongside every value of this kind.
    const DATA_TYPE: &'static str;
}

/// Object-safe view over a [`DataKind`] value.
pub trait TypedData: fmt::Debug + Send + Sync {
    /// Discriminant of the concrete kind.
    fn data_type(&self) -> &'static str;
    /// Marshals the value's fields into an attribute map.
    fn to_attributes(&self) -> Result<Attributes>;
    /// Allows downcasting to the concrete kind.
    fn as_any(&self) -> &dyn Any;
    /// Compares with another typed value of possibly different kind.
    fn eq_dyn(&self, other: &dyn TypedData) -> bool;
}

impl<T: DataKind> TypedData for T {
    fn data_type(&self) -> &'static str {
        T::DATA_TYPE
    }

    fn to_attributes(&self) -> Result<Attributes> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Err(GraphError::Serialization(serde::ser::Error::custom(format!(
                "data of type '{}' must serialize to a map of fields",
                T::DATA_TYPE
            )))),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_dyn(&self, other: &dyn TypedData) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }
}

/// One entry of a [`Data`] map.
#[derive(Clone, Debug)]
pub enum DataValue {
    /// A value whose kind is registered with the store.
    Typed(Arc<dyn TypedData>),
    /// A value of an unregistered kind, kept as its raw attributes.
    Untyped(Attributes),
}

impl DataValue {
    /// Wraps a typed value.
    pub fn typed<T: DataKind>(value: T) -> Self {
        DataValue::Typed(Arc::new(value))
    }

    /// Returns the concrete value when this entry holds a `T`.
    pub fn downcast_ref<T: DataKind>(&self) -> Option<&T> {
        match self {
            DataValue::Typed(value) => value.as_any().downcast_ref::<T>(),
            DataValue::Untyped(_) => None,
        }
    }

    /// Marshals the entry into the attribute map stored on its record.
    pub fn to_attributes(&self) -> Result<Attributes> {
        match self {
            DataValue::Typed(value) => value.to_attributes(),
            DataValue::Untyped(attrs) => Ok(attrs.clone()),
        }
    }

    /// Returns true when the entry was decoded without a registered kind.
    pub fn is_untyped(&self) -> bool {
        matches!(self, DataValue::Untyped(_))
    }
}

impl PartialEq for DataValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (DataValue::Typed(a), DataValue::Typed(b)) => a.eq_dyn(&**b),
            (DataValue::Untyped(a), DataValue::Untyped(b)) => a == b,
            _ => false,
        }
    }
}

impl Serialize for DataValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let attrs = self.to_attributes().map_err(serde::ser::Error::custom)?;
        attrs.serialize(serializer)
    }
}

/// Typed values keyed by their type name; at most one value per type.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Data {
    entries: BTreeMap<String, DataValue>,
}

impl Data {
    /// An empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a map holding a single typed value.
    pub fn of<T: DataKind>(value: T) -> Self {
        let mut data = Self::new();
        data.insert(value);
        data
    }

    /// Inserts a typed value under its kind's discriminant, replacing any
    /// previous value of that kind.
    pub fn insert<T: DataKind>(&mut self, value: T) -> Option<DataValue> {
        self.entries
            .insert(T::DATA_TYPE.to_string(), DataValue::typed(value))
    }

    /// Inserts an already-wrapped value under an explicit type name.
    pub fn insert_value(&mut self, data_type: impl Into<String>, value: DataValue) -> Option<DataValue> {
        self.entries.insert(data_type.into(), value)
    }

    /// Inserts raw attributes under a type name.
    pub fn insert_untyped(&mut self, data_type: impl Into<String>, attrs: Attributes) -> Option<DataValue> {
        self.insert_value(data_type, DataValue::Untyped(attrs))
    }

    /// Returns the value of kind `T`.
    ///
    /// Looks under `T::DATA_TYPE` first, then at any entry that decoded to a
    /// `T` under another registered name.
    pub fn get<T: DataKind>(&self) -> Option<&T> {
        self.entries
            .get(T::DATA_TYPE)
            .and_then(DataValue::downcast_ref::<T>)
            .or_else(|| self.entries.values().find_map(DataValue::downcast_ref::<T>))
    }

    /// The entry stored under `data_type`.
    pub fn get_value(&self, data_type: &str) -> Option<&DataValue> {
        self.entries.get(data_type)
    }

    /// Removes the entry stored under `data_type`.
    pub fn remove(&mut self, data_type: &str) -> Option<DataValue> {
        self.entries.remove(data_type)
    }

    /// True when an entry is stored under `data_type`.
    pub fn contains(&self, data_type: &str) -> bool {
        self.entries.contains_key(data_type)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Type names present, in sorted order.
    pub fn data_types(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Entries in type-name order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, DataValue> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a Data {
    type Item = (&'a String, &'a DataValue);
    type IntoIter = btree_map::Iter<'a, String, DataValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

pub(crate) fn from_attributes<T: DataKind>(attrs: Attributes) -> std::result::Result<T, serde_json::Error> {
    serde_json::from_value(Value::Object(attrs))
}
