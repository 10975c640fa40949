use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::trace;

use super::data::{from_attributes, Attributes, DataKind, DataValue};
use crate::error::DecodeError;

type DecodeFn = Arc<dyn Fn(Attributes) -> Result<DataValue, serde_json::Error> + Send + Sync>;

/// Maps type names to the decoders that rebuild typed values from records.
#[derive(Clone, Default)]
pub struct DataTypeRegistry {
    decoders: HashMap<String, DecodeFn>,
}

impl fmt::Debug for DataTypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.decoders.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("DataTypeRegistry")
            .field("data_types", &names)
            .finish()
    }
}

impl DataTypeRegistry {
    /// A registry with no kinds; everything decodes as untyped.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T` under its own discriminant.
    pub fn register<T: DataKind>(&mut self) -> &mut Self {
        self.register_as::<T>(T::DATA_TYPE)
    }

    /// Registers `T` under an explicit name, replacing any previous decoder.
    ///
    /// Values decoded this way are stored in node and edge data under `name`
    /// and are still found by [`Data::get`]. Values written with
    /// [`Data::insert`] are keyed by `T::DATA_TYPE`, so once `T` is only
    /// registered under `name`, those records read back as
    /// [`DataValue::Untyped`].
    ///
    /// [`Data::get`]: super::Data::get
    /// [`Data::insert`]: super::Data::insert
    pub fn register_as<T: DataKind>(&mut self, name: impl Into<String>) -> &mut Self {
        let decode: DecodeFn =
            Arc::new(|attrs| from_attributes::<T>(attrs).map(DataValue::typed));
        self.decoders.insert(name.into(), decode);
        self
    }

    /// True when `data_type` has a decoder.
    pub fn is_registered(&self, data_type: &str) -> bool {
        self.decoders.contains_key(data_type)
    }

    /// Number of registered names.
    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Rebuilds a value from a data record's attributes.
    ///
    /// Unregistered type names never fail: their attributes come back as
    /// [`DataValue::Untyped`] so the data survives a read-modify-write cycle.
    pub fn decode(&self, data_type: &str, attrs: Attributes) -> Result<DataValue, DecodeError> {
        match self.decoders.get(data_type) {
            Some(decode) => decode(attrs).map_err(|source| DecodeError::Unmarshal {
                data_type: data_type.to_string(),
                source,
            }),
            None => {
                trace!(data_type, "no decoder registered; keeping raw attributes");
                Ok(DataValue::Untyped(attrs))
            }
        }
    }
}
