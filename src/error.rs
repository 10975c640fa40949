//! Error types shared by the store, its backends and the loader.

use std::sync::Arc;

use thiserror::Error;

use crate::config::ConfigError;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors returned by [`crate::GraphStore`] and the code built on it.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A node or edge was given an empty ID.
    #[error("invalid node ID, IDs cannot be empty")]
    MissingNodeId,
    /// A stored record could not be folded back into a node.
    #[error("{context}: failed to decode record: {source}")]
    Decode {
        /// Operation that read the record.
        context: &'static str,
        /// What was wrong with the record.
        #[source]
        source: DecodeError,
    },
    /// The backend failed a call.
    #[error("{context}: {source}")]
    Store {
        /// Operation and call that failed.
        context: &'static str,
        /// Error reported by the backend.
        #[source]
        source: StoreError,
    },
    /// A data value could not be turned into record attributes.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// A loader read panicked; carries the ID being read.
    #[error("node fetch for '{0}' panicked")]
    FetchPanicked(String),
    /// A pagination cursor did not decode.
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl GraphError {
    pub(crate) fn decode(context: &'static str, source: DecodeError) -> Self {
        GraphError::Decode { context, source }
    }

    pub(crate) fn store(context: &'static str, source: StoreError) -> Self {
        GraphError::Store { context, source }
    }
}

/// Failures turning a physical record back into part of a node.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// No `rng` attribute.
    #[error("record is missing a range field")]
    MissingRangeField,
    /// The `rng` attribute is not a string.
    #[error("the record's range field is not a string")]
    RangeFieldNotString,
    /// The `rng` attribute is not a valid sort key.
    #[error("range field '{0}' is unknown")]
    UnknownRangeField(String),
    /// A node marker without an `id` attribute.
    #[error("record is missing its partition key")]
    MissingPartitionKey,
    /// A data record without a `t` attribute.
    #[error("data record is missing its type field")]
    MissingDataType,
    /// A registered kind rejected the record's attributes.
    #[error("failed to unmarshal data of type '{data_type}': {source}")]
    Unmarshal {
        /// Type name on the record.
        data_type: String,
        /// Deserialization failure.
        #[source]
        source: serde_json::Error,
    },
}

/// Errors reported by a [`crate::kv::KvClient`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached or throttled the call.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// The backend refused the request as invalid.
    #[error("request rejected: {0}")]
    Rejected(String),
    /// Any other backend-specific failure.
    #[error(transparent)]
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

/// A failed load as seen by every caller waiting on the same ID.
#[derive(Debug, Clone, Error)]
#[error(transparent)]
pub struct LoadError(Arc<GraphError>);

impl LoadError {
    /// The underlying error.
    pub fn inner(&self) -> &GraphError {
        &self.0
    }
}

impl From<GraphError> for LoadError {
    fn from(err: GraphError) -> Self {
        LoadError(Arc::new(err))
    }
}
