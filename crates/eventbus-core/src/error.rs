//! Error types for eventbus-core
//!
//! [`Error`] is what callers of [`Event`](crate::Event) see.
//! [`StoreError`] is what a [`Store`](crate::Store) implementation reports; the
//! bus wraps it with the operation that failed and keeps it as the source.

use thiserror::Error;

/// Failures reported by a store implementation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The payload could not be serialized for the transport
    #[error("encoding error: {0}")]
    Encoding(String),

    /// The transport (connection, broker) rejected or failed the operation
    #[error("transport error: {0}")]
    Transport(String),

    /// The store no longer accepts work
    #[error("store closed")]
    Closed,
}

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// A handler with this id is already registered
    #[error("duplicate handler id: {0}")]
    DuplicateHandlerId(String),

    /// Handler ids must be non-empty
    #[error("handler id must not be empty")]
    EmptyHandlerId,

    /// The store could not establish the subscription at construction
    #[error("subscription failed: {0}")]
    Subscription(#[source] StoreError),

    /// The store could not accept a published payload
    #[error("publish failed: {0}")]
    Publish(#[source] StoreError),
}

impl Error {
    /// Returns the underlying store error, if this failure came from the store
    #[must_use]
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::Subscription(e) | Self::Publish(e) => Some(e),
            Self::DuplicateHandlerId(_) | Self::EmptyHandlerId => None,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
