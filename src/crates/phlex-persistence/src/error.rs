//! Error types for persistence backend operations

use thiserror::Error;

/// Result type for persistence backend operations
pub type Result<T> = std::result::Result<T, PersistenceError>;

/// Errors a [`PersistenceBackend`](crate::PersistenceBackend) implementation may report.
///
/// The core does not interpret payload contents, so most of these wrap an
/// opaque message from the backend rather than a structured cause.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// `read` was called for a product/id pair the backend has no data for.
    #[error("no data for product '{product}' at id {id}")]
    NotFound {
        /// Product name that was requested.
        product: String,
        /// String form of the store id that was requested.
        id: String,
    },

    /// A container was registered for a product that already has one.
    #[error("container already created for product '{0}'")]
    ContainerExists(String),

    /// Serialization of a payload failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend-specific failure (disk full, connection dropped, etc).
    #[error("backend storage error: {0}")]
    Storage(String),

    /// A write was registered for a product with no matching container.
    #[error("no container registered for product '{0}'")]
    NoContainer(String),
}
