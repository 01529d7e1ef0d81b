use std::io;
use std::sync::Arc;

use elstore_types::{ElementError, ElementId};

/// Errors from element store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An element with this id is already stored or being written.
    #[error("element already exists in store: {0}")]
    AlreadyExists(ElementId),

    /// No element with this id is stored or being written.
    #[error("element not present in store: {0}")]
    NotFound(ElementId),

    /// I/O error from the underlying file system.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The element's own encode/decode failed.
    #[error(transparent)]
    Element(#[from] ElementError),

    /// The storage directory could not be scanned.
    #[error("directory scan failed: {0}")]
    Walk(#[from] walkdir::Error),

    /// An earlier background write failed. Every later put reports the same
    /// failure; the store accepts no more writes.
    #[error("background write of {id} failed: {source}")]
    BackgroundWrite {
        id: ElementId,
        #[source]
        source: Arc<StoreError>,
    },

    /// The store configuration could not be parsed.
    #[error("invalid store config: {0}")]
    Config(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
