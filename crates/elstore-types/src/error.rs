use std::io;

use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid element id {input:?}: {reason}")]
    InvalidId { input: String, reason: String },
}

/// Errors an [`Element`](crate::Element) reports from its own encode/decode.
///
/// The store never inspects these; they travel back to the caller as-is.
#[derive(Debug, Error)]
pub enum ElementError {
    /// I/O failure while reading from or writing to the byte stream.
    #[error("element I/O error: {0}")]
    Io(#[from] io::Error),

    /// The element could not be encoded.
    #[error("element encode error: {0}")]
    Encode(String),

    /// The byte stream did not decode into a valid element.
    #[error("element decode error: {0}")]
    Decode(String),
}
