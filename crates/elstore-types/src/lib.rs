//! Foundation types for elstore.
//!
//! Every other elstore crate depends on `elstore-types`.
//!
//! # Key Types
//!
//! - [`ElementId`] — 64-bit identifier with a file-name-safe base-36 form
//! - [`Element`] — capability trait the store persists (identify, load, store)
//! - [`ElementError`] — failures raised by an element's own codec

pub mod codec;
pub mod element;
pub mod error;
pub mod id;

pub use element::Element;
pub use error::{ElementError, TypeError};
pub use id::{ElementId, SHARD_LEN};
