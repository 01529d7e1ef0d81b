//! Concurrency-safe, file-backed storage for uniquely identified elements.
//!
//! [`FileStore`] keeps one file per element under a root directory, writes
//! asynchronously, and can put an [`LruCache`](elstore_cache::LruCache) in
//! front of the disk.
//!
//! # Consistency rules
//!
//! 1. An id is present if it is in the write buffer or in the inventory,
//!    checked in that order.
//! 2. Duplicate ids are rejected; element files are never overwritten.
//! 3. Of concurrent puts with the same id, exactly one succeeds.
//! 4. A background write failure is reported by every later `put`; reads
//!    are unaffected.
//! 5. Elements are only removed by deleting the whole store.

pub mod config;
pub mod error;
mod pending;
pub mod store;

pub use config::{CacheMode, StoreConfig};
pub use elstore_cache::{ElementCache, LruCache};
pub use elstore_types::{codec, Element, ElementError, ElementId};
pub use error::{StoreError, StoreResult};
pub use store::FileStore;
