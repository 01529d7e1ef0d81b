//! Element caches for elstore.
//!
//! A store consults its cache before touching its write buffer or the disk.
//! The cache never calls back into the store; the store drives it through
//! the narrow [`ElementCache`] trait.
//!
//! - [`LruCache`] -- fixed-capacity, constant-time least-recently-used cache

pub mod lru;
pub mod traits;

pub use lru::LruCache;
pub use traits::ElementCache;
