use std::sync::Arc;

use elstore_types::ElementId;

/// In-memory accelerator a store can push elements into.
///
/// Implementations synchronise internally; every method takes `&self` so a
/// single cache can be shared between a store and its background writers.
pub trait ElementCache<E>: Send + Sync {
    /// Insert `element`, or promote it if its id is already cached.
    fn cache(&self, element: Arc<E>);

    /// Look up an element by id.
    ///
    /// Returns `None` if the id is not cached. Lookups never change the
    /// eviction order.
    fn get(&self, id: ElementId) -> Option<Arc<E>>;
}
