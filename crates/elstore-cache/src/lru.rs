//! Fixed-capacity least-recently-used cache.
//!
//! The cache is a doubly-linked recency list plus a hash index. The list
//! lives in a slab (`Vec<Node>`) and links nodes by index, so no node is
//! ever reallocated once the cache has filled up: a full cache evicts by
//! overwriting its tail slot and moving it to the head.
//!
//! ```text
//!  head (most recent)                         tail (least recent)
//!    [c] <-> [a] <-> [d] <-> ... <-> [b]
//!
//!  index: { a -> slot 0, b -> slot 1, c -> slot 2, d -> slot 3, ... }
//! ```
//!
//! Recency changes only on insertion. [`LruCache::get`] does not promote,
//! so an element that is read often but never re-inserted still ages out.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use elstore_types::{Element, ElementId};
use tracing::trace;

use crate::traits::ElementCache;

const NIL: usize = usize::MAX;

struct Node<E> {
    id: ElementId,
    element: Arc<E>,
    prev: usize,
    next: usize,
}

/// List and index, always mutated together under one lock.
struct LruState<E> {
    nodes: Vec<Node<E>>,
    index: HashMap<ElementId, usize>,
    head: usize,
    tail: usize,
}

impl<E> LruState<E> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
            head: NIL,
            tail: NIL,
        }
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        if prev == NIL {
            self.head = next;
        } else {
            self.nodes[prev].next = next;
        }
        if next == NIL {
            self.tail = prev;
        } else {
            self.nodes[next].prev = prev;
        }
        self.nodes[idx].prev = NIL;
        self.nodes[idx].next = NIL;
    }

    fn push_front(&mut self, idx: usize) {
        self.nodes[idx].prev = NIL;
        self.nodes[idx].next = self.head;
        if self.head == NIL {
            self.tail = idx;
        } else {
            self.nodes[self.head].prev = idx;
        }
        self.head = idx;
    }

    fn move_to_front(&mut self, idx: usize) {
        if self.head != idx {
            self.unlink(idx);
            self.push_front(idx);
        }
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.index.clear();
        self.head = NIL;
        self.tail = NIL;
    }
}

/// Thread-safe LRU cache of elements.
///
/// A capacity of zero produces a disabled cache: inserts are ignored and
/// lookups always miss. Stores treat such a cache exactly like having no
/// cache at all.
pub struct LruCache<E> {
    capacity: usize,
    state: Option<Mutex<LruState<E>>>,
}

impl<E: Element> LruCache<E> {
    /// Create a cache with room for `capacity` elements.
    pub fn new(capacity: usize) -> Self {
        let state = (capacity > 0).then(|| Mutex::new(LruState::with_capacity(capacity)));
        Self { capacity, state }
    }

    /// Maximum number of cached elements.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns `true` if this cache was created with zero capacity.
    pub fn is_disabled(&self) -> bool {
        self.state.is_none()
    }

    /// Number of elements currently cached.
    pub fn len(&self) -> usize {
        match &self.state {
            Some(state) => state.lock().expect("lock poisoned").index.len(),
            None => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if `id` is cached. Does not promote.
    pub fn contains(&self, id: ElementId) -> bool {
        match &self.state {
            Some(state) => state.lock().expect("lock poisoned").index.contains_key(&id),
            None => false,
        }
    }

    /// Cached ids from most- to least-recently used.
    pub fn ids_by_recency(&self) -> Vec<ElementId> {
        let Some(state) = &self.state else {
            return Vec::new();
        };
        let state = state.lock().expect("lock poisoned");
        let mut ids = Vec::with_capacity(state.index.len());
        let mut cursor = state.head;
        while cursor != NIL {
            let node = &state.nodes[cursor];
            ids.push(node.id);
            cursor = node.next;
        }
        ids
    }

    /// Drop every cached element.
    pub fn clear(&self) {
        if let Some(state) = &self.state {
            state.lock().expect("lock poisoned").clear();
        }
    }

    /// Insert or promote `element`.
    ///
    /// - cached: move it to the head; the stored instance is kept.
    /// - not cached, room left: push a new node at the head.
    /// - not cached, full: evict the tail, reuse its slot for `element` and
    ///   move that slot to the head.
    pub fn cache(&self, element: Arc<E>) {
        let Some(state) = &self.state else {
            return;
        };
        let id = element.id();
        let mut state = state.lock().expect("lock poisoned");

        if let Some(&idx) = state.index.get(&id) {
            state.move_to_front(idx);
            return;
        }

        if state.index.len() < self.capacity {
            let idx = state.nodes.len();
            state.nodes.push(Node {
                id,
                element,
                prev: NIL,
                next: NIL,
            });
            state.push_front(idx);
            state.index.insert(id, idx);
            return;
        }

        let idx = state.tail;
        state.unlink(idx);
        let evicted = std::mem::replace(&mut state.nodes[idx].id, id);
        state.nodes[idx].element = element;
        state.index.remove(&evicted);
        state.push_front(idx);
        state.index.insert(id, idx);
        trace!(%evicted, inserted = %id, "lru eviction");
    }

    /// Look up `id` without changing recency.
    pub fn get(&self, id: ElementId) -> Option<Arc<E>> {
        let state = self.state.as_ref()?.lock().expect("lock poisoned");
        state
            .index
            .get(&id)
            .map(|&idx| Arc::clone(&state.nodes[idx].element))
    }
}

impl<E: Element> ElementCache<E> for LruCache<E> {
    fn cache(&self, element: Arc<E>) {
        LruCache::cache(self, element)
    }

    fn get(&self, id: ElementId) -> Option<Arc<E>> {
        LruCache::get(self, id)
    }
}

impl<E: Element> fmt::Debug for LruCache<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruCache")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elstore_types::ElementError;
    use proptest::prelude::*;
    use std::io::{Read, Write};

    #[derive(Debug, PartialEq)]
    struct Item {
        id: ElementId,
        data: String,
    }

    impl Element for Item {
        fn id(&self) -> ElementId {
            self.id
        }

        fn load(&mut self, reader: &mut dyn Read) -> Result<(), ElementError> {
            self.data.clear();
            reader.read_to_string(&mut self.data)?;
            Ok(())
        }

        fn store(&self, writer: &mut dyn Write) -> Result<(), ElementError> {
            writer.write_all(self.data.as_bytes())?;
            Ok(())
        }
    }

    fn item(id: u64, data: &str) -> Arc<Item> {
        Arc::new(Item {
            id: ElementId::new(id),
            data: data.to_string(),
        })
    }

    fn ids(values: &[u64]) -> Vec<ElementId> {
        values.iter().copied().map(ElementId::new).collect()
    }

    #[test]
    fn insert_then_get() {
        let lru = LruCache::new(1);
        lru.cache(item(1, "foobar"));
        assert_eq!(lru.get(ElementId::new(1)).unwrap().data, "foobar");
        assert_eq!(lru.len(), 1);
    }

    #[test]
    fn eviction_keeps_only_latest() {
        let lru = LruCache::new(1);
        lru.cache(item(1, "foobar"));
        lru.cache(item(2, "bazbaz"));
        lru.cache(item(3, "lelel"));

        assert!(lru.get(ElementId::new(1)).is_none());
        assert!(lru.get(ElementId::new(2)).is_none());
        assert_eq!(lru.get(ElementId::new(3)).unwrap().data, "lelel");
        assert_eq!(lru.len(), 1);
    }

    #[test]
    fn reinsert_promotes() {
        let lru = LruCache::new(2);
        lru.cache(item(1, "foobar"));
        lru.cache(item(2, "bazbaz"));
        lru.cache(item(1, "foobar"));
        lru.cache(item(3, "lelel"));

        assert_eq!(lru.ids_by_recency(), ids(&[3, 1]));
        assert_eq!(lru.get(ElementId::new(1)).unwrap().data, "foobar");
        assert!(lru.get(ElementId::new(2)).is_none());
        assert_eq!(lru.get(ElementId::new(3)).unwrap().data, "lelel");
    }

    #[test]
    fn reinsert_keeps_cached_instance() {
        let lru = LruCache::new(2);
        lru.cache(item(1, "first"));
        lru.cache(item(1, "second"));
        assert_eq!(lru.len(), 1);
        assert_eq!(lru.get(ElementId::new(1)).unwrap().data, "first");
    }

    #[test]
    fn get_does_not_promote() {
        let lru = LruCache::new(2);
        lru.cache(item(1, "a"));
        lru.cache(item(2, "b"));
        assert!(lru.get(ElementId::new(1)).is_some());
        lru.cache(item(3, "c"));

        // 1 was read but not re-inserted, so it was still the tail.
        assert!(!lru.contains(ElementId::new(1)));
        assert_eq!(lru.ids_by_recency(), ids(&[3, 2]));
    }

    #[test]
    fn promote_middle_and_tail() {
        let lru = LruCache::new(3);
        for id in 1..=3 {
            lru.cache(item(id, "x"));
        }
        assert_eq!(lru.ids_by_recency(), ids(&[3, 2, 1]));
        lru.cache(item(2, "x"));
        assert_eq!(lru.ids_by_recency(), ids(&[2, 3, 1]));
        lru.cache(item(1, "x"));
        assert_eq!(lru.ids_by_recency(), ids(&[1, 2, 3]));
        lru.cache(item(1, "x"));
        assert_eq!(lru.ids_by_recency(), ids(&[1, 2, 3]));
    }

    #[test]
    fn eviction_reuses_slots() {
        let lru = LruCache::new(2);
        for id in 0..100 {
            lru.cache(item(id, "x"));
        }
        let state = lru.state.as_ref().unwrap().lock().unwrap();
        assert_eq!(state.nodes.len(), 2);
        assert_eq!(state.index.len(), 2);
    }

    #[test]
    fn zero_capacity_is_disabled() {
        let lru = LruCache::new(0);
        assert!(lru.is_disabled());
        lru.cache(item(1, "foobar"));
        assert!(lru.get(ElementId::new(1)).is_none());
        assert!(lru.is_empty());
        assert!(lru.ids_by_recency().is_empty());
    }

    #[test]
    fn clear_empties_cache() {
        let lru = LruCache::new(4);
        lru.cache(item(1, "a"));
        lru.cache(item(2, "b"));
        lru.clear();
        assert!(lru.is_empty());
        assert!(lru.get(ElementId::new(1)).is_none());
        lru.cache(item(3, "c"));
        assert_eq!(lru.ids_by_recency(), ids(&[3]));
    }

    #[test]
    fn usable_as_trait_object() {
        let cache: Arc<dyn ElementCache<Item>> = Arc::new(LruCache::new(1));
        cache.cache(item(5, "five"));
        assert_eq!(cache.get(ElementId::new(5)).unwrap().data, "five");
    }

    #[test]
    fn concurrent_inserts_stay_bounded() {
        use std::thread;

        let lru = Arc::new(LruCache::<Item>::new(8));
        let handles: Vec<_> = (0..8u64)
            .map(|t| {
                let lru = Arc::clone(&lru);
                thread::spawn(move || {
                    for i in 0..200 {
                        lru.cache(item(t * 1000 + i, "x"));
                        let _ = lru.get(ElementId::new(t * 1000 + i / 2));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().expect("thread should not panic");
        }
        assert_eq!(lru.len(), 8);
        assert_eq!(lru.ids_by_recency().len(), 8);
    }

    #[test]
    fn debug_format() {
        let lru = LruCache::<Item>::new(3);
        let debug = format!("{lru:?}");
        assert!(debug.contains("LruCache"));
        assert!(debug.contains("capacity: 3"));
    }

    proptest! {
        #[test]
        fn overflow_by_one_evicts_lru(capacity in 1usize..32) {
            let lru = LruCache::new(capacity);
            for id in 0..=capacity as u64 {
                lru.cache(item(id, "x"));
            }
            prop_assert_eq!(lru.len(), capacity);
            prop_assert!(lru.get(ElementId::new(0)).is_none());
            for id in 1..=capacity as u64 {
                prop_assert!(lru.get(ElementId::new(id)).is_some());
            }
        }

        #[test]
        fn promotion_does_not_grow(capacity in 1usize..16, promote in 0usize..16) {
            let lru = LruCache::new(capacity);
            for id in 0..capacity as u64 {
                lru.cache(item(id, "x"));
            }
            let target = (promote % capacity) as u64;
            lru.cache(item(target, "x"));
            prop_assert_eq!(lru.len(), capacity);
            prop_assert_eq!(lru.ids_by_recency()[0], ElementId::new(target));
        }

        #[test]
        fn matches_reference_model(
            ops in proptest::collection::vec(0u64..12, 0..200),
            capacity in 1usize..6,
        ) {
            let lru = LruCache::new(capacity);
            let mut model: Vec<u64> = Vec::new();
            for id in ops {
                lru.cache(item(id, "x"));
                if let Some(pos) = model.iter().position(|&m| m == id) {
                    model.remove(pos);
                } else if model.len() == capacity {
                    model.pop();
                }
                model.insert(0, id);
            }
            prop_assert_eq!(lru.ids_by_recency(), ids(&model));
        }
    }
}
