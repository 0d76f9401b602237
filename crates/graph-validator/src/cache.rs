//! Shared artifact cache used while compiling a validator.
//!
//! Constraint factories use it to memoize expensive byproducts (compiled
//! patterns, lookup tables) so that every property declaring the same input
//! receives the *same* artifact instance. Entries are keyed by the triple
//! (key type, value type, key value).
//!
//! The cache lives exactly as long as one build session and is safe to share
//! across the worker threads of a parallel build.

use std::any::{Any, TypeId};
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// One typed slot of the cache: all entries sharing a (key type, value type) pair.
type Slot<K, V> = DashMap<K, Arc<V>>;

/// Concurrent memoization store keyed by (key type, value type, key value).
///
/// Under concurrent callers racing on the same key the factory may run more
/// than once, but only the first stored result is retained and every caller
/// observes that same instance.
#[derive(Default)]
pub struct ArtifactCache {
    slots: DashMap<(TypeId, TypeId), Arc<dyn Any + Send + Sync>>,
    entries: AtomicUsize,
}

impl ArtifactCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached value for `key`, or stores the one produced by `factory`.
    pub fn get_or_create<K, V, F>(&self, key: K, factory: F) -> Arc<V>
    where
        K: Eq + Hash + Send + Sync + 'static,
        V: Send + Sync + 'static,
        F: FnOnce(&K) -> V,
    {
        match self.try_get_or_create(key, |k| Ok::<_, std::convert::Infallible>(factory(k))) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Fallible variant of [`get_or_create`](Self::get_or_create).
    ///
    /// A failing factory stores nothing, so a later call retries.
    pub fn try_get_or_create<K, V, E, F>(&self, key: K, factory: F) -> Result<Arc<V>, E>
    where
        K: Eq + Hash + Send + Sync + 'static,
        V: Send + Sync + 'static,
        F: FnOnce(&K) -> Result<V, E>,
    {
        let slot = self.slot::<K, V>();

        if let Some(existing) = slot.get(&key) {
            return Ok(Arc::clone(existing.value()));
        }

        // The factory runs outside any shard lock so it may use the cache itself.
        let created = Arc::new(factory(&key)?);

        let stored = match slot.entry(key) {
            Entry::Occupied(occupied) => Arc::clone(occupied.get()),
            Entry::Vacant(vacant) => {
                self.entries.fetch_add(1, Ordering::Relaxed);
                Arc::clone(vacant.insert(created).value())
            }
        };
        Ok(stored)
    }

    /// Number of retained artifacts across all slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.load(Ordering::Relaxed)
    }

    /// Whether nothing has been cached yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot<K, V>(&self) -> Arc<Slot<K, V>>
    where
        K: Eq + Hash + Send + Sync + 'static,
        V: Send + Sync + 'static,
    {
        let erased = Arc::clone(
            self.slots
                .entry((TypeId::of::<K>(), TypeId::of::<V>()))
                .or_insert_with(|| Arc::new(Slot::<K, V>::new()) as Arc<dyn Any + Send + Sync>)
                .value(),
        );
        match erased.downcast::<Slot<K, V>>() {
            Ok(slot) => slot,
            Err(_) => unreachable!("cache slots are keyed by their own key and value types"),
        }
    }
}

impl std::fmt::Debug for ArtifactCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactCache")
            .field("slots", &self.slots.len())
            .field("entries", &self.len())
            .finish()
    }
}
