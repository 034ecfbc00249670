//! Memoization of expensive lookups
//!
//! [`ResultCache`] is a least-recently-used map from a normalized key to a
//! computed value. Each key owns a [`OnceCell`], so concurrent first accesses
//! for the same key run the computation once and every caller observes the
//! same value. Entries still being computed are never evicted; the map may
//! hold more than `capacity` keys while computations are in flight.
//!
//! A value rejected by the `retain` predicate of
//! [`ResultCache::get_or_compute_retaining`] reaches the callers already
//! waiting on that key and is then forgotten, so the next caller computes
//! again.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::OnceCell;
use tracing::trace;

/// Separator between the segments of a composite key
pub const KEY_DELIMITER: &str = "|";

/// Build a normalized composite key
///
/// Segments are trimmed and lowercased; a missing segment becomes an empty
/// string, so `["MIT", None]` and `[" mit ", Some("")]` produce the same key.
pub fn cache_key<'a, I>(parts: I) -> String
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    parts
        .into_iter()
        .map(|part| part.map(|s| s.trim().to_lowercase()).unwrap_or_default())
        .collect::<Vec<_>>()
        .join(KEY_DELIMITER)
}

struct Entry<V> {
    cell: Arc<OnceCell<V>>,
    last_used: u64,
}

struct State<V> {
    entries: HashMap<String, Entry<V>>,
    clock: u64,
}

/// Bounded (or unbounded) LRU cache with single-flight population
pub struct ResultCache<V> {
    state: Mutex<State<V>>,
    capacity: Option<usize>,
}

impl<V: Clone> ResultCache<V> {
    /// Cache holding at most `capacity` keys (minimum 1)
    pub fn bounded(capacity: usize) -> Self {
        Self::build(Some(capacity.max(1)))
    }

    /// Cache that never evicts
    pub fn unbounded() -> Self {
        Self::build(None)
    }

    /// `0` means unbounded
    pub fn with_capacity(capacity: usize) -> Self {
        match capacity {
            0 => Self::unbounded(),
            n => Self::bounded(n),
        }
    }

    fn build(capacity: Option<usize>) -> Self {
        Self {
            state: Mutex::new(State {
                entries: HashMap::new(),
                clock: 0,
            }),
            capacity,
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, State<V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the cell for `key`, inserting it and evicting as needed
    fn slot(&self, key: &str) -> Arc<OnceCell<V>> {
        let mut state = self.lock();
        state.clock += 1;
        let now = state.clock;

        if let Some(entry) = state.entries.get_mut(key) {
            entry.last_used = now;
            return Arc::clone(&entry.cell);
        }

        let cell = Arc::new(OnceCell::new());
        state.entries.insert(
            key.to_string(),
            Entry {
                cell: Arc::clone(&cell),
                last_used: now,
            },
        );

        if let Some(capacity) = self.capacity {
            while state.entries.len() > capacity {
                let victim = state
                    .entries
                    .iter()
                    .filter(|(_, entry)| entry.cell.initialized())
                    .min_by_key(|(_, entry)| entry.last_used)
                    .map(|(k, _)| k.clone());
                match victim {
                    Some(victim) => {
                        trace!(key = %victim, "Evicting least recently used entry");
                        state.entries.remove(&victim);
                    },
                    None => break,
                }
            }
        }

        cell
    }

    /// Drop `key` if it still maps to `cell`
    fn discard(&self, key: &str, cell: &Arc<OnceCell<V>>) {
        let mut state = self.lock();
        if state
            .entries
            .get(key)
            .is_some_and(|entry| Arc::ptr_eq(&entry.cell, cell))
        {
            trace!(key = %key, "Discarding rejected entry");
            state.entries.remove(key);
        }
    }

    /// Return the cached value for `key`, computing it on first access
    pub async fn get_or_compute<F, Fut>(&self, key: &str, compute: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        self.get_or_compute_retaining(key, compute, |_| true).await
    }

    /// Like [`get_or_compute`](Self::get_or_compute), but a computed value
    /// failing `retain` is not kept
    ///
    /// Callers that were already waiting on the same key receive the rejected
    /// value; later callers start a fresh computation.
    pub async fn get_or_compute_retaining<F, Fut, R>(&self, key: &str, compute: F, retain: R) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
        R: FnOnce(&V) -> bool,
    {
        let cell = self.slot(key);
        let slot = &cell;
        cell.get_or_init(move || async move {
            let value = compute().await;
            if !retain(&value) {
                // Unlinked before the cell is set, so no new caller can observe it
                self.discard(key, slot);
            }
            value
        })
        .await
        .clone()
    }

    /// Look up a populated entry, marking it as recently used
    pub fn get(&self, key: &str) -> Option<V> {
        let mut state = self.lock();
        state.clock += 1;
        let now = state.clock;
        let entry = state.entries.get_mut(key)?;
        entry.last_used = now;
        entry.cell.get().cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.lock()
            .entries
            .get(key)
            .is_some_and(|entry| entry.cell.initialized())
    }

    /// Number of populated entries
    pub fn len(&self) -> usize {
        self.lock()
            .entries
            .values()
            .filter(|entry| entry.cell.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
