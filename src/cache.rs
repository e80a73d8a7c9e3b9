use crate::Stats;
use crate::error::{Error, Result};
use crate::storage::Storage;
use entry::{Entry, Served};
use parking_lot::Mutex;
use stats::Counters;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::fmt::Debug;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;
use std::time::{Duration, Instant};

mod entry;
pub(crate) mod handler;
pub(crate) mod stats;

pub use handler::Handler;

pub(crate) type RandomState = ahash::RandomState;

type Rows<K, H, S> = HashMap<K, Arc<Entry<H>>, S>;

/// Write-once cache that lets exactly one caller populate a missing key.
///
/// Every key maps to at most one entry. An access either reads a fresh entry under its shared
/// lock, or reserves a new entry under its exclusive lock and populates it while every other
/// access to that key waits. Accesses to different keys never wait for each other, except for the
/// short moments they need the registry lock.
///
/// Wrap the cache in a [`std::sync::Arc`] to share it between threads. All operations only require
/// shared references to the cache.
pub struct Cache<K, B, S = RandomState>
where
    B: Storage<K>,
{
    storage: B,
    rows: Mutex<Rows<K, B::Handle, S>>,
    counters: Counters,
    metrics_last_accessed: Mutex<Instant>,
}

impl<K, B> Cache<K, B, RandomState>
where
    B: Storage<K>,
{
    /// Creates an empty cache keeping its bytes in `storage`.
    pub fn new(storage: B) -> Cache<K, B, RandomState> {
        Cache::with_hasher(storage, Default::default())
    }
}

impl<K, B, S> Cache<K, B, S>
where
    B: Storage<K>,
{
    /// Creates an empty cache keeping its bytes in `storage`, using `hash_builder` to hash the
    /// keys.
    pub fn with_hasher(storage: B, hash_builder: S) -> Cache<K, B, S> {
        Self {
            storage,
            rows: Mutex::new(HashMap::with_hasher(hash_builder)),
            counters: Counters::default(),
            metrics_last_accessed: Mutex::new(Instant::now()),
        }
    }

    pub fn storage(&self) -> &B {
        &self.storage
    }

    /// Number of entries, including reserved and invalid ones that were not removed yet.
    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }

    /// Returns the counters collected since the previous call and resets them.
    pub fn stats(&self) -> Stats {
        let mut stats = Stats::default();

        let millis_elapsed = {
            let mut guard = self.metrics_last_accessed.lock();
            let millis_elapsed = guard.elapsed().as_millis();
            *guard = Instant::now();
            millis_elapsed
        };

        stats.millis_elapsed = millis_elapsed;
        self.counters.take_into(&mut stats);

        stats
    }
}

impl<K, B, S> Cache<K, B, S>
where
    K: Clone + Eq + Hash,
    B: Storage<K>,
    S: BuildHasher,
{
    /// Accesses the entry of `key`.
    ///
    /// If the entry is fresh, meaning it is valid and, unless `max_age` is zero, younger than
    /// `max_age`, the `then` handler reads it. Otherwise the `or_else` handler populates a new
    /// entry, while concurrent accesses to the same key wait for it to finish and then look at
    /// the result. A failing `then` invalidates the entry and falls through to `or_else`.
    ///
    /// Returns [`Error::EntryMissing`] or [`Error::EntryInvalid`] when the entry is not fresh and
    /// there is no `or_else`, and the handler's error when the last handler that ran failed. An
    /// access without any handler does nothing and succeeds.
    ///
    /// Waiting for an in-flight population is unbounded, see [`Cache::access_timeout`].
    pub fn access<Q>(&self, key: &Q, max_age: Duration, handler: Handler<'_>) -> Result<()>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq + ToOwned<Owned = K> + Debug,
    {
        self.access_until(key, max_age, None, handler)
    }

    /// Like [`Cache::access`], but gives up with [`Error::Timeout`] when waiting for the entry
    /// lock takes longer than `timeout`.
    ///
    /// The wait covers both an in-flight population of the key and readers still holding an
    /// entry that has to be invalidated. Nothing is changed when the timeout hits. Handlers
    /// themselves are never interrupted.
    ///
    /// An entry whose `then` handler failed is always invalidated, so that access waits for the
    /// other readers of the entry regardless of `timeout` and returns the handler's error.
    pub fn access_timeout<Q>(
        &self,
        key: &Q,
        max_age: Duration,
        timeout: Duration,
        handler: Handler<'_>,
    ) -> Result<()>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq + ToOwned<Owned = K> + Debug,
    {
        let deadline = Instant::now().checked_add(timeout);
        self.access_until(key, max_age, deadline, handler)
    }

    fn access_until<Q>(
        &self,
        key: &Q,
        max_age: Duration,
        deadline: Option<Instant>,
        handler: Handler<'_>,
    ) -> Result<()>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq + ToOwned<Owned = K> + Debug,
    {
        if handler.is_noop() {
            return Ok(());
        }

        let Handler { mut then, or_else } = handler;

        let mut failure = Error::EntryMissing;
        // Set once `then` failed. Any entry found afterwards gets repopulated, not read.
        let mut consumed = false;

        let mut rows = loop {
            let rows = self.rows.lock();
            let Some(entry) = rows.get(key).cloned() else {
                break rows;
            };
            drop(rows);

            // The entry this access failed to read is invalidated whatever the deadline, so that
            // it is never served again.
            let mut wait = deadline;
            if !consumed {
                match entry.serve(max_age, &mut then, deadline)? {
                    Served::Hit => {
                        tracing::trace!("[tcache]: hit {key:?}");
                        self.counters.increment_hit_count();
                        return Ok(());
                    }
                    Served::Stale => {
                        tracing::trace!("[tcache]: stale {key:?}");
                        failure = Error::EntryInvalid;
                    }
                    Served::Failed(e) => {
                        tracing::debug!("[tcache]: failed to consume {key:?}: {e}");
                        failure = e;
                        consumed = true;
                        wait = None;
                    }
                }
            }

            match entry.invalidate(wait) {
                Ok(()) => {}
                // Timed out on an entry reserved after the failed read, which is already gone.
                Err(Error::Timeout) if consumed => {
                    self.counters.increment_miss_count();
                    return Err(failure);
                }
                Err(e) => return Err(e),
            }

            let mut rows = self.rows.lock();
            let unchanged = rows.get(key).map(|current| Arc::ptr_eq(current, &entry));
            match unchanged {
                Some(true) => {
                    rows.remove(key);
                    self.counters.increment_invalidation_count();
                    tracing::trace!("[tcache]: invalidated {key:?}");
                    break rows;
                }
                None => break rows,
                // Reserved by another access in the meantime, start over with its entry.
                Some(false) if or_else.is_some() => continue,
                Some(false) => {
                    self.counters.increment_miss_count();
                    return Err(failure);
                }
            }
        };

        self.counters.increment_miss_count();

        let Some(or_else) = or_else else {
            tracing::trace!("[tcache]: miss {key:?} without populating handler");
            return Err(failure);
        };

        let owned = key.to_owned();
        let entry = Arc::new(Entry::new());
        let mut state = entry.reserve();
        rows.insert(owned.clone(), Arc::clone(&entry));
        drop(rows);

        tracing::trace!("[tcache]: reserved {key:?}");

        let handle = self.storage.get_or_create(&owned);
        let result = state.populate(handle, or_else);
        drop(state);

        match &result {
            Ok(()) => {
                tracing::trace!("[tcache]: populated {key:?}");
                self.counters.increment_population_count();
            }
            Err(e) => {
                tracing::debug!("[tcache]: failed to populate {key:?}: {e}");
                self.counters.increment_failed_population_count();
            }
        }

        result
    }

    /// Removes the entry of `key` and discards its bytes in the storage backend.
    ///
    /// Accesses that already hold the entry finish with it, later ones see the key as missing.
    pub fn delete<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq + ToOwned<Owned = K> + Debug,
    {
        let removed = self.rows.lock().remove_entry(key);

        match removed {
            Some((key, _)) => self.storage.delete(&key),
            None => self.storage.delete(&key.to_owned()),
        }

        tracing::trace!("[tcache]: deleted {key:?}");
    }

    /// Returns `true` if there is an entry for `key`, whether it is fresh or not.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.rows.lock().contains_key(key)
    }
}

impl<K, B, S> fmt::Debug for Cache<K, B, S>
where
    B: Storage<K> + Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("storage", &self.storage)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
