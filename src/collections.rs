use crate::cache::{Cache, RandomState};
use crate::storage::Storage;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Named caches created on first use.
///
/// Every collection is an independent [`Cache`] with its own storage, built by the factory given
/// to [`Collections::new`]. Asking twice for the same name returns the same cache.
///
/// ```rust
/// use std::time::Duration;
/// use std::io::Write;
/// use tcache::{Collections, Handler, MemStorage};
///
/// let collections = Collections::new(MemStorage::<String>::new);
///
/// let answers = collections.table("answers");
/// answers
///     .access("Am I loved?", Duration::ZERO, Handler::new().or_else(|w| {
///         w.write_all(b"yes")?;
///         Ok(())
///     }))
///     .unwrap();
///
/// assert!(collections.table("answers").contains_key("Am I loved?"));
/// assert!(!collections.table("questions").contains_key("Am I loved?"));
/// ```
pub struct Collections<K, B, F>
where
    B: Storage<K>,
{
    factory: F,
    tables: Mutex<HashMap<String, Arc<Cache<K, B>>, RandomState>>,
}

impl<K, B, F> Collections<K, B, F>
where
    B: Storage<K>,
    F: Fn() -> B,
{
    /// Creates an empty registry which builds the storage of each new collection with `factory`.
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            tables: Mutex::new(HashMap::default()),
        }
    }

    /// Returns the cache of collection `name`, creating it if needed.
    pub fn table(&self, name: &str) -> Arc<Cache<K, B>> {
        let mut tables = self.tables.lock();
        if let Some(table) = tables.get(name) {
            return Arc::clone(table);
        }

        tracing::debug!("[tcache]: new collection {name}");
        let table = Arc::new(Cache::new((self.factory)()));
        tables.insert(name.to_owned(), Arc::clone(&table));
        table
    }

    /// Forgets collection `name`.
    ///
    /// Holders of the returned cache can keep using it, but [`Collections::table`] hands out a new
    /// empty cache for the name from now on.
    pub fn remove(&self, name: &str) -> Option<Arc<Cache<K, B>>> {
        self.tables.lock().remove(name)
    }

    pub fn len(&self) -> usize {
        self.tables.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.lock().is_empty()
    }
}

impl<K, B, F> fmt::Debug for Collections<K, B, F>
where
    B: Storage<K>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tables = self.tables.lock();
        f.debug_struct("Collections")
            .field("names", &tables.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Handler;
    use crate::storage::{MemStorage, NullStorage};
    use std::time::Duration;

    #[test]
    fn it_returns_the_same_table_for_a_name() {
        // given
        let collections = Collections::new(MemStorage::<String>::new);

        // when
        let first = collections.table("passwords");
        let second = collections.table("passwords");
        let other = collections.table("hashes");

        // then
        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(collections.len(), 2);
    }

    #[test]
    fn it_keeps_collections_apart() {
        // given
        let collections = Collections::new(MemStorage::<String>::new);
        collections
            .table("passwords")
            .access(
                "admin",
                Duration::ZERO,
                Handler::new().or_else(|w| {
                    w.write_all(b"hunter2")?;
                    Ok(())
                }),
            )
            .unwrap();

        // when
        let passwords = collections.table("passwords");
        let hashes = collections.table("hashes");

        // then
        assert!(passwords.contains_key("admin"));
        assert!(!hashes.contains_key("admin"));
        assert!(hashes.storage().is_empty());
    }

    #[test]
    fn it_creates_a_new_table_after_removal() {
        // given
        let collections = Collections::new(|| NullStorage);
        let removed = collections.table("passwords");
        removed
            .access("admin", Duration::ZERO, Handler::new().or_else(|_| Ok(())))
            .unwrap();

        // when
        let returned = collections.remove("passwords");
        let recreated: Arc<Cache<String, NullStorage>> = collections.table("passwords");

        // then
        assert!(returned.is_some_and(|table| Arc::ptr_eq(&table, &removed)));
        assert!(recreated.is_empty());
        assert!(removed.contains_key("admin"));
        assert!(collections.remove("missing").is_none());
    }
}
