use crate::cache::RandomState;
use crate::storage::{Handle, Storage};
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};
use std::io::{self, Read, Write};
use std::sync::Arc;

/// Keeps the bytes of every key in an in-memory buffer.
///
/// The buffer of a key outlives the cache entries using it and is only dropped by
/// [`Storage::delete`]. Opening a writer truncates the buffer, so every population replaces the
/// bytes of the previous one.
///
/// Successive entries of a key share its buffer until the key is deleted. An access still holding
/// an entry from before a [`crate::Cache::delete`] keeps the old buffer, and reads whatever was
/// written to it last, including bytes of a population that later failed. The first
/// [`Storage::get_or_create`] after the delete starts a fresh buffer that older handles never see.
#[derive(Debug)]
pub struct MemStorage<K, S = RandomState> {
    index: Mutex<HashMap<K, MemHandle, S>>,
}

impl<K> MemStorage<K, RandomState> {
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }
}

impl<K> Default for MemStorage<K, RandomState> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, S> MemStorage<K, S> {
    /// Creates an empty storage which uses `hash_builder` to hash the keys.
    pub fn with_hasher(hash_builder: S) -> Self {
        Self {
            index: Mutex::new(HashMap::with_hasher(hash_builder)),
        }
    }

    /// Number of keys with a buffer.
    pub fn len(&self) -> usize {
        self.index.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.lock().is_empty()
    }
}

impl<K, S> Storage<K> for MemStorage<K, S>
where
    K: Clone + Eq + Hash,
    S: BuildHasher,
{
    type Handle = MemHandle;

    fn get_or_create(&self, key: &K) -> MemHandle {
        let mut index = self.index.lock();
        index.entry(key.clone()).or_default().clone()
    }

    fn delete(&self, key: &K) {
        self.index.lock().remove(key);
    }
}

/// Shared buffer of one key in a [`MemStorage`].
#[derive(Clone, Debug, Default)]
pub struct MemHandle {
    buffer: Arc<RwLock<Vec<u8>>>,
}

impl Handle for MemHandle {
    type Reader<'a> = MemReader<'a>;
    type Writer<'a> = MemWriter<'a>;

    fn reader(&self) -> io::Result<MemReader<'_>> {
        Ok(MemReader {
            buffer: self.buffer.read(),
            pos: 0,
        })
    }

    fn writer(&mut self) -> io::Result<MemWriter<'_>> {
        let mut buffer = self.buffer.write();
        buffer.clear();
        Ok(MemWriter { buffer })
    }
}

/// Reads the buffer of a [`MemHandle`] from the start.
pub struct MemReader<'a> {
    buffer: RwLockReadGuard<'a, Vec<u8>>,
    pos: usize,
}

impl Read for MemReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut rest = &self.buffer.as_slice()[self.pos..];
        let n = rest.read(buf)?;
        self.pos += n;
        Ok(n)
    }
}

/// Appends to the buffer of a [`MemHandle`].
pub struct MemWriter<'a> {
    buffer: RwLockWriteGuard<'a, Vec<u8>>,
}

impl Write for MemWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
