//! Byte storage behind cache entries.
//!
//! The cache never interprets the bytes it stores. A [`Storage`] hands out one [`Handle`] per
//! key, and the cache only ever touches that handle while it holds the owning entry's lock:
//! [`Handle::reader`] under the shared lock, [`Handle::writer`] under the exclusive one.

use std::io::{self, Read, Write};

pub mod mem;
pub mod null;

pub use mem::{MemHandle, MemStorage};
pub use null::{NullHandle, NullStorage};

/// Read and write access to the bytes stored for a single key.
pub trait Handle {
    /// Stream over the previously written bytes.
    type Reader<'a>: Read
    where
        Self: 'a;

    /// Sink receiving the bytes of a new population.
    type Writer<'a>: Write
    where
        Self: 'a;

    /// Opens a reader. An error invalidates the entry and is returned to the caller.
    fn reader(&self) -> io::Result<Self::Reader<'_>>;

    /// Opens a writer. An error leaves the entry invalid and is returned to the caller.
    fn writer(&mut self) -> io::Result<Self::Writer<'_>>;
}

/// Keeps track of the handles of all keys.
pub trait Storage<K> {
    type Handle: Handle;

    /// Returns the handle for `key`, creating backing storage if the key is new.
    ///
    /// This must not fail for a key that simply does not exist yet.
    fn get_or_create(&self, key: &K) -> Self::Handle;

    /// Discards the backing storage of `key`. Missing keys are ignored.
    fn delete(&self, key: &K);
}
