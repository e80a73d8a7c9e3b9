use crate::storage::{Handle, Storage};
use std::io;

/// Storage that forgets everything written to it.
///
/// Useful to exercise the locking behaviour of a cache without any I/O.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullStorage;

impl<K> Storage<K> for NullStorage {
    type Handle = NullHandle;

    fn get_or_create(&self, _key: &K) -> NullHandle {
        NullHandle
    }

    fn delete(&self, _key: &K) {}
}

/// Handle of [`NullStorage`]. Reads are empty, writes are discarded.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullHandle;

impl Handle for NullHandle {
    type Reader<'a> = io::Empty;
    type Writer<'a> = io::Sink;

    fn reader(&self) -> io::Result<io::Empty> {
        Ok(io::empty())
    }

    fn writer(&mut self) -> io::Result<io::Sink> {
        Ok(io::sink())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn it_discards_writes() {
        // given
        let mut handle = Storage::<&str>::get_or_create(&NullStorage, &"key");

        // when
        handle.writer().unwrap().write_all(b"AAAA").unwrap();

        // then
        let mut read = Vec::new();
        handle.reader().unwrap().read_to_end(&mut read).unwrap();
        assert!(read.is_empty());
    }
}
