//! A write-once, transactional cache for values that take longer to produce than to be asked for
//! again.
//!
//! When many threads ask for the same missing key at the same time, exactly one of them populates
//! it while all the others wait, and then every one of them is served the freshly produced bytes.
//! There is no separate singleflight layer: the fill itself is mutually exclusive per key.
//!
//! # Features
//!
//! - One population per key at a time, no matter how many callers miss it concurrently
//! - Concurrent readers of a fresh entry never wait for each other
//! - Accesses to unrelated keys never wait for each other's handlers
//! - Age based expiry chosen per access
//! - Payload agnostic: handlers read and write plain bytes through [`std::io`]
//! - Pluggable byte storage, see [`storage`]
//! - No unsafe code
//!
//! # Examples
//!
//! Populate a key on a miss and read it back on a hit:
//!
//! ```rust
//! use std::io::{Read, Write};
//! use std::time::Duration;
//! use tcache::{Cache, Handler, MemStorage};
//!
//! let cache: Cache<String, _> = Cache::new(MemStorage::new());
//!
//! // Nothing is cached yet, so `or_else` runs and fills the entry.
//! cache
//!     .access("answer", Duration::ZERO, Handler::new().or_else(|w| {
//!         w.write_all(b"42")?;
//!         Ok(())
//!     }))
//!     .unwrap();
//!
//! // Now the entry is fresh, so `then` runs instead.
//! let mut answer = String::new();
//! cache
//!     .access("answer", Duration::ZERO, Handler::new()
//!         .then(|r| {
//!             r.read_to_string(&mut answer)?;
//!             Ok(())
//!         })
//!         .or_else(|_| unreachable!()))
//!     .unwrap();
//!
//! assert_eq!(answer, "42");
//! ```
//!
//! Without `or_else`, a miss is an error:
//!
//! ```rust
//! use std::time::Duration;
//! use tcache::{Cache, Error, Handler, NullStorage};
//!
//! let cache: Cache<String, _> = Cache::new(NullStorage);
//!
//! let result = cache.access("missing", Duration::ZERO, Handler::new().then(|_| Ok(())));
//! assert!(matches!(result, Err(Error::EntryMissing)));
//! ```
//!
//! Many threads asking for the same key cause a single population:
//!
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::thread;
//! use std::time::Duration;
//! use tcache::{Cache, Handler, NullStorage};
//!
//! let cache: Arc<Cache<String, _>> = Arc::new(Cache::new(NullStorage));
//! let populations = Arc::new(AtomicUsize::new(0));
//!
//! let handles: Vec<_> = (0..4)
//!     .map(|_| {
//!         let cache = Arc::clone(&cache);
//!         let populations = Arc::clone(&populations);
//!         thread::spawn(move || {
//!             cache
//!                 .access("slow", Duration::ZERO, Handler::new().or_else(|_| {
//!                     populations.fetch_add(1, Ordering::SeqCst);
//!                     thread::sleep(Duration::from_millis(50));
//!                     Ok(())
//!                 }))
//!                 .unwrap();
//!         })
//!     })
//!     .collect();
//!
//! for handle in handles {
//!     handle.join().unwrap();
//! }
//!
//! assert_eq!(populations.load(Ordering::SeqCst), 1);
//! ```

#![forbid(unsafe_code)]
pub mod cache;
mod collections;
mod error;
pub mod storage;

pub use cache::Cache;
pub use cache::Handler;
pub use cache::stats::Stats;
pub use collections::Collections;
pub use error::{BoxError, Error, Result};
pub use storage::{Handle, MemStorage, NullStorage, Storage};
