use crate::error::BoxError;
use std::fmt;
use std::io::{Read, Write};

pub(crate) type ThenFn<'a> = Box<dyn FnOnce(&mut dyn Read) -> Result<(), BoxError> + 'a>;
pub(crate) type OrElseFn<'a> = Box<dyn FnOnce(&mut dyn Write) -> Result<(), BoxError> + 'a>;

/// What to do with an entry once [`crate::Cache::access`] knows whether it is fresh.
///
/// Each closure runs at most once per access. Both are optional: an access without any handler
/// does nothing, and an access without [`Handler::or_else`] fails on a miss instead of populating.
///
/// Handlers return a [`BoxError`], so any error convertible into one can be returned with `?` or
/// `Err(e.into())`. It comes back from the access as [`crate::Error::Handler`], where
/// [`crate::Error::handler_error`] can downcast it to the original type.
///
/// ```rust
/// use std::io::{Read, Write};
/// use tcache::Handler;
///
/// let mut cached = String::new();
/// let handler = Handler::new()
///     .then(|r| {
///         r.read_to_string(&mut cached)?;
///         Ok(())
///     })
///     .or_else(|w| {
///         w.write_all(b"42")?;
///         Ok(())
///     });
/// # drop(handler);
/// ```
#[derive(Default)]
pub struct Handler<'a> {
    pub(crate) then: Option<ThenFn<'a>>,
    pub(crate) or_else: Option<OrElseFn<'a>>,
}

impl<'a> Handler<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` with the cached bytes when the entry is fresh.
    ///
    /// The entry's shared lock is held while `f` runs, so other readers run in parallel but a
    /// population of the same key waits for `f` to return. If `f` fails, the entry is invalidated
    /// and the access falls through to [`Handler::or_else`].
    pub fn then<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut dyn Read) -> Result<(), BoxError> + 'a,
    {
        self.then = Some(Box::new(f));
        self
    }

    /// Runs `f` to populate the entry when it is missing or stale.
    ///
    /// The entry's exclusive lock is held while `f` runs, which makes every other access to the
    /// same key wait. The entry only becomes valid if `f` succeeds.
    pub fn or_else<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut dyn Write) -> Result<(), BoxError> + 'a,
    {
        self.or_else = Some(Box::new(f));
        self
    }

    pub(crate) fn is_noop(&self) -> bool {
        self.then.is_none() && self.or_else.is_none()
    }
}

impl fmt::Debug for Handler<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("then", &self.then.is_some())
            .field("or_else", &self.or_else.is_some())
            .finish()
    }
}
