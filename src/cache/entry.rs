use crate::cache::handler::{OrElseFn, ThenFn};
use crate::error::{Error, Result};
use crate::storage::Handle;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::io::Write;
use std::time::{Duration, Instant};

/// Outcome of trying to serve an access from an entry.
pub(crate) enum Served {
    /// The entry was fresh and the read handler, if any, succeeded.
    Hit,
    /// The entry was invalid or too old. The read handler was not run.
    Stale,
    /// The entry was fresh but it could not be consumed.
    Failed(Error),
}

pub(crate) struct Entry<H> {
    state: RwLock<State<H>>,
}

pub(crate) struct State<H> {
    valid: bool,
    modified_at: Option<Instant>,
    // Set by the first population, before the entry can become valid.
    handle: Option<H>,
}

impl<H> Entry<H> {
    pub(crate) fn new() -> Self {
        Self {
            state: RwLock::new(State {
                valid: false,
                modified_at: None,
                handle: None,
            }),
        }
    }

    /// Takes the exclusive lock of an entry nobody else can see yet.
    pub(crate) fn reserve(&self) -> RwLockWriteGuard<'_, State<H>> {
        self.state.write()
    }

    fn read(&self, deadline: Option<Instant>) -> Result<RwLockReadGuard<'_, State<H>>> {
        match deadline {
            None => Ok(self.state.read()),
            Some(deadline) => self.state.try_read_until(deadline).ok_or(Error::Timeout),
        }
    }

    fn write(&self, deadline: Option<Instant>) -> Result<RwLockWriteGuard<'_, State<H>>> {
        match deadline {
            None => Ok(self.state.write()),
            Some(deadline) => self.state.try_write_until(deadline).ok_or(Error::Timeout),
        }
    }

    /// Marks the entry as invalid once every reader and writer is done with it.
    pub(crate) fn invalidate(&self, deadline: Option<Instant>) -> Result<()> {
        self.write(deadline)?.valid = false;
        Ok(())
    }
}

impl<H: Handle> Entry<H> {
    /// Serves the entry under its shared lock.
    ///
    /// `then` is only taken when the entry is fresh, so it stays available for another entry
    /// otherwise. Waiting for the lock past `deadline` is the only error.
    pub(crate) fn serve(
        &self,
        max_age: Duration,
        then: &mut Option<ThenFn<'_>>,
        deadline: Option<Instant>,
    ) -> Result<Served> {
        let state = self.read(deadline)?;

        let Some(handle) = state.fresh_handle(max_age) else {
            return Ok(Served::Stale);
        };

        let Some(then) = then.take() else {
            return Ok(Served::Hit);
        };

        let mut reader = match handle.reader() {
            Ok(reader) => reader,
            Err(e) => return Ok(Served::Failed(Error::Backend(e))),
        };

        match then(&mut reader) {
            Ok(()) => Ok(Served::Hit),
            Err(e) => Ok(Served::Failed(Error::Handler(e))),
        }
    }
}

impl<H: Handle> State<H> {
    fn fresh_handle(&self, max_age: Duration) -> Option<&H> {
        if !self.valid {
            return None;
        }

        let modified_at = self.modified_at?;
        if !max_age.is_zero() && modified_at.elapsed() >= max_age {
            return None;
        }

        self.handle.as_ref()
    }

    /// Runs a population. Must be called with the entry's exclusive lock held.
    ///
    /// The modification time is updated whatever the outcome, the entry only becomes valid if
    /// both the backend and `or_else` succeed.
    pub(crate) fn populate(&mut self, handle: H, or_else: OrElseFn<'_>) -> Result<()> {
        let handle = self.handle.insert(handle);

        let result = match handle.writer() {
            Ok(mut writer) => or_else(&mut writer)
                .map_err(Error::Handler)
                .and_then(|()| writer.flush().map_err(Error::Backend)),
            Err(e) => Err(Error::Backend(e)),
        };

        self.modified_at = Some(Instant::now());
        self.valid = result.is_ok();

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::storage::{MemHandle, NullHandle};
    use std::thread;

    fn populated(payload: &'static [u8]) -> Entry<MemHandle> {
        let entry = Entry::new();
        entry
            .reserve()
            .populate(
                MemHandle::default(),
                Box::new(move |w| {
                    w.write_all(payload)?;
                    Ok(())
                }),
            )
            .unwrap();
        entry
    }

    #[test]
    fn it_starts_stale() {
        // given
        let entry: Entry<NullHandle> = Entry::new();

        // when
        let served = entry.serve(Duration::ZERO, &mut None, None).unwrap();

        // then
        assert!(matches!(served, Served::Stale));
    }

    #[test]
    fn it_serves_written_bytes() {
        // given
        let entry = populated(b"AAAA");
        let mut read = Vec::new();
        let mut then: Option<ThenFn<'_>> = Some(Box::new(|r| {
            r.read_to_end(&mut read)?;
            Ok(())
        }));

        // when
        let served = entry.serve(Duration::ZERO, &mut then, None).unwrap();

        // then
        assert!(matches!(served, Served::Hit));
        assert!(then.is_none());
        drop(then);
        assert_eq!(read, b"AAAA");
    }

    #[test]
    fn it_keeps_the_read_handler_of_stale_entries() {
        // given
        let entry = populated(b"AAAA");
        entry.invalidate(None).unwrap();
        let mut then: Option<ThenFn<'_>> = Some(Box::new(|_| Ok(())));

        // when
        let served = entry.serve(Duration::ZERO, &mut then, None).unwrap();

        // then
        assert!(matches!(served, Served::Stale));
        assert!(then.is_some());
    }

    #[test]
    fn it_expires_old_entries() {
        // given
        let entry = populated(b"AAAA");
        let max_age = Duration::from_millis(20);

        // when
        let fresh = entry.serve(max_age, &mut None, None).unwrap();
        thread::sleep(max_age);
        let expired = entry.serve(max_age, &mut None, None).unwrap();

        // then
        assert!(matches!(fresh, Served::Hit));
        assert!(matches!(expired, Served::Stale));
        assert!(matches!(
            entry.serve(Duration::ZERO, &mut None, None).unwrap(),
            Served::Hit
        ));
    }

    #[test]
    fn it_reports_failed_reads() {
        // given
        let entry = populated(b"AAAA");
        let mut then: Option<ThenFn<'_>> = Some(Box::new(|_| Err(BoxError::from("cannot decode"))));

        // when
        let served = entry.serve(Duration::ZERO, &mut then, None).unwrap();

        // then
        let Served::Failed(err) = served else {
            panic!("expected a failed read");
        };
        assert_eq!(err.to_string(), "cannot decode");
    }

    #[test]
    fn it_stays_invalid_after_a_failed_population() {
        // given
        let entry = Entry::new();

        // when
        let result = entry
            .reserve()
            .populate(NullHandle, Box::new(|_| Err(BoxError::from("no answer"))));

        // then
        assert!(matches!(result, Err(Error::Handler(_))));
        assert!(matches!(
            entry.serve(Duration::ZERO, &mut None, None).unwrap(),
            Served::Stale
        ));
        assert!(entry.state.read().modified_at.is_some());
    }

    #[test]
    fn it_times_out_while_reserved() {
        // given
        let entry: Entry<NullHandle> = Entry::new();
        let _reserved = entry.reserve();
        let deadline = Instant::now() + Duration::from_millis(10);

        // when
        let served = entry.serve(Duration::ZERO, &mut None, Some(deadline));
        let invalidated = entry.invalidate(Some(deadline));

        // then
        assert!(matches!(served, Err(Error::Timeout)));
        assert!(matches!(invalidated, Err(Error::Timeout)));
    }
}
