use std::io;

/// Error produced by a caller supplied handler.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Cache access error.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// No entry exists for the key and no populating handler was given.
    #[error("entry missing")]
    EntryMissing,
    /// The entry is invalid or expired and no populating handler was given.
    #[error("entry invalid")]
    EntryInvalid,
    /// The storage backend could not provide a reader or writer.
    #[error("storage backend error: {0}")]
    Backend(#[source] io::Error),
    /// A handler returned an error. It is passed through untouched.
    #[error("{0}")]
    Handler(#[source] BoxError),
    /// The deadline passed while waiting for the entry lock.
    #[error("timed out waiting for entry")]
    Timeout,
}

impl Error {
    /// Returns the handler's error if this error came from a handler.
    pub fn handler_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Self::Handler(e) => Some(e.as_ref()),
            _ => None,
        }
    }

    /// Consumes the error and returns the handler's error, if any.
    pub fn into_handler_error(self) -> Option<BoxError> {
        match self {
            Self::Handler(e) => Some(e),
            _ => None,
        }
    }
}

/// Cache access result.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(thiserror::Error, Debug, PartialEq)]
    #[error("slow answer unavailable")]
    struct Unavailable;

    #[test]
    fn it_passes_handler_errors_through() {
        // given
        let err = Error::Handler(Box::new(Unavailable));

        // then
        assert_eq!(err.to_string(), "slow answer unavailable");
        assert_eq!(
            err.handler_error().and_then(|e| e.downcast_ref::<Unavailable>()),
            Some(&Unavailable)
        );
    }

    #[test]
    fn it_wraps_backend_errors() {
        // given
        let err = Error::Backend(io::Error::other("disk gone"));

        // then
        assert_eq!(err.to_string(), "storage backend error: disk gone");
        assert!(err.handler_error().is_none());
        assert!(err.into_handler_error().is_none());
    }
}
