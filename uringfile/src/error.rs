use std::io;

/// Error raised by the ring layer itself, as opposed to the I/O
/// errors reported by individual reads and writes.
///
/// Callers only ever observe this converted into an [`io::Error`].
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub(crate) struct RingError {
    kind: RingErrorKind,
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
impl RingError {
    pub(crate) fn setup(err: io::Error) -> Self {
        Self {
            kind: RingErrorKind::Setup(err),
        }
    }

    pub(crate) fn invalid_config(reason: &'static str) -> Self {
        Self {
            kind: RingErrorKind::InvalidConfig(reason),
        }
    }

    pub(crate) fn shutdown() -> Self {
        Self {
            kind: RingErrorKind::Shutdown,
        }
    }

    pub(crate) fn unsupported(what: &'static str) -> Self {
        Self {
            kind: RingErrorKind::Unsupported(what),
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum RingErrorKind {
    #[error("ring setup failed: {0}")]
    Setup(#[source] io::Error),
    #[error("invalid ring configuration: {0}")]
    InvalidConfig(&'static str),
    #[error("ring worker has shut down")]
    Shutdown,
    #[error("{0} is not supported")]
    Unsupported(&'static str),
}

impl From<RingError> for io::Error {
    fn from(value: RingError) -> Self {
        match value.kind {
            RingErrorKind::Setup(err) => {
                io::Error::new(err.kind(), format!("ring setup failed: {err}"))
            }
            RingErrorKind::InvalidConfig(_) => io::Error::new(io::ErrorKind::InvalidInput, value),
            RingErrorKind::Shutdown => io::Error::new(io::ErrorKind::BrokenPipe, value),
            RingErrorKind::Unsupported(_) => io::Error::new(io::ErrorKind::Unsupported, value),
        }
    }
}
