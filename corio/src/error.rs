use std::fmt;
use std::io;
use std::panic::Location;

/// Convenience alias used by every fallible operation in the runtime.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the runtime or raised from inside a task body.
///
/// A failure raised inside a task is stored in the task's result slot and
/// surfaces at the first point an awaiter observes the result. The
/// scheduler never swallows one.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A guarded system call returned its failure sentinel.
    #[error(transparent)]
    Os(#[from] OsError),

    /// The task body panicked; the payload message is preserved.
    #[error("task panicked: {0}")]
    Panicked(String),

    /// The task was destroyed before it produced a result.
    #[error("task was cancelled")]
    Cancelled,

    /// A timeout fired before the guarded task completed.
    #[error("deadline elapsed")]
    Elapsed,

    /// A race was started without any branch.
    #[error("race has no branches")]
    EmptyRace,

    /// The driving loop ran out of timers and I/O interest while the root
    /// task was still suspended.
    #[error("runtime stalled: root task is suspended with nothing left to wake it")]
    Stalled,

    /// An application-defined failure raised from a task body.
    #[error("{0}")]
    Custom(Box<dyn std::error::Error + 'static>),
}

impl Error {
    /// Wraps an arbitrary error raised from a task body.
    pub fn custom<E>(error: E) -> Self
    where
        E: std::error::Error + 'static,
    {
        Error::Custom(Box::new(error))
    }

    /// Builds a task failure from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Error::Custom(message.into())
    }

    /// Returns the platform error code if this is an OS error.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Error::Os(os) => os.code(),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(source: io::Error) -> Self {
        Error::Os(OsError {
            source,
            location: None,
        })
    }
}

/// A failed system call.
///
/// Carries the platform error code and, in debug builds, the call site
/// that issued the guarded call.
#[derive(Debug)]
pub struct OsError {
    pub(crate) source: io::Error,
    pub(crate) location: Option<&'static Location<'static>>,
}

impl OsError {
    /// Captures `errno` for the current thread.
    #[track_caller]
    pub(crate) fn last() -> Self {
        Self {
            source: io::Error::last_os_error(),
            location: call_site(),
        }
    }

    /// The raw platform error code.
    pub fn code(&self) -> Option<i32> {
        self.source.raw_os_error()
    }

    /// The `io::ErrorKind` of the underlying error.
    pub fn kind(&self) -> io::ErrorKind {
        self.source.kind()
    }

    /// Where the failing call was issued (debug builds only).
    pub fn location(&self) -> Option<&'static Location<'static>> {
        self.location
    }
}

impl From<OsError> for io::Error {
    fn from(err: OsError) -> Self {
        err.source
    }
}

impl fmt::Display for OsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(f, "{} ({}:{})", self.source, loc.file(), loc.line()),
            None => write!(f, "{}", self.source),
        }
    }
}

impl std::error::Error for OsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

#[cfg(debug_assertions)]
#[track_caller]
fn call_site() -> Option<&'static Location<'static>> {
    Some(Location::caller())
}

#[cfg(not(debug_assertions))]
fn call_site() -> Option<&'static Location<'static>> {
    None
}
