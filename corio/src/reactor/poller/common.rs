use std::os::fd::RawFd;

/// The readiness a task waits for on a file descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interest {
    pub(crate) read: bool,
    pub(crate) write: bool,
}

impl Interest {
    /// Wait until the descriptor is readable.
    pub const READABLE: Interest = Interest {
        read: true,
        write: false,
    };

    /// Wait until the descriptor is writable.
    pub const WRITABLE: Interest = Interest {
        read: false,
        write: true,
    };

    /// Wait until the descriptor is readable or writable.
    pub const BOTH: Interest = Interest {
        read: true,
        write: true,
    };

    pub fn is_readable(self) -> bool {
        self.read
    }

    pub fn is_writable(self) -> bool {
        self.write
    }
}

/// A readiness event reported by the poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Event {
    /// The descriptor the event was reported for.
    pub(crate) fd: RawFd,

    /// Indicates that the file descriptor is readable.
    pub(crate) readable: bool,

    /// Indicates that the file descriptor is writable.
    pub(crate) writable: bool,

    /// Error or hang-up. Satisfies any interest, so the waiting task gets
    /// to observe the condition on its next call.
    pub(crate) error: bool,
}

impl Event {
    /// Returns `true` if this event satisfies `interest`.
    pub(crate) fn matches(&self, interest: Interest) -> bool {
        self.error || (self.readable && interest.read) || (self.writable && interest.write)
    }
}
