//! Linux `epoll`-based poller implementation.
//!
//! Responsibilities:
//! - Register file descriptors with read/write interests
//! - Block waiting for I/O readiness, up to an optional timeout
//! - Translate raw `epoll_event`s into reactor [`Event`]s
//!
//! Descriptors are registered level-triggered and the descriptor itself is
//! used as the event token. The runtime is single-threaded, so unlike a
//! multi-threaded reactor there is no wake-up `eventfd`: nothing can
//! register interest while the loop is blocked in `epoll_wait`.

use super::common::{Event, Interest};
use crate::error::OsError;
use crate::sys::cvt;

use libc::{
    EPOLL_CLOEXEC, EPOLL_CTL_ADD, EPOLL_CTL_DEL, EPOLL_CTL_MOD, EPOLLERR, EPOLLHUP, EPOLLIN,
    EPOLLOUT, EPOLLRDHUP, epoll_create1, epoll_ctl, epoll_event, epoll_wait,
};
use std::os::unix::io::RawFd;
use std::time::Duration;

/// Linux `epoll` poller.
///
/// This poller owns an `epoll` instance and a reusable buffer for the
/// events returned by `epoll_wait`.
pub(crate) struct EpollPoller {
    /// Epoll file descriptor.
    epoll: RawFd,

    /// Reusable buffer for epoll events.
    events: Vec<epoll_event>,
}

impl EpollPoller {
    /// Create a new `EpollPoller` able to report up to `capacity` events
    /// per call.
    pub(crate) fn new(capacity: usize) -> Result<Self, OsError> {
        let epoll = cvt(unsafe { epoll_create1(EPOLL_CLOEXEC) })?;

        Ok(Self {
            epoll,
            events: Vec::with_capacity(capacity.max(1)),
        })
    }

    /// Register `fd`, or update its interest if it is already registered.
    pub(crate) fn register(
        &mut self,
        fd: RawFd,
        interest: Interest,
        existing: bool,
    ) -> Result<(), OsError> {
        let mut event = epoll_event {
            events: flags(interest),
            u64: fd as u64,
        };

        let op = if existing { EPOLL_CTL_MOD } else { EPOLL_CTL_ADD };

        cvt(unsafe { epoll_ctl(self.epoll, op, fd, &mut event) })?;
        Ok(())
    }

    /// Remove a file descriptor from the poller.
    pub(crate) fn deregister(&mut self, fd: RawFd) -> Result<(), OsError> {
        cvt(unsafe { epoll_ctl(self.epoll, EPOLL_CTL_DEL, fd, std::ptr::null_mut()) })?;
        Ok(())
    }

    /// Poll for I/O readiness events.
    ///
    /// Blocks until at least one file descriptor becomes ready or the
    /// optional timeout expires. A zero timeout returns immediately.
    /// An interrupted wait (`EINTR`) reports no events.
    pub(crate) fn poll(
        &mut self,
        events: &mut Vec<Event>,
        timeout: Option<Duration>,
    ) -> Result<(), OsError> {
        events.clear();

        let n = unsafe {
            epoll_wait(
                self.epoll,
                self.events.as_mut_ptr(),
                self.events.capacity() as i32,
                super::timeout_millis(timeout),
            )
        };

        let n = match cvt(n) {
            Ok(n) => n as usize,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => return Ok(()),
            Err(err) => return Err(err),
        };

        // Safety: epoll_wait initialized the first `n` entries.
        unsafe {
            self.events.set_len(n);
        }

        for ev in &self.events {
            let bits = ev.events;

            events.push(Event {
                fd: ev.u64 as RawFd,
                readable: bits & (EPOLLIN | EPOLLRDHUP) as u32 != 0,
                writable: bits & EPOLLOUT as u32 != 0,
                error: bits & (EPOLLERR | EPOLLHUP) as u32 != 0,
            });
        }

        Ok(())
    }
}

impl Drop for EpollPoller {
    fn drop(&mut self) {
        if let Err(err) = crate::sys::sys_close(self.epoll) {
            tracing::warn!(error = %err, "failed to close epoll instance");
        }
    }
}

fn flags(interest: Interest) -> u32 {
    let mut flags = 0;

    if interest.read {
        flags |= EPOLLIN | EPOLLRDHUP;
    }
    if interest.write {
        flags |= EPOLLOUT;
    }

    flags as u32
}
