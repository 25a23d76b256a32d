//! Portable `poll(2)`-based poller for unix targets without `epoll`.
//!
//! It keeps its own registry of monitored descriptors and rebuilds the
//! `pollfd` array on every call. This is O(n) per wait, which is fine for
//! the handful of descriptors a single-threaded loop watches.

use super::common::{Event, Interest};
use crate::error::OsError;
use crate::sys::cvt;

use libc::{POLLERR, POLLHUP, POLLIN, POLLNVAL, POLLOUT, nfds_t, poll, pollfd};
use std::collections::HashMap;
use std::os::fd::RawFd;
use std::time::Duration;

pub(crate) struct PollPoller {
    /// Registered descriptors and their interest.
    registry: HashMap<RawFd, Interest>,

    /// Reusable `pollfd` buffer.
    fds: Vec<pollfd>,

    /// Upper bound on events reported per call.
    capacity: usize,
}

impl PollPoller {
    pub(crate) fn new(capacity: usize) -> Result<Self, OsError> {
        Ok(Self {
            registry: HashMap::new(),
            fds: Vec::new(),
            capacity: capacity.max(1),
        })
    }

    pub(crate) fn register(
        &mut self,
        fd: RawFd,
        interest: Interest,
        _existing: bool,
    ) -> Result<(), OsError> {
        self.registry.insert(fd, interest);
        Ok(())
    }

    pub(crate) fn deregister(&mut self, fd: RawFd) -> Result<(), OsError> {
        self.registry.remove(&fd);
        Ok(())
    }

    pub(crate) fn poll(
        &mut self,
        events: &mut Vec<Event>,
        timeout: Option<Duration>,
    ) -> Result<(), OsError> {
        events.clear();

        self.fds.clear();
        self.fds
            .extend(self.registry.iter().map(|(&fd, &interest)| pollfd {
                fd,
                events: flags(interest),
                revents: 0,
            }));

        let n = unsafe {
            poll(
                self.fds.as_mut_ptr(),
                self.fds.len() as nfds_t,
                super::timeout_millis(timeout),
            )
        };

        match cvt(n) {
            Ok(_) => {}
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => return Ok(()),
            Err(err) => return Err(err),
        }

        for pfd in self.fds.iter().filter(|p| p.revents != 0) {
            if events.len() == self.capacity {
                break;
            }

            events.push(Event {
                fd: pfd.fd,
                readable: pfd.revents & POLLIN != 0,
                writable: pfd.revents & POLLOUT != 0,
                error: pfd.revents & (POLLERR | POLLHUP | POLLNVAL) != 0,
            });
        }

        Ok(())
    }
}

fn flags(interest: Interest) -> libc::c_short {
    let mut flags = 0;

    if interest.read {
        flags |= POLLIN;
    }
    if interest.write {
        flags |= POLLOUT;
    }

    flags
}
