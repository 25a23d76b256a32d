use super::poller::Poller;
use super::poller::common::{Event, Interest};
use crate::error::OsError;

use std::collections::HashMap;
use std::os::fd::RawFd;
use std::task::Waker;
use std::time::Duration;

/// Identifies one registration of a descriptor.
///
/// A descriptor may be registered, delivered and registered again by a
/// different waiter; the id lets a waiter tell whether the live
/// registration is still its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RegistrationId(u64);

/// A single readiness subscription.
struct Registration {
    id: RegistrationId,

    /// Readiness the waiter asked for.
    interest: Interest,

    /// Continuation to resume when the interest is satisfied.
    waker: Waker,
}

/// Readiness multiplexer.
///
/// Registrations are one-shot: when the poller reports a descriptor as
/// ready for its interest, the registration is removed from both the table
/// and the poller before its waker is handed back to the driving loop.
pub(crate) struct Reactor {
    poller: Poller,

    /// Reusable event buffer filled by the poller.
    events: Vec<Event>,

    /// Descriptor → live registration.
    registrations: HashMap<RawFd, Registration>,

    next_id: u64,
}

impl Reactor {
    pub(crate) fn new(event_capacity: usize) -> Result<Self, OsError> {
        Ok(Self {
            poller: Poller::new(event_capacity)?,
            events: Vec::with_capacity(event_capacity),
            registrations: HashMap::new(),
            next_id: 0,
        })
    }

    /// Subscribes `waker` to readiness of `fd`.
    ///
    /// At most one registration per descriptor is kept. Registering a
    /// descriptor that already has a waiter replaces it; the displaced
    /// waiter is woken so it can observe that it lost its registration.
    pub(crate) fn register(
        &mut self,
        fd: RawFd,
        interest: Interest,
        waker: Waker,
    ) -> Result<RegistrationId, OsError> {
        let existing = self.registrations.contains_key(&fd);
        self.poller.register(fd, interest, existing)?;

        let id = RegistrationId(self.next_id);
        self.next_id += 1;

        tracing::trace!(fd, ?interest, "reactor register");

        let displaced = self.registrations.insert(
            fd,
            Registration {
                id,
                interest,
                waker,
            },
        );

        if let Some(old) = displaced {
            old.waker.wake();
        }

        Ok(id)
    }

    /// Returns `true` if `id` is still the live registration of `fd`.
    pub(crate) fn is_registered(&self, fd: RawFd, id: RegistrationId) -> bool {
        self.registrations.get(&fd).is_some_and(|r| r.id == id)
    }

    /// Replaces the waker of a live registration.
    ///
    /// Returns `false` if the registration has already been delivered or
    /// removed.
    pub(crate) fn update_waker(&mut self, fd: RawFd, id: RegistrationId, waker: &Waker) -> bool {
        match self.registrations.get_mut(&fd) {
            Some(reg) if reg.id == id => {
                if !reg.waker.will_wake(waker) {
                    reg.waker = waker.clone();
                }
                true
            }
            _ => false,
        }
    }

    /// Removes any registration for `fd`.
    ///
    /// Idempotent: removing a descriptor that is not registered is a no-op
    /// and returns `Ok(false)`. A descriptor that was closed before being
    /// deregistered has already left the kernel's interest set, so
    /// `ENOENT`/`EBADF` from the poller are not treated as failures.
    pub(crate) fn deregister(&mut self, fd: RawFd) -> Result<bool, OsError> {
        if self.registrations.remove(&fd).is_none() {
            return Ok(false);
        }

        tracing::trace!(fd, "reactor deregister");
        self.poller_remove(fd)?;

        Ok(true)
    }

    /// Removes the registration of `fd` only if it is still `id`.
    ///
    /// Used from frame teardown, where the descriptor may since have been
    /// registered by someone else.
    pub(crate) fn deregister_if(&mut self, fd: RawFd, id: RegistrationId) -> Result<bool, OsError> {
        if !self.is_registered(fd, id) {
            return Ok(false);
        }

        self.deregister(fd)
    }

    /// Number of live registrations.
    pub(crate) fn len(&self) -> usize {
        self.registrations.len()
    }

    /// Returns `true` if no descriptor is registered.
    pub(crate) fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Waits up to `timeout` for readiness and collects the wakers of every
    /// satisfied registration into `ready`.
    ///
    /// `None` blocks indefinitely and a zero timeout returns immediately.
    /// The wakers are returned rather than invoked so the caller can wake
    /// them once it no longer holds the reactor.
    pub(crate) fn poll(
        &mut self,
        timeout: Option<Duration>,
        ready: &mut Vec<Waker>,
    ) -> Result<usize, OsError> {
        self.poller.poll(&mut self.events, timeout)?;

        let events = std::mem::take(&mut self.events);
        let before = ready.len();

        for event in &events {
            let satisfied = self
                .registrations
                .get(&event.fd)
                .is_some_and(|reg| event.matches(reg.interest));

            if !satisfied {
                continue;
            }

            if let Some(reg) = self.registrations.remove(&event.fd) {
                tracing::trace!(fd = event.fd, "reactor event");
                self.poller_remove(event.fd)?;
                ready.push(reg.waker);
            }
        }

        self.events = events;
        Ok(ready.len() - before)
    }

    fn poller_remove(&mut self, fd: RawFd) -> Result<(), OsError> {
        match self.poller.deregister(fd) {
            Ok(()) => Ok(()),
            Err(err) if matches!(err.code(), Some(libc::ENOENT) | Some(libc::EBADF)) => Ok(()),
            Err(err) => Err(err),
        }
    }
}

impl Drop for Reactor {
    fn drop(&mut self) {
        let fds: Vec<RawFd> = self.registrations.keys().copied().collect();

        for fd in fds {
            let _ = self.deregister(fd);
        }
    }
}
