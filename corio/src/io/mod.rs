//! Readiness waits and non-blocking descriptor I/O.
//!
//! The reactor deals only in descriptor-level readiness: a task asks to be
//! resumed once a file descriptor is readable or writable, and does the
//! actual `read`/`write` itself. [`read`], [`write`] and [`write_all`]
//! package that retry loop for raw descriptors.
//!
//! Registrations are one-shot. A descriptor carries at most one waiter at
//! a time; registering a second waiter replaces the first, which is woken
//! and resumes as if the descriptor were ready.
//!
//! Descriptors passed here **must** be in non-blocking mode (see
//! [`set_nonblocking`]).

use crate::error::{Error, Result};
use crate::reactor::RegistrationId;
use crate::runtime::Core;
use crate::runtime::context;
use crate::sys::{sys_read, sys_set_nonblocking, sys_write};

use std::future::Future;
use std::io::ErrorKind;
use std::os::fd::RawFd;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};

pub use crate::reactor::poller::common::Interest;

/// A future that completes once a descriptor is ready for its interest.
///
/// Created by [`ready`], [`readable`] and [`writable`]. The registration
/// is made on first poll and removed when the future is dropped, so a
/// wait abandoned mid-flight (for example, a lost race) leaves nothing
/// behind in the reactor.
#[derive(Debug)]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Readiness {
    fd: RawFd,
    interest: Interest,
    registration: Option<(Weak<Core>, RegistrationId)>,
}

impl Readiness {
    /// The descriptor being waited on.
    pub fn fd(&self) -> RawFd {
        self.fd
    }

    /// The readiness being waited for.
    pub fn interest(&self) -> Interest {
        self.interest
    }
}

impl Future for Readiness {
    type Output = Result<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if let Some((core, id)) = this.registration.take() {
            let live = match core.upgrade() {
                Some(runtime) => {
                    let mut reactor = runtime.reactor.borrow_mut();
                    reactor.update_waker(this.fd, id, cx.waker())
                }
                None => false,
            };

            if live {
                this.registration = Some((core, id));
                return Poll::Pending;
            }

            // Delivered, or displaced by another waiter.
            return Poll::Ready(Ok(()));
        }

        let core = context::expect_current("io::ready");
        let registered =
            core.reactor
                .borrow_mut()
                .register(this.fd, this.interest, cx.waker().clone());

        match registered {
            Ok(id) => {
                this.registration = Some((Rc::downgrade(&core), id));
                Poll::Pending
            }
            Err(err) => Poll::Ready(Err(err.into())),
        }
    }
}

impl Drop for Readiness {
    fn drop(&mut self) {
        let Some((core, id)) = self.registration.take() else {
            return;
        };

        let Some(core) = core.upgrade() else {
            return;
        };

        if let Err(err) = core.reactor.borrow_mut().deregister_if(self.fd, id) {
            tracing::warn!(fd = self.fd, %err, "failed to deregister descriptor");
        }
    }
}

/// Waits until `fd` is ready for `interest`.
///
/// A descriptor carries one registration at a time, and a new wait on a
/// descriptor displaces the old one, waking it. Two tasks that keep
/// waiting on the same descriptor, such as a reader and a writer on one
/// socket, therefore displace each other on every pass and the loop never
/// blocks. Wait from a single task with [`Interest::BOTH`] instead.
///
/// # Panics
///
/// Panics if polled outside of a running runtime.
pub fn ready(fd: RawFd, interest: Interest) -> Readiness {
    Readiness {
        fd,
        interest,
        registration: None,
    }
}

/// Waits until `fd` is readable, or has hung up or failed.
///
/// See [`ready`] before sharing a descriptor between tasks.
pub fn readable(fd: RawFd) -> Readiness {
    ready(fd, Interest::READABLE)
}

/// Waits until `fd` is writable, or has hung up or failed.
///
/// See [`ready`] before sharing a descriptor between tasks.
pub fn writable(fd: RawFd) -> Readiness {
    ready(fd, Interest::WRITABLE)
}

/// Removes any readiness registration for `fd`.
///
/// Idempotent: returns `Ok(false)` if nothing was registered. A task still
/// waiting on the descriptor is not woken.
///
/// # Errors
///
/// Fails if the poller rejects the removal for a reason other than the
/// descriptor already being gone.
///
/// # Panics
///
/// Panics if called outside of a running runtime.
#[track_caller]
pub fn deregister(fd: RawFd) -> Result<bool> {
    let core = context::expect_current("io::deregister");
    let removed = core.reactor.borrow_mut().deregister(fd)?;

    Ok(removed)
}

/// Switches `fd` to non-blocking mode.
pub fn set_nonblocking(fd: RawFd) -> Result<()> {
    sys_set_nonblocking(fd)?;
    Ok(())
}

/// Reads from `fd` into `buffer`, suspending until data is available.
///
/// Returns `Ok(0)` at end of stream.
///
/// # Examples
///
/// ```rust,ignore
/// let mut buffer = [0u8; 1024];
/// let n = io::read(fd, &mut buffer).await?;
/// ```
pub async fn read(fd: RawFd, buffer: &mut [u8]) -> Result<usize> {
    loop {
        match sys_read(fd, buffer) {
            Ok(n) => return Ok(n),
            Err(err) if err.kind() == ErrorKind::WouldBlock => readable(fd).await?,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        }
    }
}

/// Writes some of `buffer` to `fd`, suspending until it is writable.
///
/// Returns the number of bytes written, which may be less than
/// `buffer.len()`.
pub async fn write(fd: RawFd, buffer: &[u8]) -> Result<usize> {
    loop {
        match sys_write(fd, buffer) {
            Ok(n) => return Ok(n),
            Err(err) if err.kind() == ErrorKind::WouldBlock => writable(fd).await?,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        }
    }
}

/// Writes all of `buffer` to `fd`, handling partial writes.
///
/// # Errors
///
/// Fails with an [`ErrorKind::WriteZero`] OS error if the descriptor stops
/// accepting data.
pub async fn write_all(fd: RawFd, buffer: &[u8]) -> Result<()> {
    let mut written = 0;

    while written < buffer.len() {
        match write(fd, &buffer[written..]).await? {
            0 => return Err(Error::from(std::io::Error::from(ErrorKind::WriteZero))),
            n => written += n,
        }
    }

    Ok(())
}
