//! Syscall guard and thin libc wrappers.
//!
//! Every direct OS call made by the poller and the I/O helpers goes
//! through [`check`] (or its `-1` shorthand [`cvt`]), which turns the
//! failure sentinel into a structured [`OsError`] carrying `errno` and, in
//! debug builds, the call site.

use crate::error::OsError;

use libc::{F_GETFL, F_SETFL, O_NONBLOCK, c_int, close, fcntl, read, write};
use std::os::fd::RawFd;

/// Returns `res` unchanged unless it equals `sentinel`, in which case the
/// current `errno` is captured as an [`OsError`].
#[track_caller]
pub fn check<T>(res: T, sentinel: T) -> Result<T, OsError>
where
    T: PartialEq + Copy,
{
    if res == sentinel {
        return Err(OsError::last());
    }

    Ok(res)
}

/// Guard for the common "returns -1 on failure" convention.
#[track_caller]
pub fn cvt<T>(res: T) -> Result<T, OsError>
where
    T: PartialEq + Copy + From<i8>,
{
    check(res, T::from(-1))
}

/// Reads from a file descriptor into the given buffer.
#[track_caller]
pub(crate) fn sys_read(fd: RawFd, buffer: &mut [u8]) -> Result<usize, OsError> {
    let n = cvt(unsafe { read(fd, buffer.as_mut_ptr().cast(), buffer.len()) })?;
    Ok(n as usize)
}

/// Writes the buffer to a file descriptor.
#[track_caller]
pub(crate) fn sys_write(fd: RawFd, buffer: &[u8]) -> Result<usize, OsError> {
    let n = cvt(unsafe { write(fd, buffer.as_ptr().cast(), buffer.len()) })?;
    Ok(n as usize)
}

/// Closes a file descriptor.
#[track_caller]
pub(crate) fn sys_close(fd: RawFd) -> Result<(), OsError> {
    cvt(unsafe { close(fd) })?;
    Ok(())
}

/// Switches a file descriptor to non-blocking mode.
#[track_caller]
pub(crate) fn sys_set_nonblocking(fd: RawFd) -> Result<(), OsError> {
    let flags: c_int = cvt(unsafe { fcntl(fd, F_GETFL) })?;

    if flags & O_NONBLOCK == 0 {
        cvt(unsafe { fcntl(fd, F_SETFL, flags | O_NONBLOCK) })?;
    }

    Ok(())
}
