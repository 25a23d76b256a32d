//! Platform-specific readiness poller.
//!
//! This module provides a unified interface over the OS readiness
//! multiplexers the reactor can sit on. The poller only knows about file
//! descriptors and interest masks; mapping readiness back to waiting tasks
//! is the reactor's job.
//!
//! The concrete implementation is selected at compile time
//! depending on the target operating system.

pub(crate) mod common;

#[cfg(target_os = "linux")]
mod epoll;

#[cfg(all(unix, not(target_os = "linux")))]
mod poll;

#[cfg(target_os = "linux")]
pub(crate) type Poller = epoll::EpollPoller;

#[cfg(all(unix, not(target_os = "linux")))]
pub(crate) type Poller = poll::PollPoller;

/// Converts an optional timeout into the millisecond argument expected by
/// `epoll_wait`/`poll`.
///
/// `None` blocks indefinitely (`-1`). Sub-millisecond remainders are
/// rounded up so the loop never wakes before a timer is due and spins.
pub(crate) fn timeout_millis(timeout: Option<std::time::Duration>) -> libc::c_int {
    match timeout {
        None => -1,
        Some(d) => {
            let ms = d.as_nanos().div_ceil(1_000_000);
            ms.min(libc::c_int::MAX as u128) as libc::c_int
        }
    }
}

#[cfg(test)]
mod tests {
    use super::timeout_millis;
    use std::time::Duration;

    #[test]
    fn timeouts_round_up() {
        assert_eq!(timeout_millis(None), -1);
        assert_eq!(timeout_millis(Some(Duration::ZERO)), 0);
        assert_eq!(timeout_millis(Some(Duration::from_micros(1))), 1);
        assert_eq!(timeout_millis(Some(Duration::from_millis(15))), 15);
        assert_eq!(timeout_millis(Some(Duration::from_micros(15_001))), 16);
        assert_eq!(
            timeout_millis(Some(Duration::from_secs(u64::MAX))),
            libc::c_int::MAX
        );
    }
}
