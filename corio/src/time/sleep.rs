use crate::reactor::TimerKey;
use crate::runtime::Core;
use crate::runtime::context;

use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

/// Creates a future that completes after the given duration.
///
/// The returned sleep future registers a timer with the current runtime
/// on first poll and completes once the duration has elapsed. Durations
/// too large to represent as a deadline, such as `Duration::MAX`, are
/// capped about 30 years out.
///
/// # Panics
///
/// Panics if polled outside of a running runtime, unless the duration is
/// zero.
///
/// # Examples
///
/// ```rust,ignore
/// use std::time::Duration;
///
/// sleep(Duration::from_millis(10)).await;
/// ```
pub fn sleep(duration: Duration) -> Sleep {
    let now = Instant::now();
    let deadline = now.checked_add(duration).unwrap_or_else(|| far_future(now));

    sleep_until(deadline)
}

/// Roughly 30 years from `now`: stands in for durations too large to add
/// to an `Instant`.
fn far_future(now: Instant) -> Instant {
    const THIRTY_YEARS: Duration = Duration::from_secs(86_400 * 365 * 30);

    now.checked_add(THIRTY_YEARS).unwrap_or(now)
}

/// Creates a future that completes once `deadline` is reached.
///
/// A deadline that has already passed completes on the first poll without
/// suspending.
pub fn sleep_until(deadline: Instant) -> Sleep {
    Sleep {
        deadline,
        timer: None,
    }
}

/// A future that completes once a specific deadline is reached.
///
/// `Sleep` registers with the runtime's timer queue on first poll. The
/// entry is removed if the future is dropped before completion, so an
/// abandoned sleep never wakes anything.
#[derive(Debug)]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Sleep {
    /// Absolute point in time when the sleep completes.
    deadline: Instant,

    /// The queue entry, once registered.
    timer: Option<(Weak<Core>, TimerKey)>,
}

impl Sleep {
    /// The instant at which this sleep completes.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Returns `true` once the deadline has passed.
    pub fn is_elapsed(&self) -> bool {
        Instant::now() >= self.deadline
    }

    fn cancel(&mut self) {
        let Some((core, key)) = self.timer.take() else {
            return;
        };

        if let Some(core) = core.upgrade() {
            core.timers.borrow_mut().cancel(key);
        }
    }
}

impl Future for Sleep {
    /// The sleep future produces no value.
    type Output = ();

    /// Polls the sleep future.
    ///
    /// On the first poll before the deadline, the timer is registered with
    /// the runtime. Later polls only refresh the waker, so a spurious wake
    /// never registers a second entry.
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if Instant::now() >= this.deadline {
            this.cancel();
            return Poll::Ready(());
        }

        if let Some((core, key)) = &this.timer {
            if let Some(core) = core.upgrade() {
                if core.timers.borrow_mut().update_waker(*key, cx.waker()) {
                    return Poll::Pending;
                }
            }
        }

        let core = context::expect_current("time::sleep");
        let key = core
            .timers
            .borrow_mut()
            .schedule(this.deadline, cx.waker().clone());

        this.timer = Some((Rc::downgrade(&core), key));
        Poll::Pending
    }
}

impl Drop for Sleep {
    /// Cancels the timer if the sleep future is dropped before completion.
    fn drop(&mut self) {
        self.cancel();
    }
}
