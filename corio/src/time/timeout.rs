use super::sleep;
use crate::error::{Error, Result};
use crate::runtime::task::{Task, race};

use std::future::Future;
use std::time::Duration;

/// Bounds the execution time of `future`.
///
/// This is a [`race`] between the future and a [`sleep`]: whichever
/// finishes first wins, and the other is destroyed on the spot. In
/// particular, a future that loses to the timer has its own timers and
/// readiness registrations released before this task completes.
///
/// # Errors
///
/// Fails with [`Error::Elapsed`] if the duration runs out first, or with
/// the future's own failure if it finishes first and fails.
///
/// # Examples
///
/// ```rust,ignore
/// let handle = task::spawn(async {
///     sleep(Duration::from_millis(10)).await;
///     Ok(123)
/// });
///
/// assert_eq!(timeout(Duration::from_millis(50), handle).await?, 123);
/// ```
pub fn timeout<F, T>(duration: Duration, future: F) -> Task<T>
where
    F: Future<Output = Result<T>> + 'static,
    T: 'static,
{
    let work = Task::new(async move { future.await.map(Some) });
    let timer = Task::new(async move {
        sleep(duration).await;
        Ok(None)
    });

    Task::new(async move {
        match race(vec![work, timer]).await?.value {
            Some(value) => Ok(value),
            None => Err(Error::Elapsed),
        }
    })
}
