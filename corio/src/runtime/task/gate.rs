use super::TaskId;
use super::core::Task;
use crate::runtime::waker;

use std::future::{Future, poll_fn};
use std::pin::Pin;
use std::task::{Context, Poll};

/// A future that hands control back to the driving loop exactly once.
///
/// Created by [`suspend`].
#[derive(Debug)]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Suspend(bool);

impl Future for Suspend {
    type Output = ();

    /// On the first poll, the task re-queues itself and returns
    /// `Poll::Pending`. On the second poll, the future completes.
    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if !self.0 {
            self.0 = true;
            cx.waker().wake_by_ref();
            return Poll::Pending;
        }

        Poll::Ready(())
    }
}

/// Always suspends once.
///
/// The task is put at the back of the ready queue, so every task that was
/// already ready runs before it resumes.
pub fn suspend() -> Suspend {
    Suspend(false)
}

/// Yields execution back to the driving loop.
///
/// This allows other tasks to make progress before the current task
/// continues. The function yields exactly once.
///
/// # Examples
///
/// ```rust,ignore
/// async fn busy() -> corio::Result<()> {
///     for _ in 0..1_000 {
///         // Let timers and I/O make progress.
///         task::yield_now().await;
///     }
///     Ok(())
/// }
/// ```
pub async fn yield_now() {
    suspend().await
}

/// A future that runs a borrowed task until it finishes.
///
/// Created by [`drive`].
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Drive<'a, T> {
    task: &'a mut Task<T>,
}

impl<T: 'static> Future for Drive<'_, T> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        self.get_mut().task.poll_complete(cx)
    }
}

/// Runs `task` until it finishes, leaving its outcome in the task.
///
/// Unlike awaiting the task, this does not consume its result: read it
/// afterwards with [`Task::take_result`].
///
/// # Examples
///
/// ```rust,ignore
/// let mut child = Task::new(async { Ok(5) });
/// task::drive(&mut child).await;
///
/// assert!(child.is_finished());
/// assert_eq!(child.take_result()?, 5);
/// ```
pub fn drive<T: 'static>(task: &mut Task<T>) -> Drive<'_, T> {
    Drive { task }
}

/// Returns the id of the scheduled task running this code, without
/// suspending.
///
/// Every awaited [`Task`] runs as its own scheduled task, so the id is
/// that of the innermost task being awaited. Returns `None` when polled
/// outside a corio task.
pub async fn current() -> Option<TaskId> {
    poll_fn(|cx| Poll::Ready(waker::task_id(cx.waker()))).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::runtime::Runtime;

    #[test]
    fn suspend_runs_other_ready_tasks_first() {
        let runtime = Runtime::new().unwrap();
        let log = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));

        let first = log.clone();
        runtime.spawn(async move {
            first.borrow_mut().push("a1");
            suspend().await;
            first.borrow_mut().push("a2");
            Ok(())
        });

        let second = log.clone();
        runtime.spawn(async move {
            second.borrow_mut().push("b");
            Ok(())
        });

        runtime.run().unwrap();
        assert_eq!(*log.borrow(), vec!["a1", "b", "a2"]);
    }

    #[test]
    fn drive_leaves_the_result_in_place() {
        let runtime = Runtime::new().unwrap();

        let value = runtime
            .block_on(async {
                let mut child = Task::new(async {
                    yield_now().await;
                    Ok(5)
                });

                drive(&mut child).await;
                assert!(child.is_finished());
                child.take_result()
            })
            .unwrap();

        assert_eq!(value, 5);
    }

    #[test]
    fn current_reports_the_spawned_id() {
        let runtime = Runtime::new().unwrap();

        let handle = runtime.spawn(async { Ok::<_, crate::Error>(current().await) });
        let id = handle.id();

        let seen: Result<Option<TaskId>> = runtime.block_on(handle);
        assert_eq!(seen.unwrap(), Some(id));
    }

    #[test]
    fn current_outside_a_task_is_none() {
        let mut task = Task::new(async { Ok(current().await) });
        let waker = std::task::Waker::noop();
        let mut cx = Context::from_waker(waker);

        assert!(task.poll_complete(&mut cx).is_ready());
        assert_eq!(task.take_result().unwrap(), None);
    }
}
