use super::handle::{self, JoinHandle};
use crate::error::{Error, Result};
use crate::runtime::context;

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::task::{Context, Poll};

/// The coroutine frame owned by a task.
pub(crate) type Frame<T> = Pin<Box<dyn Future<Output = Result<T>> + 'static>>;

/// Where a task's outcome lives once its frame has completed.
///
/// A value and a failure are never stored together, and neither is
/// readable before completion.
enum Slot<T> {
    Pending,
    Ready(T),
    Failed(Error),
    Taken,
}

/// A suspendable computation with a single owner and a single eventual
/// result or failure.
///
/// A `Task` is lazy: building it never runs any of its body. The body
/// starts on the first poll, which happens when the task is awaited,
/// spawned, or handed to a combinator.
///
/// Awaiting a task records the awaiter's waker as the continuation and
/// hands the frame to the scheduler, which runs it right after the
/// awaiter suspends. On completion control goes straight back to the
/// awaiter the same way. An awaiter never polls its child's frame itself,
/// so a chain of nested awaits costs no native stack per level. The frame
/// is dropped as soon as it completes, and its outcome is stored until it
/// is read.
///
/// A panic escaping the body is caught at the frame boundary and stored
/// as [`Error::Panicked`], so it travels up the await chain like any
/// other failure.
///
/// Dropping a `Task` destroys its frame, wherever it is running, which
/// releases every timer and readiness registration the frame still holds.
///
/// # Examples
///
/// ```rust,ignore
/// let task = Task::new(async {
///     sleep(Duration::from_millis(10)).await;
///     Ok(7)
/// });
///
/// assert_eq!(task.await?, 7);
/// ```
pub struct Task<T> {
    /// `None` once the frame has completed or the task was created
    /// already finished.
    frame: Option<Frame<T>>,

    /// The frame once it has been handed to the scheduler.
    adopted: Option<JoinHandle<T>>,

    slot: Slot<T>,
}

// The frame is boxed, so moving a `Task` never moves the frame itself.
impl<T> Unpin for Task<T> {}

impl<T: 'static> Task<T> {
    /// Wraps `future` into a task without polling it.
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Result<T>> + 'static,
    {
        Self::from_frame(Box::pin(future))
    }

    pub(crate) fn from_frame(frame: Frame<T>) -> Self {
        Self {
            frame: Some(frame),
            adopted: None,
            slot: Slot::Pending,
        }
    }

    /// Runs the task until its outcome is stored.
    ///
    /// On a runtime, the first call hands the frame to the scheduler and
    /// later calls only check on it. Off a runtime the frame is polled in
    /// place. Polling a finished task is a no-op that returns `Ready`.
    pub(crate) fn poll_complete(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        if self.frame.is_some() {
            let Some(core) = context::current() else {
                return self.poll_frame(cx);
            };

            if let Some(frame) = self.frame.take() {
                self.adopted = Some(handle::adopt(&core, frame));
            }
        }

        let Some(adopted) = self.adopted.as_mut() else {
            return Poll::Ready(());
        };

        match Pin::new(adopted).poll(cx) {
            Poll::Ready(outcome) => {
                self.adopted = None;
                self.store(outcome);
                Poll::Ready(())
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> Task<T> {
    /// Creates a task that has already completed with `value`.
    pub fn ready(value: T) -> Self {
        Self {
            frame: None,
            adopted: None,
            slot: Slot::Ready(value),
        }
    }

    /// Creates a task that has already failed with `error`.
    pub fn failed(error: Error) -> Self {
        Self {
            frame: None,
            adopted: None,
            slot: Slot::Failed(error),
        }
    }

    /// Returns `true` once the task's outcome is available, or was read.
    pub fn is_finished(&self) -> bool {
        !matches!(self.slot, Slot::Pending)
    }

    /// Reads the task's outcome, re-raising a stored failure.
    ///
    /// # Panics
    ///
    /// Panics if the task has not completed yet, or if its outcome was
    /// already read.
    #[track_caller]
    pub fn take_result(&mut self) -> Result<T> {
        match std::mem::replace(&mut self.slot, Slot::Taken) {
            Slot::Ready(value) => Ok(value),
            Slot::Failed(error) => Err(error),
            Slot::Pending => panic!("task result read before the task completed"),
            Slot::Taken => panic!("task result read twice"),
        }
    }

    /// Polls the frame in place until its next suspension point.
    ///
    /// Used by frames the scheduler already owns. Returns `Ready` once the
    /// outcome is stored.
    pub(crate) fn poll_frame(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        let Some(frame) = self.frame.as_mut() else {
            return Poll::Ready(());
        };

        let outcome = match catch_unwind(AssertUnwindSafe(|| frame.as_mut().poll(cx))) {
            Ok(Poll::Pending) => return Poll::Pending,
            Ok(Poll::Ready(outcome)) => outcome,
            Err(payload) => Err(Error::Panicked(panic_message(payload))),
        };

        self.frame = None;
        self.store(outcome);

        Poll::Ready(())
    }

    fn store(&mut self, outcome: Result<T>) {
        self.slot = match outcome {
            Ok(value) => Slot::Ready(value),
            Err(error) => Slot::Failed(error),
        };
    }
}

impl<T> Drop for Task<T> {
    fn drop(&mut self) {
        if let Some(adopted) = self.adopted.take() {
            adopted.discard();
        }
    }
}

impl<T: 'static> Future for Task<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        match this.poll_complete(cx) {
            Poll::Ready(()) => Poll::Ready(this.take_result()),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.slot {
            Slot::Pending if self.adopted.is_some() => "running",
            Slot::Pending if self.frame.is_some() => "pending",
            Slot::Pending => "empty",
            Slot::Ready(_) => "ready",
            Slot::Failed(_) => "failed",
            Slot::Taken => "taken",
        };

        f.debug_struct("Task").field("state", &state).finish()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        return (*message).to_string();
    }

    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(_) => String::from("task panicked"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::task::{Wake, Waker};

    struct Noop;

    impl Wake for Noop {
        fn wake(self: Arc<Self>) {}
    }

    fn poll_once<T>(task: &mut Task<T>) -> Poll<()> {
        let waker = Waker::from(Arc::new(Noop));
        let mut cx = Context::from_waker(&waker);
        task.poll_frame(&mut cx)
    }

    #[test]
    fn construction_is_lazy() {
        let ran = std::rc::Rc::new(std::cell::Cell::new(false));
        let flag = ran.clone();

        let mut task = Task::new(async move {
            flag.set(true);
            Ok(1)
        });

        assert!(!ran.get());
        assert!(!task.is_finished());

        assert!(poll_once(&mut task).is_ready());
        assert!(ran.get());
        assert_eq!(task.take_result().unwrap(), 1);
    }

    #[test]
    fn failure_is_reraised_on_read() {
        let mut task: Task<()> = Task::new(async { Err(Error::msg("boom")) });

        assert!(poll_once(&mut task).is_ready());
        assert_eq!(task.take_result().unwrap_err().to_string(), "boom");
    }

    #[test]
    fn panics_become_failures() {
        let mut task: Task<()> = Task::new(async {
            if true {
                panic!("kaboom");
            }
            Ok(())
        });

        assert!(poll_once(&mut task).is_ready());
        match task.take_result() {
            Err(Error::Panicked(message)) => assert_eq!(message, "kaboom"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn frame_is_dropped_on_completion() {
        let marker = std::rc::Rc::new(());
        let held = marker.clone();

        let mut task = Task::new(async move {
            let _held = held;
            Ok(())
        });

        assert_eq!(std::rc::Rc::strong_count(&marker), 2);
        assert!(poll_once(&mut task).is_ready());
        assert_eq!(std::rc::Rc::strong_count(&marker), 1);
    }

    #[test]
    fn ready_and_failed_are_finished() {
        let mut ready = Task::ready(3);
        let mut failed: Task<u8> = Task::failed(Error::Cancelled);

        assert!(ready.is_finished());
        assert!(failed.is_finished());
        assert_eq!(ready.take_result().unwrap(), 3);
        assert!(matches!(failed.take_result(), Err(Error::Cancelled)));
    }

    #[test]
    #[should_panic(expected = "before the task completed")]
    fn reading_a_pending_task_panics() {
        let mut task = Task::new(async { Ok(()) });
        let _ = task.take_result();
    }

    #[test]
    #[should_panic(expected = "read twice")]
    fn reading_twice_panics() {
        let mut task = Task::ready(());
        let _ = task.take_result();
        let _ = task.take_result();
    }
}
