use super::TaskId;
use super::core::{Frame, Task};
use crate::error::{Error, Result};
use crate::runtime::context;
use crate::runtime::core::Core;

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll, Waker};

/// Outcome of a spawned task, shared between its frame and its handle.
enum JoinState<T> {
    Running { waiter: Option<Waker> },
    Done(Result<T>),
    Taken,
}

/// The frame the scheduler owns for a spawned task.
///
/// Publishes the task's outcome to the [`JoinHandle`]. If the frame is
/// destroyed before the task completes, the handle observes
/// [`Error::Cancelled`] instead.
///
/// The frame of an awaited task hands control straight back to its
/// awaiter on completion. A detached task just wakes whoever waits on it.
struct Spawned<T> {
    task: Task<T>,
    shared: Rc<RefCell<JoinState<T>>>,
    awaited: Option<Weak<Core>>,
}

impl<T> Spawned<T> {
    fn finish(&self, outcome: Result<T>) {
        let waiter = {
            let mut state = self.shared.borrow_mut();
            let JoinState::Running { waiter } = &mut *state else {
                return;
            };

            let waiter = waiter.take();
            *state = JoinState::Done(outcome);
            waiter
        };

        let Some(waiter) = waiter else {
            return;
        };

        match self.awaited.as_ref().and_then(Weak::upgrade) {
            Some(core) => core.scheduler.transfer(waiter),
            None => waiter.wake(),
        }
    }
}

impl<T> Future for Spawned<T> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();

        match this.task.poll_frame(cx) {
            Poll::Ready(()) => {
                let outcome = this.task.take_result();
                this.finish(outcome);
                Poll::Ready(())
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> Drop for Spawned<T> {
    fn drop(&mut self) {
        self.finish(Err(Error::Cancelled));
    }
}

/// A handle to a spawned task.
///
/// A `JoinHandle` allows awaiting the result of a task spawned onto the
/// runtime. It implements [`Future`] and resolves once the task has
/// completed, failed, or been aborted.
///
/// Dropping the `JoinHandle` does **not** cancel the task; it only
/// discards the ability to observe its result.
pub struct JoinHandle<T> {
    id: TaskId,
    core: Weak<Core>,
    state: Rc<RefCell<JoinState<T>>>,
}

impl<T> JoinHandle<T> {
    /// The id of the spawned task.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Returns `true` once the task has completed, failed, or been
    /// aborted.
    pub fn is_finished(&self) -> bool {
        !matches!(*self.state.borrow(), JoinState::Running { .. })
    }

    /// Destroys the task's frame, releasing its timers and readiness
    /// registrations.
    ///
    /// Awaiting the handle afterwards yields [`Error::Cancelled`].
    /// Returns `false` if the task had already finished or its runtime is
    /// gone.
    pub fn abort(&self) -> bool {
        match self.core.upgrade() {
            Some(core) => core.scheduler.abort(self.id),
            None => false,
        }
    }

    /// Destroys the task without resuming anyone waiting on it.
    pub(crate) fn discard(self) {
        *self.state.borrow_mut() = JoinState::Taken;
        self.abort();
    }

    pub(crate) fn try_take(&mut self) -> Option<Result<T>> {
        let mut state = self.state.borrow_mut();

        match std::mem::replace(&mut *state, JoinState::Taken) {
            JoinState::Done(outcome) => Some(outcome),
            other => {
                *state = other;
                None
            }
        }
    }
}

impl<T> Future for JoinHandle<T> {
    /// The outcome of the spawned task.
    type Output = Result<T>;

    /// Polls the join handle.
    ///
    /// If the task has already finished, its outcome is returned
    /// immediately. Otherwise the current waker is recorded and woken by
    /// the task's frame when it finishes or is destroyed.
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.state.borrow_mut();

        if let JoinState::Running { waiter } = &mut *state {
            match waiter {
                Some(waiter) if waiter.will_wake(cx.waker()) => {}
                _ => *waiter = Some(cx.waker().clone()),
            }
            return Poll::Pending;
        }

        match std::mem::replace(&mut *state, JoinState::Taken) {
            JoinState::Done(outcome) => Poll::Ready(outcome),
            _ => panic!("`JoinHandle` polled after completion"),
        }
    }
}

impl<T> fmt::Debug for JoinHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinHandle")
            .field("id", &self.id)
            .field("finished", &self.is_finished())
            .finish()
    }
}

fn launch<T: 'static>(core: &Rc<Core>, task: Task<T>, awaited: bool) -> JoinHandle<T> {
    let state = Rc::new(RefCell::new(JoinState::Running { waiter: None }));
    let frame = Spawned {
        task,
        shared: state.clone(),
        awaited: awaited.then(|| Rc::downgrade(core)),
    };

    let id = if awaited {
        core.scheduler.spawn_next(Box::pin(frame))
    } else {
        core.scheduler.spawn(Box::pin(frame))
    };

    JoinHandle {
        id,
        core: Rc::downgrade(core),
        state,
    }
}

pub(crate) fn spawn_on<F, T>(core: &Rc<Core>, future: F) -> JoinHandle<T>
where
    F: Future<Output = Result<T>> + 'static,
    T: 'static,
{
    launch(core, Task::new(future), false)
}

/// Hands the frame of a task that is being awaited to the scheduler.
///
/// The frame runs as soon as the awaiter suspends.
pub(crate) fn adopt<T: 'static>(core: &Rc<Core>, frame: Frame<T>) -> JoinHandle<T> {
    launch(core, Task::from_frame(frame), true)
}

/// Spawns a detached task onto the current runtime.
///
/// The task is placed on the ready queue and first runs on the loop's
/// next pass; the caller keeps running until its own next suspension.
///
/// # Panics
///
/// Panics if called outside of a running runtime.
///
/// # Examples
///
/// ```rust,ignore
/// let handle = task::spawn(async {
///     sleep(Duration::from_millis(100)).await;
///     Ok("done")
/// });
///
/// assert_eq!(handle.await?, "done");
/// ```
#[track_caller]
pub fn spawn<F, T>(future: F) -> JoinHandle<T>
where
    F: Future<Output = Result<T>> + 'static,
    T: 'static,
{
    let core = context::expect_current("task::spawn");
    spawn_on(&core, future)
}

/// Destroys a scheduled task's frame by id.
///
/// Idempotent, and valid for tasks that never ran. Returns `false` if the
/// task no longer exists or no runtime is driving this thread.
pub fn abort(id: TaskId) -> bool {
    context::current().is_some_and(|core| core.scheduler.abort(id))
}
