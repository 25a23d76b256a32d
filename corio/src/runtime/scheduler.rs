use super::task::TaskId;
use super::waker::{self, make_waker};
use crate::utils::Slab;

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};

/// A type-erased frame owned by the scheduler.
pub(crate) type BoxFrame = Pin<Box<dyn Future<Output = ()> + 'static>>;

struct Slot {
    /// `None` while the frame is being polled.
    future: Option<BoxFrame>,

    /// Whether the task is already on the ready queue.
    queued: bool,
}

/// Ready queue plus the frames of every scheduled task.
///
/// Not thread-safe: all state is touched only from the single driving
/// thread, so plain `RefCell`s are enough. Borrows are never held while a
/// frame is polled or dropped, because both can re-enter the scheduler
/// (spawning, waking or aborting other tasks).
///
/// Besides the FIFO ready queue there is a one-entry handoff slot. A task
/// placed there runs as soon as the frame being polled returns, ahead of
/// the queue. Awaiting a task and completing an awaited task both go
/// through it, so control moves down and up an await chain one frame at a
/// time without nesting polls on the native stack.
pub(crate) struct Scheduler {
    runtime: u64,
    frames: RefCell<Slab<Slot>>,
    ready: RefCell<VecDeque<TaskId>>,
    next: Cell<Option<TaskId>>,

    /// Set while frames are being destroyed. Frames aborted meanwhile are
    /// parked in `doomed` and dropped by the outermost teardown, so a deep
    /// chain of awaited tasks unwinds in a loop.
    dropping: Cell<bool>,
    doomed: RefCell<Vec<BoxFrame>>,
}

impl Scheduler {
    pub(crate) fn new(runtime: u64, capacity: usize) -> Self {
        Self {
            runtime,
            frames: RefCell::new(Slab::with_capacity(capacity)),
            ready: RefCell::new(VecDeque::with_capacity(capacity)),
            next: Cell::new(None),
            dropping: Cell::new(false),
            doomed: RefCell::new(Vec::new()),
        }
    }

    fn adopt(&self, future: BoxFrame) -> TaskId {
        let key = self.frames.borrow_mut().insert(Slot {
            future: Some(future),
            queued: true,
        });

        TaskId::from_key(key)
    }

    /// Adopts a frame and queues it for its first poll.
    pub(crate) fn spawn(&self, future: BoxFrame) -> TaskId {
        let id = self.adopt(future);

        self.ready.borrow_mut().push_back(id);
        tracing::trace!(task = %id, "task spawned");

        id
    }

    /// Adopts a frame that runs as soon as the current frame returns.
    pub(crate) fn spawn_next(&self, future: BoxFrame) -> TaskId {
        let id = self.adopt(future);

        self.enqueue_next(id);
        tracing::trace!(task = %id, "awaited task adopted");

        id
    }

    /// Puts a live task on the ready queue unless it is already there.
    pub(crate) fn schedule(&self, id: TaskId) {
        if !self.mark_queued(id) {
            return;
        }

        self.ready.borrow_mut().push_back(id);
        tracing::trace!(task = %id, "task woken");
    }

    /// Resumes the task behind `waker` right after the current frame,
    /// ahead of the ready queue.
    ///
    /// Wakers that do not belong to this runtime are woken normally.
    pub(crate) fn transfer(&self, waker: Waker) {
        match waker::decode(&waker) {
            Some((runtime, id)) if runtime == self.runtime => {
                if self.mark_queued(id) {
                    self.enqueue_next(id);
                    tracing::trace!(task = %id, "control transferred");
                }
            }
            _ => waker.wake(),
        }
    }

    /// Flags a live task as queued. Returns `false` if it is gone or
    /// already queued.
    fn mark_queued(&self, id: TaskId) -> bool {
        let mut frames = self.frames.borrow_mut();

        let Some(slot) = frames.get_mut(id.key()) else {
            tracing::trace!(task = %id, "wake for destroyed task ignored");
            return false;
        };

        !std::mem::replace(&mut slot.queued, true)
    }

    fn enqueue_next(&self, id: TaskId) {
        match self.next.get() {
            None => self.next.set(Some(id)),
            // A frame handed off twice in one poll: the extra one waits
            // its turn on the queue.
            Some(_) => self.ready.borrow_mut().push_back(id),
        }
    }

    /// Destroys a task's frame.
    ///
    /// Dropping the frame releases every timer and readiness registration
    /// it still holds. Idempotent, and valid for frames that never ran.
    /// A stale id left on the ready queue is skipped when popped.
    pub(crate) fn abort(&self, id: TaskId) -> bool {
        let slot = self.frames.borrow_mut().remove(id.key());

        match slot {
            Some(slot) => {
                tracing::trace!(task = %id, "task aborted");

                // `None` while the task is running: `run_ready` drops the
                // frame once its poll returns.
                if let Some(future) = slot.future {
                    self.release(future);
                }
                true
            }
            None => false,
        }
    }

    fn release(&self, future: BoxFrame) {
        if self.dropping.replace(true) {
            self.doomed.borrow_mut().push(future);
            return;
        }

        drop(future);

        loop {
            let doomed = self.doomed.borrow_mut().pop();
            match doomed {
                Some(future) => drop(future),
                None => break,
            }
        }

        self.dropping.set(false);
    }

    /// Number of live frames.
    pub(crate) fn len(&self) -> usize {
        self.frames.borrow().len()
    }

    /// Returns `true` if any task is waiting to run.
    pub(crate) fn has_ready(&self) -> bool {
        self.next.get().is_some() || !self.ready.borrow().is_empty()
    }

    /// Number of tasks waiting to run.
    pub(crate) fn ready_len(&self) -> usize {
        self.ready.borrow().len() + usize::from(self.next.get().is_some())
    }

    /// Runs every task that is ready right now to its next suspension
    /// point.
    ///
    /// Tasks woken during this pass (including a task that yields) are
    /// left for the next pass, so one busy task cannot starve timers and
    /// I/O. Handoffs are followed immediately and do not count against the
    /// pass. Returns the number of frames polled.
    pub(crate) fn run_ready(&self) -> usize {
        let batch = self.ready.borrow().len();
        let mut polled = self.run_handoffs();

        for _ in 0..batch {
            let Some(id) = self.ready.borrow_mut().pop_front() else {
                break;
            };

            polled += usize::from(self.poll_task(id));
            polled += self.run_handoffs();
        }

        polled
    }

    fn run_handoffs(&self) -> usize {
        let mut polled = 0;

        while let Some(id) = self.next.take() {
            polled += usize::from(self.poll_task(id));
        }

        polled
    }

    /// Polls one task. Returns `false` if its frame is gone.
    fn poll_task(&self, id: TaskId) -> bool {
        let future = {
            let mut frames = self.frames.borrow_mut();
            match frames.get_mut(id.key()) {
                Some(slot) => {
                    slot.queued = false;
                    slot.future.take()
                }
                None => None,
            }
        };

        let Some(mut future) = future else {
            return false;
        };

        tracing::trace!(task = %id, "task resumed");

        let waker = make_waker(self.runtime, id);
        let mut cx = Context::from_waker(&waker);

        match future.as_mut().poll(&mut cx) {
            Poll::Ready(()) => {
                self.frames.borrow_mut().remove(id.key());
                tracing::trace!(task = %id, "task completed");
                self.release(future);
            }
            Poll::Pending => {
                let mut frames = self.frames.borrow_mut();
                match frames.get_mut(id.key()) {
                    Some(slot) => slot.future = Some(future),
                    None => {
                        // Aborted while it was running.
                        drop(frames);
                        self.release(future);
                    }
                }
            }
        }

        true
    }

    /// Destroys every remaining frame.
    pub(crate) fn shutdown(&self) {
        loop {
            let frames = self.frames.borrow_mut().drain();
            self.ready.borrow_mut().clear();
            self.next.set(None);

            if frames.is_empty() {
                break;
            }

            tracing::debug!(count = frames.len(), "destroying suspended tasks");
            drop(frames);
        }
    }
}
