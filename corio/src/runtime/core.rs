use super::context;
use super::scheduler::Scheduler;
use super::task::{self, JoinHandle};
use crate::error::{Error, Result};
use crate::reactor::{Reactor, TimerQueue};

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::Waker;
use std::thread;
use std::time::{Duration, Instant};

static NEXT_RUNTIME_ID: AtomicU64 = AtomicU64::new(1);

/// State shared by everything running on one driving loop.
pub(crate) struct Core {
    /// Distinguishes this runtime's wakers from those of earlier runtimes
    /// driven on the same thread.
    pub(crate) id: u64,

    pub(crate) scheduler: Scheduler,
    pub(crate) timers: RefCell<TimerQueue>,
    pub(crate) reactor: RefCell<Reactor>,
}

/// A snapshot of what a runtime is currently tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metrics {
    /// Live task frames owned by the scheduler.
    pub tasks: usize,

    /// Tasks waiting on the ready queue.
    pub ready: usize,

    /// Timers that can still fire.
    pub timers: usize,

    /// Live readiness registrations.
    pub io: usize,
}

impl Core {
    fn metrics(&self) -> Metrics {
        Metrics {
            tasks: self.scheduler.len(),
            ready: self.scheduler.ready_len(),
            timers: self.timers.borrow().len(),
            io: self.reactor.borrow().len(),
        }
    }
}

/// The single-threaded driving loop.
///
/// `Runtime` owns the scheduler's ready queue, the timer queue and the
/// readiness reactor, and merges them into one step function:
///
/// 1. run every task that is ready,
/// 2. fire due timers and compute the delay until the next one,
/// 3. if any descriptor is registered, poll for readiness with that delay,
/// 4. otherwise sleep for the delay, or stop if there is none.
///
/// The loop stops once no task is ready, no timer is pending and no
/// descriptor is registered.
///
/// Dropping the runtime destroys every task that is still suspended,
/// releasing its registrations.
pub struct Runtime {
    core: Rc<Core>,
}

impl Runtime {
    /// Creates a runtime with the default configuration.
    ///
    /// See [`Builder`](super::Builder) to customize it.
    pub fn new() -> Result<Self> {
        super::Builder::new().build()
    }

    pub(crate) fn with_config(event_capacity: usize, task_capacity: usize) -> Result<Self> {
        let id = NEXT_RUNTIME_ID.fetch_add(1, Ordering::Relaxed);
        let reactor = Reactor::new(event_capacity)?;

        Ok(Self {
            core: Rc::new(Core {
                id,
                scheduler: Scheduler::new(id, task_capacity),
                timers: RefCell::new(TimerQueue::new()),
                reactor: RefCell::new(reactor),
            }),
        })
    }

    /// Spawns a task onto this runtime.
    ///
    /// The task does not start until the loop is driven by
    /// [`run`](Self::run) or [`block_on`](Self::block_on).
    pub fn spawn<F, T>(&self, future: F) -> JoinHandle<T>
    where
        F: Future<Output = Result<T>> + 'static,
        T: 'static,
    {
        task::spawn_on(&self.core, future)
    }

    /// Drives the loop until nothing is left to run or wait for.
    ///
    /// Returns immediately if no task is ready and no timer or descriptor
    /// is pending.
    ///
    /// # Errors
    ///
    /// A failed readiness poll is fatal for the loop and is returned as
    /// [`Error::Os`]; it is not retried.
    ///
    /// # Panics
    ///
    /// Panics if another runtime is already being driven on this thread.
    pub fn run(&self) -> Result<()> {
        let _guard = context::enter(self.core.clone());
        self.drive()
    }

    /// Runs `future` as the root task and returns its result.
    ///
    /// The loop is driven until it is idle, then the root's result is
    /// read, re-raising any failure stored in it.
    ///
    /// # Errors
    ///
    /// Returns the root's own failure, a fatal loop error, or
    /// [`Error::Stalled`] if the loop went idle while the root was still
    /// suspended.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let runtime = Runtime::new()?;
    /// let value = runtime.block_on(async { Ok(42) })?;
    /// assert_eq!(value, 42);
    /// ```
    pub fn block_on<F, T>(&self, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + 'static,
        T: 'static,
    {
        let _guard = context::enter(self.core.clone());

        let mut root = task::spawn_on(&self.core, future);
        self.drive()?;

        match root.try_take() {
            Some(result) => result,
            None => {
                tracing::debug!(task = %root.id(), "root task stalled");
                root.abort();
                Err(Error::Stalled)
            }
        }
    }

    /// Returns a snapshot of the tasks, timers and registrations this
    /// runtime is tracking.
    pub fn metrics(&self) -> Metrics {
        self.core.metrics()
    }

    fn drive(&self) -> Result<()> {
        let core = &*self.core;
        let mut wakers: Vec<Waker> = Vec::new();

        loop {
            core.scheduler.run_ready();

            let mut delay = core
                .timers
                .borrow_mut()
                .advance(Instant::now(), &mut wakers);
            wakers.drain(..).for_each(Waker::wake);

            if core.scheduler.has_ready() {
                delay = Some(Duration::ZERO);
            }

            let watching = !core.reactor.borrow().is_empty();

            if watching {
                core.reactor.borrow_mut().poll(delay, &mut wakers)?;
                wakers.drain(..).for_each(Waker::wake);
            } else if let Some(delay) = delay {
                if !delay.is_zero() {
                    thread::sleep(delay);
                }
            } else {
                tracing::debug!(runtime = core.id, "driving loop idle");
                return Ok(());
            }
        }
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.core.scheduler.shutdown();
    }
}

/// Returns a snapshot of the runtime driving this thread, if any.
pub fn metrics() -> Option<Metrics> {
    context::current().map(|core| core.metrics())
}
