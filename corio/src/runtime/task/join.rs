use super::TaskId;
use super::core::Task;
use crate::error::{Error, Result};
use crate::runtime::context;
use crate::runtime::core::Core;
use crate::runtime::scheduler::BoxFrame;

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll, Waker};

/// Bookkeeping shared by the parent of a join and every child wrapper.
///
/// Not thread-safe: the counter is a plain `Cell` because every wrapper
/// runs on the single driving thread, so only one of them can observe the
/// transition to zero.
struct JoinBlock<T> {
    remaining: Cell<usize>,
    values: RefCell<Vec<Option<T>>>,

    /// First failure observed, in completion order.
    failure: RefCell<Option<Error>>,

    /// The parent's continuation. Cleared while the parent itself polls
    /// its inline child, so a child finishing inline never wakes it.
    parent: RefCell<Option<Waker>>,
}

impl<T> JoinBlock<T> {
    fn new(count: usize) -> Self {
        Self {
            remaining: Cell::new(count),
            values: RefCell::new((0..count).map(|_| None).collect()),
            failure: RefCell::new(None),
            parent: RefCell::new(None),
        }
    }

    fn complete(&self, index: usize, outcome: Result<T>) {
        match outcome {
            Ok(value) => self.values.borrow_mut()[index] = Some(value),
            Err(error) => {
                let mut failure = self.failure.borrow_mut();
                if failure.is_none() {
                    *failure = Some(error);
                }
            }
        }

        let remaining = self.remaining.get() - 1;
        self.remaining.set(remaining);

        if remaining == 0 {
            let parent = self.parent.borrow_mut().take();
            if let Some(parent) = parent {
                parent.wake();
            }
        }
    }

    fn collect(&self) -> Result<Vec<T>> {
        if let Some(error) = self.failure.borrow_mut().take() {
            return Err(error);
        }

        let values = std::mem::take(&mut *self.values.borrow_mut());
        Ok(values
            .into_iter()
            .map(|value| value.expect("join child finished without a value"))
            .collect())
    }
}

/// A child's place in a join.
///
/// Reports its index exactly once. A wrapper destroyed before its child
/// finished (aborted by id, or torn down with the runtime) reports
/// [`Error::Cancelled`], so the count still reaches zero.
struct Seat<T> {
    block: Option<Rc<JoinBlock<T>>>,
    index: usize,
}

impl<T> Seat<T> {
    fn complete(mut self, outcome: Result<T>) {
        if let Some(block) = self.block.take() {
            block.complete(self.index, outcome);
        }
    }
}

impl<T> Drop for Seat<T> {
    fn drop(&mut self) {
        if let Some(block) = self.block.take() {
            block.complete(self.index, Err(Error::Cancelled));
        }
    }
}

fn wrap<T: 'static>(block: &Rc<JoinBlock<T>>, index: usize, child: Task<T>) -> BoxFrame {
    let seat = Seat {
        block: Some(block.clone()),
        index,
    };

    Box::pin(async move {
        let outcome = child.await;
        seat.complete(outcome);
    })
}

/// The parent frame of a [`join_all`].
struct JoinAll<T> {
    block: Rc<JoinBlock<T>>,

    /// Children not yet dispatched. Emptied on the first poll.
    pending: Vec<Task<T>>,

    /// The first child's wrapper, run inside the parent's own poll.
    inline: Option<BoxFrame>,

    /// Wrappers handed to the scheduler, torn down if the join is.
    spawned: Vec<TaskId>,
    core: Weak<Core>,
}

impl<T: 'static> JoinAll<T> {
    fn launch(&mut self) {
        let core = context::expect_current("task::join_all");
        let mut children = std::mem::take(&mut self.pending).into_iter().enumerate();

        if let Some((index, child)) = children.next() {
            self.inline = Some(wrap(&self.block, index, child));
        }

        for (index, child) in children {
            let id = core.scheduler.spawn(wrap(&self.block, index, child));
            self.spawned.push(id);
        }

        self.core = Rc::downgrade(&core);
    }
}

impl<T: 'static> Future for JoinAll<T> {
    type Output = Result<Vec<T>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if !this.pending.is_empty() {
            this.launch();
        }

        this.block.parent.borrow_mut().take();

        if let Some(inline) = this.inline.as_mut() {
            if inline.as_mut().poll(cx).is_ready() {
                this.inline = None;
            }
        }

        if this.block.remaining.get() == 0 {
            this.spawned.clear();
            return Poll::Ready(this.block.collect());
        }

        *this.block.parent.borrow_mut() = Some(cx.waker().clone());
        Poll::Pending
    }
}

impl<T> Drop for JoinAll<T> {
    fn drop(&mut self) {
        // Seats of the children torn down below must not resume a parent
        // that is going away.
        self.block.parent.borrow_mut().take();

        let Some(core) = self.core.upgrade() else {
            return;
        };

        for id in self.spawned.drain(..) {
            core.scheduler.abort(id);
        }
    }
}

/// Runs every task concurrently and completes once all of them have.
///
/// The result holds each child's value in input order. Children may
/// finish in any order; the parent is resumed exactly once, by whichever
/// child finishes last.
///
/// The first child starts as soon as the join is first polled. The others
/// are placed on the ready queue and start on the loop's next pass.
///
/// # Errors
///
/// If any child fails, the join still waits for every child, then fails
/// with the first failure observed.
///
/// Dropping the returned task before it completes destroys every child
/// that has not finished.
///
/// # Examples
///
/// ```rust,ignore
/// let values = task::join_all(vec![
///     Task::new(async { sleep(Duration::from_millis(20)).await; Ok(1) }),
///     Task::new(async { sleep(Duration::from_millis(10)).await; Ok(2) }),
/// ])
/// .await?;
///
/// assert_eq!(values, vec![1, 2]);
/// ```
pub fn join_all<T: 'static>(children: Vec<Task<T>>) -> Task<Vec<T>> {
    if children.is_empty() {
        return Task::ready(Vec::new());
    }

    let count = children.len();
    let block = Rc::new(JoinBlock::new(count));

    Task::new(JoinAll {
        block,
        pending: children,
        inline: None,
        spawned: Vec::with_capacity(count - 1),
        core: Weak::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Runtime;
    use crate::runtime::task::yield_now;

    #[test]
    fn empty_join_is_immediately_ready() {
        let mut task = join_all::<u8>(Vec::new());

        assert!(task.is_finished());
        assert!(task.take_result().unwrap().is_empty());
    }

    #[test]
    fn values_keep_input_order() {
        let runtime = Runtime::new().unwrap();

        let values = runtime
            .block_on(join_all(vec![
                Task::new(async {
                    yield_now().await;
                    yield_now().await;
                    Ok(1)
                }),
                Task::new(async { Ok(2) }),
                Task::new(async {
                    yield_now().await;
                    Ok(3)
                }),
            ]))
            .unwrap();

        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn failure_waits_for_every_child() {
        let runtime = Runtime::new().unwrap();
        let finished = Rc::new(Cell::new(false));
        let flag = finished.clone();

        let result = runtime.block_on(join_all(vec![
            Task::new(async { Err(Error::msg("first")) }),
            Task::new(async move {
                yield_now().await;
                flag.set(true);
                Ok(())
            }),
        ]));

        assert_eq!(result.unwrap_err().to_string(), "first");
        assert!(finished.get());
    }

    #[test]
    fn dropping_the_join_destroys_every_child() {
        let runtime = Runtime::new().unwrap();

        runtime
            .block_on(async {
                let handle = crate::task::spawn(join_all(vec![
                    Task::new(async {
                        crate::time::sleep(std::time::Duration::from_secs(60)).await;
                        Ok(())
                    }),
                    Task::new(async {
                        crate::time::sleep(std::time::Duration::from_secs(60)).await;
                        Ok(())
                    }),
                ]));

                // Let the join and its children start.
                yield_now().await;
                yield_now().await;
                assert_eq!(crate::metrics().unwrap().timers, 2);

                assert!(handle.abort());

                let metrics = crate::metrics().unwrap();
                assert_eq!(metrics.timers, 0);
                assert_eq!(metrics.tasks, 1);

                Ok(())
            })
            .unwrap();

        assert_eq!(runtime.metrics().tasks, 0);
        assert_eq!(runtime.metrics().timers, 0);
    }

    #[test]
    fn destroyed_wrapper_still_counts_down() {
        let runtime = Runtime::new().unwrap();

        runtime
            .block_on(async {
                let core = context::expect_current("join test");
                let block = Rc::new(JoinBlock::new(2));

                let stuck = Task::new(async {
                    std::future::pending::<()>().await;
                    Ok(1u8)
                });
                let id = core.scheduler.spawn(wrap(&block, 1, stuck));
                assert!(core.scheduler.abort(id));

                assert_eq!(block.remaining.get(), 1);
                block.complete(0, Ok(0));

                assert_eq!(block.remaining.get(), 0);
                assert!(matches!(block.collect(), Err(Error::Cancelled)));
                Ok(())
            })
            .unwrap();
    }
}
