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

/// The outcome of a [`race`]: which branch won, and its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raced<T> {
    /// Position of the winning task in the input.
    pub index: usize,

    /// The winner's value.
    pub value: T,
}

/// Bookkeeping shared by the parent of a race and every branch wrapper.
///
/// Only the first branch to finish claims the race. Claiming tears down
/// every other branch on the spot, so losers never outlive the winner's
/// completion.
struct RaceBlock<T> {
    claimed: Cell<bool>,
    winner: RefCell<Option<(usize, Result<T>)>>,
    parent: RefCell<Option<Waker>>,

    /// The first branch's wrapper. Taken out while the parent polls it.
    inline: RefCell<Option<BoxFrame>>,

    /// Branch wrappers handed to the scheduler.
    siblings: RefCell<Vec<TaskId>>,
    core: RefCell<Weak<Core>>,
}

impl<T> RaceBlock<T> {
    fn new(branches: usize) -> Self {
        Self {
            claimed: Cell::new(false),
            winner: RefCell::new(None),
            parent: RefCell::new(None),
            inline: RefCell::new(None),
            siblings: RefCell::new(Vec::with_capacity(branches.saturating_sub(1))),
            core: RefCell::new(Weak::new()),
        }
    }

    fn claim(&self, index: usize, outcome: Result<T>) {
        if self.claimed.replace(true) {
            tracing::trace!(index, "race branch finished after the winner");
            return;
        }

        tracing::trace!(index, "race claimed");
        *self.winner.borrow_mut() = Some((index, outcome));
        self.teardown();

        let parent = self.parent.borrow_mut().take();
        if let Some(parent) = parent {
            parent.wake();
        }
    }

    /// Destroys every branch that is not currently running.
    ///
    /// Dropping a branch drops its task, which cancels its timers and
    /// deregisters its descriptors. A branch that is running aborts
    /// itself here too; its frame is released as soon as it returns.
    fn teardown(&self) {
        let inline = self.inline.borrow_mut().take();
        drop(inline);

        let siblings = std::mem::take(&mut *self.siblings.borrow_mut());
        let core = self.core.borrow().upgrade();

        if let Some(core) = core {
            for id in siblings {
                core.scheduler.abort(id);
            }
        }
    }
}

/// A branch's entry in a race.
///
/// A wrapper destroyed before its branch finished, other than by the
/// race's own teardown, enters the race with [`Error::Cancelled`].
struct Entry<T> {
    block: Option<Rc<RaceBlock<T>>>,
    index: usize,
}

impl<T> Entry<T> {
    fn claim(mut self, outcome: Result<T>) {
        if let Some(block) = self.block.take() {
            block.claim(self.index, outcome);
        }
    }
}

impl<T> Drop for Entry<T> {
    fn drop(&mut self) {
        if let Some(block) = self.block.take() {
            block.claim(self.index, Err(Error::Cancelled));
        }
    }
}

fn wrap<T: 'static>(block: &Rc<RaceBlock<T>>, index: usize, child: Task<T>) -> BoxFrame {
    let entry = Entry {
        block: Some(block.clone()),
        index,
    };

    Box::pin(async move {
        let outcome = child.await;
        entry.claim(outcome);
    })
}

/// The parent frame of a [`race`].
struct RaceAll<T> {
    block: Rc<RaceBlock<T>>,

    /// Branches not yet dispatched. Emptied on the first poll.
    pending: Vec<Task<T>>,
}

impl<T: 'static> RaceAll<T> {
    fn launch(&mut self) {
        let core = context::expect_current("task::race");
        let mut children = std::mem::take(&mut self.pending).into_iter().enumerate();

        *self.block.core.borrow_mut() = Rc::downgrade(&core);

        if let Some((index, child)) = children.next() {
            *self.block.inline.borrow_mut() = Some(wrap(&self.block, index, child));
        }

        for (index, child) in children {
            let id = core.scheduler.spawn(wrap(&self.block, index, child));
            self.block.siblings.borrow_mut().push(id);
        }
    }
}

impl<T: 'static> Future for RaceAll<T> {
    type Output = Result<Raced<T>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if !this.pending.is_empty() {
            this.launch();
        }

        let block = &*this.block;
        block.parent.borrow_mut().take();

        let inline = block.inline.borrow_mut().take();
        if let Some(mut inline) = inline {
            if inline.as_mut().poll(cx).is_pending() && !block.claimed.get() {
                *block.inline.borrow_mut() = Some(inline);
            }
        }

        let winner = block.winner.borrow_mut().take();
        if let Some((index, outcome)) = winner {
            return Poll::Ready(outcome.map(|value| Raced { index, value }));
        }

        *block.parent.borrow_mut() = Some(cx.waker().clone());
        Poll::Pending
    }
}

impl<T> Drop for RaceAll<T> {
    fn drop(&mut self) {
        // An abandoned race has no winner to report.
        self.block.claimed.set(true);
        self.block.parent.borrow_mut().take();
        self.block.teardown();
    }
}

/// Runs every task concurrently and completes with the first one to
/// finish.
///
/// The winner's outcome is propagated whether it is a value or a
/// failure. The moment the winner is claimed, every other branch is
/// destroyed, releasing its timers and readiness registrations, and any
/// outcome it might have produced is discarded.
///
/// An empty race fails with [`Error::EmptyRace`].
///
/// # Examples
///
/// ```rust,ignore
/// let raced = task::race(vec![
///     Task::new(async { sleep(Duration::from_millis(10)).await; Ok("fast") }),
///     Task::new(async { sleep(Duration::from_secs(10)).await; Ok("slow") }),
/// ])
/// .await?;
///
/// assert_eq!(raced.index, 0);
/// assert_eq!(raced.value, "fast");
/// ```
pub fn race<T: 'static>(children: Vec<Task<T>>) -> Task<Raced<T>> {
    if children.is_empty() {
        return Task::failed(Error::EmptyRace);
    }

    let block = Rc::new(RaceBlock::new(children.len()));

    Task::new(RaceAll {
        block,
        pending: children,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Runtime;
    use crate::runtime::task::yield_now;
    use crate::time::sleep;

    use std::time::Duration;

    #[test]
    fn empty_race_fails() {
        let runtime = Runtime::new().unwrap();
        let result = runtime.block_on(race::<u8>(Vec::new()));

        assert!(matches!(result, Err(Error::EmptyRace)));
    }

    #[test]
    fn spawned_branch_can_win() {
        let runtime = Runtime::new().unwrap();

        let raced = runtime
            .block_on(race(vec![
                Task::new(async {
                    sleep(Duration::from_secs(60)).await;
                    Ok("slow")
                }),
                Task::new(async {
                    yield_now().await;
                    Ok("fast")
                }),
            ]))
            .unwrap();

        assert_eq!(raced, Raced { index: 1, value: "fast" });

        // The inline loser's timer went away with it.
        assert_eq!(runtime.metrics().timers, 0);
        assert_eq!(runtime.metrics().tasks, 0);
    }

    #[test]
    fn losing_branches_are_destroyed_when_the_winner_is_claimed() {
        let runtime = Runtime::new().unwrap();
        let dropped = Rc::new(Cell::new(0));

        struct Guard(Rc<Cell<u32>>);

        impl Drop for Guard {
            fn drop(&mut self) {
                self.0.set(self.0.get() + 1);
            }
        }

        let first = dropped.clone();
        let second = dropped.clone();

        let raced = runtime
            .block_on(async move {
                let raced = race(vec![
                    Task::new(async {
                        sleep(Duration::from_millis(20)).await;
                        Ok(0)
                    }),
                    Task::new(async move {
                        let _guard = Guard(first);
                        sleep(Duration::from_secs(60)).await;
                        Ok(1)
                    }),
                    Task::new(async move {
                        let _guard = Guard(second);
                        sleep(Duration::from_secs(60)).await;
                        Ok(2)
                    }),
                ])
                .await?;

                Ok(raced.index)
            })
            .unwrap();

        assert_eq!(raced, 0);
        assert_eq!(dropped.get(), 2);

        let metrics = runtime.metrics();
        assert_eq!(metrics.tasks, 0);
        assert_eq!(metrics.timers, 0);
    }

    #[test]
    fn winner_failure_is_propagated() {
        let runtime = Runtime::new().unwrap();

        let result = runtime.block_on(race(vec![
            Task::new(async {
                yield_now().await;
                Ok(1)
            }),
            Task::new(async { Err::<i32, _>(Error::msg("lost the plot")) }),
        ]));

        // The inline branch yields, so the spawned failing branch wins.
        assert_eq!(result.unwrap_err().to_string(), "lost the plot");
    }

    #[test]
    fn destroyed_wrapper_enters_the_race_as_cancelled() {
        let runtime = Runtime::new().unwrap();

        runtime
            .block_on(async {
                let core = context::expect_current("race test");
                let block = Rc::new(RaceBlock::new(2));

                let stuck = Task::new(async {
                    std::future::pending::<()>().await;
                    Ok(1u8)
                });
                let id = core.scheduler.spawn(wrap(&block, 1, stuck));
                assert!(core.scheduler.abort(id));

                assert!(block.claimed.get());
                let winner = block.winner.borrow_mut().take();
                assert!(matches!(winner, Some((1, Err(Error::Cancelled)))));
                Ok(())
            })
            .unwrap();
    }
}
