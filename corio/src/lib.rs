//! # Corio
//!
//! **Corio** is a single-threaded cooperative coroutine runtime. It lets a
//! program write sequential-looking code that suspends at timer and I/O
//! waits without blocking the thread, and resumes when the awaited
//! condition is satisfied.
//!
//! One thread drives everything: a ready queue of tasks, a deadline-ordered
//! timer queue and a readiness reactor (epoll on Linux, `poll(2)` on other
//! unix targets), merged into one loop that stops once nothing is left to
//! run or wait for.
//!
//! It offers:
//!
//! - A lazy, uniquely-owned [`Task`](task::Task) with failure propagation
//!   across suspension points,
//! - **Structured concurrency** with [`join_all`](task::join_all) and
//!   [`race`](task::race), where race losers are torn down the moment the
//!   winner finishes,
//! - **Timers** with [`sleep`](time::sleep) and [`timeout`](time::timeout),
//! - **Readiness-based I/O** on raw descriptors in [`io`],
//! - **Ergonomic macros** like `#[corio::main]`, `#[corio::test]`, `join!`
//!   and `race!`.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use corio::task::{self, Task};
//! use corio::time::sleep;
//! use std::time::Duration;
//!
//! #[corio::main]
//! async fn main() -> corio::Result<()> {
//!     let pair = task::join_all(vec![
//!         Task::new(async { sleep(Duration::from_secs(1)).await; Ok(1) }),
//!         Task::new(async { sleep(Duration::from_secs(2)).await; Ok(2) }),
//!     ])
//!     .await?;
//!
//!     // Both children slept concurrently: this prints after ~2s.
//!     println!("{pair:?}");
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`task`] — Tasks, spawning, and the join/race combinators
//! - [`time`] — Sleep and timeout
//! - [`io`] — Readiness waits and non-blocking descriptor I/O
//! - [`sys`] — The syscall guard

mod error;
mod reactor;
mod runtime;
mod utils;

pub mod io;
pub mod sys;
pub mod time;

pub use error::{Error, OsError, Result};
pub use runtime::task;
pub use runtime::{Builder, Metrics, Runtime, metrics};

pub use corio_macros::*;

/// Support code for the `join!` and `race!` macros. Not public API.
#[doc(hidden)]
pub mod __private {
    use crate::error::Result;
    use crate::task::Task;

    use std::cell::RefCell;
    use std::future::Future;
    use std::rc::Rc;

    /// Pins the output type of an entry point's body to its declared
    /// return type.
    pub fn returning<T, F>(future: F) -> F
    where
        F: Future<Output = T>,
    {
        future
    }

    pub type Slot<T> = Rc<RefCell<Option<T>>>;

    pub fn slot<T>() -> Slot<T> {
        Rc::new(RefCell::new(None))
    }

    /// Runs `future` as a task that parks its value in `slot`.
    pub fn fill<F, T>(slot: &Slot<T>, future: F) -> Task<()>
    where
        F: Future<Output = Result<T>> + 'static,
        T: 'static,
    {
        let slot = slot.clone();

        Task::new(async move {
            let value = future.await?;
            *slot.borrow_mut() = Some(value);
            Ok(())
        })
    }

    /// Runs `future` as a task whose value is wrapped by `map`.
    pub fn map<F, T, U>(future: F, map: fn(T) -> U) -> Task<U>
    where
        F: Future<Output = Result<T>> + 'static,
        T: 'static,
        U: 'static,
    {
        Task::new(async move { future.await.map(map) })
    }

    pub fn take<T>(slot: &Slot<T>) -> T {
        match slot.borrow_mut().take() {
            Some(value) => value,
            None => unreachable!("joined branch finished without a value"),
        }
    }
}
