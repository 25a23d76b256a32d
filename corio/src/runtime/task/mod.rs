//! Tasks and the combinators built on them.
//!
//! A [`Task`] is a lazily-started, uniquely-owned unit of suspendable
//! computation with a single eventual result or failure. Tasks can be
//! awaited directly, handed to the runtime with [`spawn`], or composed
//! with [`join_all`] and [`race`].
//!
//! Everything here is single-threaded: tasks are not `Send` and shared
//! bookkeeping uses `Rc`/`Cell` rather than atomics.

mod core;
mod gate;
mod handle;
mod join;
mod race;

use crate::utils::Key;

use std::fmt;

pub use self::core::Task;
pub use gate::{Drive, Suspend, current, drive, suspend, yield_now};
pub use handle::{JoinHandle, abort, spawn};
pub use join::join_all;
pub use race::{Raced, race};

pub(crate) use handle::spawn_on;

/// Identifies a task scheduled on a runtime.
///
/// Ids are generational: once a task's frame is destroyed its id never
/// refers to another task, even if the slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(Key);

impl TaskId {
    pub(crate) fn from_key(key: Key) -> Self {
        Self(key)
    }

    pub(crate) fn key(self) -> Key {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.0.index, self.0.generation)
    }
}
