//! Core runtime components.
//!
//! This module contains the fundamental building blocks of the runtime:
//! the task abstraction, the ready queue and the driving loop that merges
//! it with the timer queue and the readiness reactor.
//!
//! Everything here is single-threaded. A runtime is driven by exactly one
//! thread, and at most one runtime is driven per thread at a time.

mod core;
mod scheduler;
mod waker;

pub(crate) mod builder;
pub(crate) mod context;

pub mod task;

pub use self::core::{Metrics, Runtime, metrics};
pub use builder::Builder;

pub(crate) use self::core::Core;
