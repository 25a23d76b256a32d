//! Timer utilities.
//!
//! This module provides time-related asynchronous utilities that
//! integrate with the runtime's timer queue.
//!
//! It includes:
//! - [`sleep`] and [`sleep_until`] for suspending until a deadline,
//! - [`timeout`] for bounding a future's execution time.

mod sleep;
mod timeout;

#[doc(inline)]
pub use sleep::{Sleep, sleep, sleep_until};

#[doc(inline)]
pub use timeout::timeout;
