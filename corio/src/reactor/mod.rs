//! Timer queue and readiness reactor.
//!
//! This module holds the two wait lists the driving loop merges:
//! - the [`TimerQueue`], a deadline-ordered heap of sleeping tasks,
//! - the [`Reactor`], a readiness multiplexer for tasks waiting on file
//!   descriptors.
//!
//! Neither component runs tasks. Both hand the wakers of satisfied waits
//! back to the loop, which pushes them onto the ready queue.
//!
//! Most runtime users do not interact with these directly; they are
//! reached through [`time`](crate::time) and [`io`](crate::io).

mod io;
mod timer;

pub(crate) mod poller;

pub(crate) use io::{Reactor, RegistrationId};
pub(crate) use timer::{TimerKey, TimerQueue};
