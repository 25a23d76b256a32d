use super::core::Core;

use std::cell::RefCell;
use std::rc::Rc;

thread_local! {
    /// The runtime currently driving this thread.
    ///
    /// Installed for the duration of [`Runtime::run`](super::Runtime::run)
    /// and [`Runtime::block_on`](super::Runtime::block_on) so that timers,
    /// readiness waits and `spawn` can reach the scheduler without explicit
    /// parameter passing.
    static CURRENT: RefCell<Option<Rc<Core>>> = const { RefCell::new(None) };
}

/// Restores the previous (empty) context when dropped, including while
/// unwinding out of the driving loop.
pub(crate) struct EnterGuard {
    _private: (),
}

impl Drop for EnterGuard {
    fn drop(&mut self) {
        CURRENT.with(|cell| cell.borrow_mut().take());
    }
}

/// Installs `core` as the current runtime for this thread.
///
/// # Panics
///
/// Panics if a runtime is already being driven on this thread: there is
/// exactly one driving loop per thread.
pub(crate) fn enter(core: Rc<Core>) -> EnterGuard {
    CURRENT.with(|cell| {
        let mut current = cell.borrow_mut();
        assert!(
            current.is_none(),
            "cannot drive a corio runtime from within another runtime on the same thread"
        );
        *current = Some(core);
    });

    EnterGuard { _private: () }
}

/// Returns the runtime driving this thread, if any.
pub(crate) fn current() -> Option<Rc<Core>> {
    CURRENT.with(|cell| cell.borrow().clone())
}

/// Returns the runtime driving this thread.
///
/// # Panics
///
/// Panics with a message naming `what` when called outside a runtime.
#[track_caller]
pub(crate) fn expect_current(what: &str) -> Rc<Core> {
    match current() {
        Some(core) => core,
        None => panic!("{what} must be used within the context of a corio runtime"),
    }
}
