use super::context;
use super::task::TaskId;

use std::task::{RawWaker, RawWakerVTable, Waker};

/// What a task waker points at: the runtime that owns the task and the
/// task's slot in that runtime's scheduler.
#[derive(Clone, Copy)]
struct WakerData {
    runtime: u64,
    task: TaskId,
}

/// The vtable shared by every task waker.
///
/// Its address doubles as the marker that lets [`task_id`] recognise
/// wakers created by this module.
static VTABLE: RawWakerVTable = RawWakerVTable::new(clone_raw, wake_raw, wake_by_ref_raw, drop_raw);

/// Creates the continuation handle for a scheduled task.
///
/// Waking it never polls anything: it only pushes the task onto the ready
/// queue of the runtime currently driving this thread, and only if that
/// is the runtime the task belongs to. The driving loop performs the
/// actual resume, so completion chains never nest on the native stack.
///
/// The waker is not meant to leave the driving thread. Waking it from
/// another thread reaches that thread's runtime (usually none) and is
/// dropped.
pub(crate) fn make_waker(runtime: u64, task: TaskId) -> Waker {
    let data = Box::new(WakerData { runtime, task });
    unsafe { Waker::from_raw(RawWaker::new(Box::into_raw(data) as *const (), &VTABLE)) }
}

/// Recovers the task behind a waker, if it is a task waker.
pub(crate) fn task_id(waker: &Waker) -> Option<TaskId> {
    decode(waker).map(|(_, task)| task)
}

/// Recovers the owning runtime id and the task behind a task waker.
pub(crate) fn decode(waker: &Waker) -> Option<(u64, TaskId)> {
    if !std::ptr::eq(waker.vtable(), &VTABLE) {
        return None;
    }

    // Safety: the vtable matched, so `data` came from `make_waker`.
    let data = unsafe { &*(waker.data() as *const WakerData) };
    Some((data.runtime, data.task))
}

fn schedule(data: &WakerData) {
    match context::current() {
        Some(core) if core.id == data.runtime => core.scheduler.schedule(data.task),
        _ => tracing::trace!(task = %data.task, "wake outside of owning runtime ignored"),
    }
}

fn clone_raw(ptr: *const ()) -> RawWaker {
    let data = unsafe { *(ptr as *const WakerData) };
    RawWaker::new(Box::into_raw(Box::new(data)) as *const (), &VTABLE)
}

fn wake_raw(ptr: *const ()) {
    let data = unsafe { Box::from_raw(ptr as *mut WakerData) };
    schedule(&data);
}

fn wake_by_ref_raw(ptr: *const ()) {
    let data = unsafe { &*(ptr as *const WakerData) };
    schedule(data);
}

fn drop_raw(ptr: *const ()) {
    drop(unsafe { Box::from_raw(ptr as *mut WakerData) });
}
