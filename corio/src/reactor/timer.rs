use crate::utils::{Key, Slab};

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::task::Waker;
use std::time::{Duration, Instant};

/// Handle to a scheduled timer, used to cancel it or refresh its waker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TimerKey(Key);

/// An entry in the timer heap.
///
/// `TimerEntry` represents a scheduled wake-up at a specific
/// deadline. The waker itself lives in the queue's slab under `key`; a
/// cancelled entry stays in the heap until it is popped or compacted, and
/// is recognised by its key no longer resolving.
struct TimerEntry {
    /// The time at which the timer should fire.
    deadline: Instant,

    /// Insertion order, used to break deadline ties.
    seq: u64,

    key: Key,
}

impl Eq for TimerEntry {}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Ord for TimerEntry {
    /// Orders timer entries by deadline, then by insertion order.
    ///
    /// Note that the comparison is **reversed** so that a
    /// `BinaryHeap<TimerEntry>` behaves as a min-heap,
    /// where the earliest deadline is popped first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Deadline-ordered wait list.
///
/// Scheduling is O(log n). Cancellation removes the waker immediately, so
/// [`len`](Self::len) only ever counts timers that can still fire.
pub(crate) struct TimerQueue {
    heap: BinaryHeap<TimerEntry>,
    wakers: Slab<Waker>,
    seq: u64,
}

impl TimerQueue {
    pub(crate) fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            wakers: Slab::with_capacity(16),
            seq: 0,
        }
    }

    /// Registers `waker` to be woken once `deadline` has passed.
    pub(crate) fn schedule(&mut self, deadline: Instant, waker: Waker) -> TimerKey {
        let key = self.wakers.insert(waker);
        let seq = self.seq;
        self.seq += 1;

        self.heap.push(TimerEntry { deadline, seq, key });
        tracing::trace!(?deadline, seq, "timer scheduled");

        TimerKey(key)
    }

    /// Cancels a pending timer.
    ///
    /// Returns `false` if the timer already fired or was cancelled, which
    /// makes this safe to call from every teardown path.
    pub(crate) fn cancel(&mut self, key: TimerKey) -> bool {
        let removed = self.wakers.remove(key.0).is_some();

        if removed {
            tracing::trace!("timer cancelled");
            self.compact();
        }

        removed
    }

    /// Replaces the waker of a pending timer.
    pub(crate) fn update_waker(&mut self, key: TimerKey, waker: &Waker) -> bool {
        match self.wakers.get_mut(key.0) {
            Some(current) => {
                if !current.will_wake(waker) {
                    *current = waker.clone();
                }
                true
            }
            None => false,
        }
    }

    /// Number of timers that can still fire.
    pub(crate) fn len(&self) -> usize {
        self.wakers.len()
    }

    /// Pops every timer whose deadline is at or before `now`, collecting
    /// its waker into `due`, and returns the delay until the next pending
    /// deadline, or `None` if nothing is left.
    ///
    /// Entries are compared against the single `now` passed in, so a timer
    /// scheduled by a resumed task is only included if its own deadline
    /// has already passed.
    pub(crate) fn advance(&mut self, now: Instant, due: &mut Vec<Waker>) -> Option<Duration> {
        while let Some(entry) = self.heap.peek() {
            let live = self.wakers.contains(entry.key);

            if live && entry.deadline > now {
                return Some(entry.deadline - now);
            }

            let Some(entry) = self.heap.pop() else {
                break;
            };

            if let Some(waker) = self.wakers.remove(entry.key) {
                tracing::trace!(seq = entry.seq, "timer fired");
                due.push(waker);
            }
        }

        None
    }

    /// Drops cancelled entries once they make up most of the heap.
    fn compact(&mut self) {
        if self.heap.len() > 64 && self.heap.len() > 2 * self.wakers.len() {
            let wakers = &self.wakers;
            self.heap.retain(|entry| wakers.contains(entry.key));
        }
    }
}
