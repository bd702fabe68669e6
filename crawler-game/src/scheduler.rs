//! Discrete-event scheduler.
//!
//! Pending events are kept in a min-heap keyed by `(time, priority, seq)`.
//! `seq` is a monotonic insertion counter, so events with equal time and
//! priority fire in the order they were scheduled on every run.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::time::TimePoint;

/// An event waiting in the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scheduled<E> {
    pub time: TimePoint,
    /// Lower values fire first among events at the same instant.
    pub priority: i32,
    pub seq: u64,
    pub event: E,
}

impl<E> Scheduled<E> {
    const fn key(&self) -> (TimePoint, i32, u64) {
        (self.time, self.priority, self.seq)
    }
}

impl<E> PartialEq for Scheduled<E> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl<E> Eq for Scheduled<E> {}

impl<E> PartialOrd for Scheduled<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Ord for Scheduled<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the std max-heap pops the smallest key.
        other.key().cmp(&self.key())
    }
}

#[derive(Serialize, Deserialize)]
struct SchedulerRepr<E> {
    next_seq: u64,
    last_fired: TimePoint,
    events: Vec<Scheduled<E>>,
}

/// Priority queue of pending events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    into = "SchedulerRepr<E>",
    from = "SchedulerRepr<E>",
    bound(serialize = "E: Serialize + Clone", deserialize = "E: Deserialize<'de>")
)]
pub struct Scheduler<E> {
    heap: BinaryHeap<Scheduled<E>>,
    next_seq: u64,
    last_fired: TimePoint,
}

impl<E> Default for Scheduler<E> {
    fn default() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
            last_fired: TimePoint::NONE,
        }
    }
}

impl<E> From<Scheduler<E>> for SchedulerRepr<E> {
    fn from(scheduler: Scheduler<E>) -> Self {
        // Serialized in firing order so equal queues produce equal snapshots.
        let mut events = scheduler.heap.into_sorted_vec();
        events.reverse();
        Self {
            next_seq: scheduler.next_seq,
            last_fired: scheduler.last_fired,
            events,
        }
    }
}

impl<E> From<SchedulerRepr<E>> for Scheduler<E> {
    fn from(repr: SchedulerRepr<E>) -> Self {
        Self {
            heap: repr.events.into_iter().collect(),
            next_seq: repr.next_seq,
            last_fired: repr.last_fired,
        }
    }
}

impl<E> Scheduler<E> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an event. The queue accepts any time; rejecting instants that
    /// are already in the past is the job of whoever owns "now".
    pub fn schedule(&mut self, time: TimePoint, priority: i32, event: E) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Scheduled {
            time,
            priority,
            seq,
            event,
        });
        seq
    }

    /// Earliest pending event, if any.
    #[must_use]
    pub fn peek_next(&self) -> Option<&Scheduled<E>> {
        self.heap.peek()
    }

    /// Time of the earliest pending event.
    #[must_use]
    pub fn next_time(&self) -> Option<TimePoint> {
        self.heap.peek().map(|scheduled| scheduled.time)
    }

    /// Pop the earliest event if it is due at or before `target`.
    pub fn pop_due(&mut self, target: TimePoint) -> Option<Scheduled<E>> {
        if self.heap.peek().is_some_and(|next| next.time <= target) {
            let scheduled = self.heap.pop()?;
            self.last_fired = scheduled.time;
            Some(scheduled)
        } else {
            None
        }
    }

    /// Pop and fire events due at or before `target` until the queue runs dry
    /// or `stop` reports true. `stop` is polled before every event; `fire` may
    /// schedule follow-ups, which are picked up if they are still due.
    ///
    /// Returns the number of events fired.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by `fire`; the failing event has
    /// already been removed from the queue.
    pub fn process_until<S, F, Err>(
        &mut self,
        target: TimePoint,
        mut stop: S,
        mut fire: F,
    ) -> Result<usize, Err>
    where
        S: FnMut() -> bool,
        F: FnMut(&mut Self, Scheduled<E>) -> Result<(), Err>,
    {
        let mut fired = 0;
        while !stop() {
            let Some(scheduled) = self.pop_due(target) else {
                break;
            };
            fire(self, scheduled)?;
            fired += 1;
        }
        Ok(fired)
    }

    /// Time of the most recently popped event, `NONE` before the first.
    #[must_use]
    pub const fn last_fired(&self) -> TimePoint {
        self.last_fired
    }

    /// Pending events in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Scheduled<E>> {
        self.heap.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
