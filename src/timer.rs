//! Timers and idlers (C9): an expiring timer heap plus an idle callback
//! list serviced once per event-pump iteration.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::time::Millis;

/// A timer's identity, returned by [`TimerQueue::schedule`] so callers
/// can cancel it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

struct Entry {
    expiry: Millis,
    seq: u64,
    id: TimerId,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.expiry == other.expiry && self.seq == other.seq
    }
}
impl Eq for Entry {}
impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Tied expiries fire in insertion order: break ties on sequence
        // number, not arbitrary heap order.
        self.expiry.cmp(&other.expiry).then(self.seq.cmp(&other.seq))
    }
}

/// A min-heap of pending timers, ordered by expiry then insertion order.
pub struct TimerQueue {
    heap: BinaryHeap<Reverse<Entry>>,
    cancelled: std::collections::HashSet<TimerId>,
    next_id: u64,
    next_seq: u64,
}

impl Default for TimerQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerQueue {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            cancelled: std::collections::HashSet::new(),
            next_id: 0,
            next_seq: 0,
        }
    }

    /// Schedule a one-shot timer to expire at `expiry` (absolute
    /// milliseconds on the pump's clock).
    pub fn schedule(&mut self, expiry: Millis) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Entry { expiry, seq, id }));
        id
    }

    /// Cancel a pending timer. Idempotent: cancelling an already-fired or
    /// already-cancelled id is a no-op, and may be called from within the
    /// timer's own callback.
    pub fn cancel(&mut self, id: TimerId) {
        self.cancelled.insert(id);
    }

    /// Pop every timer whose expiry is `<= now`, in expiry order (ties
    /// broken by insertion order), skipping cancelled ones.
    pub fn drain_expired(&mut self, now: Millis) -> Vec<TimerId> {
        let mut fired = Vec::new();
        while let Some(Reverse(top)) = self.heap.peek() {
            if top.expiry > now {
                break;
            }
            let Reverse(entry) = self.heap.pop().unwrap();
            if !self.cancelled.remove(&entry.id) {
                fired.push(entry.id);
            }
        }
        fired
    }

    /// The expiry of the next pending timer, if any, used by the pump to
    /// compute its `select()` timeout.
    pub fn next_expiry(&self) -> Option<Millis> {
        self.heap.peek().map(|Reverse(e)| e.expiry)
    }
}

/// An idle callback, identified so it can be removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdlerId(u64);

/// The idle callback list, run once per pump iteration but only when the
/// event sequence counter has advanced since the last run — the same
/// "seqn == Mode.events.seqn" guard the animation idler uses in the
/// original to skip redundant iterations.
#[derive(Default)]
pub struct IdlerList {
    next_id: u64,
    ids: Vec<IdlerId>,
    last_run_seq: Option<u64>,
}

impl IdlerList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self) -> IdlerId {
        let id = IdlerId(self.next_id);
        self.next_id += 1;
        self.ids.push(id);
        id
    }

    pub fn unregister(&mut self, id: IdlerId) {
        self.ids.retain(|i| *i != id);
    }

    /// Whether idlers should run this iteration, given the pump's current
    /// event sequence number. Updates internal bookkeeping as a side
    /// effect of the check, matching the original's guard being read and
    /// then rearmed in the same step.
    pub fn should_run(&mut self, current_seq: u64) -> bool {
        let should = self.last_run_seq != Some(current_seq);
        self.last_run_seq = Some(current_seq);
        should
    }

    pub fn ids(&self) -> &[IdlerId] {
        &self.ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timers_fire_in_expiry_order() {
        let mut q = TimerQueue::new();
        let a = q.schedule(100);
        let b = q.schedule(50);
        let fired = q.drain_expired(200);
        assert_eq!(fired, vec![b, a]);
    }

    #[test]
    fn tied_expiries_fire_in_insertion_order() {
        let mut q = TimerQueue::new();
        let a = q.schedule(100);
        let b = q.schedule(100);
        let fired = q.drain_expired(100);
        assert_eq!(fired, vec![a, b]);
    }

    #[test]
    fn cancel_is_idempotent_and_skips_firing() {
        let mut q = TimerQueue::new();
        let a = q.schedule(10);
        q.cancel(a);
        q.cancel(a);
        assert!(q.drain_expired(100).is_empty());
    }

    #[test]
    fn idlers_only_run_once_per_advanced_sequence() {
        let mut idlers = IdlerList::new();
        assert!(idlers.should_run(1));
        assert!(!idlers.should_run(1));
        assert!(idlers.should_run(2));
    }
}
