//! Cancellable timers and trailing-edge debounce.
//!
//! Timers are plain data: callers schedule a payload for an instant and
//! later collect due payloads with `take_due(now)`. A [`TimerHandle`] can
//! cancel its entry at any time; cancelled entries are never returned.

use crate::clock::EpochMs;
use std::cell::Cell;
use std::collections::HashMap;
use std::hash::Hash;
use std::rc::Rc;

/// Handle to one scheduled entry.
#[derive(Debug, Clone)]
pub struct TimerHandle {
    due_at: EpochMs,
    cancelled: Rc<Cell<bool>>,
}

impl TimerHandle {
    /// Drops the scheduled entry. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }

    pub fn due_at(&self) -> EpochMs {
        self.due_at
    }
}

struct Scheduled<T> {
    due_at: EpochMs,
    seq: u64,
    cancelled: Rc<Cell<bool>>,
    payload: T,
}

/// Ordered queue of scheduled payloads.
pub struct TimerQueue<T> {
    entries: Vec<Scheduled<T>>,
    next_seq: u64,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_seq: 0,
        }
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due_at: EpochMs, payload: T) -> TimerHandle {
        let cancelled = Rc::new(Cell::new(false));
        self.entries.push(Scheduled {
            due_at,
            seq: self.next_seq,
            cancelled: Rc::clone(&cancelled),
            payload,
        });
        self.next_seq += 1;
        TimerHandle { due_at, cancelled }
    }

    /// Removes and returns payloads due at or before `now`, earliest first;
    /// entries scheduled for the same instant keep scheduling order.
    pub fn take_due(&mut self, now: EpochMs) -> Vec<T> {
        self.entries.retain(|entry| !entry.cancelled.get());
        let (mut due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|entry| entry.due_at <= now);
        self.entries = pending;
        due.sort_by_key(|entry| (entry.due_at, entry.seq));
        due.into_iter().map(|entry| entry.payload).collect()
    }

    /// Earliest live deadline.
    pub fn next_due(&self) -> Option<EpochMs> {
        self.entries
            .iter()
            .filter(|entry| !entry.cancelled.get())
            .map(|entry| entry.due_at)
            .min()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| !entry.cancelled.get())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Trailing-edge debounce keyed by `K`.
///
/// Each `touch` cancels the key's pending entry and schedules a new one
/// `delay_ms` later, so a burst collapses into one call after it ends.
pub struct Debouncer<K> {
    delay_ms: EpochMs,
    queue: TimerQueue<K>,
    pending: HashMap<K, TimerHandle>,
}

impl<K: Eq + Hash + Clone> Debouncer<K> {
    pub fn new(delay_ms: EpochMs) -> Self {
        Self {
            delay_ms,
            queue: TimerQueue::new(),
            pending: HashMap::new(),
        }
    }

    pub fn delay_ms(&self) -> EpochMs {
        self.delay_ms
    }

    /// (Re)starts the timer for `key`.
    pub fn touch(&mut self, key: K, now: EpochMs) -> TimerHandle {
        if let Some(previous) = self.pending.remove(&key) {
            previous.cancel();
        }
        let handle = self.queue.schedule(now + self.delay_ms, key.clone());
        self.pending.insert(key, handle.clone());
        handle
    }

    /// Cancels the pending call for `key`. Returns whether one existed.
    pub fn cancel(&mut self, key: &K) -> bool {
        match self.pending.remove(key) {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.pending
            .get(key)
            .is_some_and(|handle| !handle.is_cancelled())
    }

    /// Keys whose quiet period has elapsed.
    pub fn due(&mut self, now: EpochMs) -> Vec<K> {
        let due = self.queue.take_due(now);
        for key in &due {
            self.pending.remove(key);
        }
        due
    }

    /// Cancels every pending call and returns the affected keys.
    pub fn drain(&mut self) -> Vec<K> {
        let keys: Vec<K> = self.pending.keys().cloned().collect();
        for handle in self.pending.values() {
            handle.cancel();
        }
        self.pending.clear();
        self.queue.take_due(EpochMs::MIN);
        keys
    }
}
