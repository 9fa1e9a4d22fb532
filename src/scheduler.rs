//! Tracked one-shot and repeating timers.
//!
//! Every timer belongs to the component that scheduled it and is keyed by a
//! task kind, so the owner can cancel a superseded task, all tasks of a kind,
//! or everything on reset/teardown. Timers are polled: the owner advances its
//! clock and handles due tasks one at a time, which keeps all mutation on the
//! caller's thread and makes playback independent of frame size.

use std::fmt::Debug;

/// Shortest allowed period, guards against zero-length repeating timers
pub const MIN_PERIOD_MS: u64 = 1;

/// Identifies one scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cadence {
    Once,
    Every(u64),
}

#[derive(Debug, Clone)]
struct Entry<K> {
    handle: TimerHandle,
    kind: K,
    due_ms: u64,
    cadence: Cadence,
}

/// A timer that came due
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fired<K> {
    pub handle: TimerHandle,
    pub kind: K,
    /// Clock time at which the timer fired
    pub at_ms: u64,
}

/// Timer table owned by a single component
#[derive(Debug, Clone)]
pub struct Timers<K> {
    now_ms: u64,
    next_handle: u64,
    entries: Vec<Entry<K>>,
}

impl<K: Copy + PartialEq + Debug> Timers<K> {
    pub fn new() -> Self {
        Self {
            now_ms: 0,
            next_handle: 1,
            entries: Vec::new(),
        }
    }

    /// Current clock time in milliseconds
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    fn push(&mut self, kind: K, due_ms: u64, cadence: Cadence) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        self.entries.push(Entry {
            handle,
            kind,
            due_ms,
            cadence,
        });
        handle
    }

    /// Fire `kind` once, `delay_ms` from now
    pub fn after(&mut self, delay_ms: u64, kind: K) -> TimerHandle {
        let due = self.now_ms + delay_ms;
        self.push(kind, due, Cadence::Once)
    }

    /// Fire `kind` every `period_ms`, first time one period from now
    pub fn every(&mut self, period_ms: u64, kind: K) -> TimerHandle {
        let period = period_ms.max(MIN_PERIOD_MS);
        let due = self.now_ms + period;
        self.push(kind, due, Cadence::Every(period))
    }

    /// Cancel a single timer. Returns false if it already fired or was cancelled.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.handle != handle);
        self.entries.len() != before
    }

    /// Cancel every timer of the given kind, returning how many were dropped
    pub fn cancel_kind(&mut self, kind: K) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.kind != kind);
        before - self.entries.len()
    }

    /// Cancel everything
    pub fn cancel_all(&mut self) {
        if !self.entries.is_empty() {
            log::trace!("Cancelling {} timers", self.entries.len());
        }
        self.entries.clear();
    }

    pub fn is_scheduled(&self, kind: K) -> bool {
        self.entries.iter().any(|e| e.kind == kind)
    }

    /// Number of outstanding timers
    pub fn pending(&self) -> usize {
        self.entries.len()
    }

    /// Pop the earliest timer due at or before `until_ms`.
    ///
    /// The clock moves to the timer's due time, so anything scheduled while
    /// handling it is relative to that instant. Repeating timers are re-armed.
    /// Ties fire in scheduling order.
    pub fn pop_due(&mut self, until_ms: u64) -> Option<Fired<K>> {
        let index = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.due_ms <= until_ms)
            .min_by_key(|(_, e)| (e.due_ms, e.handle))
            .map(|(i, _)| i)?;

        let entry = &mut self.entries[index];
        let fired = Fired {
            handle: entry.handle,
            kind: entry.kind,
            at_ms: entry.due_ms,
        };
        self.now_ms = self.now_ms.max(entry.due_ms);

        let cadence = entry.cadence;
        match cadence {
            Cadence::Every(period) => entry.due_ms += period,
            Cadence::Once => {
                self.entries.remove(index);
            }
        }
        Some(fired)
    }

    /// Move the clock forward to `until_ms` once all due timers are handled
    pub fn catch_up(&mut self, until_ms: u64) {
        self.now_ms = self.now_ms.max(until_ms);
    }
}

impl<K: Copy + PartialEq + Debug> Default for Timers<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Task {
        Hold,
        Tick,
    }

    fn drain(timers: &mut Timers<Task>, dt: u64) -> Vec<Task> {
        let until = timers.now_ms() + dt;
        let mut fired = Vec::new();
        while let Some(f) = timers.pop_due(until) {
            fired.push(f.kind);
        }
        timers.catch_up(until);
        fired
    }

    #[test]
    fn test_one_shot_fires_once() {
        let mut timers = Timers::new();
        timers.after(100, Task::Hold);

        assert!(drain(&mut timers, 99).is_empty());
        assert_eq!(drain(&mut timers, 1), vec![Task::Hold]);
        assert!(drain(&mut timers, 1000).is_empty());
        assert_eq!(timers.pending(), 0);
    }

    #[test]
    fn test_repeating_fires_per_period() {
        let mut timers = Timers::new();
        timers.every(16, Task::Tick);

        // A large frame still fires every period it covers
        assert_eq!(drain(&mut timers, 64).len(), 4);
        assert_eq!(timers.now_ms(), 64);
        assert!(timers.is_scheduled(Task::Tick));
    }

    #[test]
    fn test_zero_period_is_floored() {
        let mut timers = Timers::new();
        timers.every(0, Task::Tick);

        assert_eq!(drain(&mut timers, 5).len(), 5);
    }

    #[test]
    fn test_cancel_kind_and_all() {
        let mut timers = Timers::new();
        timers.every(16, Task::Tick);
        timers.after(10, Task::Hold);
        timers.after(20, Task::Hold);

        assert_eq!(timers.cancel_kind(Task::Hold), 2);
        assert_eq!(timers.pending(), 1);

        timers.cancel_all();
        assert!(drain(&mut timers, 1000).is_empty());
    }

    #[test]
    fn test_cancel_handle() {
        let mut timers = Timers::new();
        let handle = timers.after(10, Task::Hold);

        assert!(timers.cancel(handle));
        assert!(!timers.cancel(handle));
        assert!(drain(&mut timers, 100).is_empty());
    }

    #[test]
    fn test_scheduling_during_handling_is_relative_to_fire_time() {
        let mut timers = Timers::new();
        timers.after(10, Task::Hold);

        let fired = timers.pop_due(100).unwrap();
        assert_eq!(fired.at_ms, 10);
        timers.after(5, Task::Tick);

        // Chained timer lands at 15, still inside the same frame
        assert_eq!(timers.pop_due(100).map(|f| f.at_ms), Some(15));
    }

    #[test]
    fn test_ties_fire_in_scheduling_order() {
        let mut timers = Timers::new();
        timers.after(10, Task::Tick);
        timers.after(10, Task::Hold);

        assert_eq!(drain(&mut timers, 10), vec![Task::Tick, Task::Hold]);
    }
}
