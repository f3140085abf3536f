//! Delay scheduling for derived events
//!
//! Wins and clicks are created at bid time but must not be emitted before
//! their scheduled time. A [`DelayScheduler`] holds them until then. It
//! is shared by the workers that insert and the dispatcher that drains it,
//! and keeps its lock private: every operation takes the lock for one heap
//! operation only.
//!
//! Scheduled times are wall-clock Unix nanoseconds ([`LogTime`]).

mod pending;

pub use pending::PendingHeap;

use crate::event::{Event, LogTime};
use crate::timing::unix_time_ns;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Result of [`DelayScheduler::insert`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Queued,
    /// The scheduler was at capacity; the event was discarded
    Dropped,
}

struct State<E> {
    pending: PendingHeap<E>,
    /// Bumped whenever a waiter should re-evaluate (new earliest, explicit notify)
    generation: u64,
}

/// Thread-safe min-heap of events keyed by scheduled time
pub struct DelayScheduler<E = Event> {
    name: String,
    state: Mutex<State<E>>,
    changed: Condvar,
    max_pending: Option<usize>,
    dropped: AtomicU64,
}

impl<E: LogTime> DelayScheduler<E> {
    /// Create an unbounded scheduler
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_capacity_limit(name, None)
    }

    /// Create a scheduler that drops inserts beyond `max_pending` events
    pub fn with_capacity_limit(name: impl Into<String>, max_pending: Option<usize>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(State { pending: PendingHeap::new(), generation: 0 }),
            changed: Condvar::new(),
            max_pending,
            dropped: AtomicU64::new(0),
        }
    }

    // A panic while holding the lock cannot leave the heap half-updated,
    // so a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, State<E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue `event` for emission at its scheduled time
    pub fn insert(&self, event: E) -> InsertOutcome {
        let due_ns = event.log_time_ns();
        let mut state = self.lock();

        if self.max_pending.is_some_and(|max| state.pending.len() >= max) {
            drop(state);
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return InsertOutcome::Dropped;
        }

        if state.pending.push(due_ns, event) {
            state.generation = state.generation.wrapping_add(1);
            drop(state);
            self.changed.notify_all();
        }
        InsertOutcome::Queued
    }

    /// Remove the earliest event; `None` when empty
    pub fn pop_earliest(&self) -> Option<E> {
        self.lock().pending.pop()
    }

    /// Remove the earliest event if it is due at or before `now_ns`
    pub fn pop_due(&self, now_ns: u64) -> Option<E> {
        self.lock().pending.pop_due(now_ns)
    }

    pub fn peek_earliest_time(&self) -> Option<u64> {
        self.lock().pending.peek_due_time()
    }

    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().pending.is_empty()
    }

    /// Inserts rejected because the scheduler was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Discard everything still pending, returning the count
    pub fn clear(&self) -> usize {
        self.lock().pending.clear()
    }

    /// Wake every thread blocked in [`wait_for_due`](Self::wait_for_due)
    pub fn notify_waiters(&self) {
        let mut state = self.lock();
        state.generation = state.generation.wrapping_add(1);
        drop(state);
        self.changed.notify_all();
    }

    /// Block until the earliest event is due, a new earliest event arrives,
    /// [`notify_waiters`](Self::notify_waiters) is called, or `max_wait` passes
    pub fn wait_for_due(&self, max_wait: Duration) {
        let deadline = Instant::now() + max_wait;
        let mut state = self.lock();
        let generation = state.generation;

        loop {
            if state.generation != generation {
                return;
            }

            let now = Instant::now();
            if now >= deadline {
                return;
            }
            let mut timeout = deadline - now;

            if let Some(due_ns) = state.pending.peek_due_time() {
                let now_ns = unix_time_ns();
                if due_ns <= now_ns {
                    return;
                }
                timeout = timeout.min(Duration::from_nanos(due_ns - now_ns));
            }

            state = self
                .changed
                .wait_timeout(state, timeout)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|e| e.into_inner().0);
        }
    }
}

impl<E: LogTime + Clone> DelayScheduler<E> {
    /// Copy of the earliest pending event
    pub fn peek_earliest(&self) -> Option<E> {
        self.lock().pending.peek().cloned()
    }
}

impl<E> std::fmt::Debug for DelayScheduler<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelayScheduler")
            .field("name", &self.name)
            .field("max_pending", &self.max_pending)
            .field("dropped", &self.dropped.load(Ordering::Relaxed))
            .finish()
    }
}
