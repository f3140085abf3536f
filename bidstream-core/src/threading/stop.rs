//! Cooperative cancellation shared by workers, dispatchers and the runtime

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

struct Inner {
    stopped: AtomicBool,
    lock: Mutex<()>,
    cvar: Condvar,
}

/// Cloneable stop signal
///
/// Every loop checks `is_stopped()` once per iteration, and every blocking
/// wait goes through `wait_timeout()` so that `stop()` wakes it immediately.
#[derive(Clone)]
pub struct StopSignal {
    inner: Arc<Inner>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                stopped: AtomicBool::new(false),
                lock: Mutex::new(()),
                cvar: Condvar::new(),
            }),
        }
    }

    /// Fire the signal and wake every waiter. Idempotent.
    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::Release);
        // Taking the lock orders the store before any waiter's re-check
        let _guard = self.inner.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.inner.cvar.notify_all();
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::Acquire)
    }

    /// Block for up to `timeout`; returns `true` if the signal has fired
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.inner.lock.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if self.is_stopped() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            guard = self
                .inner
                .cvar
                .wait_timeout(guard, deadline - now)
                .map(|(g, _)| g)
                .unwrap_or_else(|e| e.into_inner().0);
        }
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StopSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StopSignal").field("stopped", &self.is_stopped()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_wait_times_out_without_stop() {
        let stop = StopSignal::new();
        let start = Instant::now();
        assert!(!stop.wait_timeout(Duration::from_millis(10)));
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn test_stop_wakes_waiters() {
        let stop = StopSignal::new();
        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let stop = stop.clone();
                thread::spawn(move || stop.wait_timeout(Duration::from_secs(30)))
            })
            .collect();

        thread::sleep(Duration::from_millis(20));
        stop.stop();

        for waiter in waiters {
            assert!(waiter.join().unwrap());
        }
        assert!(stop.is_stopped());
    }

    #[test]
    fn test_wait_after_stop_returns_immediately() {
        let stop = StopSignal::new();
        stop.stop();
        stop.stop();
        assert!(stop.wait_timeout(Duration::from_secs(30)));
    }
}
