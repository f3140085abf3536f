//! Nanosecond-precision timing utilities
//!
//! Two clocks are used:
//! - a monotonic clock (`time_ns`) for pacing worker ticks, relative to the
//!   first call in the process;
//! - the wall clock (`unix_time_ns`) for event timestamps and scheduled
//!   emission times, which must be meaningful to downstream consumers.

use crate::threading::StopSignal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Global start time for monotonic nanosecond timestamps
static START: OnceLock<Instant> = OnceLock::new();

/// Last timestamp handed out by `unique_timestamp_ns`
static LAST_UNIQUE_NS: AtomicU64 = AtomicU64::new(0);

/// Waits shorter than this are finished with a spin loop instead of a sleep
pub const SPIN_THRESHOLD: Duration = Duration::from_micros(200);

/// Get current monotonic time in nanoseconds since program start
///
/// # Example
/// ```
/// use bidstream_core::timing::time_ns;
///
/// let start = time_ns();
/// // ... do work ...
/// let elapsed = time_ns() - start;
/// println!("Elapsed: {} ns", elapsed);
/// ```
#[inline]
pub fn time_ns() -> u64 {
    let start = START.get_or_init(Instant::now);
    start.elapsed().as_nanos() as u64
}

/// Current wall-clock time in nanoseconds since the Unix epoch
#[inline]
pub fn unix_time_ns() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos() as u64).unwrap_or(0)
}

/// Wall-clock timestamp that is unique across all threads of the process
///
/// Returns the current Unix time in nanoseconds, or one more than the last
/// value returned if the clock has not advanced (or went backwards) since.
pub fn unique_timestamp_ns() -> u64 {
    let now = unix_time_ns();
    let mut last = LAST_UNIQUE_NS.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_UNIQUE_NS.compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed)
        {
            Ok(_) => return next,
            Err(observed) => last = observed,
        }
    }
}

/// Convert Unix nanoseconds back into a `SystemTime`
#[inline]
pub fn to_system_time(unix_ns: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_nanos(unix_ns)
}

/// Busy-wait until the monotonic target time is reached
#[inline]
pub fn busy_wait_until(target_ns: u64) {
    while time_ns() < target_ns {
        std::hint::spin_loop();
    }
}

/// Wait until the monotonic target time, observing the stop signal
///
/// Sleeps on the stop signal until [`SPIN_THRESHOLD`] before the target, then
/// spins for the remainder. Returns `false` if the stop signal fired first.
pub fn wait_until(target_ns: u64, stop: &StopSignal) -> bool {
    let spin_ns = SPIN_THRESHOLD.as_nanos() as u64;
    loop {
        let now = time_ns();
        if now >= target_ns {
            return !stop.is_stopped();
        }
        let remaining = target_ns - now;
        if remaining <= spin_ns {
            busy_wait_until(target_ns);
            return !stop.is_stopped();
        }
        if stop.wait_timeout(Duration::from_nanos(remaining - spin_ns)) {
            return false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_ns_monotonic() {
        let t1 = time_ns();
        std::thread::sleep(Duration::from_millis(1));
        let t2 = time_ns();

        assert!(t2 > t1, "Time should be monotonic");
        assert!(t2 - t1 >= 1_000_000, "Should have elapsed at least 1ms");
    }

    #[test]
    fn test_unique_timestamps_strictly_increase() {
        let stamps: Vec<u64> = (0..10_000).map(|_| unique_timestamp_ns()).collect();
        for pair in stamps.windows(2) {
            assert!(pair[1] > pair[0], "{} !> {}", pair[1], pair[0]);
        }
    }

    #[test]
    fn test_unique_timestamps_across_threads() {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                std::thread::spawn(|| (0..5_000).map(|_| unique_timestamp_ns()).collect::<Vec<_>>())
            })
            .collect();

        let mut all: Vec<u64> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        let total = all.len();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), total, "Duplicate timestamps handed out");
    }

    #[test]
    fn test_system_time_roundtrip() {
        let now = unix_time_ns();
        let back = to_system_time(now).duration_since(UNIX_EPOCH).unwrap().as_nanos() as u64;
        assert_eq!(now, back);
    }

    #[test]
    fn test_wait_until_reaches_target() {
        let stop = StopSignal::new();
        let target = time_ns() + 2_000_000;
        assert!(wait_until(target, &stop));
        assert!(time_ns() >= target);
    }

    #[test]
    fn test_wait_until_observes_stop() {
        let stop = StopSignal::new();
        let remote = stop.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            remote.stop();
        });

        let start = time_ns();
        assert!(!wait_until(start + 10_000_000_000, &stop));
        assert!(time_ns() - start < 5_000_000_000, "Stop was not observed promptly");
        handle.join().unwrap();
    }
}
