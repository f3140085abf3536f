//! Rate control accuracy tests
//!
//! These tests verify that rate workers achieve the target bid rate within
//! 5% over a sustained window, for single and split configurations.

use bidstream_core::config::{ArrivalProcess, GeneratorConfig};
use bidstream_core::{Event, GeneratorRuntime, Sink, StopSignal};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Counts every event without storing it
#[derive(Default)]
struct CountingSink {
    events: AtomicU64,
}

impl Sink for CountingSink {
    fn write(&self, _event: &Event) -> bidstream_core::Result<()> {
        self.events.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn flush(&self) -> bidstream_core::Result<()> {
        Ok(())
    }
}

fn config(rate: f64, workers: usize, duration: Duration) -> GeneratorConfig {
    let mut config = GeneratorConfig::default();
    config.traffic.rate = rate;
    config.traffic.workers = workers;
    config.traffic.duration = Some(duration);
    config.traffic.seed = Some(2024);
    config
}

fn assert_within(actual: f64, target: f64, tolerance: f64, what: &str) {
    let error = (actual - target).abs() / target;
    assert!(
        error <= tolerance,
        "{}: achieved {:.1}, target {:.1} ({:.2}% off)",
        what,
        actual,
        target,
        error * 100.0
    );
}

#[test]
fn test_fixed_rate_10k_within_5_percent() {
    let runtime = GeneratorRuntime::new(config(10_000.0, 1, Duration::from_secs(1))).unwrap();
    let summary = runtime.run(Arc::new(CountingSink::default()), &StopSignal::new()).unwrap();

    let achieved = summary.bids() as f64 / summary.elapsed.as_secs_f64();
    assert_within(achieved, 10_000.0, 0.05, "single worker");
}

#[test]
fn test_rate_split_evenly_across_workers() {
    let runtime = GeneratorRuntime::new(config(1_000.0, 2, Duration::from_secs(2))).unwrap();
    let summary = runtime.run(Arc::new(CountingSink::default()), &StopSignal::new()).unwrap();

    assert_eq!(summary.workers.len(), 2);
    for worker in &summary.workers {
        assert_within(worker.achieved_rate(), 500.0, 0.05, &format!("worker {}", worker.worker_id));
    }
    assert_within(summary.bids() as f64 / summary.elapsed.as_secs_f64(), 1_000.0, 0.05, "total");
}

#[test]
fn test_poisson_rate_within_tolerance() {
    let mut config = config(5_000.0, 1, Duration::from_secs(2));
    config.traffic.arrival = ArrivalProcess::Poisson;
    let runtime = GeneratorRuntime::new(config).unwrap();
    let summary = runtime.run(Arc::new(CountingSink::default()), &StopSignal::new()).unwrap();

    // 10,000 expected arrivals: sd ~1%
    let achieved = summary.bids() as f64 / summary.elapsed.as_secs_f64();
    assert_within(achieved, 5_000.0, 0.05, "poisson");
}

#[test]
fn test_fractional_per_worker_rate() {
    // 3 bids/s over 4 workers is 0.75/s each: every worker still ticks once at start
    let runtime = GeneratorRuntime::new(config(3.0, 4, Duration::from_millis(500))).unwrap();
    let summary = runtime.run(Arc::new(CountingSink::default()), &StopSignal::new()).unwrap();

    for worker in &summary.workers {
        assert_eq!(worker.bids, 1, "worker {}", worker.worker_id);
    }
}
