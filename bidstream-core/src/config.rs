//! Configuration types for the bidstream generator
//!
//! Every section has defaults matching the reference generator, so an empty
//! profile is a valid configuration (1 bid/s on one worker).

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_WIN_RATE: f64 = 0.1;
pub const DEFAULT_CLICK_RATE: f64 = 0.01;
pub const DEFAULT_WIN_DELAY_SKEW: f64 = 100.0;
pub const DEFAULT_WIN_DELAY_MAX: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_CLICK_DELAY_SKEW: f64 = 100.0;
pub const DEFAULT_CLICK_DELAY_MAX: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(10);

/// Full generator configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub traffic: TrafficConfig,
    pub events: EventConfig,
    pub scheduler: SchedulerConfig,
    pub output: OutputConfig,
}

/// How bid ticks are spaced in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrivalProcess {
    /// Constant period of `1 / rate`
    #[default]
    Fixed,
    /// Exponentially distributed inter-arrival times with mean `1 / rate`
    Poisson,
}

/// Throughput and run-length settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficConfig {
    /// Total bid rate across all workers (events per second)
    pub rate: f64,
    /// Number of parallel rate workers; the rate is split evenly
    pub workers: usize,
    pub arrival: ArrivalProcess,
    /// Stop after this long (None = run until stopped externally)
    #[serde(with = "humantime_serde")]
    pub duration: Option<Duration>,
    /// Master seed for reproducible runs (None = OS entropy)
    pub seed: Option<u64>,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self { rate: 1.0, workers: 1, arrival: ArrivalProcess::Fixed, duration: None, seed: None }
    }
}

/// Bounded delay distribution: mean `max / skew`, hard cap at `max`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelayConfig {
    pub skew: f64,
    #[serde(with = "humantime_serde")]
    pub max: Duration,
}

/// Derived-event probabilities and delays
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    /// Probability that a bid wins
    pub win_rate: f64,
    /// Probability that a won bid is clicked
    pub click_rate: f64,
    pub win_delay: DelayConfig,
    pub click_delay: DelayConfig,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            win_rate: DEFAULT_WIN_RATE,
            click_rate: DEFAULT_CLICK_RATE,
            win_delay: DelayConfig { skew: DEFAULT_WIN_DELAY_SKEW, max: DEFAULT_WIN_DELAY_MAX },
            click_delay: DelayConfig {
                skew: DEFAULT_CLICK_DELAY_SKEW,
                max: DEFAULT_CLICK_DELAY_MAX,
            },
        }
    }
}

/// How delay schedulers are shared between workers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Topology {
    /// Each worker owns a win and a click scheduler with their own dispatchers
    #[default]
    PerWorker,
    /// All workers feed one win and one click scheduler
    Shared,
}

/// Dispatcher wake-up strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum DispatchMode {
    /// Check the scheduler on a fixed interval
    Poll {
        #[serde(with = "humantime_serde", default = "default_poll_interval")]
        interval: Duration,
    },
    /// Sleep until the earliest pending event is due, waking on earlier inserts
    SleepUntilDue,
}

fn default_poll_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

impl Default for DispatchMode {
    fn default() -> Self {
        DispatchMode::Poll { interval: DEFAULT_POLL_INTERVAL }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub topology: Topology,
    /// Pending events per scheduler before new inserts are dropped (None = unbounded)
    pub max_pending: Option<usize>,
    pub dispatch: DispatchMode,
}

/// What a worker or dispatcher does when the sink rejects an event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WriteFailurePolicy {
    /// Count and log the failure, drop the event, keep going
    #[default]
    LogAndDrop,
    /// Stop the whole run on the first failure
    FailFast,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub on_write_error: WriteFailurePolicy,
    /// Maximum time buffered output may wait before being flushed
    #[serde(with = "humantime_serde")]
    pub flush_interval: Duration,
    /// How often each worker logs its achieved rate
    #[serde(with = "humantime_serde")]
    pub report_interval: Duration,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            on_write_error: WriteFailurePolicy::LogAndDrop,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            report_interval: DEFAULT_REPORT_INTERVAL,
        }
    }
}

fn config_error(msg: impl Into<String>) -> Error {
    Error::Config(msg.into())
}

fn check_probability(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(config_error(format!("{name} must be in [0, 1], got {value}")));
    }
    Ok(())
}

fn check_delay(name: &str, delay: &DelayConfig) -> Result<()> {
    if !(delay.skew.is_finite() && delay.skew > 0.0) {
        return Err(config_error(format!("{name}.skew must be > 0, got {}", delay.skew)));
    }
    if delay.max.is_zero() {
        return Err(config_error(format!("{name}.max must be > 0")));
    }
    Ok(())
}

impl GeneratorConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let traffic = &self.traffic;
        if !(traffic.rate.is_finite() && traffic.rate > 0.0) {
            return Err(config_error(format!("rate must be > 0, got {}", traffic.rate)));
        }
        if traffic.workers == 0 {
            return Err(config_error("workers must be > 0"));
        }
        if traffic.duration.is_some_and(|d| d.is_zero()) {
            return Err(config_error("duration must be > 0 when set"));
        }

        check_probability("win_rate", self.events.win_rate)?;
        check_probability("click_rate", self.events.click_rate)?;
        check_delay("win_delay", &self.events.win_delay)?;
        check_delay("click_delay", &self.events.click_delay)?;

        if self.scheduler.max_pending == Some(0) {
            return Err(config_error("max_pending must be > 0 when set"));
        }
        if let DispatchMode::Poll { interval } = self.scheduler.dispatch {
            if interval.is_zero() {
                return Err(config_error("dispatch poll interval must be > 0"));
            }
        }

        if self.output.flush_interval.is_zero() {
            return Err(config_error("flush_interval must be > 0"));
        }
        if self.output.report_interval.is_zero() {
            return Err(config_error("report_interval must be > 0"));
        }
        Ok(())
    }

    /// Bid rate assigned to each worker
    pub fn per_worker_rate(&self) -> f64 {
        self.traffic.rate / self.traffic.workers.max(1) as f64
    }
}
