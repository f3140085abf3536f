//! Arrival policies
//!
//! A policy decides WHEN a worker ticks next. Targets are absolute times on
//! the monotonic clock ([`crate::timing::time_ns`]), each computed from the
//! previous target rather than from the actual wake-up time, so oversleeping
//! one tick does not shift every later one.

use crate::config::ArrivalProcess;
use crate::Result;
use bidstream_common::ExponentialDistribution;
use std::time::Duration;
use tracing::debug;

/// Backlog beyond which missed ticks are skipped instead of replayed
pub const MAX_BACKLOG: Duration = Duration::from_secs(1);

pub trait ArrivalPolicy: Send {
    /// Target time of the next tick; the first tick is due at `now_ns`
    fn next_tick(&mut self, now_ns: u64) -> u64;

    /// Mean ticks per second
    fn rate(&self) -> f64;

    /// Ticks dropped because the worker fell more than [`MAX_BACKLOG`] behind
    fn skipped_ticks(&self) -> u64;

    fn name(&self) -> &'static str;
}

/// Moves `target` up to `now_ns` when the backlog exceeds [`MAX_BACKLOG`]
///
/// Returns the adjusted target and the number of mean intervals skipped.
fn skip_backlog(target: u64, now_ns: u64, mean_interval_ns: f64) -> (u64, u64) {
    let behind = now_ns.saturating_sub(target);
    if behind > MAX_BACKLOG.as_nanos() as u64 {
        let skipped = (behind as f64 / mean_interval_ns) as u64;
        debug!(behind_ns = behind, skipped, "Arrival backlog skipped");
        (now_ns, skipped)
    } else {
        (target, 0)
    }
}

fn interval_ns(rate: f64) -> f64 {
    1_000_000_000.0 / rate
}

/// Constant inter-arrival time of `1 / rate`
pub struct FixedRatePolicy {
    rate: f64,
    interval_ns: f64,
    anchor_ns: Option<u64>,
    ticks_since_anchor: u64,
    skipped: u64,
}

impl FixedRatePolicy {
    pub fn new(rate: f64) -> Self {
        Self {
            rate,
            interval_ns: interval_ns(rate),
            anchor_ns: None,
            ticks_since_anchor: 0,
            skipped: 0,
        }
    }
}

impl ArrivalPolicy for FixedRatePolicy {
    fn next_tick(&mut self, now_ns: u64) -> u64 {
        let anchor = *self.anchor_ns.get_or_insert(now_ns);
        // Offsets from a fixed anchor keep fractional intervals from drifting.
        // The float-to-int cast saturates, so tiny rates pin the target at u64::MAX.
        let offset = (self.ticks_since_anchor as f64 * self.interval_ns) as u64;
        let target = anchor.saturating_add(offset);

        let (next, skipped) = skip_backlog(target, now_ns, self.interval_ns);
        if skipped > 0 {
            self.skipped += skipped;
            self.anchor_ns = Some(next);
            self.ticks_since_anchor = 0;
        }
        self.ticks_since_anchor += 1;
        next
    }

    fn rate(&self) -> f64 {
        self.rate
    }

    fn skipped_ticks(&self) -> u64 {
        self.skipped
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

/// Exponentially distributed inter-arrival times with mean `1 / rate`
pub struct PoissonPolicy {
    dist: ExponentialDistribution,
    interval_ns: f64,
    last_target_ns: Option<u64>,
    skipped: u64,
}

impl PoissonPolicy {
    pub fn new(rate: f64) -> Result<Self> {
        Self::with_seed(rate, None)
    }

    pub fn with_seed(rate: f64, seed: Option<u64>) -> Result<Self> {
        let dist = ExponentialDistribution::with_seed(rate, seed)?;
        Ok(Self { dist, interval_ns: interval_ns(rate), last_target_ns: None, skipped: 0 })
    }
}

impl ArrivalPolicy for PoissonPolicy {
    fn next_tick(&mut self, now_ns: u64) -> u64 {
        let target = match self.last_target_ns {
            Some(last) => {
                let inter_arrival_ns = (self.dist.sample_inter_arrival() * 1_000_000_000.0) as u64;
                last.saturating_add(inter_arrival_ns)
            }
            None => now_ns,
        };

        let (next, skipped) = skip_backlog(target, now_ns, self.interval_ns);
        self.skipped += skipped;
        self.last_target_ns = Some(next);
        next
    }

    fn rate(&self) -> f64 {
        self.dist.lambda()
    }

    fn skipped_ticks(&self) -> u64 {
        self.skipped
    }

    fn name(&self) -> &'static str {
        "poisson"
    }
}

/// Build the policy for `arrival` at `rate` ticks per second
pub fn build_policy(
    arrival: ArrivalProcess,
    rate: f64,
    seed: Option<u64>,
) -> Result<Box<dyn ArrivalPolicy>> {
    Ok(match arrival {
        ArrivalProcess::Fixed => Box::new(FixedRatePolicy::new(rate)),
        ArrivalProcess::Poisson => Box::new(PoissonPolicy::with_seed(rate, seed)?),
    })
}
