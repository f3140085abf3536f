//! Dispatcher: drains one delay scheduler into the sink
//!
//! Each cycle takes a clock reading, emits every event due at that reading
//! in scheduled order, then waits according to its [`DispatchMode`].

use crate::config::{DispatchMode, WriteFailurePolicy};
use crate::scheduler::DelayScheduler;
use crate::sink::{Emitter, Sink};
use crate::threading::StopSignal;
use crate::timing::unix_time_ns;
use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Longest a sleep-until-due dispatcher blocks before re-checking the stop signal
pub const MAX_IDLE_WAIT: Duration = Duration::from_millis(50);

/// Counters reported by a dispatcher when it exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub emitted: u64,
    pub write_failures: u64,
    pub cycles: u64,
}

pub struct Dispatcher {
    scheduler: Arc<DelayScheduler>,
    emitter: Emitter,
    mode: DispatchMode,
    stats: DispatchStats,
}

impl Dispatcher {
    pub fn new(
        scheduler: Arc<DelayScheduler>,
        sink: Arc<dyn Sink>,
        mode: DispatchMode,
        on_write_error: WriteFailurePolicy,
    ) -> Self {
        Self {
            scheduler,
            emitter: Emitter::new(sink, on_write_error),
            mode,
            stats: DispatchStats::default(),
        }
    }

    /// Emit every event due at or before `now_ns`, returning how many were taken
    ///
    /// An empty or not-yet-due scheduler is a no-op.
    ///
    /// Events come out in scheduled order within one call. Across calls the
    /// order holds unless a producer inserts an event that is already past
    /// due and earlier than one emitted before; that event goes out on the
    /// next cycle, behind the later one.
    pub fn dispatch_due(&mut self, now_ns: u64) -> Result<usize> {
        let mut taken = 0;
        while let Some(event) = self.scheduler.pop_due(now_ns) {
            taken += 1;
            if self.emitter.emit(&event)? {
                self.stats.emitted += 1;
            } else {
                self.stats.write_failures += 1;
            }
        }
        self.stats.cycles += 1;
        Ok(taken)
    }

    /// Dispatch until `stop` fires
    pub fn run(mut self, stop: &StopSignal) -> Result<DispatchStats> {
        info!(scheduler = %self.scheduler.name(), mode = ?self.mode, "Dispatcher started");

        while !stop.is_stopped() {
            self.dispatch_due(unix_time_ns())?;

            match self.mode {
                DispatchMode::Poll { interval } => {
                    if stop.wait_timeout(interval) {
                        break;
                    }
                }
                DispatchMode::SleepUntilDue => self.scheduler.wait_for_due(MAX_IDLE_WAIT),
            }
        }

        self.emitter.flush()?;
        debug!(
            scheduler = %self.scheduler.name(),
            emitted = self.stats.emitted,
            pending = self.scheduler.len(),
            "Dispatcher stopped"
        );
        Ok(self.stats)
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }
}
