//! Rate worker: the bid-generating loop
//!
//! Each tick emits one bid straight to the sink and may schedule a win and a
//! click for later emission by the dispatchers. The worker never blocks on
//! delayed events.

use crate::attributes::{AttributeGenerator, RandomAttributes};
use crate::config::{EventConfig, GeneratorConfig};
use crate::event::{Bid, Click, Event, Win};
use crate::policy::{build_policy, ArrivalPolicy};
use crate::scheduler::{DelayScheduler, InsertOutcome};
use crate::seed::{components, worker_seed};
use crate::sink::{Emitter, Sink};
use crate::threading::StopSignal;
use crate::timing::{self, time_ns};
use crate::Result;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Schedulers a worker feeds
#[derive(Debug, Clone)]
pub struct WorkerQueues {
    pub wins: Arc<DelayScheduler>,
    pub clicks: Arc<DelayScheduler>,
}

/// Counters reported by a worker when it exits
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkerStats {
    pub worker_id: usize,
    pub bids: u64,
    pub wins: u64,
    pub clicks: u64,
    /// Wins and clicks rejected by a full scheduler
    pub dropped: u64,
    pub write_failures: u64,
    pub skipped_ticks: u64,
    pub elapsed: Duration,
}

impl WorkerStats {
    /// Bids per second over the worker's lifetime
    pub fn achieved_rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.bids as f64 / secs
        } else {
            0.0
        }
    }
}

pub struct RateWorker {
    id: usize,
    attributes: Box<dyn AttributeGenerator>,
    policy: Box<dyn ArrivalPolicy>,
    decisions: SmallRng,
    win_rate: f64,
    click_rate: f64,
    queues: WorkerQueues,
    emitter: Emitter,
    report_interval: Duration,
    stats: WorkerStats,
}

impl RateWorker {
    /// Worker `id` running at the per-worker share of the configured rate
    pub fn new(
        id: usize,
        config: &GeneratorConfig,
        queues: WorkerQueues,
        sink: Arc<dyn Sink>,
    ) -> Result<Self> {
        let seed = config.traffic.seed;
        let attributes = RandomAttributes::with_seed(&config.events, seed, id)?;
        let policy = build_policy(
            config.traffic.arrival,
            config.per_worker_rate(),
            worker_seed(seed, components::ARRIVALS, id),
        )?;

        let mut worker = Self::with_parts(
            id,
            &config.events,
            Box::new(attributes),
            policy,
            queues,
            Emitter::new(sink, config.output.on_write_error),
        );
        if let Some(seed) = worker_seed(seed, components::WIN_DECISION, id) {
            worker = worker.with_decision_seed(seed);
        }
        worker.report_interval = config.output.report_interval;
        Ok(worker)
    }

    /// Worker with caller-supplied attribute model and arrival policy
    pub fn with_parts(
        id: usize,
        events: &EventConfig,
        attributes: Box<dyn AttributeGenerator>,
        policy: Box<dyn ArrivalPolicy>,
        queues: WorkerQueues,
        emitter: Emitter,
    ) -> Self {
        Self {
            id,
            attributes,
            policy,
            decisions: SmallRng::from_os_rng(),
            win_rate: events.win_rate,
            click_rate: events.click_rate,
            queues,
            emitter,
            report_interval: crate::config::DEFAULT_REPORT_INTERVAL,
            stats: WorkerStats { worker_id: id, ..WorkerStats::default() },
        }
    }

    pub fn with_decision_seed(mut self, seed: u64) -> Self {
        self.decisions = SmallRng::seed_from_u64(seed);
        self
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    /// Generate one bid and its derived events
    ///
    /// The bid is written before anything is scheduled, so a zero-delay win
    /// can never reach the sink ahead of its bid.
    pub fn tick(&mut self) -> Result<()> {
        let bid = Bid::generate(&mut *self.attributes);

        let mut win = None;
        let mut click = None;
        if self.decisions.random::<f64>() < self.win_rate {
            let delay = self.attributes.win_delay();
            let price = self.attributes.win_price(bid.bid_price);
            win = Some(Win::from_bid(&bid, delay, price));

            if self.decisions.random::<f64>() < self.click_rate {
                click = Some(Click::from_bid(&bid, self.attributes.click_delay()));
            }
        }

        if !self.emitter.emit(&Event::Bid(bid))? {
            self.stats.write_failures += 1;
        }
        self.stats.bids += 1;

        if let Some(win) = win {
            match self.queues.wins.insert(win.into()) {
                InsertOutcome::Queued => self.stats.wins += 1,
                InsertOutcome::Dropped => self.stats.dropped += 1,
            }
        }
        if let Some(click) = click {
            match self.queues.clicks.insert(click.into()) {
                InsertOutcome::Queued => self.stats.clicks += 1,
                InsertOutcome::Dropped => self.stats.dropped += 1,
            }
        }
        Ok(())
    }

    /// Tick at the policy's pace until `stop` fires
    pub fn run(mut self, stop: &StopSignal) -> Result<WorkerStats> {
        info!(
            worker = self.id,
            rate = self.policy.rate(),
            arrival = self.policy.name(),
            "Worker started"
        );

        let start_ns = time_ns();
        let report_ns = self.report_interval.as_nanos() as u64;
        let mut last_report_ns = start_ns;
        let mut bids_at_report = 0;

        loop {
            let target = self.policy.next_tick(time_ns());
            if !timing::wait_until(target, stop) {
                break;
            }
            self.tick()?;

            let now = time_ns();
            if now - last_report_ns >= report_ns {
                let window = Duration::from_nanos(now - last_report_ns);
                let achieved = (self.stats.bids - bids_at_report) as f64 / window.as_secs_f64();
                info!(
                    worker = self.id,
                    target_rate = self.policy.rate(),
                    achieved_rate = %format!("{achieved:.2}"),
                    bids = self.stats.bids,
                    wins = self.stats.wins,
                    clicks = self.stats.clicks,
                    "Rate report"
                );
                last_report_ns = now;
                bids_at_report = self.stats.bids;
            }
        }

        self.stats.elapsed = Duration::from_nanos(time_ns() - start_ns);
        self.stats.skipped_ticks = self.policy.skipped_ticks();
        self.emitter.flush()?;

        info!(
            worker = self.id,
            bids = self.stats.bids,
            achieved_rate = %format!("{:.2}", self.stats.achieved_rate()),
            "Worker stopped"
        );
        Ok(self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WriteFailurePolicy;
    use crate::event::LogTime;
    use crate::policy::FixedRatePolicy;
    use crate::sink::MemorySink;
    use std::thread;

    fn queues() -> WorkerQueues {
        WorkerQueues {
            wins: Arc::new(DelayScheduler::new("win")),
            clicks: Arc::new(DelayScheduler::new("click")),
        }
    }

    fn worker_with(events: EventConfig, queues: WorkerQueues, sink: Arc<MemorySink>) -> RateWorker {
        let attributes = RandomAttributes::with_seed(&events, Some(11), 0).unwrap();
        RateWorker::with_parts(
            0,
            &events,
            Box::new(attributes),
            Box::new(FixedRatePolicy::new(1000.0)),
            queues,
            Emitter::new(sink, WriteFailurePolicy::FailFast),
        )
        .with_decision_seed(5)
    }

    #[test]
    fn test_tick_always_emits_bid() {
        let events = EventConfig { win_rate: 0.0, click_rate: 1.0, ..EventConfig::default() };
        let queues = queues();
        let sink = Arc::new(MemorySink::new());
        let mut worker = worker_with(events, queues.clone(), sink.clone());

        for _ in 0..100 {
            worker.tick().unwrap();
        }

        assert_eq!(sink.len(), 100);
        assert!(sink.events().iter().all(|e| matches!(e, Event::Bid(_))));
        assert!(queues.wins.is_empty());
        assert!(queues.clicks.is_empty(), "Clicks require a win");
        assert_eq!(worker.stats().bids, 100);
    }

    #[test]
    fn test_tick_schedules_win_and_click_for_each_bid() {
        let events = EventConfig { win_rate: 1.0, click_rate: 1.0, ..EventConfig::default() };
        let queues = queues();
        let sink = Arc::new(MemorySink::new());
        let mut worker = worker_with(events.clone(), queues.clone(), sink.clone());

        for _ in 0..50 {
            worker.tick().unwrap();
        }
        assert_eq!(queues.wins.len(), 50);
        assert_eq!(queues.clicks.len(), 50);

        let bids: Vec<Bid> = sink
            .events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Bid(bid) => Some(bid),
                _ => None,
            })
            .collect();

        while let Some(Event::Win(win)) = queues.wins.pop_earliest() {
            let bid = bids.iter().find(|b| b.id == win.bid_id).unwrap();
            assert_eq!(win.bid_time_ns, bid.time_ns);
            assert!(win.win_price <= bid.bid_price);
            assert!(win.delay() <= events.win_delay.max);
        }
        while let Some(Event::Click(click)) = queues.clicks.pop_earliest() {
            assert!(bids.iter().any(|b| b.id == click.bid_id));
            assert!(click.delay() <= events.click_delay.max);
            assert_eq!(click.log_time_ns(), click.bid_time_ns + click.delay().as_nanos() as u64);
        }
    }

    #[test]
    fn test_full_scheduler_counts_drops() {
        let events = EventConfig { win_rate: 1.0, click_rate: 0.0, ..EventConfig::default() };
        let queues = WorkerQueues {
            wins: Arc::new(DelayScheduler::with_capacity_limit("win", Some(10))),
            clicks: Arc::new(DelayScheduler::new("click")),
        };
        let mut worker = worker_with(events, queues.clone(), Arc::new(MemorySink::new()));

        for _ in 0..25 {
            worker.tick().unwrap();
        }
        assert_eq!(worker.stats().wins, 10);
        assert_eq!(worker.stats().dropped, 15);
        assert_eq!(queues.wins.dropped(), 15);
    }

    #[test]
    fn test_run_stops_on_signal() {
        let sink = Arc::new(MemorySink::new());
        let worker = worker_with(EventConfig::default(), queues(), sink.clone());
        let stop = StopSignal::new();

        let handle = {
            let stop = stop.clone();
            thread::spawn(move || worker.run(&stop))
        };
        thread::sleep(Duration::from_millis(200));
        stop.stop();

        let stats = handle.join().unwrap().unwrap();
        assert!(stats.bids > 50, "Only {} bids in 200ms at 1000/s", stats.bids);
        assert_eq!(stats.bids as usize, sink.len());
        assert!(stats.elapsed >= Duration::from_millis(150));
    }

    #[test]
    fn test_new_uses_per_worker_rate() {
        let mut config = GeneratorConfig::default();
        config.traffic.rate = 1000.0;
        config.traffic.workers = 2;
        config.traffic.seed = Some(1);

        let worker = RateWorker::new(1, &config, queues(), Arc::new(MemorySink::new())).unwrap();
        assert_eq!(worker.policy.rate(), 500.0);
        assert_eq!(worker.id(), 1);
    }
}
