//! Threading runtime
//!
//! Uses native OS threads: one per rate worker plus one per dispatcher.
//! Every thread is named, starts behind a common gate, and is joined on
//! shutdown.

use crate::config::{GeneratorConfig, Topology};
use crate::dispatcher::{DispatchStats, Dispatcher};
use crate::scheduler::DelayScheduler;
use crate::sink::Sink;
use crate::worker::{RateWorker, WorkerQueues, WorkerStats};
use crate::{Error, Result};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

pub mod barrier;
mod stop;

pub use barrier::StartGate;
pub use stop::StopSignal;

/// Fires the stop signal if the owning thread unwinds
struct StopOnPanic(StopSignal);

impl Drop for StopOnPanic {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.stop();
        }
    }
}

/// Per-dispatcher result of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherSummary {
    pub scheduler: String,
    pub stats: DispatchStats,
}

/// Outcome of [`GeneratorRuntime::run`]
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub workers: Vec<WorkerStats>,
    pub dispatchers: Vec<DispatcherSummary>,
    /// Wins and clicks still pending at shutdown, never emitted
    pub discarded: usize,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn bids(&self) -> u64 {
        self.workers.iter().map(|w| w.bids).sum()
    }

    /// Wins accepted by a scheduler
    pub fn scheduled_wins(&self) -> u64 {
        self.workers.iter().map(|w| w.wins).sum()
    }

    /// Clicks accepted by a scheduler
    pub fn scheduled_clicks(&self) -> u64 {
        self.workers.iter().map(|w| w.clicks).sum()
    }

    /// Delayed events written by dispatchers
    pub fn emitted_delayed(&self) -> u64 {
        self.dispatchers.iter().map(|d| d.stats.emitted).sum()
    }

    /// Inserts rejected by full schedulers
    pub fn dropped(&self) -> u64 {
        self.workers.iter().map(|w| w.dropped).sum()
    }

    pub fn write_failures(&self) -> u64 {
        self.workers.iter().map(|w| w.write_failures).sum::<u64>()
            + self.dispatchers.iter().map(|d| d.stats.write_failures).sum::<u64>()
    }
}

enum Outcome {
    Worker(WorkerStats),
    Dispatcher(DispatcherSummary),
}

/// Multi-threaded runtime driving workers and dispatchers
pub struct GeneratorRuntime {
    config: GeneratorConfig,
}

impl GeneratorRuntime {
    /// Create a runtime; the configuration is validated here
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    fn build_queues(&self) -> Vec<WorkerQueues> {
        let max_pending = self.config.scheduler.max_pending;
        let queues = |suffix: String| WorkerQueues {
            wins: Arc::new(DelayScheduler::with_capacity_limit(
                format!("win{suffix}"),
                max_pending,
            )),
            clicks: Arc::new(DelayScheduler::with_capacity_limit(
                format!("click{suffix}"),
                max_pending,
            )),
        };

        match self.config.scheduler.topology {
            Topology::PerWorker => {
                (0..self.config.traffic.workers).map(|id| queues(format!("-{id}"))).collect()
            }
            Topology::Shared => vec![queues(String::new())],
        }
    }

    /// Run until the configured duration elapses or `stop` fires
    ///
    /// The first thread error stops every other thread and is returned once
    /// all threads have been joined.
    pub fn run(&self, sink: Arc<dyn Sink>, stop: &StopSignal) -> Result<RunSummary> {
        let config = &self.config;
        let queue_sets = self.build_queues();

        // Build everything up front so setup errors surface before any thread starts
        let workers = (0..config.traffic.workers)
            .map(|id| {
                let queues = queue_sets[id % queue_sets.len()].clone();
                RateWorker::new(id, config, queues, sink.clone())
            })
            .collect::<Result<Vec<_>>>()?;

        let dispatchers: Vec<(String, Dispatcher)> = queue_sets
            .iter()
            .flat_map(|queues| [queues.wins.clone(), queues.clicks.clone()])
            .map(|scheduler| {
                let name = scheduler.name().to_string();
                let dispatcher = Dispatcher::new(
                    scheduler,
                    sink.clone(),
                    config.scheduler.dispatch,
                    config.output.on_write_error,
                );
                (name, dispatcher)
            })
            .collect();

        info!(
            rate = config.traffic.rate,
            workers = config.traffic.workers,
            per_worker_rate = config.per_worker_rate(),
            topology = ?config.scheduler.topology,
            dispatchers = dispatchers.len(),
            "Starting generator"
        );

        // Threads plus this one, which starts the duration timer
        let gate = Arc::new(StartGate::new(workers.len() + dispatchers.len() + 1));
        let mut handles: Vec<Handle> = Vec::new();

        let spawn_result = spawn_threads(workers, dispatchers, &gate, stop, &mut handles);
        if let Err(e) = spawn_result {
            gate.abort();
            stop.stop();
            join_all(handles);
            return Err(e);
        }

        gate.wait();
        let start = Instant::now();
        wait_and_flush(start, config, sink.as_ref(), stop);
        stop.stop();
        for queues in &queue_sets {
            queues.wins.notify_waiters();
            queues.clicks.notify_waiters();
        }

        let (outcomes, first_error) = join_all(handles);

        let mut summary = RunSummary { elapsed: start.elapsed(), ..RunSummary::default() };
        for outcome in outcomes {
            match outcome {
                Outcome::Worker(stats) => summary.workers.push(stats),
                Outcome::Dispatcher(dispatcher) => summary.dispatchers.push(dispatcher),
            }
        }

        for queues in &queue_sets {
            summary.discarded += queues.wins.clear() + queues.clicks.clear();
        }
        if summary.discarded > 0 {
            info!(discarded = summary.discarded, "Discarding events still pending at shutdown");
        }

        let flushed = sink.flush();
        if let Some(e) = first_error {
            return Err(e);
        }
        flushed?;

        if summary.dropped() > 0 {
            warn!(dropped = summary.dropped(), "Schedulers were full; delayed events dropped");
        }
        Ok(summary)
    }
}

/// Block until the run ends, flushing the sink every `flush_interval`
///
/// Writers only flush when they write, so a quiet period would otherwise
/// leave the last records buffered.
fn wait_and_flush(start: Instant, config: &GeneratorConfig, sink: &dyn Sink, stop: &StopSignal) {
    let flush_interval = config.output.flush_interval;
    let deadline = config.traffic.duration.map(|duration| start + duration);

    loop {
        let wait = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    info!(duration = ?config.traffic.duration, "Run duration elapsed");
                    return;
                }
                flush_interval.min(deadline - now)
            }
            None => flush_interval,
        };

        if stop.wait_timeout(wait) {
            return;
        }
        if let Err(e) = sink.flush() {
            warn!("Periodic flush failed: {}", e);
        }
    }
}

type Handle = (String, JoinHandle<Result<Outcome>>);

fn spawn_threads(
    workers: Vec<RateWorker>,
    dispatchers: Vec<(String, Dispatcher)>,
    gate: &Arc<StartGate>,
    stop: &StopSignal,
    handles: &mut Vec<Handle>,
) -> Result<()> {
    for worker in workers {
        let name = format!("worker-{}", worker.id());
        let (gate, stop) = (gate.clone(), stop.clone());
        let handle = spawn_named(name.clone(), move || {
            let _guard = StopOnPanic(stop.clone());
            if !gate.wait() {
                return Ok(Outcome::Worker(WorkerStats::default()));
            }
            worker.run(&stop).map(Outcome::Worker).inspect_err(|_| stop.stop())
        })?;
        handles.push((name, handle));
    }

    for (scheduler, dispatcher) in dispatchers {
        let name = format!("dispatch-{scheduler}");
        let (gate, stop) = (gate.clone(), stop.clone());
        let handle = spawn_named(name.clone(), move || {
            let _guard = StopOnPanic(stop.clone());
            if !gate.wait() {
                let stats = DispatchStats::default();
                return Ok(Outcome::Dispatcher(DispatcherSummary { scheduler, stats }));
            }
            dispatcher
                .run(&stop)
                .map(|stats| Outcome::Dispatcher(DispatcherSummary { scheduler, stats }))
                .inspect_err(|_| stop.stop())
        })?;
        handles.push((name, handle));
    }
    Ok(())
}

fn spawn_named<F>(name: String, body: F) -> Result<JoinHandle<Result<Outcome>>>
where
    F: FnOnce() -> Result<Outcome> + Send + 'static,
{
    thread::Builder::new()
        .name(name.clone())
        .spawn(body)
        .map_err(|e| Error::Thread(format!("Failed to spawn {name}: {e}")))
}

/// Join every thread, keeping the first error
fn join_all(handles: Vec<Handle>) -> (Vec<Outcome>, Option<Error>) {
    let mut outcomes = Vec::with_capacity(handles.len());
    let mut first_error = None;

    for (name, handle) in handles {
        let result = handle
            .join()
            .map_err(|_| Error::Thread(format!("Thread {name} panicked")))
            .and_then(|r| r);
        match result {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                error!(thread = %name, "Thread failed: {}", e);
                first_error.get_or_insert(e);
            }
        }
    }
    (outcomes, first_error)
}
