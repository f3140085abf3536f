//! Event output
//!
//! A [`Sink`] is shared by every worker and dispatcher of a run, so each
//! implementation serializes concurrent writers itself. [`Emitter`] wraps a
//! sink for one writing thread and applies the configured
//! [`WriteFailurePolicy`].

use crate::config::WriteFailurePolicy;
use crate::event::Event;
use crate::{Error, Result};
use std::io::{self, BufWriter, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::warn;

/// Minimum spacing between write-failure warnings from one emitter
pub const FAILURE_WARN_INTERVAL: Duration = Duration::from_secs(1);

/// Destination for emitted events
pub trait Sink: Send + Sync {
    /// Write one complete record
    fn write(&self, event: &Event) -> Result<()>;

    /// Push buffered records to the underlying output
    fn flush(&self) -> Result<()>;
}

struct Buffered<W: Write> {
    writer: BufWriter<W>,
    last_flush: Instant,
}

/// JSON-lines sink: one record per line, records never interleave
///
/// Each record is serialized before the lock is taken, then written as a
/// single buffer. Output is flushed once `flush_interval` has elapsed since
/// the previous flush, and on [`Sink::flush`].
pub struct JsonLinesSink<W: Write + Send> {
    inner: Mutex<Buffered<W>>,
    flush_interval: Duration,
    records: AtomicU64,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W, flush_interval: Duration) -> Self {
        Self {
            inner: Mutex::new(Buffered {
                writer: BufWriter::new(writer),
                last_flush: Instant::now(),
            }),
            flush_interval,
            records: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Buffered<W>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of records written so far
    pub fn records(&self) -> u64 {
        self.records.load(Ordering::Relaxed)
    }

    /// Flush and return the underlying writer
    pub fn into_inner(self) -> Result<W> {
        let buffered = self.inner.into_inner().unwrap_or_else(PoisonError::into_inner);
        buffered.writer.into_inner().map_err(|e| Error::Io(e.into_error()))
    }
}

impl JsonLinesSink<io::Stdout> {
    pub fn stdout(flush_interval: Duration) -> Self {
        Self::new(io::stdout(), flush_interval)
    }
}

impl<W: Write + Send> Sink for JsonLinesSink<W> {
    fn write(&self, event: &Event) -> Result<()> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let mut inner = self.lock();
        inner.writer.write_all(&line)?;
        self.records.fetch_add(1, Ordering::Relaxed);

        if inner.last_flush.elapsed() >= self.flush_interval {
            inner.writer.flush()?;
            inner.last_flush = Instant::now();
        }
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        let mut inner = self.lock();
        inner.writer.flush()?;
        inner.last_flush = Instant::now();
        Ok(())
    }
}

/// In-memory sink for embedding and tests
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<Event>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Event>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of everything written so far, in write order
    pub fn events(&self) -> Vec<Event> {
        self.lock().clone()
    }

    /// Remove and return everything written so far
    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl Sink for MemorySink {
    fn write(&self, event: &Event) -> Result<()> {
        self.lock().push(event.clone());
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Per-thread writer applying the write-failure policy
pub struct Emitter {
    sink: Arc<dyn Sink>,
    policy: WriteFailurePolicy,
    failures: u64,
    unreported: u64,
    last_warning: Option<Instant>,
}

impl Emitter {
    pub fn new(sink: Arc<dyn Sink>, policy: WriteFailurePolicy) -> Self {
        Self { sink, policy, failures: 0, unreported: 0, last_warning: None }
    }

    /// Write `event`; returns `Ok(false)` when the write failed and the event was dropped
    ///
    /// Under [`WriteFailurePolicy::FailFast`] the failure is returned instead.
    pub fn emit(&mut self, event: &Event) -> Result<bool> {
        match self.sink.write(event) {
            Ok(()) => Ok(true),
            Err(e) => {
                self.failures += 1;
                match self.policy {
                    WriteFailurePolicy::FailFast => Err(e),
                    WriteFailurePolicy::LogAndDrop => {
                        self.report_failure(event, &e);
                        Ok(false)
                    }
                }
            }
        }
    }

    fn report_failure(&mut self, event: &Event, error: &Error) {
        self.unreported += 1;
        let due = self.last_warning.map_or(true, |at| at.elapsed() >= FAILURE_WARN_INTERVAL);
        if due {
            warn!(
                kind = %event.kind(),
                bid_id = %event.bid_id(),
                dropped = self.unreported,
                total_failures = self.failures,
                "Failed to write event: {}",
                error
            );
            self.unreported = 0;
            self.last_warning = Some(Instant::now());
        }
    }

    /// Write failures seen so far
    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn flush(&self) -> Result<()> {
        self.sink.flush()
    }
}
