//! Bidstream Core Library
//!
//! This crate provides the core of the bidstream synthetic ad-auction
//! traffic generator: the event model, attribute sampling, delay scheduling,
//! dispatch, rate workers, output sinks and the threading runtime.

pub mod attributes;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod policy;
pub mod scheduler;
pub mod seed;
pub mod sink;
pub mod threading;
pub mod timing;
pub mod worker;

pub use attributes::{AttributeGenerator, RandomAttributes};
pub use config::GeneratorConfig;
pub use error::{Error, Result};
pub use event::{Bid, BidId, Click, Event, EventKind, LogTime, Win};
pub use scheduler::{DelayScheduler, InsertOutcome};
pub use sink::{JsonLinesSink, MemorySink, Sink};
pub use threading::{GeneratorRuntime, RunSummary, StopSignal};
pub use worker::{RateWorker, WorkerStats};
