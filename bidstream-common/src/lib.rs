//! Common utilities for bidstream
//!
//! This crate provides shared utilities used by the other bidstream crates:
//! - `distributions`: sampling distributions for synthetic attributes and timing

pub mod distributions;

pub use distributions::{
    BoundedExponentialDistribution, Distribution, ExponentialDistribution, UniformDistribution,
    WeightedChoice, MAX_SAMPLE_ATTEMPTS,
};
