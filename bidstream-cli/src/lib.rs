//! Bidstream CLI library
//!
//! This library exposes argument and configuration handling for testing and
//! potential reuse.

pub mod args;
pub mod config;

pub use args::Cli;
