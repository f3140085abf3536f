//! Command-line arguments

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Bidstream: synthetic ad-auction traffic generator
///
/// Emits bid, win and click events as JSON lines on stdout. Logs go to
/// stderr.
///
/// Example usage:
///   bidstream 1000 4
///   bidstream -P profiles/default.toml --duration 30s
///   bidstream 500 --seed 42 --set scheduler.topology=shared
///
/// Positional arguments and flags override the profile; `--set` overrides
/// any profile value using dot notation and is applied before the flags.
#[derive(Parser, Debug, Clone)]
#[command(name = "bidstream")]
#[command(version, about = "Synthetic ad-auction event generator", long_about = None)]
pub struct Cli {
    /// Total bids per second across all workers [default: 1]
    pub rate: Option<u64>,

    /// Number of rate workers [default: 1]
    pub workers: Option<u64>,

    /// Path to TOML profile configuration file
    #[arg(short = 'P', long)]
    pub profile: Option<PathBuf>,

    /// Master seed for reproducible runs
    #[arg(long)]
    pub seed: Option<u64>,

    /// Stop after this long (e.g. 30s, 5m); runs until killed if omitted
    #[arg(long, value_parser = humantime::parse_duration)]
    pub duration: Option<Duration>,

    /// Probability that a bid wins
    #[arg(long)]
    pub win_rate: Option<f64>,

    /// Probability that a won bid is clicked
    #[arg(long)]
    pub click_rate: Option<f64>,

    /// Override a configuration value using dot notation (repeatable)
    ///
    /// Examples:
    ///   --set traffic.arrival=poisson
    ///   --set scheduler.max_pending=100000
    ///   --set output.flush_interval=250ms
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    pub log_level: String,
}
