use anyhow::Context;
use bidstream_cli::{config, Cli};
use bidstream_core::{GeneratorRuntime, JsonLinesSink, StopSignal};
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries the event stream; logs must stay on stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Bidstream synthetic auction traffic generator");
    if let Some(profile) = &cli.profile {
        tracing::info!("Loading profile: {}", profile.display());
    }

    let config = config::resolve(&cli)?;

    tracing::info!("=== Run Configuration ===");
    tracing::info!(
        "Rate: {} bids/s over {} worker(s)",
        config.traffic.rate,
        config.traffic.workers
    );
    tracing::info!("Arrival: {:?}", config.traffic.arrival);
    match config.traffic.seed {
        Some(seed) => tracing::info!("Seed: {} (reproducible mode)", seed),
        None => tracing::info!("Seed: none (entropy)"),
    }
    match config.traffic.duration {
        Some(duration) => tracing::info!("Duration: {}", humantime::format_duration(duration)),
        None => tracing::info!("Duration: unbounded"),
    }
    tracing::info!(
        "Win rate: {}, click rate: {}",
        config.events.win_rate,
        config.events.click_rate
    );
    tracing::info!(
        "Topology: {:?}, dispatch: {:?}",
        config.scheduler.topology,
        config.scheduler.dispatch
    );

    let flush_interval = config.output.flush_interval;
    let runtime = GeneratorRuntime::new(config).context("Invalid configuration")?;
    let sink = Arc::new(JsonLinesSink::stdout(flush_interval));

    let summary = runtime.run(sink, &StopSignal::new()).context("Generator run failed")?;

    tracing::info!("=== Run Summary ===");
    tracing::info!("Elapsed: {:.2?}", summary.elapsed);
    tracing::info!("Bids: {}", summary.bids());
    tracing::info!(
        "Wins scheduled: {}, clicks scheduled: {}",
        summary.scheduled_wins(),
        summary.scheduled_clicks()
    );
    tracing::info!("Delayed events emitted: {}", summary.emitted_delayed());
    tracing::info!("Pending at shutdown (discarded): {}", summary.discarded);
    if summary.dropped() > 0 {
        tracing::warn!("Dropped by full schedulers: {}", summary.dropped());
    }
    if summary.write_failures() > 0 {
        tracing::warn!("Write failures: {}", summary.write_failures());
    }

    Ok(())
}
