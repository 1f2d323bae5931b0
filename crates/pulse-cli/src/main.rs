//! Pulse CLI - client observability from the command line
//!
//! Usage:
//!   pulse init                  Write a default pulse.toml
//!   pulse check                 Run the health probe battery once
//!   pulse watch                 Poll and render health on an interval
//!   pulse event <name>          Send a custom telemetry event

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pulse_core::{AggregateHealthStatus, ProbeStatus, PulseConfig};
use pulse_health::HealthAggregator;
use pulse_telemetry::TelemetryBatcher;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "pulse")]
#[command(author, version, about = "Client observability: telemetry batching and health checks")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, default_value = "pulse.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,

    /// Run the health probe battery once
    Check {
        /// Emit the aggregate status as JSON
        #[arg(long)]
        json: bool,
    },

    /// Poll health on an interval and render each result
    Watch {
        /// Poll interval in seconds
        #[arg(short, long, default_value = "30")]
        interval: u64,
    },

    /// Send a custom telemetry event
    Event {
        /// Event name
        name: String,

        /// Event payload as a JSON object
        #[arg(long)]
        data: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if matches!(cli.command, Commands::Init) {
        PulseConfig::write_default(&cli.config)
            .with_context(|| format!("Failed to write {}", cli.config.display()))?;
        println!("Wrote default configuration to {}", cli.config.display());
        return Ok(());
    }

    let config = PulseConfig::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;

    let batcher = Arc::new(TelemetryBatcher::new(config.clone()).context("Failed to start telemetry")?);
    batcher.capture_panics();
    let aggregator = HealthAggregator::new(&config, batcher.clone());

    match cli.command {
        Commands::Init => unreachable!("handled above"),

        Commands::Check { json } => {
            let status = aggregator.check().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                render_status(&status);
            }
        }

        Commands::Watch { interval } => {
            info!("Polling health every {}s, Ctrl-C to stop", interval);
            loop {
                let status = aggregator.check().await;
                render_status(&status);

                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(interval)) => {}
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
        }

        Commands::Event { name, data } => {
            let data = match data {
                Some(raw) => serde_json::from_str(&raw).context("--data is not valid JSON")?,
                None => serde_json::Value::Null,
            };
            if batcher.report_custom_event(&name, data).await {
                println!("Event '{}' dispatched", name);
            } else {
                println!(
                    "Event '{}' logged locally only (offline, non-production, or no events endpoint configured)",
                    name
                );
            }
        }
    }

    // Flush anything still queued before the process exits
    batcher.shutdown().await;
    Ok(())
}

fn render_status(status: &AggregateHealthStatus) {
    println!(
        "{}  [{} v{}]  uptime {}ms",
        status.status.to_string().to_uppercase(),
        status.environment,
        status.version,
        status.uptime_ms
    );

    let mut names: Vec<_> = status.checks.keys().collect();
    names.sort();
    for name in names {
        let check = &status.checks[name];
        let marker = match check.status {
            ProbeStatus::Pass => "ok  ",
            ProbeStatus::Warn => "warn",
            ProbeStatus::Fail => "FAIL",
        };
        let timing = check
            .response_time_ms
            .map(|ms| format!(" ({}ms)", ms))
            .unwrap_or_default();
        println!("  [{}] {:<10} {}{}", marker, name, check.message, timing);
    }

    println!(
        "  error rate {:.1}%  avg response {:.1}ms{}",
        status.metrics.error_rate * 100.0,
        status.metrics.response_time_ms,
        status
            .metrics
            .memory_usage_percent
            .map(|p| format!("  memory {:.1}%", p))
            .unwrap_or_default()
    );
    println!();
}
