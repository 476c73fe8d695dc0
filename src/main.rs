//! Transit analytics - event dispatch CLI
//!
//! Builds the analytics context from a TOML config, performs one command
//! and drains the sink transports before exiting.
//!
//! Module structure:
//! - `domain/` - Value types (distance buckets, categories, region tags, hits)
//! - `infra/` - Infrastructure (Config, preferences, gate, registry, metrics)
//! - `io/` - Tracker handles and sink transports (MQTT, HTTP, file, log)
//! - `services/` - Dispatcher, startup report, context

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;
use transit_analytics::domain::{EventCategory, GeoPoint, LocationFix};
use transit_analytics::infra::{Config, PreferenceStore, TrackerRole};
use transit_analytics::services::AnalyticsContext;

/// Transit analytics - sends usage events to the configured trackers
#[derive(Parser, Debug)]
#[command(name = "transit-analytics", version, about)]
struct Args {
    /// Path to TOML configuration file (falls back to CONFIG_FILE, then config/dev.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send the startup settings report
    Startup,
    /// Record a screen view
    Screen {
        name: String,
    },
    /// Send a structured event
    Event {
        /// app_settings | ui_action | submit | stop_metrics | accessibility
        category: EventCategory,
        action: String,
        label: String,
        #[arg(long)]
        value: Option<i64>,
    },
    /// Report the distance between the user and a tapped stop
    StopTap {
        stop_id: String,
        #[arg(long, allow_hyphen_values = true)]
        stop_lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        stop_lon: f64,
        #[arg(long, allow_hyphen_values = true, requires_all = ["lon", "accuracy"])]
        lat: Option<f64>,
        #[arg(long, allow_hyphen_values = true, requires_all = ["lat", "accuracy"])]
        lon: Option<f64>,
        /// Horizontal accuracy radius in meters
        #[arg(long, requires_all = ["lat", "lon"])]
        accuracy: Option<f64>,
    },
    /// Print the region tag for the current configuration
    Tag,
}

fn init_logging(json: bool) {
    // Default: INFO, use RUST_LOG=debug to see every hit
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_json);

    info!(
        version = %env!("CARGO_PKG_VERSION"),
        git_hash = %env!("GIT_HASH"),
        "transit-analytics starting"
    );

    let config_path = Config::resolve_config_path(args.config.as_deref());
    let config = Config::load_from_path(&config_path);

    info!(
        config_file = %config.config_file(),
        analytics_enabled = %config.analytics_enabled(),
        dry_run = %config.dry_run(),
        app_transport = %config.tracker_profile(TrackerRole::App).transport.as_str(),
        global_transport = %config.tracker_profile(TrackerRole::Global).transport.as_str(),
        "config_loaded"
    );

    let store = Arc::new(PreferenceStore::from_config(&config));
    let ctx = AnalyticsContext::new(&config, store, Handle::current());

    // Periodic counters for long-running sinks (0 disables)
    let metrics_interval = config.metrics_interval_secs();
    if metrics_interval > 0 {
        let metrics = ctx.metrics().clone();
        tokio::spawn(async move {
            let period = std::time::Duration::from_secs(metrics_interval);
            let mut interval = tokio::time::interval(period);
            // First tick fires immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                metrics.report().log();
            }
        });
    }

    run_command(&ctx, args.command).context("command failed")?;

    let metrics = ctx.metrics().clone();
    ctx.shutdown().await;
    metrics.report().log();

    info!("transit-analytics shutdown complete");
    Ok(())
}

fn run_command(ctx: &AnalyticsContext, command: Command) -> anyhow::Result<()> {
    let dispatcher = ctx.dispatcher();

    match command {
        Command::Startup => ctx.report_startup(),
        Command::Screen { name } => dispatcher.dispatch_screen_view(&name),
        Command::Event { category, action, label, value } => {
            dispatcher.dispatch(category, &action, &label, value)
        }
        Command::StopTap { stop_id, stop_lat, stop_lon, lat, lon, accuracy } => {
            let stop = GeoPoint::new(stop_lat, stop_lon);
            if !stop.is_valid() {
                anyhow::bail!("stop coordinates out of range: {}, {}", stop_lat, stop_lon);
            }
            let fix = match (lat, lon, accuracy) {
                (Some(lat), Some(lon), Some(accuracy)) => {
                    Some(LocationFix::new(lat, lon, accuracy))
                }
                _ => None,
            };
            dispatcher.dispatch_stop_proximity(&stop_id, fix.as_ref(), &stop);
        }
        Command::Tag => println!("{}", dispatcher.region_tag()),
    }

    Ok(())
}
