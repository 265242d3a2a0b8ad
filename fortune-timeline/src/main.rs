//! fortune-timeline - command-line entry point
//!
//! Loads precomputed chart engine output, ranks it for one birth profile and
//! reference date, and prints the report as JSON on stdout. Logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use fortune_common::config::{ConfigResolver, TomlConfig};
use fortune_timeline::{
    BirthProfile, CacheLayer, FortuneError, FortunePipeline, FortuneReport, FortuneResult,
    InMemorySharedStore, JsonChartEngine,
};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for fortune-timeline
#[derive(Parser, Debug)]
#[command(name = "fortune-timeline")]
#[command(about = "Rank fortune periods and notable years for a birth profile")]
#[command(version)]
struct Args {
    /// Precomputed chart engine output (JSON snapshot)
    #[arg(long, env = "FORTUNE_CHART")]
    chart: PathBuf,

    /// Birth date (YYYY-MM-DD)
    #[arg(long)]
    birth_date: String,

    /// Birth time (HH:MM)
    #[arg(long, default_value = "12:00")]
    birth_time: String,

    /// male / female (男 / 女)
    #[arg(long)]
    gender: String,

    /// solar / lunar
    #[arg(long, default_value = "solar")]
    calendar: String,

    /// Reference date (YYYY-MM-DD), defaults to today
    #[arg(long)]
    reference_date: Option<String>,

    /// Config file path (overrides FORTUNE_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of ranked periods, current period included
    #[arg(long)]
    period_count: Option<usize>,

    /// Notable years kept per period
    #[arg(long)]
    cap: Option<usize>,

    /// Pretty-print the JSON report
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ConfigResolver::new(args.config.clone())
        .load()
        .context("Failed to load configuration")?;
    if let Some(period_count) = args.period_count {
        config.ranking.period_count = period_count;
    }
    if let Some(cap) = args.cap {
        config.ranking.years_per_period_cap = cap;
    }
    config.validate().context("Invalid configuration")?;

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        chart = %args.chart.display(),
        "Starting fortune-timeline"
    );

    match run(&args, &config).await {
        Ok(report) => {
            let body = if args.pretty {
                serde_json::to_string_pretty(&report)?
            } else {
                serde_json::to_string(&report)?
            };
            println!("{}", body);
            Ok(())
        }
        Err(e) => {
            error!(code = e.error_code(), error = %e, "Request failed");
            println!("{}", e.to_json());
            std::process::exit(1);
        }
    }
}

async fn run(args: &Args, config: &TomlConfig) -> FortuneResult<FortuneReport> {
    let profile = BirthProfile::parse(
        &args.birth_date,
        &args.birth_time,
        &args.gender,
        &args.calendar,
    )?;
    let reference_date = args
        .reference_date
        .as_deref()
        .map(fortune_common::time::parse_date)
        .transpose()
        .map_err(|e| FortuneError::InvalidBirthProfile(e.to_string()))?;

    let engine = Arc::new(JsonChartEngine::load(&args.chart).await?);
    let cache = Arc::new(
        CacheLayer::connect(&config.cache, Arc::new(InMemorySharedStore::new())).await,
    );
    let pipeline = FortunePipeline::new(engine, cache, config);

    let result = pipeline.generate(&profile, reference_date).await;
    pipeline.shutdown().await;
    result
}
