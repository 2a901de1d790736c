//! Story Export CLI
//!
//! Fetches, enriches and aggregates session events per day.

use anyhow::{bail, Context};
use chrono::{Days, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use story_export::{
    config::API_KEY_ENV,
    pipeline::{self, date_in, ExportRequest, PipelineOutcome},
    Config, ExportClient, RunLog, VERSION,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Days before today the export starts when no start is given.
const DEFAULT_OFFSET_DAYS: u64 = 2;

/// How far back the export API keeps data.
const RETENTION_DAYS: u64 = 90;

#[derive(Parser)]
#[command(name = "story-export")]
#[command(version = VERSION)]
#[command(about = "Export, enrich and aggregate session events", long_about = None)]
struct Cli {
    /// Default log filter when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Config file (defaults to ./story.json, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// API key, overriding the config file
    #[arg(long, global = true, env = API_KEY_ENV, hide_env_values = true)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a range of days
    Export {
        /// First day to export (YYYY-MM-DD)
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Last day to export, inclusive (YYYY-MM-DD); defaults to today
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Start this many days before today instead of --start
        #[arg(long, conflicts_with = "start")]
        offset: Option<u64>,

        /// Skip the aggregation catalogue
        #[arg(long)]
        no_aggregate: bool,

        /// Output directory for daily files
        #[arg(long, short, default_value = "data")]
        output: PathBuf,

        /// Abort the run after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Validate and show the effective configuration
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let config = load_config(cli.config.as_deref(), cli.api_key)?;

    match cli.command {
        Commands::Export {
            start,
            end,
            offset,
            no_aggregate,
            output,
            timeout,
        } => {
            cmd_export(
                &config,
                start,
                end,
                offset,
                !no_aggregate,
                &output,
                timeout.map(Duration::from_secs),
            )
            .await
        }
        Commands::CheckConfig => cmd_check_config(&config),
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(path: Option<&Path>, api_key: Option<String>) -> anyhow::Result<Config> {
    let config = Config::load(path).context("Failed to load configuration")?;
    Ok(match api_key {
        Some(key) if !key.is_empty() => config.with_api_key(key),
        _ => config,
    })
}

async fn cmd_export(
    config: &Config,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    offset: Option<u64>,
    aggregate: bool,
    output: &Path,
    timeout: Option<Duration>,
) -> anyhow::Result<()> {
    config.validate().context("Invalid configuration")?;
    let tz = config.tz()?;

    let today = date_in(Utc::now(), tz);
    let start = match (start, offset) {
        (Some(start), _) => start,
        (None, offset) => today
            .checked_sub_days(Days::new(offset.unwrap_or(DEFAULT_OFFSET_DAYS)))
            .context("Offset reaches before the supported date range")?,
    };
    let end = end.unwrap_or(today);
    if end < start {
        bail!("End date {end} is before start date {start}");
    }
    if let Some(oldest) = today.checked_sub_days(Days::new(RETENTION_DAYS)) {
        if start < oldest {
            warn!(%start, %oldest, "Start is older than the export API keeps data");
        }
    }

    println!("Story Export v{VERSION}");
    println!("  Range: {start} to {end} ({tz})");
    println!("  Aggregations: {}", if aggregate { "enabled" } else { "disabled" });
    println!("  Output: {}", output.display());
    println!();

    let client = ExportClient::new(config)?;
    let log = RunLog::new();
    let request = ExportRequest::for_dates(start, Some(end), tz, aggregate);

    let outcome = match timeout {
        Some(limit) => pipeline::run_with_timeout(config, &client, &request, &log, limit).await,
        None => pipeline::run(config, &client, &request, &log).await,
    }
    .context("Export failed")?;

    match outcome {
        PipelineOutcome::NoData => {
            println!("No data found between {start} and {end}.");
        }
        PipelineOutcome::Reports(reports) => {
            std::fs::create_dir_all(output)
                .with_context(|| format!("Failed to create {}", output.display()))?;

            for report in &reports {
                write_json(&output.join(report.records_file_name()), &report.records)?;
                if let Some(aggregations) = &report.aggregations {
                    write_json(&output.join(report.aggregations_file_name()), aggregations)?;
                }
            }
            println!("Wrote {} daily report(s) to {}", reports.len(), output.display());
        }
    }

    println!();
    println!("{}", log.summary());
    Ok(())
}

/// Write `value` as pretty JSON and log the size written.
fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    std::fs::write(path, &json).with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), bytes = json.len(), "Wrote file");
    Ok(())
}

fn cmd_check_config(config: &Config) -> anyhow::Result<()> {
    println!("Configuration");
    println!("=============");
    println!();
    for path in Config::default_paths() {
        let marker = if path.exists() { "found" } else { "missing" };
        println!("Search path: {} ({marker})", path.display());
    }
    println!();

    let mut shown = config.clone();
    if !shown.api_key.is_empty() {
        shown.api_key = "********".to_string();
    }
    println!("{}", serde_json::to_string_pretty(&shown)?);
    println!();

    config.validate().context("Configuration is invalid")?;
    story_export::Enricher::new(config).context("Enrichment rules are invalid")?;
    println!("Configuration is valid.");
    Ok(())
}
