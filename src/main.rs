//! CLI entry point for the DRT operations dashboard.
//!
//! Provides subcommands for printing a region's daily statistics, exporting
//! the whole aggregate, splitting ridership by weekday/holiday, and keeping
//! an export fresh on a schedule.

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use drt_dashboard::aggregator::analyzer::load_dataset;
use drt_dashboard::aggregator::calendar::{HolidayCalendar, day_type_split};
use drt_dashboard::aggregator::snapshot::SnapshotStore;
use drt_dashboard::aggregator::types::{AggregateExport, DataStatus, Dataset};
use drt_dashboard::aggregator::views::{
    BucketSummary, StationMarker, ZoneLayer, available_zone_layers, station_markers, summarize,
};
use drt_dashboard::config::DashboardConfig;
use drt_dashboard::fetch::BasicClient;
use drt_dashboard::output::{
    SummaryRow, append_record, od_leaderboard, print_json, print_pretty, station_leaderboard,
    write_json,
};
use serde::Serialize;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::Instrument;
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "drt_dashboard")]
#[command(about = "Aggregates DRT ride history into per-region daily statistics", long_about = None)]
struct Cli {
    /// JSON config file; falls back to $DRT_CONFIG, then built-in defaults
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory holding the station, service-area and history CSVs
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the dashboard statistics for one day
    Summary {
        /// Only this service area (default: every area with data that day)
        #[arg(short, long)]
        region: Option<String>,

        /// Day to show, YYYY-MM-DD (default: the configured look-back date)
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// Log the full view as JSON instead of text
        #[arg(long, default_value_t = false)]
        json: bool,

        /// CSV file to append one summary row per region to
        #[arg(long)]
        csv: Option<String>,
    },
    /// Write the whole aggregate as JSON
    Export {
        /// Directory to write exports to
        #[arg(short, long, default_value = "exports")]
        output_dir: PathBuf,

        /// Gzip compress the JSON files
        #[arg(long, default_value_t = false)]
        gzip: bool,
    },
    /// Average riders and calls per day, split by weekday and holiday
    DayTypes,
    /// Rebuild the aggregate on an interval and re-export it
    Watch {
        /// Directory to write exports to
        #[arg(short, long, default_value = "exports")]
        output_dir: PathBuf,

        /// Seconds between rebuilds
        #[arg(short, long, default_value_t = 3600)]
        interval: u64,

        /// Number of rebuilds (0 = infinite)
        #[arg(short = 'n', long, default_value_t = 0)]
        num_runs: usize,

        /// Gzip compress the JSON files
        #[arg(long, default_value_t = false)]
        gzip: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/drt_dashboard.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("drt_dashboard.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let config = resolve_config(cli.config, cli.data_dir)?;
    print_pretty(&config);

    let client = BasicClient::new();

    match cli.command {
        Commands::Summary {
            region,
            date,
            json,
            csv,
        } => {
            let date = date.unwrap_or_else(|| config.as_of());
            let dataset = load_dataset(&client, &config).await;
            report_status(&dataset);
            show_summary(&dataset, &config, region.as_deref(), date, json, csv.as_deref())?;
        }
        Commands::Export { output_dir, gzip } => {
            let dataset = load_dataset(&client, &config).await;
            report_status(&dataset);
            export(&dataset, &config, &output_dir, gzip)?;
        }
        Commands::DayTypes => {
            let dataset = load_dataset(&client, &config).await;
            report_status(&dataset);
            if !dataset.aggregate.is_available() {
                warn!("Data unavailable, nothing to split");
            } else {
                let calendar = HolidayCalendar::from_config(&config);
                print_json(&day_type_split(&dataset.aggregate, &calendar))?;
            }
        }
        Commands::Watch {
            output_dir,
            interval,
            num_runs,
            gzip,
        } => {
            watch(&client, &config, &output_dir, interval, num_runs, gzip).await?;
        }
    }

    Ok(())
}

/// Defaults, then the JSON file, then `DRT_DATA_DIR`, then `--data-dir`.
fn resolve_config(file: Option<PathBuf>, data_dir: Option<PathBuf>) -> Result<DashboardConfig> {
    let file = file.or_else(|| std::env::var_os("DRT_CONFIG").map(PathBuf::from));
    let mut config = match file {
        Some(path) => DashboardConfig::load(&path)?,
        None => DashboardConfig::default(),
    };
    if let Some(dir) = std::env::var_os("DRT_DATA_DIR") {
        config.data_dir = PathBuf::from(dir);
    }
    if let Some(dir) = data_dir {
        config.data_dir = dir;
    }
    config.validate()?;
    Ok(config)
}

fn report_status(dataset: &Dataset) {
    let aggregate = &dataset.aggregate;
    match &aggregate.status {
        DataStatus::Complete => info!(
            rows = aggregate.rows_read,
            skipped = aggregate.rows_skipped,
            buckets = aggregate.bucket_count(),
            "Ride history aggregated"
        ),
        DataStatus::Partial { row, reason } => warn!(
            row,
            reason = %reason,
            buckets = aggregate.bucket_count(),
            "Ride history only partially aggregated"
        ),
        DataStatus::Unavailable { reason } => {
            error!(reason = %reason, "Ride history data unavailable")
        }
    }
}

/// Everything one dashboard page draws for a region and day.
#[derive(Serialize)]
struct DashboardView {
    summary: BucketSummary,
    markers: Vec<StationMarker>,
    zones: Vec<ZoneLayer>,
}

fn show_summary(
    dataset: &Dataset,
    config: &DashboardConfig,
    region: Option<&str>,
    date: NaiveDate,
    json: bool,
    csv: Option<&str>,
) -> Result<()> {
    let aggregate = &dataset.aggregate;
    if !aggregate.is_available() {
        warn!(%date, "Data unavailable");
        return Ok(());
    }

    let regions: Vec<&str> = match region {
        Some(region) => vec![region],
        None => aggregate.regions.keys().map(String::as_str).collect(),
    };

    let mut shown = 0;
    for region in regions {
        let Some(stats) = aggregate.bucket(region, date) else {
            continue;
        };
        shown += 1;

        let summary = summarize(region, date, stats, config);
        if let Some(path) = csv {
            append_record(path, &SummaryRow::from(&summary))?;
        }

        if json {
            let view = DashboardView {
                markers: station_markers(stats, &dataset.tables.station_types, &config.style),
                zones: available_zone_layers(region, &config.shp_dir, &config.style),
                summary,
            };
            print_json(&view)?;
            continue;
        }

        info!(
            region,
            %date,
            total_users = summary.total_users,
            calls = summary.calls,
            avg_wait = summary.avg_wait,
            "Daily summary"
        );
        for share in &summary.outcomes {
            info!(outcome = %share.label, count = share.count, percent = share.percent, "Dispatch outcome");
        }
        for share in &summary.call_methods {
            info!(method = %share.label, count = share.count, percent = share.percent, "Call method");
        }
        info!("\n{}", station_leaderboard("Top boarding stations", &summary.top_boarded));
        info!("\n{}", station_leaderboard("Top alighting stations", &summary.top_alighted));
        info!("\n{}", od_leaderboard("Top O-D pairs", &summary.top_od_pairs));
        for point in summary.hourly.iter().filter(|p| p.users > 0) {
            info!(
                hour = point.hour,
                users = point.users,
                avg_wait = point.avg_wait,
                avg_travel = point.avg_travel,
                "Hourly"
            );
        }
        for share in &summary.wait_distribution {
            info!(bin = %share.label, count = share.count, percent = share.percent, "Wait distribution");
        }
    }

    if shown == 0 {
        warn!(%date, region = region.unwrap_or("*"), "Data unavailable: no rides recorded");
    }
    Ok(())
}

fn export(dataset: &Dataset, config: &DashboardConfig, output_dir: &Path, gzip: bool) -> Result<()> {
    let envelope = AggregateExport::new(dataset, config.as_of());
    write_json(output_dir, "aggregate", &envelope, gzip)?;

    if config.day_type_split && dataset.aggregate.is_available() {
        let calendar = HolidayCalendar::from_config(config);
        write_json(
            output_dir,
            "day_types",
            &day_type_split(&dataset.aggregate, &calendar),
            gzip,
        )?;
    }
    Ok(())
}

/// Rebuilds the dataset every `interval` seconds and swaps it in whole.
/// A rebuild that reads less of the history than the current snapshot
/// (partial or unavailable) keeps serving the previous one.
#[tracing::instrument(skip(client, config, output_dir), fields(output_dir = %output_dir.display()))]
async fn watch(
    client: &BasicClient,
    config: &DashboardConfig,
    output_dir: &Path,
    interval: u64,
    num_runs: usize,
    gzip: bool,
) -> Result<()> {
    if num_runs == 0 {
        info!(interval, "Rebuilding indefinitely. Press Ctrl+C to stop.");
    }

    let mut run_count = 1;
    let store = SnapshotStore::new(rebuild(client, config, run_count).await);

    loop {
        let snapshot = store.current();
        if let Err(e) = export(&snapshot, config, output_dir, gzip) {
            error!(error = %format!("{e:#}"), "Failed to export snapshot");
        }

        if num_runs > 0 && run_count >= num_runs {
            break;
        }

        info!(interval, "Waiting before next rebuild");
        tokio::time::sleep(tokio::time::Duration::from_secs(interval)).await;

        run_count += 1;
        let dataset = rebuild(client, config, run_count).await;
        if dataset.supersedes(&snapshot) {
            store.replace(dataset);
        } else {
            warn!("Rebuild is less complete than the current snapshot, keeping it");
        }
    }

    info!(runs = run_count, "Finished rebuilding");
    Ok(())
}

async fn rebuild(client: &BasicClient, config: &DashboardConfig, run: usize) -> Dataset {
    let span = tracing::info_span!("rebuild", run);
    let dataset = load_dataset(client, config).instrument(span).await;
    report_status(&dataset);
    dataset
}
