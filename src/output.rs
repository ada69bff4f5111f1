//! Output formatting and persistence for aggregated statistics.
//!
//! Supports pretty-printing, JSON export (optionally gzipped), CSV append of
//! daily summary rows, and markdown leaderboards.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use csv::WriterBuilder;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::aggregator::views::{BucketSummary, RankedPair, RankedStation};

/// Logs a value using Rust's debug pretty-print format.
pub fn print_pretty<T: std::fmt::Debug>(value: &T) {
    debug!("{:#?}", value);
}

/// Logs a value as pretty-printed JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Writes `value` as JSON to `dir/<stem>.json`, or `dir/<stem>.json.gz` when `gzip` is set.
pub fn write_json<T: Serialize>(dir: &Path, stem: &str, value: &T, gzip: bool) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;

    let body = serde_json::to_vec(value)?;
    let (path, contents) = if gzip {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&body)?;
        (dir.join(format!("{stem}.json.gz")), encoder.finish()?)
    } else {
        (dir.join(format!("{stem}.json")), body)
    };

    // Readers must never see a half-written export.
    let partial = path.with_extension("partial");
    std::fs::write(&partial, &contents)
        .with_context(|| format!("failed to write {}", partial.display()))?;
    std::fs::rename(&partial, &path)
        .with_context(|| format!("failed to move export into {}", path.display()))?;

    info!(path = %path.display(), bytes = contents.len(), "Export written");
    Ok(path)
}

/// One flat CSV row per `(region, date)` bucket.
#[derive(Debug, Serialize)]
pub struct SummaryRow<'a> {
    pub region: &'a str,
    pub date: NaiveDate,
    pub total_users: u64,
    pub calls: u64,
    pub avg_wait: f64,
    pub adult: u64,
    pub teen: u64,
    pub child: u64,
}

impl<'a> From<&'a BucketSummary> for SummaryRow<'a> {
    fn from(summary: &'a BucketSummary) -> Self {
        let rider = |label: &str| {
            summary
                .rider_types
                .iter()
                .find(|s| s.label == label)
                .map_or(0, |s| s.count)
        };
        SummaryRow {
            region: &summary.region,
            date: summary.date,
            total_users: summary.total_users,
            calls: summary.calls,
            avg_wait: summary.avg_wait,
            adult: rider("adult"),
            teen: rider("teen"),
            child: rider("child"),
        }
    }
}

/// Appends a [`SummaryRow`] to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record(path: &str, row: &SummaryRow) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, "Appending CSV record");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    writer.serialize(row)?;
    writer.flush()?;

    Ok(())
}

/// Escapes the square brackets markdown would read as link syntax.
pub fn escape_markdown(text: &str) -> String {
    text.replace('[', "\\[").replace(']', "\\]")
}

fn leaderboard<'a>(title: &str, rows: impl Iterator<Item = (usize, &'a str, u64)>) -> String {
    let mut text = format!("### {title}\n");
    for (rank, name, count) in rows {
        text.push_str(&format!("{rank}. **{}** : {count}\n\n", escape_markdown(name)));
    }
    text
}

pub fn station_leaderboard(title: &str, stations: &[RankedStation]) -> String {
    leaderboard(
        title,
        stations.iter().map(|s| (s.rank, s.name.as_str(), s.count)),
    )
}

pub fn od_leaderboard(title: &str, pairs: &[RankedPair]) -> String {
    leaderboard(
        title,
        pairs.iter().map(|p| (p.rank, p.label.as_str(), p.count)),
    )
}
