//! Parsing for the ride-history export.
//!
//! The export is a fixed-layout CSV in a legacy Korean code page. Each row is
//! one dispatch request; [`RideEvent::from_record`] lifts it into typed fields.

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use csv::StringRecord;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use tracing::warn;

mod col {
    pub const AREA: usize = 0;
    pub const TOTAL_RIDES: usize = 6;
    pub const ADULTS: usize = 7;
    pub const TEENS: usize = 8;
    pub const CHILDREN: usize = 9;
    pub const OUTCOME: usize = 10;
    pub const DATE: usize = 11;
    pub const CALL_METHOD: usize = 12;
    pub const CALL_TIME: usize = 14;
    pub const PICKUP_TIME: usize = 15;
    pub const DROPOFF_TIME: usize = 16;
    pub const WAITING: usize = 17;
    pub const TRAVEL: usize = 18;
    pub const ORIGIN: usize = 19;
    pub const DESTINATION: usize = 20;
    pub const ORIGIN_LAT: usize = 23;
    pub const ORIGIN_LON: usize = 24;
    pub const DESTINATION_LAT: usize = 25;
    pub const DESTINATION_LON: usize = 26;
}

/// Decodes raw file bytes using the WHATWG encoding `label` (e.g. `windows-949`).
///
/// Unmappable byte sequences are replaced rather than rejected; a warning is
/// logged when that happens.
pub fn decode<'a>(bytes: &'a [u8], label: &str) -> Result<Cow<'a, str>> {
    let encoding = encoding_rs::Encoding::for_label(label.as_bytes())
        .ok_or_else(|| anyhow!("unknown text encoding '{label}'"))?;
    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        warn!(encoding = used.name(), "Input contained undecodable bytes");
    }
    Ok(text)
}

/// Iterates the CSV records of already-decoded text, skipping the header row if present.
pub fn records(text: &str, has_headers: bool) -> impl Iterator<Item = Result<StringRecord>> + '_ {
    csv::ReaderBuilder::new()
        .has_headers(has_headers)
        .flexible(true)
        .from_reader(text.as_bytes())
        .into_records()
        .map(|r| r.map_err(anyhow::Error::from))
}

/// Parses every record of a decoded history file into a [`RideEvent`].
pub fn ride_events(text: &str, has_headers: bool) -> impl Iterator<Item = Result<RideEvent>> + '_ {
    records(text, has_headers).map(|record| RideEvent::from_record(&record?))
}

/// Dispatch outcome of a ride request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Outcome {
    Completed,
    Cancelled,
    NoShow,
    Other(String),
}

impl Outcome {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "이용완료" | "completed" => Outcome::Completed,
            "호출취소" | "cancelled" => Outcome::Cancelled,
            "노쇼" | "no-show" => Outcome::NoShow,
            other => Outcome::Other(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Outcome::Completed => "completed",
            Outcome::Cancelled => "cancelled",
            Outcome::NoShow => "no-show",
            Outcome::Other(raw) => raw.as_str(),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed)
    }
}

impl From<Outcome> for String {
    fn from(outcome: Outcome) -> Self {
        outcome.label().to_string()
    }
}

impl From<String> for Outcome {
    fn from(raw: String) -> Self {
        Outcome::parse(&raw)
    }
}

/// A stop as it appears in a ride row: name plus the coordinates recorded with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationRef {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RideEvent {
    pub area_code: String,
    pub total_rides: u32,
    pub adults: u32,
    pub teens: u32,
    pub children: u32,
    pub outcome: Outcome,
    pub date: NaiveDate,
    pub call_method: String,
    pub call_hour: Option<u32>,
    pub pickup_hour: Option<u32>,
    pub dropoff_hour: Option<u32>,
    pub waiting_minutes: Option<f64>,
    pub travel_minutes: Option<f64>,
    pub origin: StationRef,
    pub destination: StationRef,
}

impl RideEvent {
    pub fn from_record(record: &StringRecord) -> Result<Self> {
        Ok(RideEvent {
            area_code: field(record, col::AREA, "area code")?.to_string(),
            total_rides: parse_count(record, col::TOTAL_RIDES, "total rides")?,
            adults: parse_count(record, col::ADULTS, "adult riders")?,
            teens: parse_count(record, col::TEENS, "teen riders")?,
            children: parse_count(record, col::CHILDREN, "child riders")?,
            outcome: Outcome::parse(field(record, col::OUTCOME, "outcome")?),
            date: parse_date(field(record, col::DATE, "date")?)?,
            call_method: call_method(field(record, col::CALL_METHOD, "call method")?),
            call_hour: parse_hour(field(record, col::CALL_TIME, "call time")?)
                .context("call time")?,
            pickup_hour: parse_hour(field(record, col::PICKUP_TIME, "pickup time")?)
                .context("pickup time")?,
            dropoff_hour: parse_hour(field(record, col::DROPOFF_TIME, "dropoff time")?)
                .context("dropoff time")?,
            waiting_minutes: parse_duration_minutes(field(record, col::WAITING, "waiting time")?)
                .context("waiting time")?,
            travel_minutes: parse_duration_minutes(field(record, col::TRAVEL, "travel time")?)
                .context("travel time")?,
            origin: StationRef {
                name: field(record, col::ORIGIN, "origin")?.to_string(),
                lat: parse_coord(record, col::ORIGIN_LAT, "origin latitude")?,
                lon: parse_coord(record, col::ORIGIN_LON, "origin longitude")?,
            },
            destination: StationRef {
                name: field(record, col::DESTINATION, "destination")?.to_string(),
                lat: parse_coord(record, col::DESTINATION_LAT, "destination latitude")?,
                lon: parse_coord(record, col::DESTINATION_LON, "destination longitude")?,
            },
        })
    }

    /// Riders on this request across all fare types.
    pub fn riders(&self) -> u64 {
        u64::from(self.adults) + u64::from(self.teens) + u64::from(self.children)
    }

    /// `"<origin>-<destination>"`, the key of the OD tally.
    pub fn od_label(&self) -> String {
        format!("{}-{}", self.origin.name, self.destination.name)
    }
}

pub(crate) fn field<'r>(record: &'r StringRecord, index: usize, name: &str) -> Result<&'r str> {
    record
        .get(index)
        .ok_or_else(|| anyhow!("missing column {index} ({name})"))
}

fn parse_count(record: &StringRecord, index: usize, name: &str) -> Result<u32> {
    let raw = field(record, index, name)?;
    raw.trim()
        .parse()
        .with_context(|| format!("column {index} ({name}): invalid count '{raw}'"))
}

fn parse_coord(record: &StringRecord, index: usize, name: &str) -> Result<f64> {
    let raw = field(record, index, name)?;
    raw.trim()
        .parse()
        .with_context(|| format!("column {index} ({name}): invalid coordinate '{raw}'"))
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .with_context(|| format!("invalid date '{raw}'"))
}

/// Drops the parenthesised qualifier: `"앱(실시간)"` becomes `"앱"`.
/// Whitespace before the parenthesis is kept, so `"앱 (실시간)"` is its own key.
pub fn call_method(raw: &str) -> String {
    raw.split('(').next().unwrap_or_default().to_string()
}

/// Hour component of a `HH:MM[:SS]` time of day. Empty means "not recorded".
pub fn parse_hour(raw: &str) -> Result<Option<u32>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let hour = raw.split(':').next().unwrap_or_default().trim();
    hour.parse()
        .map(Some)
        .with_context(|| format!("invalid time of day '{raw}'"))
}

/// Converts an `HH:MM:SS` duration into fractional minutes. Empty means "unknown".
pub fn parse_duration_minutes(raw: &str) -> Result<Option<f64>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let parts: Vec<&str> = raw.split(':').collect();
    let &[h, m, s] = parts.as_slice() else {
        anyhow::bail!("invalid duration '{raw}', expected HH:MM:SS");
    };
    let parse = |part: &str| -> Result<u32> {
        part.trim()
            .parse()
            .with_context(|| format!("invalid duration '{raw}'"))
    };
    let (h, m, s) = (parse(h)?, parse(m)?, parse(s)?);
    Ok(Some(f64::from(h) * 60.0 + f64::from(m) + f64::from(s) / 60.0))
}
