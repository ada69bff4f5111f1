//! Runtime configuration for the dashboard pipeline.
//!
//! Every path and domain constant has a default matching the production
//! layout, so an empty JSON object (or no file at all) is a valid config.

use anyhow::{Context, Result};
use chrono::{Days, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::style::StylePolicy;

/// How the aggregator reacts to a ride row it cannot parse or place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowPolicy {
    /// Stop at the first bad row and keep whatever was accumulated so far.
    #[default]
    FailFast,
    /// Log the row, count it, and carry on.
    Skip,
}

/// Inclusive range of pickup hours tracked by the hourly breakdowns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourRange {
    pub first: u32,
    pub last: u32,
}

impl Default for HourRange {
    fn default() -> Self {
        Self { first: 6, last: 21 }
    }
}

impl HourRange {
    pub fn contains(&self, hour: u32) -> bool {
        hour >= self.first && hour <= self.last
    }

    pub fn len(&self) -> usize {
        if self.last < self.first {
            0
        } else {
            (self.last - self.first + 1) as usize
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hours(&self) -> std::ops::RangeInclusive<u32> {
        self.first..=self.last
    }
}

/// Wait-time histogram layout: `limit / width` regular bins plus one overflow bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitBins {
    pub width_minutes: u32,
    pub limit_minutes: u32,
}

impl Default for WaitBins {
    fn default() -> Self {
        Self {
            width_minutes: 5,
            limit_minutes: 60,
        }
    }
}

impl WaitBins {
    /// Total number of bins, overflow included.
    pub fn count(&self) -> usize {
        (self.limit_minutes / self.width_minutes.max(1)) as usize + 1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub data_dir: PathBuf,
    pub shp_dir: PathBuf,
    pub station_file: String,
    pub history_file: String,
    pub area_file: String,
    /// WHATWG label of the legacy text encoding used by all three input files.
    pub encoding: String,
    pub has_headers: bool,
    pub lookback_days: u64,
    pub hours: HourRange,
    pub wait_bins: WaitBins,
    pub top_n: usize,
    pub row_policy: RowPolicy,
    pub track_travel_times: bool,
    pub day_type_split: bool,
    pub weekends_are_holidays: bool,
    pub extra_holidays: Vec<NaiveDate>,
    pub style: StylePolicy,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            data_dir: Path::new("input").join("01 data"),
            shp_dir: Path::new("input").join("02 shp"),
            station_file: "DRT정류장(통합).csv".to_string(),
            history_file: "DRT운행내역(통합).csv".to_string(),
            area_file: "지역별 중심점.csv".to_string(),
            encoding: "windows-949".to_string(),
            has_headers: true,
            lookback_days: 1,
            hours: HourRange::default(),
            wait_bins: WaitBins::default(),
            top_n: 5,
            row_policy: RowPolicy::default(),
            track_travel_times: true,
            day_type_split: true,
            weekends_are_holidays: true,
            extra_holidays: Vec::new(),
            style: StylePolicy::default(),
        }
    }
}

impl DashboardConfig {
    /// Loads the config from a JSON file at `path`. Missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: DashboardConfig = serde_json::from_str(&content)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.hours.is_empty() || self.hours.last > 23 {
            anyhow::bail!(
                "hour range {}..={} must be non-empty and within a day",
                self.hours.first,
                self.hours.last
            );
        }
        if self.wait_bins.width_minutes == 0 {
            anyhow::bail!("wait bin width must be positive");
        }
        if self.wait_bins.limit_minutes % self.wait_bins.width_minutes != 0 {
            anyhow::bail!(
                "wait bin limit {} is not a multiple of width {}",
                self.wait_bins.limit_minutes,
                self.wait_bins.width_minutes
            );
        }
        if encoding_rs::Encoding::for_label(self.encoding.as_bytes()).is_none() {
            anyhow::bail!("unknown text encoding '{}'", self.encoding);
        }
        Ok(())
    }

    /// Resolves a configured file into a fetchable location: URLs pass through,
    /// anything else is taken relative to `data_dir`.
    pub fn source_location(&self, file: &str) -> String {
        if file.starts_with("http://") || file.starts_with("https://") {
            file.to_string()
        } else {
            self.data_dir.join(file).display().to_string()
        }
    }

    /// The reference date the dashboard opens on: `lookback_days` before today.
    pub fn as_of(&self) -> NaiveDate {
        self.as_of_from(Local::now().date_naive())
    }

    pub fn as_of_from(&self, today: NaiveDate) -> NaiveDate {
        today
            .checked_sub_days(Days::new(self.lookback_days))
            .unwrap_or(today)
    }
}
