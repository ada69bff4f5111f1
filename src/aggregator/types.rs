//! Data types shared by the aggregation pipeline and its consumers.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::DashboardConfig;
use crate::reference::{GeoPoint, ReferenceTables, SourceStatus};
use crate::stats::DailyStats;

/// Whether the aggregate reflects the whole history file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DataStatus {
    Complete,
    /// Loading stopped at data row `row`; buckets hold everything before it.
    Partial { row: usize, reason: String },
    /// No history could be read at all.
    Unavailable { reason: String },
}

impl DataStatus {
    fn completeness(&self) -> u8 {
        match self {
            DataStatus::Complete => 2,
            DataStatus::Partial { .. } => 1,
            DataStatus::Unavailable { .. } => 0,
        }
    }
}

/// Statistics keyed by service area, then by date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregate {
    pub status: DataStatus,
    pub rows_read: usize,
    pub rows_skipped: usize,
    /// Completed rides left out of the hourly breakdowns (pickup hour missing or out of range).
    pub hours_out_of_domain: usize,
    pub regions: BTreeMap<String, BTreeMap<NaiveDate, DailyStats>>,
}

impl Default for Aggregate {
    fn default() -> Self {
        Self {
            status: DataStatus::Complete,
            rows_read: 0,
            rows_skipped: 0,
            hours_out_of_domain: 0,
            regions: BTreeMap::new(),
        }
    }
}

impl Aggregate {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            status: DataStatus::Unavailable {
                reason: reason.into(),
            },
            ..Default::default()
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self.status, DataStatus::Unavailable { .. })
    }

    pub fn bucket(&self, region: &str, date: NaiveDate) -> Option<&DailyStats> {
        self.regions.get(region)?.get(&date)
    }

    /// Finds the bucket for `(region, date)`, creating it with `center` on first touch.
    /// The centre of an existing bucket is never replaced.
    pub(crate) fn bucket_or_insert(
        &mut self,
        region: &str,
        date: NaiveDate,
        center: GeoPoint,
        config: &DashboardConfig,
    ) -> &mut DailyStats {
        self.regions
            .entry(region.to_string())
            .or_default()
            .entry(date)
            .or_insert_with(|| DailyStats::new(center, config.hours, config.wait_bins))
    }

    pub fn buckets(&self) -> impl Iterator<Item = (&str, NaiveDate, &DailyStats)> {
        self.regions.iter().flat_map(|(region, days)| {
            days.iter()
                .map(move |(date, stats)| (region.as_str(), *date, stats))
        })
    }

    pub fn bucket_count(&self) -> usize {
        self.regions.values().map(BTreeMap::len).sum()
    }
}

/// Everything the presentation layer reads: reference tables plus the aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub tables: ReferenceTables,
    pub history_status: SourceStatus,
    pub aggregate: Aggregate,
}

impl Dataset {
    /// Whether a rebuild should replace `current`: never with a less complete read.
    pub fn supersedes(&self, current: &Dataset) -> bool {
        self.aggregate.status.completeness() >= current.aggregate.status.completeness()
    }
}

/// JSON envelope written by the export commands.
#[derive(Serialize)]
pub struct AggregateExport<'a> {
    pub(crate) schema_version: u8,
    pub(crate) generated_at: DateTime<Utc>,
    pub(crate) as_of: NaiveDate,
    pub(crate) station_source: &'a SourceStatus,
    pub(crate) area_source: &'a SourceStatus,
    pub(crate) history_source: &'a SourceStatus,
    #[serde(flatten)]
    pub(crate) aggregate: &'a Aggregate,
}

impl<'a> AggregateExport<'a> {
    pub fn new(dataset: &'a Dataset, as_of: NaiveDate) -> Self {
        Self {
            schema_version: 1,
            generated_at: Utc::now(),
            as_of,
            station_source: &dataset.tables.station_status,
            area_source: &dataset.tables.area_status,
            history_source: &dataset.history_status,
            aggregate: &dataset.aggregate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::{AreaCenters, ServiceAreas, StationTypes};

    fn dataset(status: DataStatus) -> Dataset {
        Dataset {
            tables: ReferenceTables::new(
                StationTypes::default(),
                ServiceAreas::default(),
                AreaCenters::default(),
            ),
            history_status: SourceStatus::Loaded { rows: 0 },
            aggregate: Aggregate {
                status,
                ..Default::default()
            },
        }
    }

    fn partial() -> DataStatus {
        DataStatus::Partial {
            row: 3,
            reason: "bad row".to_string(),
        }
    }

    fn unavailable() -> DataStatus {
        DataStatus::Unavailable {
            reason: "missing".to_string(),
        }
    }

    #[test]
    fn test_rebuild_never_downgrades_snapshot() {
        let complete = dataset(DataStatus::Complete);
        assert!(!dataset(partial()).supersedes(&complete));
        assert!(!dataset(unavailable()).supersedes(&complete));
        assert!(!dataset(unavailable()).supersedes(&dataset(partial())));
    }

    #[test]
    fn test_rebuild_replaces_equal_or_worse_snapshot() {
        assert!(dataset(DataStatus::Complete).supersedes(&dataset(DataStatus::Complete)));
        assert!(dataset(DataStatus::Complete).supersedes(&dataset(partial())));
        assert!(dataset(partial()).supersedes(&dataset(partial())));
        assert!(dataset(partial()).supersedes(&dataset(unavailable())));
        assert!(dataset(unavailable()).supersedes(&dataset(unavailable())));
    }
}
