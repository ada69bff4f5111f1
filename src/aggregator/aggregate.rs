use anyhow::{Result, anyhow};
use tracing::{error, info, warn};

use crate::aggregator::types::{Aggregate, DataStatus};
use crate::config::{DashboardConfig, RowPolicy};
use crate::parser::RideEvent;
use crate::reference::ReferenceTables;

/// Reduces a stream of ride rows into per-region, per-day statistics.
///
/// Each row lands in exactly one `(service area, date)` bucket, created the
/// first time that pair is seen. Rows that fail to parse, or whose area code
/// is not in the reference tables, are handled according to
/// `config.row_policy`: `FailFast` stops and marks the result
/// [`DataStatus::Partial`], `Skip` logs and counts them.
pub fn build_aggregate<I>(tables: &ReferenceTables, events: I, config: &DashboardConfig) -> Aggregate
where
    I: IntoIterator<Item = Result<RideEvent>>,
{
    let mut aggregate = Aggregate::default();

    for (i, event) in events.into_iter().enumerate() {
        let row = i + 1;
        aggregate.rows_read += 1;

        let applied = event.and_then(|event| apply(&mut aggregate, tables, &event, config));
        match applied {
            Ok(true) => {}
            Ok(false) => aggregate.hours_out_of_domain += 1,
            Err(e) => match config.row_policy {
                RowPolicy::FailFast => {
                    error!(row, error = %format!("{e:#}"), "Aborting history load");
                    aggregate.status = DataStatus::Partial {
                        row,
                        reason: format!("{e:#}"),
                    };
                    break;
                }
                RowPolicy::Skip => {
                    warn!(row, error = %format!("{e:#}"), "Skipping ride row");
                    aggregate.rows_skipped += 1;
                }
            },
        }
    }

    info!(
        rows = aggregate.rows_read,
        skipped = aggregate.rows_skipped,
        out_of_domain = aggregate.hours_out_of_domain,
        regions = aggregate.regions.len(),
        buckets = aggregate.bucket_count(),
        "Completed reading history data"
    );

    aggregate
}

fn apply(
    aggregate: &mut Aggregate,
    tables: &ReferenceTables,
    event: &RideEvent,
    config: &DashboardConfig,
) -> Result<bool> {
    let region = tables
        .service_areas
        .region(&event.area_code)
        .ok_or_else(|| anyhow!("unknown area code '{}'", event.area_code))?;
    let center = tables
        .area_centers
        .center(&event.area_code)
        .ok_or_else(|| anyhow!("no centre for area code '{}'", event.area_code))?;

    let bucket = aggregate.bucket_or_insert(region, event.date, center, config);
    Ok(bucket.record(event, config.track_travel_times))
}
