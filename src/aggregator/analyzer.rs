use tracing::{error, info};

use crate::aggregator::aggregate::build_aggregate;
use crate::aggregator::types::{Aggregate, Dataset};
use crate::config::DashboardConfig;
use crate::fetch::{HttpClient, Source};
use crate::parser::{decode, ride_events};
use crate::reference::{ReferenceTables, SourceStatus, load_reference_tables};

/// Loads the reference tables, then reads the ride history once and reduces it.
///
/// Never fails: a missing or unreadable history file yields an aggregate whose
/// status is [`crate::aggregator::types::DataStatus::Unavailable`].
#[tracing::instrument(skip_all)]
pub async fn load_dataset<C: HttpClient>(client: &C, config: &DashboardConfig) -> Dataset {
    let tables = load_reference_tables(client, config).await;
    let (history_status, aggregate) = load_history(client, config, &tables).await;

    Dataset {
        tables,
        history_status,
        aggregate,
    }
}

async fn load_history<C: HttpClient>(
    client: &C,
    config: &DashboardConfig,
    tables: &ReferenceTables,
) -> (SourceStatus, Aggregate) {
    let source = Source::parse(&config.source_location(&config.history_file));
    info!(source = %source, "Reading history data");

    let bytes = match source.load(client).await {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            error!(source = %source, "History file not found");
            return (
                SourceStatus::Missing,
                Aggregate::unavailable(format!("{source} not found")),
            );
        }
        Err(e) => {
            let reason = format!("{e:#}");
            error!(source = %source, error = %reason, "Failed to read history file");
            return (
                SourceStatus::Failed {
                    reason: reason.clone(),
                },
                Aggregate::unavailable(reason),
            );
        }
    };

    let text = match decode(&bytes, &config.encoding) {
        Ok(text) => text,
        Err(e) => {
            let reason = format!("{e:#}");
            error!(source = %source, error = %reason, "Failed to decode history file");
            return (
                SourceStatus::Failed {
                    reason: reason.clone(),
                },
                Aggregate::unavailable(reason),
            );
        }
    };

    let aggregate = build_aggregate(tables, ride_events(&text, config.has_headers), config);
    let status = SourceStatus::Loaded {
        rows: aggregate.rows_read,
    };
    (status, aggregate)
}
