//! Ride-history aggregation and the views derived from it.
//!
//! [`aggregate::build_aggregate`] reduces the ride rows into per-region,
//! per-day [`crate::stats::DailyStats`] buckets; [`analyzer::load_dataset`]
//! wires it to the input files; [`views`] and [`calendar`] read the result.

pub mod aggregate;
pub mod analyzer;
pub mod calendar;
pub mod snapshot;
pub mod types;
pub mod utility;
pub mod views;
