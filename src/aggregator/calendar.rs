//! Weekday / holiday split of daily ridership.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

use crate::aggregator::types::Aggregate;
use crate::aggregator::utility::round1;
use crate::config::DashboardConfig;

/// Korean public holidays, substitute days and election days included.
/// Every year that appears here is listed in full.
static KR_PUBLIC_HOLIDAYS: &[(i32, u32, u32)] = &[
    (2024, 1, 1),
    (2024, 2, 9),
    (2024, 2, 10),
    (2024, 2, 11),
    (2024, 2, 12),
    (2024, 3, 1),
    (2024, 4, 10),
    (2024, 5, 5),
    (2024, 5, 6),
    (2024, 5, 15),
    (2024, 6, 6),
    (2024, 8, 15),
    (2024, 9, 16),
    (2024, 9, 17),
    (2024, 9, 18),
    (2024, 10, 1),
    (2024, 10, 3),
    (2024, 10, 9),
    (2024, 12, 25),
    (2025, 1, 1),
    (2025, 1, 27),
    (2025, 1, 28),
    (2025, 1, 29),
    (2025, 1, 30),
    (2025, 3, 1),
    (2025, 3, 3),
    (2025, 5, 5),
    (2025, 5, 6),
    (2025, 6, 3),
    (2025, 6, 6),
    (2025, 8, 15),
    (2025, 10, 3),
    (2025, 10, 5),
    (2025, 10, 6),
    (2025, 10, 7),
    (2025, 10, 8),
    (2025, 10, 9),
    (2025, 12, 25),
    (2026, 1, 1),
    (2026, 2, 16),
    (2026, 2, 17),
    (2026, 2, 18),
    (2026, 3, 1),
    (2026, 3, 2),
    (2026, 5, 5),
    (2026, 5, 24),
    (2026, 5, 25),
    (2026, 6, 3),
    (2026, 6, 6),
    (2026, 8, 15),
    (2026, 8, 17),
    (2026, 9, 24),
    (2026, 9, 25),
    (2026, 9, 26),
    (2026, 10, 3),
    (2026, 10, 5),
    (2026, 10, 9),
    (2026, 12, 25),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DayType {
    Weekday,
    Holiday,
    /// A date in a year the calendar has no holiday list for.
    Unknown,
}

/// Holiday lookup over a fixed set of years.
///
/// Dates in years without a holiday list are [`DayType::Unknown`] rather than
/// guessed, except weekends when those count as holidays.
#[derive(Debug, Clone, PartialEq)]
pub struct HolidayCalendar {
    holidays: BTreeSet<NaiveDate>,
    years: BTreeSet<i32>,
    weekends_are_holidays: bool,
}

impl HolidayCalendar {
    /// Calendar covering exactly the years that appear in `holidays`.
    pub fn new(holidays: impl IntoIterator<Item = NaiveDate>, weekends_are_holidays: bool) -> Self {
        let holidays: BTreeSet<NaiveDate> = holidays.into_iter().collect();
        let years = holidays.iter().map(Datelike::year).collect();
        Self {
            holidays,
            years,
            weekends_are_holidays,
        }
    }

    /// Built-in Korean calendar with weekends counted as holidays.
    pub fn korea() -> Self {
        Self::new(
            KR_PUBLIC_HOLIDAYS
                .iter()
                .filter_map(|&(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            true,
        )
    }

    /// The Korean calendar plus `extra_holidays`. A year named in
    /// `extra_holidays` counts as covered, so its list should be complete.
    pub fn from_config(config: &DashboardConfig) -> Self {
        let mut calendar = Self::korea();
        calendar.weekends_are_holidays = config.weekends_are_holidays;
        for &date in &config.extra_holidays {
            calendar.holidays.insert(date);
            calendar.years.insert(date.year());
        }
        calendar
    }

    pub fn covers(&self, year: i32) -> bool {
        self.years.contains(&year)
    }

    pub fn day_type(&self, date: NaiveDate) -> DayType {
        if self.holidays.contains(&date) {
            return DayType::Holiday;
        }
        if self.weekends_are_holidays && matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            return DayType::Holiday;
        }
        if self.covers(date.year()) {
            DayType::Weekday
        } else {
            DayType::Unknown
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DayTypeTotals {
    pub days: usize,
    pub total_users: u64,
    pub calls: u64,
    pub avg_users: f64,
    pub avg_calls: f64,
}

impl DayTypeTotals {
    fn add(&mut self, users: u64, calls: u64) {
        self.days += 1;
        self.total_users += users;
        self.calls += calls;
    }

    fn finish(&mut self) {
        if self.days > 0 {
            self.avg_users = round1(self.total_users as f64 / self.days as f64);
            self.avg_calls = round1(self.calls as f64 / self.days as f64);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DayTypeSplit {
    pub weekday: DayTypeTotals,
    pub holiday: DayTypeTotals,
    /// Buckets the calendar could not classify; left out of both averages.
    pub unclassified: Vec<NaiveDate>,
}

/// Per region, riders and calls summed over weekday buckets and holiday
/// buckets separately, then averaged per day.
pub fn day_type_split(
    aggregate: &Aggregate,
    calendar: &HolidayCalendar,
) -> BTreeMap<String, DayTypeSplit> {
    let mut split: BTreeMap<String, DayTypeSplit> = BTreeMap::new();

    for (region, date, stats) in aggregate.buckets() {
        let entry = split.entry(region.to_string()).or_default();
        let totals = match calendar.day_type(date) {
            DayType::Weekday => &mut entry.weekday,
            DayType::Holiday => &mut entry.holiday,
            DayType::Unknown => {
                warn!(region, %date, "No holiday list for this year, leaving day out of the split");
                entry.unclassified.push(date);
                continue;
            }
        };
        totals.add(stats.total_users, stats.calls());
    }

    for entry in split.values_mut() {
        entry.weekday.finish();
        entry.holiday.finish();
    }
    split
}
