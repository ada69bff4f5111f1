//! Read-only views over a [`DailyStats`] bucket, shaped for the dashboard widgets.

use chrono::NaiveDate;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::aggregator::utility::{mean, pct, round1};
use crate::config::DashboardConfig;
use crate::reference::{StationKind, StationTypes};
use crate::stats::{DailyStats, HourlySeries, StationCounts, Tally, WaitHistogram};
use crate::style::{StylePolicy, ZoneKind, ZoneStyle};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedStation {
    pub rank: usize,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedPair {
    pub rank: usize,
    pub label: String,
    pub count: u64,
}

/// Busiest stations by riders boarding. Ties keep first-seen order.
pub fn top_stations_by_boarded(stats: &DailyStats, n: usize) -> Vec<RankedStation> {
    top_stations(stats, n, |c| c.boarded)
}

/// Busiest stations by riders alighting. Ties keep first-seen order.
pub fn top_stations_by_alighted(stats: &DailyStats, n: usize) -> Vec<RankedStation> {
    top_stations(stats, n, |c| c.alighted)
}

fn top_stations(
    stats: &DailyStats,
    n: usize,
    key: impl Fn(&StationCounts) -> u64,
) -> Vec<RankedStation> {
    let mut stations: Vec<_> = stats.stations.iter().collect();
    stations.sort_by(|a, b| key(b.1).cmp(&key(a.1)));
    stations
        .into_iter()
        .take(n)
        .enumerate()
        .map(|(i, (station, counts))| RankedStation {
            rank: i + 1,
            name: station.name.clone(),
            lat: station.lat,
            lon: station.lon,
            count: key(counts),
        })
        .collect()
}

pub fn top_od_pairs(stats: &DailyStats, n: usize) -> Vec<RankedPair> {
    let mut pairs: Vec<_> = stats.od_pairs.iter().collect();
    pairs.sort_by(|a, b| b.1.cmp(a.1));
    pairs
        .into_iter()
        .take(n)
        .enumerate()
        .map(|(i, (label, count))| RankedPair {
            rank: i + 1,
            label: label.clone(),
            count: *count,
        })
        .collect()
}

/// Mean per hour of the domain, 0.0 for hours without data, one decimal.
pub fn hourly_average(series: &HourlySeries<Vec<f64>>) -> Vec<(u32, f64)> {
    series
        .iter()
        .map(|(hour, values)| (hour, round1(mean(values))))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyPoint {
    pub hour: u32,
    pub avg_wait: f64,
    pub avg_travel: f64,
    pub users: u64,
}

/// The time-of-day chart: average wait, average travel and riders per pickup hour.
pub fn hourly_profile(stats: &DailyStats) -> Vec<HourlyPoint> {
    let waits = hourly_average(&stats.hourly_wait);
    let travels = hourly_average(&stats.hourly_travel);
    waits
        .into_iter()
        .zip(travels)
        .zip(stats.hourly_users.iter())
        .map(|(((hour, avg_wait), (_, avg_travel)), (_, users))| HourlyPoint {
            hour,
            avg_wait,
            avg_travel,
            users: *users,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Share {
    pub label: String,
    pub count: u64,
    pub percent: f64,
}

/// Share of waits in each histogram bin, one decimal. All zeros when the
/// bucket has no completed rides with a recorded wait.
pub fn histogram_percentages(histogram: &WaitHistogram) -> Vec<Share> {
    let total = histogram.total() as u64;
    histogram
        .iter()
        .map(|(label, bin)| Share {
            label,
            count: bin.len() as u64,
            percent: round1(pct(bin.len() as u64, total)),
        })
        .collect()
}

/// Pie-chart slices of a counter, in first-seen order.
pub fn shares(tally: &Tally<String, u64>) -> Vec<Share> {
    let total: u64 = tally.iter().map(|(_, n)| n).sum();
    tally
        .iter()
        .map(|(label, count)| Share {
            label: label.clone(),
            count: *count,
            percent: round1(pct(*count, total)),
        })
        .collect()
}

pub fn rider_type_shares(stats: &DailyStats) -> Vec<Share> {
    let counts = stats.rider_types;
    let total = counts.adult + counts.teen + counts.child;
    [("adult", counts.adult), ("teen", counts.teen), ("child", counts.child)]
        .into_iter()
        .map(|(label, count)| Share {
            label: label.to_string(),
            count,
            percent: round1(pct(count, total)),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationMarker {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub boarded: u64,
    pub alighted: u64,
    pub kind: StationKind,
    pub color: String,
    pub radius_m: f64,
}

/// One map circle per station, sized by total activity and coloured by station type.
pub fn station_markers(
    stats: &DailyStats,
    types: &StationTypes,
    policy: &StylePolicy,
) -> Vec<StationMarker> {
    stats
        .stations
        .iter()
        .map(|(station, counts)| {
            let kind = types.kind(&station.name);
            StationMarker {
                name: station.name.clone(),
                lat: station.lat,
                lon: station.lon,
                boarded: counts.boarded,
                alighted: counts.alighted,
                kind,
                color: policy.station_color(kind).to_string(),
                radius_m: (counts.boarded + counts.alighted) as f64 * policy.radius_per_rider,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneLayer {
    pub kind: ZoneKind,
    pub name: &'static str,
    pub path: PathBuf,
    pub style: ZoneStyle,
}

/// The zone shapefiles a region would be drawn with.
pub fn zone_layers(region: &str, shp_dir: &Path, policy: &StylePolicy) -> Vec<ZoneLayer> {
    ZoneKind::ALL
        .into_iter()
        .map(|kind| ZoneLayer {
            kind,
            name: kind.layer_name(),
            path: shp_dir.join(format!("{region}_{}.shp", kind.file_suffix())),
            style: policy.zone_style(kind),
        })
        .collect()
}

/// [`zone_layers`] without the layers whose shapefile is missing.
pub fn available_zone_layers(region: &str, shp_dir: &Path, policy: &StylePolicy) -> Vec<ZoneLayer> {
    zone_layers(region, shp_dir, policy)
        .into_iter()
        .filter(|layer| {
            let exists = layer.path.exists();
            if !exists {
                warn!(path = %layer.path.display(), layer = layer.name, "Zone shapefile not found, omitting layer");
            }
            exists
        })
        .collect()
}

/// Everything the dashboard shows for one region on one day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketSummary {
    pub region: String,
    pub date: NaiveDate,
    pub total_users: u64,
    pub calls: u64,
    pub avg_wait: f64,
    pub outcomes: Vec<Share>,
    pub rider_types: Vec<Share>,
    pub call_methods: Vec<Share>,
    pub top_boarded: Vec<RankedStation>,
    pub top_alighted: Vec<RankedStation>,
    pub top_od_pairs: Vec<RankedPair>,
    pub hourly: Vec<HourlyPoint>,
    pub wait_distribution: Vec<Share>,
}

pub fn summarize(
    region: &str,
    date: NaiveDate,
    stats: &DailyStats,
    config: &DashboardConfig,
) -> BucketSummary {
    BucketSummary {
        region: region.to_string(),
        date,
        total_users: stats.total_users,
        calls: stats.calls(),
        avg_wait: round1(mean(&stats.wait_times)),
        outcomes: shares(&stats.outcome_counts),
        rider_types: rider_type_shares(stats),
        call_methods: shares(&stats.call_methods),
        top_boarded: top_stations_by_boarded(stats, config.top_n),
        top_alighted: top_stations_by_alighted(stats, config.top_n),
        top_od_pairs: top_od_pairs(stats, config.top_n),
        hourly: hourly_profile(stats),
        wait_distribution: histogram_percentages(&stats.wait_histogram),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HourRange, WaitBins};
    use crate::parser::{Outcome, RideEvent, StationRef};
    use crate::reference::GeoPoint;

    fn station(name: &str, lat: f64) -> StationRef {
        StationRef {
            name: name.to_string(),
            lat,
            lon: 127.0,
        }
    }

    fn completed(from: &str, to: &str, riders: u32, hour: u32, wait: f64) -> RideEvent {
        RideEvent {
            area_code: "A01".to_string(),
            total_rides: 1,
            adults: riders,
            teens: 0,
            children: 0,
            outcome: Outcome::Completed,
            date: NaiveDate::from_ymd_opt(2024, 11, 1).unwrap(),
            call_method: "앱".to_string(),
            call_hour: Some(hour),
            pickup_hour: Some(hour),
            dropoff_hour: Some(hour),
            waiting_minutes: Some(wait),
            travel_minutes: Some(wait * 2.0),
            origin: station(from, 36.0),
            destination: station(to, 36.1),
        }
    }

    fn bucket(events: &[RideEvent]) -> DailyStats {
        let mut stats = DailyStats::new(
            GeoPoint {
                lat: 36.6,
                lon: 127.3,
            },
            HourRange::default(),
            WaitBins::default(),
        );
        for event in events {
            stats.record(event, true);
        }
        stats
    }

    #[test]
    fn test_top_stations_fewer_than_n() {
        let stats = bucket(&[completed("A", "B", 2, 8, 3.0)]);
        let top = top_stations_by_boarded(&stats, 5);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].name, "A");
        assert_eq!(top[0].count, 2);
        assert_eq!(top[1].count, 0);
    }

    #[test]
    fn test_top_stations_ties_keep_first_seen_order() {
        let stats = bucket(&[
            completed("C", "A", 1, 8, 3.0),
            completed("B", "A", 1, 8, 3.0),
            completed("D", "A", 4, 8, 3.0),
        ]);
        let names: Vec<_> = top_stations_by_boarded(&stats, 3)
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["D", "C", "B"]);

        let alighted = top_stations_by_alighted(&stats, 1);
        assert_eq!(alighted[0].name, "A");
        assert_eq!(alighted[0].count, 6);
        assert_eq!(alighted[0].rank, 1);
    }

    #[test]
    fn test_top_od_pairs() {
        let stats = bucket(&[
            completed("A", "B", 1, 8, 3.0),
            completed("B", "A", 3, 8, 3.0),
            completed("A", "B", 1, 8, 3.0),
        ]);
        let top = top_od_pairs(&stats, 5);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].label, "B-A");
        assert_eq!(top[0].count, 3);
        assert_eq!(top[1].label, "A-B");
        assert_eq!(top[1].count, 2);
    }

    #[test]
    fn test_hourly_profile() {
        let stats = bucket(&[
            completed("A", "B", 1, 8, 3.0),
            completed("A", "B", 2, 8, 4.0),
        ]);
        let profile = hourly_profile(&stats);
        assert_eq!(profile.len(), 16);
        let eight = profile.iter().find(|p| p.hour == 8).unwrap();
        assert_eq!(eight.avg_wait, 3.5);
        assert_eq!(eight.avg_travel, 7.0);
        assert_eq!(eight.users, 3);
        let nine = profile.iter().find(|p| p.hour == 9).unwrap();
        assert_eq!((nine.avg_wait, nine.users), (0.0, 0));
    }

    #[test]
    fn test_histogram_percentages_empty_bucket() {
        let stats = bucket(&[]);
        let shares = histogram_percentages(&stats.wait_histogram);
        assert_eq!(shares.len(), 13);
        assert!(shares.iter().all(|s| s.percent == 0.0 && s.count == 0));
    }

    #[test]
    fn test_histogram_percentages() {
        let stats = bucket(&[
            completed("A", "B", 1, 8, 1.0),
            completed("A", "B", 1, 8, 6.0),
            completed("A", "B", 1, 8, 7.0),
        ]);
        let shares = histogram_percentages(&stats.wait_histogram);
        assert_eq!(shares[0].percent, 33.3);
        assert_eq!(shares[1].label, "5~10min");
        assert_eq!(shares[1].percent, 66.7);
    }

    #[test]
    fn test_station_markers() {
        let stats = bucket(&[completed("A", "[가상]B", 2, 8, 1.0)]);
        let types: StationTypes = [("[가상]B".to_string(), StationKind::Virtual)]
            .into_iter()
            .collect();
        let markers = station_markers(&stats, &types, &StylePolicy::default());
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0].color, "blue");
        assert_eq!(markers[0].radius_m, 20.0);
        assert_eq!(markers[1].kind, StationKind::Virtual);
        assert_eq!(markers[1].color, "red");
    }

    #[test]
    fn test_zone_layers_paths() {
        let dir = std::env::temp_dir().join("drt_dashboard_zone_layers");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("청주_오송_레드존.shp"), b"").unwrap();

        let policy = StylePolicy::default();
        let all = zone_layers("청주_오송", &dir, &policy);
        assert_eq!(all.len(), 2);
        assert!(all.iter().any(|l| l.path.ends_with("청주_오송_그린존만.shp")));

        let available = available_zone_layers("청주_오송", &dir, &policy);
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].kind, ZoneKind::Red);
        assert_eq!(available[0].style.color, "red");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_summarize() {
        let stats = bucket(&[completed("A", "B", 2, 8, 5.5)]);
        let config = DashboardConfig::default();
        let date = NaiveDate::from_ymd_opt(2024, 11, 1).unwrap();
        let summary = summarize("X", date, &stats, &config);
        assert_eq!(summary.total_users, 2);
        assert_eq!(summary.calls, 1);
        assert_eq!(summary.avg_wait, 5.5);
        assert_eq!(summary.outcomes[0].label, "completed");
        assert_eq!(summary.outcomes[0].percent, 100.0);
        assert_eq!(summary.rider_types[0].count, 2);
    }
}
