//! Per-bucket statistics for one service area on one day.
//!
//! A [`DailyStats`] is created the first time a `(service area, date)` pair is
//! seen and is then fed every ride row mapped to that pair.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use crate::config::{HourRange, WaitBins};
use crate::parser::{RideEvent, StationRef};
use crate::reference::GeoPoint;

/// Insertion-ordered map whose lookups never fail: missing keys are inserted
/// with `V::default()` on first access.
#[derive(Debug, Clone)]
pub struct Tally<K, V> {
    entries: Vec<(K, V)>,
    index: HashMap<K, usize>,
}

impl<K, V> Default for Tally<K, V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone, V: Default> Tally<K, V> {
    pub fn get_or_insert_default(&mut self, key: K) -> &mut V {
        let slot = match self.index.get(&key) {
            Some(&slot) => slot,
            None => {
                let slot = self.entries.len();
                self.index.insert(key.clone(), slot);
                self.entries.push((key, V::default()));
                slot
            }
        };
        &mut self.entries[slot].1
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: std::borrow::Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.index.get(key).map(|&slot| &self.entries[slot].1)
    }
}

impl<K, V> Tally<K, V> {
    /// Entries in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: PartialEq, V: PartialEq> PartialEq for Tally<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<K: Serialize, V: Serialize> Serialize for Tally<K, V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Identity of a stop inside a bucket: the same name at different recorded
/// coordinates counts as a different stop.
#[derive(Debug, Clone, Serialize)]
pub struct StationKey {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

impl PartialEq for StationKey {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.lat.to_bits() == other.lat.to_bits()
            && self.lon.to_bits() == other.lon.to_bits()
    }
}

impl Eq for StationKey {}

impl Hash for StationKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.lat.to_bits().hash(state);
        self.lon.to_bits().hash(state);
    }
}

impl From<&StationRef> for StationKey {
    fn from(station: &StationRef) -> Self {
        Self {
            name: station.name.clone(),
            lat: station.lat,
            lon: station.lon,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StationCounts {
    pub boarded: u64,
    pub alighted: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RiderTypeCounts {
    pub adult: u64,
    pub teen: u64,
    pub child: u64,
}

/// One slot per hour of a fixed [`HourRange`].
#[derive(Debug, Clone, PartialEq)]
pub struct HourlySeries<T> {
    first_hour: u32,
    slots: Vec<T>,
}

impl<T: Default + Clone> HourlySeries<T> {
    pub fn new(hours: HourRange) -> Self {
        Self {
            first_hour: hours.first,
            slots: vec![T::default(); hours.len()],
        }
    }
}

impl<T> HourlySeries<T> {
    fn slot(&self, hour: u32) -> Option<usize> {
        let slot = hour.checked_sub(self.first_hour)? as usize;
        (slot < self.slots.len()).then_some(slot)
    }

    pub fn get(&self, hour: u32) -> Option<&T> {
        self.slot(hour).map(|slot| &self.slots[slot])
    }

    pub fn get_mut(&mut self, hour: u32) -> Option<&mut T> {
        self.slot(hour).map(|slot| &mut self.slots[slot])
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        (self.first_hour..).zip(self.slots.iter())
    }
}

impl<T: Serialize> Serialize for HourlySeries<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.slots.len()))?;
        for (hour, value) in self.iter() {
            map.serialize_entry(&hour, value)?;
        }
        map.end()
    }
}

/// Waiting times split into half-open `[k*w, (k+1)*w)` bins up to `limit`,
/// plus a final `[limit, inf)` overflow bin.
#[derive(Debug, Clone, PartialEq)]
pub struct WaitHistogram {
    width: u32,
    limit: u32,
    bins: Vec<Vec<f64>>,
}

impl WaitHistogram {
    pub fn new(layout: WaitBins) -> Self {
        Self {
            width: layout.width_minutes.max(1),
            limit: layout.limit_minutes,
            bins: vec![Vec::new(); layout.count()],
        }
    }

    pub fn bin_index(&self, minutes: f64) -> usize {
        if minutes >= f64::from(self.limit) {
            return self.bins.len() - 1;
        }
        (minutes.max(0.0) / f64::from(self.width)).floor() as usize
    }

    pub fn label(&self, index: usize) -> String {
        if index + 1 >= self.bins.len() {
            format!("{}min+", self.limit)
        } else {
            let lower = index as u32 * self.width;
            format!("{}~{}min", lower, lower + self.width)
        }
    }

    pub fn record(&mut self, minutes: f64) {
        let index = self.bin_index(minutes);
        self.bins[index].push(minutes);
    }

    /// Durations that fell into the bin with the given label.
    pub fn bin(&self, label: &str) -> Option<&[f64]> {
        (0..self.bins.len())
            .find(|&i| self.label(i) == label)
            .map(|i| self.bins[i].as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (String, &[f64])> {
        self.bins
            .iter()
            .enumerate()
            .map(|(i, bin)| (self.label(i), bin.as_slice()))
    }

    pub fn counts(&self) -> Vec<usize> {
        self.bins.iter().map(Vec::len).collect()
    }

    pub fn total(&self) -> usize {
        self.bins.iter().map(Vec::len).sum()
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }
}

impl Serialize for WaitHistogram {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.bins.len()))?;
        for (label, bin) in self.iter() {
            map.serialize_entry(&label, bin)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyStats {
    pub center: GeoPoint,
    pub total_users: u64,
    pub wait_times: Vec<f64>,
    #[serde(serialize_with = "serialize_stations")]
    pub stations: Tally<StationKey, StationCounts>,
    pub od_pairs: Tally<String, u64>,
    pub outcome_counts: Tally<String, u64>,
    pub rider_types: RiderTypeCounts,
    pub call_methods: Tally<String, u64>,
    pub hourly_wait: HourlySeries<Vec<f64>>,
    pub hourly_travel: HourlySeries<Vec<f64>>,
    pub hourly_users: HourlySeries<u64>,
    pub wait_histogram: WaitHistogram,
}

impl DailyStats {
    pub fn new(center: GeoPoint, hours: HourRange, bins: WaitBins) -> Self {
        Self {
            center,
            total_users: 0,
            wait_times: Vec::new(),
            stations: Tally::default(),
            od_pairs: Tally::default(),
            outcome_counts: Tally::default(),
            rider_types: RiderTypeCounts::default(),
            call_methods: Tally::default(),
            hourly_wait: HourlySeries::new(hours),
            hourly_travel: HourlySeries::new(hours),
            hourly_users: HourlySeries::new(hours),
            wait_histogram: WaitHistogram::new(bins),
        }
    }

    /// Folds one ride into the bucket.
    ///
    /// Returns `false` when the ride was completed but its pickup hour is
    /// missing or outside the hourly domain; such a ride counts everywhere
    /// except the hourly breakdowns.
    pub fn record(&mut self, event: &RideEvent, track_travel: bool) -> bool {
        let origin = StationKey::from(&event.origin);
        let destination = StationKey::from(&event.destination);
        let od = event.od_label();

        self.stations.get_or_insert_default(origin.clone());
        self.stations.get_or_insert_default(destination.clone());
        self.od_pairs.get_or_insert_default(od.clone());

        *self
            .outcome_counts
            .get_or_insert_default(event.outcome.label().to_string()) += 1;
        *self
            .call_methods
            .get_or_insert_default(event.call_method.clone()) += 1;

        if !event.outcome.is_completed() {
            return true;
        }

        let riders = event.riders();
        self.total_users += riders;
        if let Some(wait) = event.waiting_minutes {
            self.wait_times.push(wait);
        }

        self.rider_types.adult += u64::from(event.adults);
        self.rider_types.teen += u64::from(event.teens);
        self.rider_types.child += u64::from(event.children);

        let in_domain = match event.pickup_hour {
            Some(hour) => self.record_hourly(hour, event, riders, track_travel),
            None => false,
        };

        self.stations.get_or_insert_default(origin).boarded += riders;
        self.stations.get_or_insert_default(destination).alighted += riders;

        if let Some(wait) = event.waiting_minutes {
            self.wait_histogram.record(wait);
        }

        *self.od_pairs.get_or_insert_default(od) += riders;

        in_domain
    }

    fn record_hourly(&mut self, hour: u32, event: &RideEvent, riders: u64, track_travel: bool) -> bool {
        let Some(users) = self.hourly_users.get_mut(hour) else {
            return false;
        };
        *users += riders;

        if let (Some(wait), Some(slot)) = (event.waiting_minutes, self.hourly_wait.get_mut(hour)) {
            slot.push(wait);
        }
        if track_travel {
            if let (Some(travel), Some(slot)) =
                (event.travel_minutes, self.hourly_travel.get_mut(hour))
            {
                slot.push(travel);
            }
        }
        true
    }

    /// Number of ride requests seen, whatever their outcome.
    pub fn calls(&self) -> u64 {
        self.outcome_counts.iter().map(|(_, n)| n).sum()
    }
}

fn serialize_stations<S: Serializer>(
    stations: &Tally<StationKey, StationCounts>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    #[derive(Serialize)]
    struct Entry<'a> {
        #[serde(flatten)]
        station: &'a StationKey,
        #[serde(flatten)]
        counts: &'a StationCounts,
    }

    let mut seq = serializer.serialize_seq(Some(stations.len()))?;
    for (station, counts) in stations.iter() {
        seq.serialize_element(&Entry { station, counts })?;
    }
    seq.end()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Outcome;
    use chrono::NaiveDate;

    fn center() -> GeoPoint {
        GeoPoint {
            lat: 36.62,
            lon: 127.32,
        }
    }

    fn event(outcome: Outcome, riders: u32, pickup: Option<u32>, wait: Option<f64>) -> RideEvent {
        RideEvent {
            area_code: "A01".to_string(),
            total_rides: 1,
            adults: riders,
            teens: 0,
            children: 0,
            outcome,
            date: NaiveDate::from_ymd_opt(2024, 11, 1).unwrap(),
            call_method: "앱".to_string(),
            call_hour: pickup,
            pickup_hour: pickup,
            dropoff_hour: pickup,
            waiting_minutes: wait,
            travel_minutes: Some(10.0),
            origin: StationRef {
                name: "오송역".to_string(),
                lat: 36.62,
                lon: 127.32,
            },
            destination: StationRef {
                name: "마을회관".to_string(),
                lat: 36.63,
                lon: 127.33,
            },
        }
    }

    fn stats() -> DailyStats {
        DailyStats::new(center(), HourRange::default(), WaitBins::default())
    }

    #[test]
    fn test_tally_keeps_insertion_order() {
        let mut tally: Tally<String, u64> = Tally::default();
        *tally.get_or_insert_default("b".to_string()) += 2;
        *tally.get_or_insert_default("a".to_string()) += 1;
        *tally.get_or_insert_default("b".to_string()) += 1;
        let entries: Vec<_> = tally.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        assert_eq!(entries, vec![("b", 3), ("a", 1)]);
        assert_eq!(tally.get("a"), Some(&1));
        assert_eq!(tally.get("c"), None);
    }

    #[test]
    fn test_histogram_edges_are_half_open() {
        let hist = WaitHistogram::new(WaitBins::default());
        assert_eq!(hist.len(), 13);
        assert_eq!(hist.bin_index(0.0), 0);
        assert_eq!(hist.bin_index(4.99), 0);
        assert_eq!(hist.bin_index(5.0), 1);
        assert_eq!(hist.bin_index(59.9), 11);
        assert_eq!(hist.bin_index(60.0), 12);
        assert_eq!(hist.bin_index(240.0), 12);
        assert_eq!(hist.label(0), "0~5min");
        assert_eq!(hist.label(1), "5~10min");
        assert_eq!(hist.label(12), "60min+");
    }

    #[test]
    fn test_hourly_series_domain() {
        let mut series: HourlySeries<u64> = HourlySeries::new(HourRange::default());
        assert!(series.get_mut(5).is_none());
        assert!(series.get_mut(22).is_none());
        *series.get_mut(21).unwrap() += 3;
        assert_eq!(series.get(21), Some(&3));
        let hours: Vec<u32> = series.iter().map(|(h, _)| h).collect();
        assert_eq!(hours.first(), Some(&6));
        assert_eq!(hours.last(), Some(&21));
    }

    #[test]
    fn test_completed_ride_accumulates_everywhere() {
        let mut s = stats();
        assert!(s.record(&event(Outcome::Completed, 2, Some(7), Some(5.5)), true));

        assert_eq!(s.total_users, 2);
        assert_eq!(s.wait_times, vec![5.5]);
        assert_eq!(s.rider_types.adult, 2);
        assert_eq!(s.hourly_users.get(7), Some(&2));
        assert_eq!(s.hourly_wait.get(7), Some(&vec![5.5]));
        assert_eq!(s.hourly_travel.get(7), Some(&vec![10.0]));
        assert_eq!(s.wait_histogram.bin("5~10min"), Some(&[5.5][..]));
        assert_eq!(s.od_pairs.get("오송역-마을회관"), Some(&2));
        let boarded: u64 = s.stations.iter().map(|(_, c)| c.boarded).sum();
        let alighted: u64 = s.stations.iter().map(|(_, c)| c.alighted).sum();
        assert_eq!((boarded, alighted), (2, 2));
    }

    #[test]
    fn test_no_show_only_counts_outcome_and_stations() {
        let mut s = stats();
        s.record(&event(Outcome::NoShow, 3, Some(7), None), true);

        assert_eq!(s.total_users, 0);
        assert_eq!(s.outcome_counts.get("no-show"), Some(&1));
        assert_eq!(s.call_methods.get("앱"), Some(&1));
        assert_eq!(s.stations.len(), 2);
        assert!(s.stations.iter().all(|(_, c)| c.boarded == 0 && c.alighted == 0));
        assert_eq!(s.od_pairs.get("오송역-마을회관"), Some(&0));
        assert_eq!(s.wait_histogram.total(), 0);
    }

    #[test]
    fn test_pickup_outside_domain_skips_hourly_only() {
        let mut s = stats();
        assert!(!s.record(&event(Outcome::Completed, 1, Some(23), Some(3.0)), true));

        assert_eq!(s.total_users, 1);
        assert_eq!(s.outcome_counts.get("completed"), Some(&1));
        assert!(s.hourly_users.iter().all(|(_, n)| *n == 0));
        assert!(s.hourly_wait.iter().all(|(_, w)| w.is_empty()));
        assert_eq!(s.wait_histogram.total(), 1);
    }

    #[test]
    fn test_travel_tracking_can_be_disabled() {
        let mut s = stats();
        s.record(&event(Outcome::Completed, 1, Some(9), Some(3.0)), false);
        assert!(s.hourly_travel.iter().all(|(_, t)| t.is_empty()));
        assert_eq!(s.hourly_wait.get(9), Some(&vec![3.0]));
    }

    #[test]
    fn test_same_name_different_coordinates_are_distinct() {
        let mut s = stats();
        let mut other = event(Outcome::Completed, 1, Some(9), Some(3.0));
        other.origin.lat = 36.7;
        s.record(&event(Outcome::Completed, 1, Some(9), Some(3.0)), true);
        s.record(&other, true);
        assert_eq!(s.stations.len(), 3);
    }

    #[test]
    fn test_serializes_to_json() {
        let mut s = stats();
        s.record(&event(Outcome::Completed, 2, Some(7), Some(5.5)), true);
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["total_users"], 2);
        assert_eq!(json["stations"][0]["name"], "오송역");
        assert_eq!(json["stations"][0]["boarded"], 2);
        assert_eq!(json["hourly_users"]["7"], 2);
        assert_eq!(json["wait_histogram"]["5~10min"][0], 5.5);
    }
}
