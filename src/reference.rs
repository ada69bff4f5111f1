//! Reference tables: station types, service areas and area centres.
//!
//! Each table is loaded independently. A missing or unreadable file is logged
//! and leaves that table empty; it never stops the other tables from loading.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{error, info};

use crate::config::DashboardConfig;
use crate::fetch::{HttpClient, Source};
use crate::parser::{decode, field, records};

mod col {
    pub const STATION_NAME: usize = 5;
    pub const STATION_TYPE: usize = 12;

    pub const AREA_CODE: usize = 0;
    pub const AREA_NAME: usize = 1;
    pub const AREA_LON: usize = 2;
    pub const AREA_LAT: usize = 3;
}

/// Kind of stop. Stations absent from the type table are `Unspecified`,
/// which the map treats like an existing stop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StationKind {
    #[default]
    Unspecified,
    Existing,
    Virtual,
}

impl StationKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim() {
            "가상정류장" | "virtual" => StationKind::Virtual,
            "기존정류장" | "existing" => StationKind::Existing,
            _ => StationKind::Unspecified,
        }
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self, StationKind::Virtual)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationTypes(HashMap<String, StationKind>);

impl StationTypes {
    /// Station file: column 5 is the station name, column 12 its type tag.
    pub fn parse(text: &str, has_headers: bool) -> Result<Self> {
        let mut types = HashMap::new();
        for (i, record) in records(text, has_headers).enumerate() {
            let record = record.with_context(|| format!("station row {}", i + 1))?;
            let name = field(&record, col::STATION_NAME, "station name")?;
            let tag = field(&record, col::STATION_TYPE, "station type")?;
            types.insert(name.to_string(), StationKind::from_tag(tag));
        }
        Ok(Self(types))
    }

    pub fn kind(&self, station: &str) -> StationKind {
        self.0.get(station).copied().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, StationKind)> for StationTypes {
    fn from_iter<I: IntoIterator<Item = (String, StationKind)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Raw area code to service-area name. Several codes may share one name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceAreas(HashMap<String, String>);

impl ServiceAreas {
    pub fn region(&self, area_code: &str) -> Option<&str> {
        self.0.get(area_code).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AreaCenters(HashMap<String, GeoPoint>);

impl AreaCenters {
    pub fn center(&self, area_code: &str) -> Option<GeoPoint> {
        self.0.get(area_code).copied()
    }
}

/// Service-area file: code, name, then the centre as longitude, latitude.
pub fn parse_service_areas(text: &str, has_headers: bool) -> Result<(ServiceAreas, AreaCenters)> {
    let mut areas = HashMap::new();
    let mut centers = HashMap::new();
    for (i, record) in records(text, has_headers).enumerate() {
        let record = record.with_context(|| format!("service area row {}", i + 1))?;
        let code = field(&record, col::AREA_CODE, "area code")?.to_string();
        let name = field(&record, col::AREA_NAME, "service area")?.to_string();
        let lon = field(&record, col::AREA_LON, "centre longitude")?;
        let lat = field(&record, col::AREA_LAT, "centre latitude")?;
        let center = GeoPoint {
            lat: lat
                .trim()
                .parse()
                .with_context(|| format!("area {code}: invalid latitude '{lat}'"))?,
            lon: lon
                .trim()
                .parse()
                .with_context(|| format!("area {code}: invalid longitude '{lon}'"))?,
        };
        centers.insert(code.clone(), center);
        areas.insert(code, name);
    }
    Ok((ServiceAreas(areas), AreaCenters(centers)))
}

/// Outcome of loading one input file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceStatus {
    Loaded { rows: usize },
    Missing,
    Failed { reason: String },
}

impl SourceStatus {
    pub fn is_loaded(&self) -> bool {
        matches!(self, SourceStatus::Loaded { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceTables {
    pub station_types: StationTypes,
    pub service_areas: ServiceAreas,
    pub area_centers: AreaCenters,
    pub station_status: SourceStatus,
    pub area_status: SourceStatus,
}

impl ReferenceTables {
    /// Tables built directly from parsed contents, marked as loaded.
    pub fn new(
        station_types: StationTypes,
        service_areas: ServiceAreas,
        area_centers: AreaCenters,
    ) -> Self {
        let station_rows = station_types.len();
        let area_rows = service_areas.len();
        Self {
            station_types,
            service_areas,
            area_centers,
            station_status: SourceStatus::Loaded { rows: station_rows },
            area_status: SourceStatus::Loaded { rows: area_rows },
        }
    }
}

/// Loads all three reference tables from the locations named in `config`.
#[tracing::instrument(skip(client, config))]
pub async fn load_reference_tables<C: HttpClient>(
    client: &C,
    config: &DashboardConfig,
) -> ReferenceTables {
    let (station_types, station_status) = load_table(
        client,
        &config.source_location(&config.station_file),
        config,
        "station types",
        |text, has_headers| {
            let types = StationTypes::parse(text, has_headers)?;
            let rows = types.len();
            Ok((types, rows))
        },
    )
    .await;

    let ((service_areas, area_centers), area_status) = load_table(
        client,
        &config.source_location(&config.area_file),
        config,
        "service areas",
        |text, has_headers| {
            let parsed = parse_service_areas(text, has_headers)?;
            let rows = parsed.0.len();
            Ok((parsed, rows))
        },
    )
    .await;

    ReferenceTables {
        station_types,
        service_areas,
        area_centers,
        station_status,
        area_status,
    }
}

async fn load_table<C, T, F>(
    client: &C,
    location: &str,
    config: &DashboardConfig,
    table: &str,
    parse: F,
) -> (T, SourceStatus)
where
    C: HttpClient,
    T: Default,
    F: FnOnce(&str, bool) -> Result<(T, usize)>,
{
    let source = Source::parse(location);
    let bytes = match source.load(client).await {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            error!(source = %source, table, "Reference file not found");
            return (T::default(), SourceStatus::Missing);
        }
        Err(e) => {
            error!(source = %source, table, error = %format!("{e:#}"), "Failed to read reference file");
            return (
                T::default(),
                SourceStatus::Failed {
                    reason: format!("{e:#}"),
                },
            );
        }
    };

    let parsed = decode(&bytes, &config.encoding).and_then(|text| parse(&text, config.has_headers));
    match parsed {
        Ok((contents, rows)) => {
            info!(source = %source, table, rows, "Reference table loaded");
            (contents, SourceStatus::Loaded { rows })
        }
        Err(e) => {
            error!(source = %source, table, error = %format!("{e:#}"), "Failed to parse reference file");
            (
                T::default(),
                SourceStatus::Failed {
                    reason: format!("{e:#}"),
                },
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::BasicClient;
    use crate::fetch::tests::CannedClient;
    use std::path::PathBuf;

    const STATIONS: &str = "\
c0,c1,c2,c3,c4,name,c6,c7,c8,c9,c10,c11,type
,,,,,오송역,,,,,,,기존정류장
,,,,,[가상]마을회관,,,,,,,가상정류장
";

    const AREAS: &str = "\
code,name,lon,lat
A01,청주_오송,127.3246,36.6226
A02,청주_오송,127.3300,36.6300
B01,청주_남이,127.4286,36.5665
";

    #[test]
    fn test_station_types() {
        let types = StationTypes::parse(STATIONS, true).unwrap();
        assert_eq!(types.len(), 2);
        assert_eq!(types.kind("오송역"), StationKind::Existing);
        assert!(types.kind("[가상]마을회관").is_virtual());
        assert_eq!(types.kind("unknown"), StationKind::Unspecified);
    }

    #[test]
    fn test_service_areas_many_to_one() {
        let (areas, centers) = parse_service_areas(AREAS, true).unwrap();
        assert_eq!(areas.region("A01"), Some("청주_오송"));
        assert_eq!(areas.region("A02"), Some("청주_오송"));
        assert_eq!(areas.region("Z99"), None);
        let center = centers.center("B01").unwrap();
        assert_eq!(center.lat, 36.5665);
        assert_eq!(center.lon, 127.4286);
    }

    #[test]
    fn test_bad_center_fails_whole_table() {
        let text = "code,name,lon,lat\nA01,청주_오송,east,36.6\n";
        assert!(parse_service_areas(text, true).is_err());
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_missing_file_leaves_table_empty() {
        let dir = temp_dir("drt_dashboard_reference_missing");
        let (encoded, _, _) = encoding_rs::EUC_KR.encode(AREAS);
        std::fs::write(dir.join("areas.csv"), &encoded).unwrap();

        let config = DashboardConfig {
            data_dir: dir.clone(),
            station_file: "stations.csv".to_string(),
            area_file: "areas.csv".to_string(),
            ..Default::default()
        };
        let tables = load_reference_tables(&BasicClient::new(), &config).await;

        assert_eq!(tables.station_status, SourceStatus::Missing);
        assert!(tables.station_types.is_empty());
        assert_eq!(tables.area_status, SourceStatus::Loaded { rows: 3 });
        assert_eq!(tables.service_areas.region("B01"), Some("청주_남이"));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_malformed_file_is_failed() {
        let dir = temp_dir("drt_dashboard_reference_failed");
        std::fs::write(dir.join("stations.csv"), "header\nshort,row\n").unwrap();
        std::fs::write(dir.join("areas.csv"), "header\n").unwrap();

        let config = DashboardConfig {
            data_dir: dir.clone(),
            station_file: "stations.csv".to_string(),
            area_file: "areas.csv".to_string(),
            ..Default::default()
        };
        let tables = load_reference_tables(&BasicClient::new(), &config).await;

        assert!(matches!(tables.station_status, SourceStatus::Failed { .. }));
        assert_eq!(tables.area_status, SourceStatus::Loaded { rows: 0 });

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_remote_tables_map_http_status() {
        let config = DashboardConfig {
            station_file: "https://data.invalid/stations.csv".to_string(),
            area_file: "https://data.invalid/areas.csv".to_string(),
            ..Default::default()
        };

        let not_found = CannedClient {
            status: 404,
            body: b"",
        };
        let tables = load_reference_tables(&not_found, &config).await;
        assert_eq!(tables.station_status, SourceStatus::Missing);
        assert_eq!(tables.area_status, SourceStatus::Missing);

        let server_error = CannedClient {
            status: 500,
            body: b"",
        };
        let tables = load_reference_tables(&server_error, &config).await;
        assert!(matches!(tables.station_status, SourceStatus::Failed { .. }));
        assert!(matches!(tables.area_status, SourceStatus::Failed { .. }));
        assert!(tables.service_areas.is_empty());
    }
}
