//! Colours and stroke settings for the map layers.
//!
//! Styles are looked up from an explicit [`StylePolicy`] by zone or station
//! kind instead of being baked into per-layer callbacks.

use serde::{Deserialize, Serialize};

use crate::reference::StationKind;

/// Operating zones drawn under the station markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneKind {
    Green,
    Red,
}

impl ZoneKind {
    pub const ALL: [ZoneKind; 2] = [ZoneKind::Red, ZoneKind::Green];

    /// Legend name of the layer.
    pub fn layer_name(&self) -> &'static str {
        match self {
            ZoneKind::Green => "그린존",
            ZoneKind::Red => "레드존",
        }
    }

    /// Suffix of the shapefile holding this zone: `<region>_<suffix>.shp`.
    pub fn file_suffix(&self) -> &'static str {
        match self {
            ZoneKind::Green => "그린존만",
            ZoneKind::Red => "레드존",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneStyle {
    pub fill_color: String,
    pub color: String,
    pub weight: u32,
    pub fill_opacity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StylePolicy {
    pub green_zone: String,
    pub red_zone: String,
    pub zone_weight: u32,
    pub zone_fill_opacity: f64,
    pub existing_station: String,
    pub virtual_station: String,
    /// Marker radius in metres per rider boarding or alighting.
    pub radius_per_rider: f64,
}

impl Default for StylePolicy {
    fn default() -> Self {
        Self {
            green_zone: "green".to_string(),
            red_zone: "red".to_string(),
            zone_weight: 1,
            zone_fill_opacity: 0.1,
            existing_station: "blue".to_string(),
            virtual_station: "red".to_string(),
            radius_per_rider: 10.0,
        }
    }
}

impl StylePolicy {
    pub fn zone_style(&self, kind: ZoneKind) -> ZoneStyle {
        let color = match kind {
            ZoneKind::Green => &self.green_zone,
            ZoneKind::Red => &self.red_zone,
        };
        ZoneStyle {
            fill_color: color.clone(),
            color: color.clone(),
            weight: self.zone_weight,
            fill_opacity: self.zone_fill_opacity,
        }
    }

    /// Virtual stops get their own colour; existing and untyped stops share one.
    pub fn station_color(&self, kind: StationKind) -> &str {
        if kind.is_virtual() {
            &self.virtual_station
        } else {
            &self.existing_station
        }
    }
}
