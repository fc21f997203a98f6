use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::stats::EmissionStats;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: Vec<f64>,
    pub lon: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl Bounds {
    /// Extent of the coordinate arrays, widened on each side by `padding`
    /// times the span. `None` when either array has no finite value.
    pub fn from_coordinates(coordinates: &Coordinates, padding: f64) -> Option<Bounds> {
        let (south, north) = min_max(&coordinates.lat)?;
        let (west, east) = min_max(&coordinates.lon)?;
        let lat_pad = (north - south) * padding;
        let lon_pad = (east - west) * padding;
        Some(Bounds {
            north: north + lat_pad,
            south: south - lat_pad,
            east: east + lon_pad,
            west: west - lon_pad,
        })
    }
}

fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// A road or ward the policy can target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneFeature {
    #[serde(rename = "type")]
    pub kind: String,
    pub geometry: Value,
    pub properties: Map<String, Value>,
    /// Position within the snapshot's zone list.
    pub id: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotSource {
    Observed,
    /// Placeholder data generated because the real files were missing or
    /// unreadable.
    Synthetic,
}

/// Baseline view of one city, built per request and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitySnapshot {
    pub city: String,
    pub emission_grid: Vec<Vec<f64>>,
    pub coordinates: Coordinates,
    pub zones: Vec<ZoneFeature>,
    pub baseline_stats: EmissionStats,
    pub bounds: Bounds,
    pub source: SnapshotSource,
}

impl CitySnapshot {
    pub fn zone_count(&self) -> usize {
        self.zones.len()
    }

    pub fn is_synthetic(&self) -> bool {
        self.source == SnapshotSource::Synthetic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_without_padding_are_the_extent() {
        let coords = Coordinates {
            lat: vec![28.5, 28.7, 28.6],
            lon: vec![77.0, 77.4],
        };
        let bounds = Bounds::from_coordinates(&coords, 0.0).unwrap();
        assert_eq!(bounds.north, 28.7);
        assert_eq!(bounds.south, 28.5);
        assert_eq!(bounds.east, 77.4);
        assert_eq!(bounds.west, 77.0);
    }

    #[test]
    fn padding_is_a_fraction_of_the_span() {
        let coords = Coordinates {
            lat: vec![10.0, 20.0],
            lon: vec![70.0, 72.0],
        };
        let bounds = Bounds::from_coordinates(&coords, 0.05).unwrap();
        assert!((bounds.north - 20.5).abs() < 1e-9);
        assert!((bounds.south - 9.5).abs() < 1e-9);
        assert!((bounds.east - 72.1).abs() < 1e-9);
        assert!((bounds.west - 69.9).abs() < 1e-9);
    }

    #[test]
    fn empty_axis_has_no_bounds() {
        let coords = Coordinates {
            lat: vec![],
            lon: vec![1.0],
        };
        assert_eq!(Bounds::from_coordinates(&coords, 0.0), None);
    }

    #[test]
    fn zone_serializes_as_geojson_feature() {
        let zone = ZoneFeature {
            kind: "Feature".to_string(),
            geometry: serde_json::json!({"type": "Point", "coordinates": [77.2, 28.6]}),
            properties: Map::new(),
            id: 3,
        };
        let value = serde_json::to_value(&zone).unwrap();
        assert_eq!(value["type"], "Feature");
        assert_eq!(value["id"], 3);
    }
}
