use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use super::{densify, read_json, CityDataLoader, LoaderKind, LoaderSettings, SourceContext};
use crate::error::LoadError;
use crate::reference::ReferenceData;
use crate::snapshot::{Bounds, CitySnapshot, Coordinates, SnapshotSource, ZoneFeature};
use crate::stats::{baseline_from_grid, nan_sum, EmissionStats, KG_PER_TON};
use crate::zones::zones_from_collection;

pub const DATA_FILE: &str = "data.json";

#[derive(Debug, Deserialize)]
struct AggregatedCityFile {
    emissions: AggregatedEmissions,
    geometry: Value,
}

#[derive(Debug, Deserialize)]
struct AggregatedEmissions {
    coordinates: LatLon,
    emissions: EmissionLayers,
    summary: EmissionSummary,
}

#[derive(Debug, Deserialize)]
struct LatLon {
    lat: Vec<f64>,
    lon: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct EmissionLayers {
    co2_total: Vec<Vec<Option<f64>>>,
}

/// Pollutant totals, already in tons.
#[derive(Debug, Deserialize)]
struct EmissionSummary {
    co2_total_sum: f64,
    nox_total_sum: f64,
    pm25_total_sum: f64,
}

/// Loader over one pre-aggregated `data.json` per city.
///
/// Here `total` is exactly `co2 + nox + pm25`.
pub struct AggregatedJsonLoader {
    ctx: SourceContext,
}

impl AggregatedJsonLoader {
    pub fn new(settings: LoaderSettings, reference: Arc<ReferenceData>) -> Self {
        AggregatedJsonLoader {
            ctx: SourceContext::new(LoaderKind::Aggregated, settings, reference),
        }
    }

    fn read_city(&self, city: &str, path: &Path) -> Result<Option<CitySnapshot>, LoadError> {
        let Some(file) = read_json::<AggregatedCityFile>(path)? else {
            return Ok(None);
        };

        let coordinates = Coordinates {
            lat: file.emissions.coordinates.lat,
            lon: file.emissions.coordinates.lon,
        };
        let bounds = Bounds::from_coordinates(&coordinates, self.ctx.bounds_padding())
            .ok_or_else(|| LoadError::malformed(path, "empty coordinate axis"))?;
        let zones: Vec<ZoneFeature> = zones_from_collection(&file.geometry)
            .map_err(|reason| LoadError::malformed(path, reason))?;
        let summary = file.emissions.summary;

        Ok(Some(CitySnapshot {
            city: city.to_string(),
            emission_grid: densify(file.emissions.emissions.co2_total),
            coordinates,
            zones,
            baseline_stats: EmissionStats::summed(
                summary.co2_total_sum,
                summary.nox_total_sum,
                summary.pm25_total_sum,
            ),
            bounds,
            source: SnapshotSource::Observed,
        }))
    }
}

impl CityDataLoader for AggregatedJsonLoader {
    fn load(&self, city_id: &str) -> Result<CitySnapshot, LoadError> {
        let city = self.ctx.resolve(city_id)?;
        let path = self.ctx.city_dir(&city).join(DATA_FILE);

        if let Some(snapshot) = self
            .ctx
            .or_fallback(&city, &path, self.read_city(&city.name, &path))?
        {
            info!(
                "📦 Loaded {} from {} ({} zones)",
                snapshot.city,
                path.display(),
                snapshot.zone_count()
            );
            return Ok(snapshot);
        }

        let zones = self.ctx.synthetic_wards(&city);
        let layer = self.ctx.synthetic_grid(&city, &[]);
        let bounds = Bounds::from_coordinates(&layer.coordinates, self.ctx.bounds_padding())
            .ok_or_else(|| LoadError::malformed(&path, "empty synthetic grid"))?;
        let baseline_stats = baseline_from_grid(
            nan_sum(&layer.grid) / KG_PER_TON,
            layer.totals,
            self.ctx.reference.covariates.get(&city.name),
        );

        Ok(CitySnapshot {
            city: city.name,
            emission_grid: layer.grid,
            coordinates: layer.coordinates,
            zones,
            baseline_stats,
            bounds,
            source: SnapshotSource::Synthetic,
        })
    }

    fn kind(&self) -> LoaderKind {
        LoaderKind::Aggregated
    }
}
