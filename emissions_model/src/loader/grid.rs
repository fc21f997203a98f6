use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use super::{densify, read_json, CityDataLoader, GridLayer, LoaderKind, LoaderSettings, SourceContext};
use crate::error::LoadError;
use crate::reference::ReferenceData;
use crate::snapshot::{Bounds, CitySnapshot, Coordinates, SnapshotSource, ZoneFeature};
use crate::stats::{baseline_from_grid, nan_sum, PollutantTotals, KG_PER_TON};
use crate::zones::zones_from_collection;

pub const EMISSIONS_FILE: &str = "emissions.grid.json";
pub const MAP_FILE: &str = "map.geojson";

const DISPLAY_TERMS: &[&str] = &[
    "co2", "nox", "pm25", "pm_2.5", "pm2_5", "pm 2.5", "emission", "pollutant",
];
const CO2_TERMS: &[&str] = &["co2"];
const NOX_TERMS: &[&str] = &["nox"];
const PM25_TERMS: &[&str] = &["pm25", "pm_2.5", "pm2_5", "pm 2.5"];

/// Gridded dataset: named coordinate axes and named 2-D or 3-D variables.
#[derive(Debug, Deserialize)]
struct GriddedDataset {
    coords: BTreeMap<String, Vec<f64>>,
    data_vars: BTreeMap<String, Variable>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Variable {
    Plane(Vec<Vec<Option<f64>>>),
    /// Leading axis is time.
    Stack(Vec<Vec<Vec<Option<f64>>>>),
}

impl Variable {
    /// 2-D view: a single time slice is taken as is, several are summed.
    fn collapse(&self) -> Vec<Vec<f64>> {
        match self {
            Variable::Plane(rows) => densify(rows.clone()),
            Variable::Stack(slices) => {
                let mut planes = slices.iter().map(|s| densify(s.clone()));
                let Some(first) = planes.next() else {
                    return Vec::new();
                };
                planes.fold(first, |acc, plane| {
                    acc.into_iter()
                        .zip(plane)
                        .map(|(a, b)| a.into_iter().zip(b).map(|(x, y)| x + y).collect())
                        .collect()
                })
            }
        }
    }
}

fn matches_any(name: &str, terms: &[&str]) -> bool {
    let lower = name.to_lowercase();
    terms.iter().any(|t| lower.contains(t))
}

fn axis<'a>(coords: &'a BTreeMap<String, Vec<f64>>, term: &str) -> Option<&'a Vec<f64>> {
    coords
        .iter()
        .find(|(name, _)| name.to_lowercase().contains(term))
        .map(|(_, values)| values)
}

/// Sum in tons of every variable matching `terms`, `None` when none match.
fn pollutant_total(vars: &BTreeMap<String, Variable>, terms: &[&str]) -> Option<f64> {
    let matching: Vec<&Variable> = vars
        .iter()
        .filter(|(name, _)| matches_any(name, terms))
        .map(|(_, v)| v)
        .collect();
    if matching.is_empty() {
        return None;
    }
    let kg: f64 = matching.iter().map(|v| nan_sum(&v.collapse())).sum();
    Some(kg / KG_PER_TON)
}

fn grid_layer(dataset: GriddedDataset, path: &Path) -> Result<GridLayer, LoadError> {
    let lat = axis(&dataset.coords, "lat")
        .ok_or_else(|| LoadError::malformed(path, "latitude coordinate not found"))?;
    let lon = axis(&dataset.coords, "lon")
        .ok_or_else(|| LoadError::malformed(path, "longitude coordinate not found"))?;

    let (display_name, display_var) = dataset
        .data_vars
        .iter()
        .find(|(name, _)| matches_any(name, DISPLAY_TERMS))
        .or_else(|| dataset.data_vars.iter().next())
        .ok_or_else(|| LoadError::malformed(path, "no data variables"))?;
    debug!("Using '{}' as display grid", display_name);

    Ok(GridLayer {
        grid: display_var.collapse(),
        coordinates: Coordinates {
            lat: lat.clone(),
            lon: lon.clone(),
        },
        totals: PollutantTotals {
            co2: pollutant_total(&dataset.data_vars, CO2_TERMS),
            nox: pollutant_total(&dataset.data_vars, NOX_TERMS),
            pm25: pollutant_total(&dataset.data_vars, PM25_TERMS),
        },
    })
}

/// Loader over `emissions.grid.json` + `map.geojson`.
///
/// `total` in the baseline is the display-grid sum, not the sum of the
/// pollutant totals.
pub struct GridFileLoader {
    ctx: SourceContext,
}

impl GridFileLoader {
    pub fn new(settings: LoaderSettings, reference: Arc<ReferenceData>) -> Self {
        GridFileLoader {
            ctx: SourceContext::new(LoaderKind::Grid, settings, reference),
        }
    }

    fn read_layer(&self, path: &Path) -> Result<Option<(GridLayer, Bounds)>, LoadError> {
        let Some(dataset) = read_json::<GriddedDataset>(path)? else {
            return Ok(None);
        };
        let layer = grid_layer(dataset, path)?;
        let bounds = Bounds::from_coordinates(&layer.coordinates, self.ctx.bounds_padding())
            .ok_or_else(|| LoadError::malformed(path, "empty coordinate axis"))?;
        Ok(Some((layer, bounds)))
    }

    fn read_zones(&self, path: &Path) -> Result<Option<Vec<ZoneFeature>>, LoadError> {
        let Some(collection) = read_json::<Value>(path)? else {
            return Ok(None);
        };
        zones_from_collection(&collection)
            .map(Some)
            .map_err(|reason| LoadError::malformed(path, reason))
    }
}

impl CityDataLoader for GridFileLoader {
    fn load(&self, city_id: &str) -> Result<CitySnapshot, LoadError> {
        let city = self.ctx.resolve(city_id)?;
        let dir = self.ctx.city_dir(&city);
        let mut source = SnapshotSource::Observed;

        let map_path = dir.join(MAP_FILE);
        let real_zones = self
            .ctx
            .or_fallback(&city, &map_path, self.read_zones(&map_path))?;

        let emissions_path = dir.join(EMISSIONS_FILE);
        let (layer, bounds) = match self
            .ctx
            .or_fallback(&city, &emissions_path, self.read_layer(&emissions_path))?
        {
            Some(read) => read,
            None => {
                source = SnapshotSource::Synthetic;
                let layer = self
                    .ctx
                    .synthetic_grid(&city, real_zones.as_deref().unwrap_or(&[]));
                let bounds =
                    Bounds::from_coordinates(&layer.coordinates, self.ctx.bounds_padding())
                        .ok_or_else(|| LoadError::malformed(&emissions_path, "empty synthetic grid"))?;
                (layer, bounds)
            }
        };

        let zones = match real_zones {
            Some(zones) => zones,
            None => {
                source = SnapshotSource::Synthetic;
                self.ctx.synthetic_wards(&city)
            }
        };

        let covariates = self.ctx.reference.covariates.get(&city.name);
        let grid_total_tons = nan_sum(&layer.grid) / KG_PER_TON;
        let baseline_stats = baseline_from_grid(grid_total_tons, layer.totals, covariates);

        info!(
            "📦 Loaded {} ({} zones, {}x{} grid, source={:?})",
            city.name,
            zones.len(),
            layer.coordinates.lat.len(),
            layer.coordinates.lon.len(),
            source
        );

        Ok(CitySnapshot {
            city: city.name,
            emission_grid: layer.grid,
            coordinates: layer.coordinates,
            zones,
            baseline_stats,
            bounds,
            source,
        })
    }

    fn kind(&self) -> LoaderKind {
        LoaderKind::Grid
    }
}
