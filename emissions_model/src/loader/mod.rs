//! City data loaders.
//!
//! Both sources resolve a city id to the same [`CitySnapshot`] shape. The
//! concrete source is picked once at startup through [`LoaderKind`].

mod aggregated;
mod grid;

pub use aggregated::AggregatedJsonLoader;
pub use grid::GridFileLoader;

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::LoadError;
use crate::reference::{normalize_city_id, CityReference, ReferenceData};
use crate::snapshot::{Coordinates, ZoneFeature};
use crate::stats::PollutantTotals;
use crate::synthetic::SyntheticGenerator;

pub trait CityDataLoader: Send + Sync {
    fn load(&self, city_id: &str) -> Result<crate::CitySnapshot, LoadError>;

    fn kind(&self) -> LoaderKind;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderKind {
    /// Gridded emissions file plus a GeoJSON ward map per city.
    Grid,
    /// One pre-aggregated `data.json` per city.
    Aggregated,
}

impl LoaderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoaderKind::Grid => "grid",
            LoaderKind::Aggregated => "aggregated",
        }
    }

    /// Padding applied to the map bounds when none is configured.
    pub fn default_bounds_padding(&self) -> f64 {
        match self {
            LoaderKind::Grid => 0.0,
            LoaderKind::Aggregated => 0.05,
        }
    }
}

impl fmt::Display for LoaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoaderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "grid" => Ok(LoaderKind::Grid),
            "aggregated" | "json" => Ok(LoaderKind::Aggregated),
            other => Err(format!("unknown loader '{}' (expected grid or aggregated)", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoaderSettings {
    pub data_dir: PathBuf,
    /// Serve seeded placeholder data when a known city's files are missing
    /// or unreadable. When off, those cases surface as errors.
    pub synthetic_fallback: bool,
    pub seed: u64,
    /// Overrides [`LoaderKind::default_bounds_padding`].
    pub bounds_padding: Option<f64>,
}

impl LoaderSettings {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        LoaderSettings {
            data_dir: data_dir.into(),
            synthetic_fallback: true,
            seed: 42,
            bounds_padding: None,
        }
    }
}

pub fn build_loader(
    kind: LoaderKind,
    settings: LoaderSettings,
    reference: Arc<ReferenceData>,
) -> Arc<dyn CityDataLoader> {
    match kind {
        LoaderKind::Grid => Arc::new(GridFileLoader::new(settings, reference)),
        LoaderKind::Aggregated => Arc::new(AggregatedJsonLoader::new(settings, reference)),
    }
}

/// Emission layer of a snapshot before stats and bounds are derived.
pub(crate) struct GridLayer {
    pub grid: Vec<Vec<f64>>,
    pub coordinates: Coordinates,
    pub totals: PollutantTotals,
}

/// State shared by both loaders.
pub(crate) struct SourceContext {
    pub reference: Arc<ReferenceData>,
    pub settings: LoaderSettings,
    pub synthetic: SyntheticGenerator,
    padding: f64,
}

impl SourceContext {
    pub fn new(kind: LoaderKind, settings: LoaderSettings, reference: Arc<ReferenceData>) -> Self {
        let padding = settings
            .bounds_padding
            .unwrap_or_else(|| kind.default_bounds_padding());
        SourceContext {
            synthetic: SyntheticGenerator::new(settings.seed),
            reference,
            settings,
            padding,
        }
    }

    pub fn bounds_padding(&self) -> f64 {
        self.padding
    }

    /// Allowlist check. Unknown ids never reach the synthetic fallback.
    pub fn resolve(&self, city_id: &str) -> Result<CityReference, LoadError> {
        self.reference
            .cities
            .get(city_id)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(normalize_city_id(city_id)))
    }

    pub fn city_dir(&self, city: &CityReference) -> PathBuf {
        self.settings.data_dir.join(&city.name)
    }

    /// Maps a source read to either real data or `None` ("use synthetic"),
    /// honouring the fallback setting.
    pub fn or_fallback<T>(
        &self,
        city: &CityReference,
        path: &Path,
        outcome: Result<Option<T>, LoadError>,
    ) -> Result<Option<T>, LoadError> {
        match outcome {
            Ok(Some(value)) => Ok(Some(value)),
            Ok(None) if self.settings.synthetic_fallback => {
                warn!(
                    "⚠️ {} not found for {}, generating synthetic data",
                    path.display(),
                    city.name
                );
                Ok(None)
            }
            Ok(None) => Err(LoadError::NotFound(city.name.clone())),
            Err(e) if self.settings.synthetic_fallback => {
                warn!("⚠️ {}; generating synthetic data for {}", e, city.name);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub fn synthetic_grid(&self, city: &CityReference, zones: &[ZoneFeature]) -> GridLayer {
        let (grid, coordinates) =
            self.synthetic
                .emission_grid(&city.name, (city.latitude, city.longitude), zones);
        GridLayer {
            grid,
            coordinates,
            totals: PollutantTotals::default(),
        }
    }

    pub fn synthetic_wards(&self, city: &CityReference) -> Vec<ZoneFeature> {
        self.synthetic
            .wards(&city.name, (city.latitude, city.longitude))
    }
}

/// Reads and decodes a JSON file. `Ok(None)` means the file does not exist.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, LoadError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(LoadError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|e| LoadError::malformed(path, e.to_string()))
}

/// Collapses a grid with missing cells into a dense one, missing cells as NaN.
pub(crate) fn densify(rows: Vec<Vec<Option<f64>>>) -> Vec<Vec<f64>> {
    rows.into_iter()
        .map(|row| row.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
        .collect()
}
