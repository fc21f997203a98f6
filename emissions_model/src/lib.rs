//! Emission baselines for Indian cities and the congestion-pricing model on
//! top of them.

pub mod error;
pub mod estimator;
pub mod loader;
pub mod reference;
pub mod snapshot;
pub mod stats;
pub mod synthetic;
pub mod zones;

pub use error::{EstimateError, LoadError, ReferenceError};
pub use estimator::{ModelParameters, PolicyEstimator, PolicyResponse, ReductionPercentages};
pub use loader::{build_loader, CityDataLoader, LoaderKind, LoaderSettings};
pub use reference::{CityCovariates, CityReference, CityRegistry, CovariateTable, ReferenceData};
pub use snapshot::{Bounds, CitySnapshot, Coordinates, SnapshotSource, ZoneFeature};
pub use stats::EmissionStats;
pub use synthetic::SyntheticGenerator;
