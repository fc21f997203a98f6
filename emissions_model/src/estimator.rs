//! Elasticity-scaled congestion-pricing reduction model.
//!
//! Each pollutant has a fixed ceiling on how much pricing can cut it. The
//! achieved fraction grows linearly with pricing intensity, zone coverage and
//! a city elasticity, and is clamped at that ceiling.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EstimateError;
use crate::reference::{usable, CityCovariates, ReferenceData};
use crate::snapshot::CitySnapshot;
use crate::stats::EmissionStats;

const DEFAULT_ROAD_LENGTH_KM: f64 = 2000.0;
const DEFAULT_RHO_I: f64 = 150.0;
const DEFAULT_POPULATION: f64 = 1e6;
const DEFAULT_VKT_PUBLIC_TRANSPORT: f64 = 5e7;

/// Per-pollutant fractions in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PollutantFractions {
    pub co2: f64,
    pub nox: f64,
    pub pm25: f64,
}

impl PollutantFractions {
    pub fn mean(&self) -> f64 {
        (self.co2 + self.nox + self.pm25) / 3.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelParameters {
    /// Largest achievable reduction per pollutant.
    pub max_reduction: PollutantFractions,
    pub elasticity_min: f64,
    pub elasticity_max: f64,
    /// Social cost of carbon, USD per ton.
    pub co2_cost_per_ton: f64,
    /// Health cost of PM2.5, USD per ton.
    pub pm25_health_cost_per_ton: f64,
    /// Floor for percentage denominators.
    pub epsilon: f64,
}

impl Default for ModelParameters {
    fn default() -> Self {
        ModelParameters {
            max_reduction: PollutantFractions {
                co2: 0.35,
                nox: 0.42,
                pm25: 0.38,
            },
            elasticity_min: 0.8,
            elasticity_max: 2.2,
            co2_cost_per_ton: 85.0,
            pm25_health_cost_per_ton: 60_000.0,
            epsilon: 1e-9,
        }
    }
}

/// The three bounded factors behind a city's elasticity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ElasticityFactors {
    /// Extensive road networks dilute the effect of any one priced zone.
    pub road_scale: f64,
    /// Denser traffic responds more strongly.
    pub density_scale: f64,
    /// Transit alternatives make drivers more price sensitive.
    pub transit_scale: f64,
}

impl ElasticityFactors {
    pub fn for_city(covariates: Option<&CityCovariates>) -> Self {
        let field = |f: fn(&CityCovariates) -> Option<f64>, default: f64| {
            usable(covariates.and_then(f)).unwrap_or(default)
        };
        let road_length_km = field(|c| c.road_length_km, DEFAULT_ROAD_LENGTH_KM);
        let rho_i = field(|c| c.rho_i, DEFAULT_RHO_I);
        let population = field(|c| c.population_2020, DEFAULT_POPULATION);
        let vkt = field(|c| c.vkt_public_transport, DEFAULT_VKT_PUBLIC_TRANSPORT);
        let transit_per_capita = vkt / population.max(1.0);

        ElasticityFactors {
            road_scale: (1.0 - road_length_km / 15_000.0).clamp(0.7, 1.3),
            density_scale: (0.9 + rho_i / 250.0).clamp(0.9, 1.6),
            transit_scale: (1.0 + transit_per_capita / 1500.0).clamp(1.0, 1.8),
        }
    }

    pub fn product(&self) -> f64 {
        self.road_scale * self.density_scale * self.transit_scale
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReductionPercentages {
    pub co2: f64,
    pub nox: f64,
    pub pm25: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyResponse {
    pub city: String,
    pub baseline_stats: EmissionStats,
    pub projected_stats: EmissionStats,
    pub reduction_percentage: ReductionPercentages,
    pub affected_zone_indices: Vec<i64>,
    pub pricing_intensity: f64,
    /// USD.
    pub estimated_cost_savings: f64,
    pub coverage: f64,
    pub elasticity: f64,
}

pub struct PolicyEstimator {
    reference: Arc<ReferenceData>,
    params: ModelParameters,
}

impl PolicyEstimator {
    pub fn new(reference: Arc<ReferenceData>, params: ModelParameters) -> Self {
        PolicyEstimator { reference, params }
    }

    pub fn params(&self) -> &ModelParameters {
        &self.params
    }

    /// City elasticity, clamped to the configured range.
    pub fn elasticity(&self, city: &str) -> f64 {
        ElasticityFactors::for_city(self.reference.covariates.get(city))
            .product()
            .clamp(self.params.elasticity_min, self.params.elasticity_max)
    }

    /// Projects emissions after pricing the `selected` zones at `intensity`
    /// percent.
    ///
    /// Indices are not checked against the snapshot's zones and duplicates
    /// count once. Coverage is not capped; the per-pollutant ceilings bound the
    /// result.
    pub fn estimate(
        &self,
        snapshot: &CitySnapshot,
        selected: &[i64],
        intensity: f64,
    ) -> Result<PolicyResponse, EstimateError> {
        if !intensity.is_finite() || !(0.0..=100.0).contains(&intensity) {
            return Err(EstimateError::InvalidIntensity(intensity));
        }
        let selected: BTreeSet<i64> = selected.iter().copied().collect();
        Ok(self.project(snapshot, selected, intensity))
    }

    /// Upper-bound scenario: every zone priced at full intensity.
    pub fn potential(&self, snapshot: &CitySnapshot) -> PolicyResponse {
        let all = (0..snapshot.zone_count() as i64).collect();
        self.project(snapshot, all, 100.0)
    }

    fn project(
        &self,
        snapshot: &CitySnapshot,
        selected: BTreeSet<i64>,
        intensity: f64,
    ) -> PolicyResponse {
        let coverage = selected.len() as f64 / snapshot.zone_count().max(1) as f64;
        let intensity_factor = intensity / 100.0;
        let elasticity = self.elasticity(&snapshot.city);

        let max = self.params.max_reduction;
        let scale = intensity_factor * coverage * elasticity;
        let reduction = PollutantFractions {
            co2: max.co2.min(max.co2 * scale),
            nox: max.nox.min(max.nox * scale),
            pm25: max.pm25.min(max.pm25 * scale),
        };

        let baseline = snapshot.baseline_stats;
        let projected = EmissionStats::new(
            baseline.co2 * (1.0 - reduction.co2),
            baseline.nox * (1.0 - reduction.nox),
            baseline.pm25 * (1.0 - reduction.pm25),
            baseline.total * (1.0 - reduction.mean()),
        );

        let eps = self.params.epsilon;
        let pct = |before: f64, after: f64| (before - after) / before.max(eps) * 100.0;
        let reduction_percentage = ReductionPercentages {
            co2: pct(baseline.co2, projected.co2),
            nox: pct(baseline.nox, projected.nox),
            pm25: pct(baseline.pm25, projected.pm25),
            total: pct(baseline.total, projected.total),
        };

        // NOx is not monetized.
        let estimated_cost_savings = (baseline.co2 - projected.co2) * self.params.co2_cost_per_ton
            + (baseline.pm25 - projected.pm25) * self.params.pm25_health_cost_per_ton;

        debug!(
            city = %snapshot.city,
            coverage,
            intensity,
            elasticity,
            "Projected congestion pricing reductions"
        );

        PolicyResponse {
            city: snapshot.city.clone(),
            baseline_stats: baseline,
            projected_stats: projected,
            reduction_percentage,
            affected_zone_indices: selected.into_iter().collect(),
            pricing_intensity: intensity,
            estimated_cost_savings,
            coverage,
            elasticity,
        }
    }
}
