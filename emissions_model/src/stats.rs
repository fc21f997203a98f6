use serde::{Deserialize, Serialize};

use crate::reference::CityCovariates;

/// Annualized emission totals in tons.
///
/// `total` is deliberately independent of the three tracked pollutants: the
/// grid loader fills it from the display-grid sum, the aggregated loader from
/// `co2 + nox + pm25`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EmissionStats {
    pub co2: f64,
    pub nox: f64,
    pub pm25: f64,
    pub total: f64,
}

impl EmissionStats {
    pub fn new(co2: f64, nox: f64, pm25: f64, total: f64) -> Self {
        EmissionStats {
            co2,
            nox,
            pm25,
            total,
        }
    }

    /// Stats where `total` is exactly the sum of the tracked pollutants.
    pub fn summed(co2: f64, nox: f64, pm25: f64) -> Self {
        EmissionStats::new(co2, nox, pm25, co2 + nox + pm25)
    }
}

/// Gridded sources are in kilograms.
pub const KG_PER_TON: f64 = 1000.0;

const BASE_SPLIT_CO2: f64 = 0.65;
const BASE_SPLIT_NOX: f64 = 0.20;
const BASE_SPLIT_PM25: f64 = 0.15;

/// Shares used to allocate an undifferentiated grid total to pollutants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollutantSplit {
    pub co2: f64,
    pub nox: f64,
    pub pm25: f64,
}

impl PollutantSplit {
    /// Base 65/20/15 split, shifted towards NOx and PM2.5 in cities with heavy
    /// public-transport usage. Always normalized to sum to 1.
    pub fn for_city(covariates: Option<&CityCovariates>) -> Self {
        let pt_factor = covariates
            .and_then(CityCovariates::transit_vkt_per_capita)
            .map(|per_cap| (0.8 + per_cap / 1e3).clamp(0.8, 1.2))
            .unwrap_or(1.0);

        let co2 = BASE_SPLIT_CO2 * (2.0 - pt_factor) / 1.8;
        let nox = BASE_SPLIT_NOX * pt_factor;
        let pm25 = BASE_SPLIT_PM25 * pt_factor;
        let sum = co2 + nox + pm25;

        PollutantSplit {
            co2: co2 / sum,
            nox: nox / sum,
            pm25: pm25 / sum,
        }
    }

    pub fn sum(&self) -> f64 {
        self.co2 + self.nox + self.pm25
    }
}

/// Per-pollutant totals a source may or may not provide.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PollutantTotals {
    pub co2: Option<f64>,
    pub nox: Option<f64>,
    pub pm25: Option<f64>,
}

/// Builds baseline stats from a grid total (tons). Explicit pollutant totals
/// win; any missing pollutant is filled from the proxy split.
pub fn baseline_from_grid(
    grid_total_tons: f64,
    explicit: PollutantTotals,
    covariates: Option<&CityCovariates>,
) -> EmissionStats {
    let split = PollutantSplit::for_city(covariates);
    EmissionStats::new(
        explicit.co2.unwrap_or(grid_total_tons * split.co2),
        explicit.nox.unwrap_or(grid_total_tons * split.nox),
        explicit.pm25.unwrap_or(grid_total_tons * split.pm25),
        grid_total_tons,
    )
}

/// Sum of a grid, skipping NaN cells.
pub fn nan_sum(grid: &[Vec<f64>]) -> f64 {
    grid.iter()
        .flat_map(|row| row.iter())
        .filter(|v| !v.is_nan())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn covariates(population: f64, vkt: f64) -> CityCovariates {
        CityCovariates {
            population_2020: Some(population),
            vkt_public_transport: Some(vkt),
            ..CityCovariates::default()
        }
    }

    #[test]
    fn default_split_keeps_base_proportions() {
        let split = PollutantSplit::for_city(None);
        // pt_factor 1.0 scales co2 by 1/1.8 before normalizing
        let co2 = 0.65 / 1.8;
        let sum = co2 + 0.20 + 0.15;
        assert!((split.co2 - co2 / sum).abs() < 1e-12);
        assert!((split.nox - 0.20 / sum).abs() < 1e-12);
        assert!((split.sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn split_sums_to_one_for_any_covariates() {
        for (population, vkt) in [(1.0, 0.0), (1e6, 5e7), (1e3, 1e12), (2e7, 1.0)] {
            let split = PollutantSplit::for_city(Some(&covariates(population, vkt)));
            assert!((split.sum() - 1.0).abs() < 1e-12, "{population} {vkt}");
        }
    }

    #[test]
    fn heavy_transit_shifts_share_away_from_co2() {
        let light = PollutantSplit::for_city(Some(&covariates(1e6, 1e6)));
        let heavy = PollutantSplit::for_city(Some(&covariates(1e6, 1e9)));
        assert!(heavy.co2 < light.co2);
        assert!(heavy.pm25 > light.pm25);
    }

    #[test]
    fn zero_transit_vkt_uses_lowest_transit_factor() {
        let split = PollutantSplit::for_city(Some(&covariates(1e6, 0.0)));
        // pt_factor 0.8
        let co2 = 0.65 * 1.2 / 1.8;
        let sum = co2 + 0.20 * 0.8 + 0.15 * 0.8;
        assert!((split.co2 - co2 / sum).abs() < 1e-12);
        assert!((split.co2 - 0.6075).abs() < 1e-3);
    }

    #[test]
    fn explicit_totals_take_precedence() {
        let explicit = PollutantTotals {
            co2: Some(10.0),
            nox: None,
            pm25: Some(1.0),
        };
        let stats = baseline_from_grid(100.0, explicit, None);
        assert_eq!(stats.co2, 10.0);
        assert_eq!(stats.pm25, 1.0);
        assert_eq!(stats.total, 100.0);
        let split = PollutantSplit::for_city(None);
        assert!((stats.nox - 100.0 * split.nox).abs() < 1e-9);
    }

    #[test]
    fn nan_cells_are_skipped() {
        let grid = vec![vec![1.0, f64::NAN], vec![2.5, 0.5]];
        assert_eq!(nan_sum(&grid), 4.0);
    }
}
