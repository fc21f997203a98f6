use emissions_model::{CityCovariates, EmissionStats, SnapshotSource};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn error(message: String) -> Self {
        ApiResponse {
            success: false,
            data: None,
            message: Some(message),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub service: String,
    pub version: String,
    pub loader: String,
    pub cities: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PolicyRequest {
    pub city: String,
    /// Zone indices to price; an empty list prices nothing.
    #[serde(default)]
    pub selected_roads: Vec<i64>,
    pub pricing_intensity: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CityPopulation {
    pub city: String,
    pub population_2020: f64,
}

/// `?cities=delhi,mumbai`
#[derive(Debug, Deserialize)]
pub struct CompareQuery {
    #[serde(default)]
    pub cities: String,
}

impl CompareQuery {
    pub fn city_ids(&self) -> Vec<String> {
        self.cities
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CompareEntry {
    Loaded {
        city: String,
        stats: EmissionStats,
        zone_count: usize,
        covariates: Option<CityCovariates>,
        source: SnapshotSource,
    },
    Failed {
        city: String,
        error: String,
    },
}
