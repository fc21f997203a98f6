use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use emissions_model::{
    CityRegistry, CovariateTable, LoaderKind, LoaderSettings, ReferenceData, ReferenceError,
};
use thiserror::Error;
use tracing::info;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_SEED: u64 = 42;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(key: &'static str, reason: impl ToString) -> Self {
        ConfigError::Invalid {
            key,
            reason: reason.to_string(),
        }
    }
}

/// Server settings, read from the environment (and `.env`).
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub loader: LoaderKind,
    pub synthetic_fallback: bool,
    pub seed: u64,
    pub bounds_padding: Option<f64>,
    /// Replaces the built-in city registry when set.
    pub city_table: Option<PathBuf>,
    pub covariates_file: PathBuf,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr = var("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .trim()
            .parse()
            .map_err(|e| ConfigError::invalid("BIND_ADDR", e))?;

        let data_dir = PathBuf::from(var("DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()));

        let loader = match var("LOADER") {
            Some(raw) => raw.parse().map_err(|e| ConfigError::invalid("LOADER", e))?,
            None => LoaderKind::Grid,
        };

        let synthetic_fallback = match var("SYNTHETIC_FALLBACK") {
            Some(raw) => parse_flag(&raw).ok_or_else(|| {
                ConfigError::invalid("SYNTHETIC_FALLBACK", format!("'{}' is not a boolean", raw))
            })?,
            None => true,
        };

        let seed = match var("SYNTHETIC_SEED") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid("SYNTHETIC_SEED", e))?,
            None => DEFAULT_SEED,
        };

        let bounds_padding = match var("BOUNDS_PADDING") {
            Some(raw) => {
                let padding: f64 = raw
                    .trim()
                    .parse()
                    .map_err(|e| ConfigError::invalid("BOUNDS_PADDING", e))?;
                if !padding.is_finite() || padding < 0.0 {
                    return Err(ConfigError::invalid(
                        "BOUNDS_PADDING",
                        "must be a non-negative number",
                    ));
                }
                Some(padding)
            }
            None => None,
        };

        let city_table = var("CITY_TABLE").map(PathBuf::from);
        let covariates_file = var("COVARIATES_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("others").join("covariates.json"));

        Ok(ServerConfig {
            bind_addr,
            data_dir,
            loader,
            synthetic_fallback,
            seed,
            bounds_padding,
            city_table,
            covariates_file,
        })
    }

    pub fn loader_settings(&self) -> LoaderSettings {
        LoaderSettings {
            data_dir: self.data_dir.clone(),
            synthetic_fallback: self.synthetic_fallback,
            seed: self.seed,
            bounds_padding: self.bounds_padding,
        }
    }

    /// Builds the registry and covariates. A configured city table must be
    /// readable; the covariates file is optional.
    pub fn load_reference(&self) -> Result<ReferenceData, ReferenceError> {
        let cities = match &self.city_table {
            Some(path) => CityRegistry::from_file(path)?,
            None => {
                info!("🗺️ Using built-in registry");
                CityRegistry::builtin()
            }
        };
        let covariates = CovariateTable::load_or_empty(&self.covariates_file);
        Ok(ReferenceData::new(cities, covariates))
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
