//! Read-only reference tables shared by the loaders and the estimator.
//!
//! Both tables are built once at startup and handed around behind an `Arc`;
//! nothing here is mutated after construction.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ReferenceError;

/// Normalized form of a city id: trimmed and lowercased.
pub fn normalize_city_id(id: &str) -> String {
    id.trim().to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityReference {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Allowlist of known cities together with their centre coordinates.
#[derive(Debug, Clone)]
pub struct CityRegistry {
    cities: Vec<CityReference>,
    index: HashMap<String, usize>,
}

impl CityRegistry {
    pub fn new(cities: Vec<CityReference>) -> Self {
        let cities: Vec<CityReference> = cities
            .into_iter()
            .map(|c| CityReference {
                name: normalize_city_id(&c.name),
                ..c
            })
            .collect();
        let index = cities
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect();
        CityRegistry { cities, index }
    }

    /// Registry of the 100 Indian cities the front end knows about.
    pub fn builtin() -> Self {
        CityRegistry::new(
            BUILTIN_CITIES
                .iter()
                .map(|&(name, latitude, longitude)| CityReference {
                    name: name.to_string(),
                    latitude,
                    longitude,
                })
                .collect(),
        )
    }

    /// Reads a JSON array of [`CityReference`].
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ReferenceError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ReferenceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let cities: Vec<CityReference> =
            serde_json::from_str(&contents).map_err(|source| ReferenceError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        info!("Loaded {} cities from {}", cities.len(), path.display());
        Ok(CityRegistry::new(cities))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(&normalize_city_id(id))
    }

    pub fn get(&self, id: &str) -> Option<&CityReference> {
        self.index
            .get(&normalize_city_id(id))
            .map(|&i| &self.cities[i])
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.cities.iter().map(|c| c.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }
}

/// Static city indicators used as elasticity and split proxies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CityCovariates {
    #[serde(default)]
    pub population_2020: Option<f64>,
    #[serde(default)]
    pub road_length_km: Option<f64>,
    /// Traffic density proxy.
    #[serde(default)]
    pub rho_i: Option<f64>,
    #[serde(default)]
    pub vkt_public_transport: Option<f64>,
}

impl CityCovariates {
    /// Public-transport vehicle-km per resident. Needs a non-zero population;
    /// a zero vehicle-km figure is a real value and yields zero.
    pub fn transit_vkt_per_capita(&self) -> Option<f64> {
        let vkt = self.vkt_public_transport.filter(|v| v.is_finite())?;
        let population = usable(self.population_2020)?;
        Some(vkt / population)
    }
}

/// Treats absent, zero and non-finite values alike.
pub(crate) fn usable(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v != 0.0)
}

/// Covariates keyed by lowercase city name.
#[derive(Debug, Clone, Default)]
pub struct CovariateTable {
    rows: HashMap<String, CityCovariates>,
}

impl CovariateTable {
    pub fn new(rows: HashMap<String, CityCovariates>) -> Self {
        CovariateTable {
            rows: rows
                .into_iter()
                .map(|(city, row)| (normalize_city_id(&city), row))
                .collect(),
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ReferenceError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ReferenceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let rows: HashMap<String, CityCovariates> =
            serde_json::from_str(&contents).map_err(|source| ReferenceError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(CovariateTable::new(rows))
    }

    /// The table is optional: an unreadable file leaves every city on the
    /// model defaults.
    pub fn load_or_empty<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            warn!("Covariates table {} not found, using model defaults", path.display());
            return CovariateTable::default();
        }
        match CovariateTable::from_file(path) {
            Ok(table) => {
                info!("Loaded covariates for {} cities", table.len());
                table
            }
            Err(e) => {
                warn!("Ignoring covariates table: {}", e);
                CovariateTable::default()
            }
        }
    }

    pub fn get(&self, city: &str) -> Option<&CityCovariates> {
        self.rows.get(&normalize_city_id(city))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CityCovariates)> {
        self.rows.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Everything the loaders and the estimator need to know about cities.
#[derive(Debug, Clone)]
pub struct ReferenceData {
    pub cities: CityRegistry,
    pub covariates: CovariateTable,
}

impl ReferenceData {
    pub fn new(cities: CityRegistry, covariates: CovariateTable) -> Self {
        ReferenceData { cities, covariates }
    }
}

const BUILTIN_CITIES: &[(&str, f64, f64)] = &[
    ("kohima", 25.6747, 94.1100),
    ("panaji", 15.4909, 73.8278),
    ("itanagar", 27.0844, 93.6053),
    ("gangtok", 27.3389, 88.6065),
    ("shilong", 25.5788, 91.8933),
    ("nalgonda", 17.0575, 79.2671),
    ("shimla", 31.1048, 77.1734),
    ("imphal", 24.8170, 93.9368),
    ("rourkela", 22.2604, 84.8536),
    ("siliguri", 26.7271, 88.3953),
    ("durgapur", 23.5204, 87.3119),
    ("dewas", 22.9659, 76.0553),
    ("aizawl", 23.7271, 92.7176),
    ("haldia", 22.0667, 88.0698),
    ("sagar", 23.8388, 78.7378),
    ("jabalpur", 23.1815, 79.9864),
    ("thoothukkudi", 8.7642, 78.1348),
    ("shivamogga", 13.9299, 75.5681),
    ("kurnool", 15.8222, 78.0350),
    ("jalpaiguri", 26.5170, 88.7196),
    ("korba", 22.3475, 82.6966),
    ("alwar", 27.5529, 76.6346),
    ("silchar", 24.8273, 92.7979),
    ("udaipur", 24.5854, 73.7125),
    ("erode", 11.3410, 77.7172),
    ("muzaffarpur", 26.1220, 85.3906),
    ("ujjain", 23.1793, 75.7849),
    ("kolhapur", 16.7050, 74.2433),
    ("agartala", 23.8315, 91.2868),
    ("sangli-miraj-kupwad", 16.8524, 74.5815),
    ("gaya", 24.7969, 85.0002),
    ("nellore", 14.4426, 79.9865),
    ("jalgaon", 21.0077, 75.5626),
    ("bhilainagar", 21.1950, 81.3509),
    ("jhansi", 25.4484, 78.5685),
    ("mangaluru", 12.9141, 74.8560),
    ("patiala", 30.3398, 76.3869),
    ("amravati", 20.9374, 77.7796),
    ("dehradun", 30.3165, 78.0322),
    ("guntur", 16.3067, 80.4365),
    ("firozabad", 27.1496, 78.3949),
    ("tiruppur", 11.1085, 77.3411),
    ("chandigarh", 30.7333, 76.7794),
    ("cuttack", 20.4625, 85.8828),
    ("warangal", 17.9784, 79.5941),
    ("mysuru", 12.2958, 76.6394),
    ("jammu", 32.7266, 74.8570),
    ("srinagar", 34.0837, 74.7973),
    ("bhubaneswar", 20.2961, 85.8245),
    ("vijaywada", 16.5062, 80.6480),
    ("aligarh", 27.8974, 78.0880),
    ("jodhpur", 26.2389, 73.0243),
    ("hubli dharwad", 15.3647, 75.1240),
    ("kochi", 9.9312, 76.2673),
    ("solapur", 17.6599, 75.9064),
    ("tiruchirappalli", 10.7905, 78.7047),
    ("gurgaon", 28.4595, 77.0266),
    ("jalandhar", 31.3260, 75.5762),
    ("guwahati", 26.1445, 91.7362),
    ("amritsar", 31.6340, 74.8723),
    ("raipur", 21.2514, 81.6296),
    ("bareilly", 28.3670, 79.4304),
    ("kota", 25.2138, 75.8648),
    ("noida", 28.5355, 77.3910),
    ("rajkot", 22.3039, 70.8022),
    ("moradabad", 28.8386, 78.7733),
    ("aurangabad", 19.8762, 75.3433),
    ("ranchi", 23.3441, 85.3096),
    ("gwalior", 26.2183, 78.1828),
    ("jamshedpur", 22.8046, 86.2029),
    ("coimbatore", 11.0168, 76.9558),
    ("meerut", 28.9845, 77.7064),
    ("dhanbad", 23.7957, 86.4304),
    ("allahabad", 25.4358, 81.8463),
    ("madurai", 9.9252, 78.1198),
    ("nashik", 19.9975, 73.7898),
    ("ludhiana", 30.9005, 75.8573),
    ("faridabad", 28.4089, 77.3178),
    ("vadodara", 22.3072, 73.1812),
    ("varanashi", 25.3176, 82.9739),
    ("agra", 27.1767, 78.0081),
    ("thiruvananthapuram", 8.5241, 76.9366),
    ("vishakhapatnam", 17.6868, 83.2185),
    ("patna", 25.5941, 85.1376),
    ("ghaziabad", 28.6692, 77.4538),
    ("bhopal", 23.2599, 77.4126),
    ("nagpur", 21.1458, 79.0882),
    ("indore", 22.7196, 75.8577),
    ("kanpur", 26.4499, 80.3319),
    ("jaipur", 26.9124, 75.7873),
    ("lucknow", 26.8467, 80.9462),
    ("pune", 18.5204, 73.8567),
    ("surat", 21.1702, 72.8311),
    ("kolkata", 22.5726, 88.3639),
    ("hyderabad", 17.3850, 78.4867),
    ("chennai", 13.0827, 80.2707),
    ("ahmedabad", 23.0225, 72.5714),
    ("bengaluru", 12.9716, 77.5946),
    ("mumbai", 19.0760, 72.8777),
    ("delhi", 28.6139, 77.2090),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_knows_delhi_but_not_atlantis() {
        let registry = CityRegistry::builtin();
        assert_eq!(registry.len(), 100);
        assert!(registry.contains("delhi"));
        assert!(registry.contains("  Delhi "));
        assert!(!registry.contains("atlantis"));
        let delhi = registry.get("delhi").unwrap();
        assert!((delhi.latitude - 28.6139).abs() < 1e-9);
    }

    #[test]
    fn covariate_keys_are_normalized() {
        let mut rows = HashMap::new();
        rows.insert(
            " Pune".to_string(),
            CityCovariates {
                road_length_km: Some(1200.0),
                ..CityCovariates::default()
            },
        );
        let table = CovariateTable::new(rows);
        assert_eq!(table.get("PUNE").unwrap().road_length_km, Some(1200.0));
    }

    #[test]
    fn per_capita_needs_nonzero_population() {
        let row = CityCovariates {
            population_2020: Some(0.0),
            vkt_public_transport: Some(5e7),
            ..CityCovariates::default()
        };
        assert_eq!(row.transit_vkt_per_capita(), None);
    }

    #[test]
    fn zero_transit_vkt_is_zero_per_capita() {
        let row = CityCovariates {
            population_2020: Some(1e6),
            vkt_public_transport: Some(0.0),
            ..CityCovariates::default()
        };
        assert_eq!(row.transit_vkt_per_capita(), Some(0.0));

        let missing = CityCovariates {
            population_2020: Some(1e6),
            ..CityCovariates::default()
        };
        assert_eq!(missing.transit_vkt_per_capita(), None);
    }

    #[test]
    fn missing_covariates_file_gives_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let table = CovariateTable::load_or_empty(dir.path().join("nope.json"));
        assert!(table.is_empty());
    }

    #[test]
    fn covariates_file_parses_partial_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("covariates.json");
        fs::write(
            &path,
            r#"{"Delhi": {"population_2020": 2.0e7, "rho_i": 210.0}, "pune": {}}"#,
        )
        .unwrap();
        let table = CovariateTable::from_file(&path).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("delhi").unwrap().rho_i, Some(210.0));
        assert_eq!(table.get("pune").unwrap(), &CityCovariates::default());
    }
}
