//! Seeded placeholder data for known cities whose files are missing or
//! unreadable. Output is a pure function of the seed and the city id.

use std::f64::consts::PI;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::{json, Map};
use xxhash_rust::xxh32::xxh32;

use crate::snapshot::{Coordinates, ZoneFeature};
use crate::zones::positions;

/// Half-width in degrees of the grid drawn around a city centre.
const CENTRE_HALF_SPAN: f64 = 0.04;
const CENTRE_GRID_SIZE: usize = 25;
/// Roughly 500 m at Indian latitudes.
const WARD_GRID_STEP: f64 = 0.0045;
const WARD_GRID_PADDING: f64 = 0.01;
/// Keeps a grid derived from oversized geometries renderable.
const MAX_AXIS_CELLS: usize = 400;

const PEAK_EMISSION: f64 = 120.0;
const FALLOFF_PER_CELL: f64 = 4.0;
const NOISE_STD_DEV: f64 = 10.0;

const GRID_STREAM: u64 = 0;
const WARD_STREAM: u64 = 1;

struct WardPattern {
    kind: &'static str,
    width: f64,
    count: usize,
    population: (u32, u32),
}

const WARD_PATTERNS: [WardPattern; 3] = [
    WardPattern {
        kind: "central",
        width: 0.008,
        count: 4,
        population: (80_000, 150_000),
    },
    WardPattern {
        kind: "suburban",
        width: 0.012,
        count: 6,
        population: (40_000, 80_000),
    },
    WardPattern {
        kind: "peripheral",
        width: 0.018,
        count: 6,
        population: (20_000, 50_000),
    },
];

const WARD_CODES: [&str; 30] = [
    "A/01", "A/02", "A/03", "B/01", "B/02", "B/03", "C/01", "C/02", "C/03", "D/01", "D/02",
    "D/03", "E/01", "E/02", "E/03", "F/01", "F/02", "F/03", "G/01", "G/02", "H/01", "H/02",
    "I/01", "I/02", "J/01", "J/02", "K/01", "K/02", "L/01", "L/02",
];

#[derive(Debug, Clone, Copy)]
pub struct SyntheticGenerator {
    seed: u64,
}

impl SyntheticGenerator {
    pub fn new(seed: u64) -> Self {
        SyntheticGenerator { seed }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    fn rng_for(&self, city: &str, stream: u64) -> ChaCha8Rng {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed ^ u64::from(xxh32(city.as_bytes(), 0)));
        rng.set_stream(stream);
        rng
    }

    /// Emission grid peaking at the centre of the covered area.
    ///
    /// The grid covers the extent of `zones` when they carry coordinates,
    /// otherwise a fixed window around `centre` (`(lat, lon)`).
    pub fn emission_grid(
        &self,
        city: &str,
        centre: (f64, f64),
        zones: &[ZoneFeature],
    ) -> (Vec<Vec<f64>>, Coordinates) {
        let coordinates = grid_from_zones(zones).unwrap_or_else(|| centre_grid(centre));
        let mut rng = self.rng_for(city, GRID_STREAM);

        let rows = coordinates.lat.len();
        let cols = coordinates.lon.len();
        let (centre_row, centre_col) = ((rows / 2) as f64, (cols / 2) as f64);

        let grid = (0..rows)
            .map(|i| {
                (0..cols)
                    .map(|j| {
                        let dist = ((i as f64 - centre_row).powi(2)
                            + (j as f64 - centre_col).powi(2))
                        .sqrt();
                        let base = (PEAK_EMISSION - dist * FALLOFF_PER_CELL).max(0.0);
                        (base + standard_normal(&mut rng) * NOISE_STD_DEV).max(0.0)
                    })
                    .collect()
            })
            .collect();

        (grid, coordinates)
    }

    /// Sixteen irregular municipal wards scattered around `centre`.
    pub fn wards(&self, city: &str, centre: (f64, f64)) -> Vec<ZoneFeature> {
        let (base_lat, base_lon) = centre;
        let mut rng = self.rng_for(city, WARD_STREAM);
        let mut wards = Vec::new();

        for pattern in &WARD_PATTERNS {
            for _ in 0..pattern.count {
                let id = wards.len();
                let centre_lat = base_lat + rng.gen_range(-CENTRE_HALF_SPAN..=CENTRE_HALF_SPAN);
                let centre_lon = base_lon + rng.gen_range(-CENTRE_HALF_SPAN..=CENTRE_HALF_SPAN);

                let points = rng.gen_range(10..=18);
                let mut ring: Vec<[f64; 2]> = (0..points)
                    .map(|k| {
                        let angle = 2.0 * PI * k as f64 / points as f64;
                        let radius = pattern.width * rng.gen_range(0.6..1.4);
                        [
                            centre_lon + radius * angle.sin(),
                            centre_lat + radius * angle.cos(),
                        ]
                    })
                    .collect();
                ring.push(ring[0]);

                let area_sqm = rng.gen_range(2_000_000.0..8_000_000.0) * (pattern.width / 0.015);
                let area_ha = area_sqm / 10_000.0;
                let pop_2011 = rng.gen_range(pattern.population.0..=pattern.population.1);
                let pop_2001 = (f64::from(pop_2011) * rng.gen_range(0.75..0.90)) as u32;
                let density = (f64::from(pop_2011) / area_ha * 100.0).round() / 100.0;

                let code = WARD_CODES[id % WARD_CODES.len()];
                let name = format!("Ward {}", code);

                let mut properties = Map::new();
                properties.insert("Id".to_string(), json!(id));
                properties.insert("Wards".to_string(), json!(code));
                properties.insert("Area".to_string(), json!(area_sqm));
                properties.insert("Pop_2011".to_string(), json!(pop_2011));
                properties.insert("Pop_2001".to_string(), json!(pop_2001));
                properties.insert("Area_in_HA".to_string(), json!(area_ha));
                properties.insert("Density".to_string(), json!(density));
                properties.insert("road_id".to_string(), json!(id));
                properties.insert("name".to_string(), json!(name));
                properties.insert("ward_type".to_string(), json!(pattern.kind));
                properties.insert("ward_category".to_string(), json!("Municipal Ward"));
                properties.insert(
                    "emission_level".to_string(),
                    json!(rng.gen_range(80.0_f64..250.0)),
                );

                wards.push(ZoneFeature {
                    kind: "Feature".to_string(),
                    geometry: json!({"type": "Polygon", "coordinates": [ring]}),
                    properties,
                    id,
                });
            }
        }

        wards
    }
}

fn centre_grid((lat, lon): (f64, f64)) -> Coordinates {
    Coordinates {
        lat: linspace(lat - CENTRE_HALF_SPAN, lat + CENTRE_HALF_SPAN, CENTRE_GRID_SIZE),
        lon: linspace(lon - CENTRE_HALF_SPAN, lon + CENTRE_HALF_SPAN, CENTRE_GRID_SIZE),
    }
}

fn grid_from_zones(zones: &[ZoneFeature]) -> Option<Coordinates> {
    let points: Vec<(f64, f64)> = zones
        .iter()
        .flat_map(|z| positions(&z.geometry))
        .filter(|(lon, lat)| lon.is_finite() && lat.is_finite())
        .collect();
    if points.is_empty() {
        return None;
    }

    let (mut min_lon, mut max_lon) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut min_lat, mut max_lat) = (f64::INFINITY, f64::NEG_INFINITY);
    for (lon, lat) in points {
        min_lon = min_lon.min(lon);
        max_lon = max_lon.max(lon);
        min_lat = min_lat.min(lat);
        max_lat = max_lat.max(lat);
    }

    Some(Coordinates {
        lat: arange(min_lat - WARD_GRID_PADDING, max_lat + WARD_GRID_PADDING),
        lon: arange(min_lon - WARD_GRID_PADDING, max_lon + WARD_GRID_PADDING),
    })
}

fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    if n < 2 {
        return vec![start; n];
    }
    let step = (end - start) / (n - 1) as f64;
    (0..n).map(|i| start + step * i as f64).collect()
}

/// Half-open range `[start, end)` at the ward grid step, widening the step
/// when the range would exceed [`MAX_AXIS_CELLS`].
fn arange(start: f64, end: f64) -> Vec<f64> {
    let span = end - start;
    let mut step = WARD_GRID_STEP;
    let mut n = (span / step).ceil() as usize;
    if n > MAX_AXIS_CELLS {
        step = span / MAX_AXIS_CELLS as f64;
        n = MAX_AXIS_CELLS;
    }
    (0..n.max(1)).map(|i| start + step * i as f64).collect()
}

/// Box-Muller transform.
fn standard_normal<R: Rng>(rng: &mut R) -> f64 {
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}
