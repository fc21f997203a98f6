use std::fs;
use std::path::Path;
use std::sync::Arc;

use emissions_model::{
    build_loader, CityRegistry, CovariateTable, LoadError, LoaderKind, LoaderSettings,
    ModelParameters, PolicyEstimator, ReferenceData, SnapshotSource,
};
use serde_json::json;
use tempfile::TempDir;

fn reference() -> Arc<ReferenceData> {
    Arc::new(ReferenceData::new(
        CityRegistry::builtin(),
        CovariateTable::default(),
    ))
}

fn settings(dir: &Path, fallback: bool) -> LoaderSettings {
    LoaderSettings {
        synthetic_fallback: fallback,
        ..LoaderSettings::new(dir)
    }
}

fn write_json(path: &Path, value: &serde_json::Value) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, serde_json::to_string(value).unwrap()).unwrap();
}

fn ward_map() -> serde_json::Value {
    json!({
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"Ward_No.": 7},
                "geometry": {"type": "Polygon", "coordinates": [[[77.1, 28.6], [77.2, 28.6], [77.2, 28.7], [77.1, 28.6]]]}
            },
            {"type": "Feature", "properties": {}, "geometry": null},
            {
                "type": "Feature",
                "properties": {},
                "geometry": {"type": "LineString", "coordinates": [[77.3, 28.5], [77.4, 28.55]]}
            }
        ]
    })
}

fn grid_fixture(dir: &TempDir) {
    write_json(
        &dir.path().join("delhi/emissions.grid.json"),
        &json!({
            "coords": {"lat": [28.5, 28.6, 28.7], "lon": [77.1, 77.3]},
            "data_vars": {
                "co2_road": [[1000.0, 2000.0], [null, 3000.0], [500.0, 500.0]],
                "nox_road": [[100.0, 100.0], [100.0, 100.0], [100.0, 100.0]]
            }
        }),
    );
    write_json(&dir.path().join("delhi/map.geojson"), &ward_map());
}

fn aggregated_fixture(dir: &TempDir) {
    write_json(
        &dir.path().join("mumbai/data.json"),
        &json!({
            "emissions": {
                "coordinates": {"lat": [19.0, 19.2], "lon": [72.8, 73.0]},
                "emissions": {"co2_total": [[1.0, 2.0], [3.0, null]]},
                "summary": {"co2_total_sum": 900.0, "nox_total_sum": 60.0, "pm25_total_sum": 40.0}
            },
            "geometry": ward_map()
        }),
    );
}

#[test]
fn grid_loader_reads_files_and_splits_pollutants() {
    let dir = tempfile::tempdir().unwrap();
    grid_fixture(&dir);
    let loader = build_loader(LoaderKind::Grid, settings(dir.path(), false), reference());

    let snapshot = loader.load(" Delhi ").unwrap();
    assert_eq!(snapshot.city, "delhi");
    assert_eq!(snapshot.source, SnapshotSource::Observed);
    assert_eq!(snapshot.zone_count(), 2);
    assert_eq!(snapshot.zones[0].properties["Wards"], json!("W/07"));
    assert_eq!(snapshot.zones[1].id, 1);
    assert_eq!(snapshot.zones[1].properties["ward_number"], json!(3));

    // display grid is co2_road: 7000 kg
    assert!((snapshot.baseline_stats.total - 7.0).abs() < 1e-9);
    assert!((snapshot.baseline_stats.co2 - 7.0).abs() < 1e-9);
    assert!((snapshot.baseline_stats.nox - 0.6).abs() < 1e-9);
    assert!(snapshot.baseline_stats.pm25 > 0.0);
    assert!(snapshot.emission_grid[1][0].is_nan());

    assert_eq!(snapshot.bounds.north, 28.7);
    assert_eq!(snapshot.bounds.west, 77.1);
}

#[test]
fn aggregated_loader_sums_totals_and_pads_bounds() {
    let dir = tempfile::tempdir().unwrap();
    aggregated_fixture(&dir);
    let loader = build_loader(
        LoaderKind::Aggregated,
        settings(dir.path(), false),
        reference(),
    );

    let snapshot = loader.load("mumbai").unwrap();
    assert_eq!(snapshot.baseline_stats.total, 1000.0);
    assert_eq!(snapshot.zone_count(), 2);
    assert!((snapshot.bounds.north - 19.21).abs() < 1e-9);
    assert!((snapshot.bounds.west - 72.79).abs() < 1e-9);
}

#[test]
fn unknown_city_is_not_found_even_with_fallback() {
    let dir = tempfile::tempdir().unwrap();
    for kind in [LoaderKind::Grid, LoaderKind::Aggregated] {
        let loader = build_loader(kind, settings(dir.path(), true), reference());
        match loader.load("atlantis") {
            Err(LoadError::NotFound(city)) => assert_eq!(city, "atlantis"),
            other => panic!("expected NotFound, got {:?}", other.map(|s| s.city)),
        }
    }
}

#[test]
fn missing_files_without_fallback_are_not_found() {
    let dir = tempfile::tempdir().unwrap();
    for kind in [LoaderKind::Grid, LoaderKind::Aggregated] {
        let loader = build_loader(kind, settings(dir.path(), false), reference());
        assert!(matches!(loader.load("pune"), Err(LoadError::NotFound(_))));
    }
}

#[test]
fn malformed_file_without_fallback_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pune/data.json");
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "{\"emissions\": 3}").unwrap();

    let loader = build_loader(
        LoaderKind::Aggregated,
        settings(dir.path(), false),
        reference(),
    );
    assert!(matches!(loader.load("pune"), Err(LoadError::Malformed { .. })));
}

#[test]
fn fallback_serves_deterministic_synthetic_data() {
    let dir = tempfile::tempdir().unwrap();
    for kind in [LoaderKind::Grid, LoaderKind::Aggregated] {
        let a = build_loader(kind, settings(dir.path(), true), reference())
            .load("pune")
            .unwrap();
        let b = build_loader(kind, settings(dir.path(), true), reference())
            .load("pune")
            .unwrap();
        assert!(a.is_synthetic());
        assert_eq!(a.zone_count(), 16);
        assert_eq!(a.emission_grid, b.emission_grid);
        assert_eq!(a.baseline_stats, b.baseline_stats);
        assert!(a.baseline_stats.total > 0.0);
    }
}

#[test]
fn synthetic_grid_follows_real_ward_extent() {
    let dir = tempfile::tempdir().unwrap();
    write_json(&dir.path().join("delhi/map.geojson"), &ward_map());
    let loader = build_loader(LoaderKind::Grid, settings(dir.path(), true), reference());

    let snapshot = loader.load("delhi").unwrap();
    assert!(snapshot.is_synthetic());
    // real wards kept, only the grid is synthesized
    assert_eq!(snapshot.zone_count(), 2);
    assert!(snapshot.bounds.south <= 28.5 - 0.009);
    assert!(snapshot.bounds.east >= 77.4);
}

#[test]
fn empty_selection_leaves_baseline_untouched() {
    let dir = tempfile::tempdir().unwrap();
    grid_fixture(&dir);
    let reference = reference();
    let loader = build_loader(LoaderKind::Grid, settings(dir.path(), true), reference.clone());
    let estimator = PolicyEstimator::new(reference, ModelParameters::default());

    let snapshot = loader.load("delhi").unwrap();
    let response = estimator.estimate(&snapshot, &[], 50.0).unwrap();
    assert_eq!(response.projected_stats, response.baseline_stats);
    assert_eq!(response.estimated_cost_savings, 0.0);
}
