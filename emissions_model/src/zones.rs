//! Normalization of GeoJSON feature collections into [`ZoneFeature`]s.

use serde_json::{Map, Value};

use crate::snapshot::ZoneFeature;

const WARD_NUMBER_KEY: &str = "Ward_No.";

/// Turns a FeatureCollection into indexed zones.
///
/// Features with absent or null geometry are dropped, and the remaining ones
/// are numbered densely. Each zone gets a synthesized ward label; without a
/// `Ward_No.` property the label uses the feature's position in the input.
pub fn zones_from_collection(collection: &Value) -> Result<Vec<ZoneFeature>, String> {
    let features = match collection.get("features") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(features)) => features,
        Some(_) => return Err("`features` is not an array".to_string()),
    };

    let zones = features
        .iter()
        .enumerate()
        .filter_map(|(position, feature)| {
            let geometry = feature.get("geometry").filter(|g| !g.is_null())?;
            let kind = feature
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("Feature")
                .to_string();
            let properties = feature
                .get("properties")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            Some((position, kind, geometry.clone(), properties))
        })
        .enumerate()
        .map(|(id, (position, kind, geometry, properties))| ZoneFeature {
            kind,
            geometry,
            properties: label_ward(properties, id, position),
            id,
        })
        .collect();

    Ok(zones)
}

fn label_ward(mut properties: Map<String, Value>, id: usize, position: usize) -> Map<String, Value> {
    let ward_number = properties
        .get(WARD_NUMBER_KEY)
        .filter(|v| !v.is_null())
        .cloned()
        .unwrap_or_else(|| Value::from(position + 1));

    let (name, code) = match ward_number.as_i64() {
        Some(n) => (format!("Ward {}", n), format!("W/{:02}", n)),
        None => {
            let text = match &ward_number {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (format!("Ward {}", text), format!("W/{}", text))
        }
    };

    properties.insert("road_id".to_string(), Value::from(id));
    properties.insert("name".to_string(), Value::from(name));
    properties.insert("ward_number".to_string(), ward_number);
    properties.insert("Wards".to_string(), Value::from(code));
    properties.insert("ward_category".to_string(), Value::from("Municipal Ward"));
    properties
}

/// Every `[lon, lat]` position found anywhere in a geometry's coordinates,
/// whatever the geometry type.
pub fn positions(geometry: &Value) -> Vec<(f64, f64)> {
    let mut out = Vec::new();
    if let Some(coords) = geometry.get("coordinates") {
        collect_positions(coords, &mut out);
    }
    if let Some(Value::Array(members)) = geometry.get("geometries") {
        for member in members {
            out.extend(positions(member));
        }
    }
    out
}

fn collect_positions(value: &Value, out: &mut Vec<(f64, f64)>) {
    let Value::Array(items) = value else {
        return;
    };
    match (
        items.first().and_then(Value::as_f64),
        items.get(1).and_then(Value::as_f64),
    ) {
        (Some(lon), Some(lat)) => out.push((lon, lat)),
        _ => {
            for item in items {
                collect_positions(item, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn square() -> Value {
        json!({"type": "Polygon", "coordinates": [[[77.0, 28.0], [77.1, 28.0], [77.1, 28.1], [77.0, 28.0]]]})
    }

    #[test]
    fn null_geometry_features_are_dropped_and_ids_stay_dense() {
        let collection = json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "geometry": square(), "properties": {}},
                {"type": "Feature", "geometry": null, "properties": {}},
                {"type": "Feature", "properties": {}},
                {"type": "Feature", "geometry": square()}
            ]
        });
        let zones = zones_from_collection(&collection).unwrap();
        assert_eq!(zones.len(), 2);
        assert_eq!(zones[0].id, 0);
        assert_eq!(zones[1].id, 1);
        // labelled by input position, counting the dropped features
        assert_eq!(zones[1].properties["name"], "Ward 4");
        assert_eq!(zones[1].properties["ward_number"], 4);
        assert_eq!(zones[1].properties["road_id"], 1);
    }

    #[test]
    fn ward_number_property_drives_the_label() {
        let collection = json!({
            "features": [
                {"geometry": square(), "properties": {"Ward_No.": 7, "Pop_2011": 1200}}
            ]
        });
        let zones = zones_from_collection(&collection).unwrap();
        let props = &zones[0].properties;
        assert_eq!(props["name"], "Ward 7");
        assert_eq!(props["Wards"], "W/07");
        assert_eq!(props["ward_number"], 7);
        assert_eq!(props["ward_category"], "Municipal Ward");
        assert_eq!(props["Pop_2011"], 1200);
        assert_eq!(zones[0].kind, "Feature");
    }

    #[test]
    fn textual_ward_numbers_are_kept_verbatim() {
        let collection = json!({
            "features": [{"geometry": square(), "properties": {"Ward_No.": "12A"}}]
        });
        let zones = zones_from_collection(&collection).unwrap();
        assert_eq!(zones[0].properties["Wards"], "W/12A");
    }

    #[test]
    fn missing_features_is_empty_but_wrong_type_is_an_error() {
        assert!(zones_from_collection(&json!({})).unwrap().is_empty());
        assert!(zones_from_collection(&json!({"features": 3})).is_err());
    }

    #[test]
    fn positions_walk_nested_geometries() {
        assert_eq!(positions(&square()).len(), 4);
        let line = json!({"type": "LineString", "coordinates": [[1.0, 2.0], [3.0, 4.0]]});
        assert_eq!(positions(&line), vec![(1.0, 2.0), (3.0, 4.0)]);
        let collection = json!({"type": "GeometryCollection", "geometries": [line, square()]});
        assert_eq!(positions(&collection).len(), 6);
    }
}
