use axum::{
    extract::{Query, State},
    response::Json,
};
use chrono::Utc;
use emissions_model::{CitySnapshot, EmissionStats, PolicyResponse};
use tracing::{error, info};

use crate::api::middleware::{load_snapshot, ApiError, CityFromPath};
use crate::api::models::*;
use crate::api::routes::AppState;

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

// ========== SERVICE ==========

pub async fn root(State(state): State<AppState>) -> Json<ApiResponse<ServiceInfo>> {
    Json(ApiResponse::success(ServiceInfo {
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        loader: state.loader.kind().to_string(),
        cities: state.reference.cities.len(),
    }))
}

pub async fn health_check() -> Json<ApiResponse<serde_json::Value>> {
    Json(ApiResponse::success(serde_json::json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339()
    })))
}

// ========== CITIES ==========

pub async fn list_cities(State(state): State<AppState>) -> Json<ApiResponse<Vec<String>>> {
    let names = state.reference.cities.names().map(str::to_string).collect();
    Json(ApiResponse::success(names))
}

/// Cities with a known population, largest first.
pub async fn cities_by_population(
    State(state): State<AppState>,
) -> Json<ApiResponse<Vec<CityPopulation>>> {
    let mut ranked: Vec<CityPopulation> = state
        .reference
        .covariates
        .iter()
        .filter_map(|(city, covariates)| {
            covariates
                .population_2020
                .filter(|p| p.is_finite())
                .map(|population_2020| CityPopulation {
                    city: city.to_string(),
                    population_2020,
                })
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.population_2020
            .total_cmp(&a.population_2020)
            .then_with(|| a.city.cmp(&b.city))
    });
    Json(ApiResponse::success(ranked))
}

pub async fn city_data(CityFromPath(snapshot): CityFromPath) -> ApiResult<CitySnapshot> {
    Ok(Json(ApiResponse::success(snapshot)))
}

pub async fn city_stats(CityFromPath(snapshot): CityFromPath) -> ApiResult<EmissionStats> {
    Ok(Json(ApiResponse::success(snapshot.baseline_stats)))
}

// ========== POLICY ==========

pub async fn apply_policy(
    State(state): State<AppState>,
    Json(payload): Json<PolicyRequest>,
) -> ApiResult<PolicyResponse> {
    let snapshot = load_snapshot(&state, payload.city).await?;
    let response = state.estimator.estimate(
        &snapshot,
        &payload.selected_roads,
        payload.pricing_intensity,
    )?;

    info!(
        "🚦 Policy for {}: {} zones at {}% -> {:.2}% total reduction",
        response.city,
        response.affected_zone_indices.len(),
        response.pricing_intensity,
        response.reduction_percentage.total
    );
    Ok(Json(ApiResponse::success(response)))
}

pub async fn reduction_potential(
    State(state): State<AppState>,
    CityFromPath(snapshot): CityFromPath,
) -> ApiResult<PolicyResponse> {
    Ok(Json(ApiResponse::success(state.estimator.potential(&snapshot))))
}

/// Side-by-side baselines. Failures are reported per city instead of failing
/// the whole request.
pub async fn compare_cities(
    State(state): State<AppState>,
    Query(query): Query<CompareQuery>,
) -> ApiResult<Vec<CompareEntry>> {
    let city_ids = query.city_ids();
    if city_ids.is_empty() {
        return Err(ApiError::BadRequest(
            "query parameter 'cities' must list at least one city".to_string(),
        ));
    }

    let mut entries = Vec::with_capacity(city_ids.len());
    for city_id in city_ids {
        let entry = match load_snapshot(&state, city_id.clone()).await {
            Ok(snapshot) => CompareEntry::Loaded {
                covariates: state.reference.covariates.get(&snapshot.city).cloned(),
                zone_count: snapshot.zone_count(),
                stats: snapshot.baseline_stats,
                source: snapshot.source,
                city: snapshot.city,
            },
            Err(ApiError::NotFound(message)) => CompareEntry::Failed {
                city: city_id,
                error: message,
            },
            Err(e) => {
                error!("❌ Comparison failed for {}: {}", city_id, e);
                CompareEntry::Failed {
                    city: city_id,
                    error: "city data unavailable".to_string(),
                }
            }
        };
        entries.push(entry);
    }

    Ok(Json(ApiResponse::success(entries)))
}
