use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    classify::ServerErrorsFailureClass,
    cors::CorsLayer,
    trace::TraceLayer,
};
use tracing::Level;

use emissions_model::{CityDataLoader, PolicyEstimator, ReferenceData};

use crate::api::handlers::*;

#[derive(Clone)]
pub struct AppState {
    pub reference: Arc<ReferenceData>,
    pub loader: Arc<dyn CityDataLoader>,
    pub estimator: Arc<PolicyEstimator>,
}

impl AppState {
    pub fn new(
        reference: Arc<ReferenceData>,
        loader: Arc<dyn CityDataLoader>,
        estimator: Arc<PolicyEstimator>,
    ) -> Self {
        AppState {
            reference,
            loader,
            estimator,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let service_routes = Router::new()
        .route("/", get(root))
        .route("/health", get(health_check));

    let city_routes = Router::new()
        .route("/cities", get(list_cities))
        .route("/cities/population", get(cities_by_population))
        .route("/city/:id", get(city_data))
        .route("/city/:id/stats", get(city_stats))
        .route("/city/:id/potential", get(reduction_potential))
        .route("/compare", get(compare_cities))
        .route("/apply_policy", post(apply_policy));

    Router::new()
        .merge(service_routes)
        .merge(city_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::span!(
                        Level::INFO,
                        "request",
                        method = %request.method(),
                        uri = %request.uri(),
                        version = ?request.version(),
                    )
                })
                .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                    tracing::info!("📥 {} {}", request.method(), request.uri());
                })
                .on_response(|response: &axum::http::Response<_>, latency: std::time::Duration, _span: &tracing::Span| {
                    tracing::info!(
                        "📤 status={} latency={:.2}ms",
                        response.status(),
                        latency.as_secs_f64() * 1000.0
                    );
                })
                .on_failure(|error: ServerErrorsFailureClass, latency: std::time::Duration, _span: &tracing::Span| {
                    tracing::error!(
                        "❌ Request failed: {:?} latency={:.2}ms",
                        error,
                        latency.as_secs_f64() * 1000.0
                    );
                }),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}
