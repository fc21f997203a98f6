use axum::{
    async_trait,
    extract::{FromRequestParts, Path},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Json, Response},
};
use emissions_model::{CitySnapshot, EstimateError, LoadError};
use thiserror::Error;
use tracing::{error, warn};

use crate::api::models::ApiResponse;
use crate::api::routes::AppState;

const INTERNAL_MESSAGE: &str = "internal server error";

/// Errors a handler can answer with. Internal details are logged, never sent.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Internal(String),
}

impl From<LoadError> for ApiError {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::NotFound(city) => ApiError::NotFound(format!("City '{}' not found", city)),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<EstimateError> for ApiError {
    fn from(err: EstimateError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::BadRequest(message) => {
                warn!("⚠️ Rejected request: {}", message);
                (StatusCode::BAD_REQUEST, message)
            }
            ApiError::Internal(detail) => {
                error!("❌ {}", detail);
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE.to_string())
            }
        };
        (status, Json(ApiResponse::<()>::error(message))).into_response()
    }
}

/// Runs the configured loader off the async runtime.
pub async fn load_snapshot(state: &AppState, city_id: String) -> Result<CitySnapshot, ApiError> {
    let loader = state.loader.clone();
    tokio::task::spawn_blocking(move || loader.load(&city_id))
        .await
        .map_err(|e| ApiError::Internal(format!("loader task failed: {}", e)))?
        .map_err(ApiError::from)
}

/// Snapshot of the city named by the `:id` path segment.
pub struct CityFromPath(pub CitySnapshot);

#[async_trait]
impl FromRequestParts<AppState> for CityFromPath {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Path(city_id) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        load_snapshot(state, city_id).await.map(CityFromPath)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_errors_map_to_status_codes() {
        let not_found = ApiError::from(LoadError::NotFound("atlantis".to_string()));
        assert_eq!(not_found.into_response().status(), StatusCode::NOT_FOUND);

        let malformed = ApiError::from(LoadError::malformed("data/pune/data.json", "bad"));
        assert_eq!(
            malformed.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        let invalid = ApiError::from(EstimateError::InvalidIntensity(120.0));
        assert_eq!(invalid.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
