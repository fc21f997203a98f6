use std::error::Error;
use std::sync::Arc;

use congestion_api::api::routes::{create_router, AppState};
use congestion_api::config::ServerConfig;
use emissions_model::{build_loader, ModelParameters, PolicyEstimator};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env()?;
    let reference = Arc::new(config.load_reference()?);
    info!(
        "📚 {} cities, covariates for {}",
        reference.cities.len(),
        reference.covariates.len()
    );

    let loader = build_loader(config.loader, config.loader_settings(), reference.clone());
    let estimator = Arc::new(PolicyEstimator::new(
        reference.clone(),
        ModelParameters::default(),
    ));
    info!(
        "📂 Serving {} data from {} (synthetic fallback: {})",
        config.loader,
        config.data_dir.display(),
        config.synthetic_fallback
    );

    let app = create_router(AppState::new(reference, loader, estimator));

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("🚀 Listening on http://{}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
