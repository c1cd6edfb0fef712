use std::path::PathBuf;
use std::sync::Arc;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use crate::config::SourceConfig;
use crate::registry::handle::RegistryHandle;
use shared::protocol::API_PREFIX;
use shared::types::ServiceRecord;

#[derive(Clone)]
pub struct AppState {
    pub registry: RegistryHandle,
    pub hash_rx: watch::Receiver<String>,
    pub source: Arc<SourceConfig>,
}

#[derive(Serialize)]
pub struct ConfigResponse {
    pub directory: PathBuf,
    pub environment: String,
    pub poll_interval_secs: u64,
}

#[derive(Deserialize)]
pub struct EnvironmentQuery {
    pub environment: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(&format!("{}/config", API_PREFIX), get(get_config))
        .route(&format!("{}/services", API_PREFIX), get(get_services))
        .route(&format!("{}/services/hash", API_PREFIX), get(get_hash))
        .route(&format!("{}/services/:service", API_PREFIX), get(get_service))
        .with_state(state)
}

async fn get_config(State(state): State<AppState>) -> Json<ConfigResponse> {
    Json(ConfigResponse {
        directory: state.source.directory.clone(),
        environment: state.source.environment.clone(),
        poll_interval_secs: state.source.poll_interval().as_secs(),
    })
}

async fn get_services(
    State(state): State<AppState>,
    Query(params): Query<EnvironmentQuery>,
) -> Result<Json<Vec<ServiceRecord>>, StatusCode> {
    let services = if let Some(environment) = params.environment {
        state.registry.get_by_environment(environment).await
    } else {
        state.registry.get_all().await
    };

    services
        .map(Json)
        .map_err(|e| {
            tracing::error!("Failed to query services: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

async fn get_hash(State(state): State<AppState>) -> String {
    state.hash_rx.borrow().clone()
}

/// Defaults to the environment this daemon publishes under
async fn get_service(
    State(state): State<AppState>,
    Path(service): Path<String>,
    Query(params): Query<EnvironmentQuery>,
) -> Result<Json<ServiceRecord>, StatusCode> {
    let environment = params
        .environment
        .unwrap_or_else(|| state.source.environment.clone());

    state
        .registry
        .get_one(service, environment)
        .await
        .map_err(|e| {
            tracing::error!("Failed to query service: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}
