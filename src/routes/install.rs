use axum::{extract::State, http::HeaderMap, routing::{get, post}, Json, Router};
use serde::Serialize;

use super::admin::require_admin;
use super::{ApiError, ApiResult};
use crate::airdrop::types::InstallationStatus;
use crate::app_state::AppState;
use crate::install::{self, InstallCheck};

#[derive(Debug, Serialize)]
pub struct InstallStatusResponse {
    pub is_installed: bool,
    pub version: Option<String>,
    pub installed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<InstallationStatus> for InstallStatusResponse {
    fn from(s: InstallationStatus) -> Self {
        Self {
            is_installed: s.is_installed,
            version: s.version,
            installed_at: s.installed_at,
        }
    }
}

async fn status(State(state): State<AppState>) -> ApiResult<InstallStatusResponse> {
    Ok(Json(state.store.installation_status()?.into()))
}

async fn check(State(state): State<AppState>) -> Json<InstallCheck> {
    Json(install::check(&state.store))
}

async fn complete(State(state): State<AppState>) -> ApiResult<InstallStatusResponse> {
    let api_key = state.oracle.api_key();
    let status = install::complete(&state.store, &api_key).map_err(|e| {
        tracing::error!(err = %e, "installation failed");
        ApiError::from(e)
    })?;
    state.refresh_whitelist_gauge();
    Ok(Json(status.into()))
}

async fn reset(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<InstallStatusResponse> {
    let session = require_admin(&state, &headers)?;
    tracing::warn!(by = %session.username, "installation reset requested");
    Ok(Json(install::reset(&state.store)?.into()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/install/status", get(status))
        .route("/api/install/check", post(check))
        .route("/api/install/complete", post(complete))
        .route("/api/install/reset", post(reset))
}
