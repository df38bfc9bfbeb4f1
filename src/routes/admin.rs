//! Admin console endpoints. Everything except `login` needs an admin token.
//!
//! - POST   /api/admin/login | /api/admin/logout, GET /api/admin/session
//! - GET    /api/admin/whitelist, POST /api/admin/whitelist
//! - PUT    /api/admin/whitelist/:id, DELETE /api/admin/whitelist/:id
//! - GET    /api/admin/claims[?address=], POST /api/admin/claims/:id/fail
//! - GET    /api/admin/settings, GET|PUT /api/admin/settings/:key
//! - GET    /api/admin/statistics

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ApiError, ApiResult};
use crate::airdrop::types::{
    Claim, NewWhitelistEntry, Setting, Statistics, WhitelistEntry, WhitelistPatch,
    SETTING_ETHPLORER_API_KEY,
};
use crate::app_state::AppState;
use crate::auth::{token_from_headers, AdminSession};

pub(crate) fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<AdminSession, ApiError> {
    Ok(state.auth.authorize(headers)?)
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct ClaimsQuery {
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SettingValue {
    pub value: String,
}

async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> ApiResult<LoginResponse> {
    let session = state.auth.login(&req.username, &req.password)?;
    Ok(Json(LoginResponse {
        token: session.token,
        username: session.username,
        role: session.role,
    }))
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Value> {
    require_admin(&state, &headers)?;
    let dropped = token_from_headers(&headers)
        .map(|t| state.auth.logout(&t))
        .unwrap_or(false);
    Ok(Json(serde_json::json!({ "ok": true, "session_dropped": dropped })))
}

async fn session(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Value> {
    let session = require_admin(&state, &headers)?;
    // never echo the token back
    Ok(Json(serde_json::json!({
        "username": session.username,
        "role": session.role,
        "created_at": session.created_at,
        "expires_at": session.expires_at,
        "active_sessions": state.auth.session_count(),
    })))
}

// ---- whitelist ----

async fn list_whitelist(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Vec<WhitelistEntry>> {
    require_admin(&state, &headers)?;
    Ok(Json(state.store.list_whitelist()?))
}

fn validate_new_entry(entry: &NewWhitelistEntry) -> Result<(), ApiError> {
    if entry.address.trim().is_empty() {
        return Err(ApiError::bad_request("address is required"));
    }
    if entry.name.trim().is_empty() {
        return Err(ApiError::bad_request("name is required"));
    }
    if entry.symbol.trim().is_empty() {
        return Err(ApiError::bad_request("symbol is required"));
    }
    Ok(())
}

fn validate_patch(patch: &WhitelistPatch) -> Result<(), ApiError> {
    let blank = |v: &Option<String>| v.as_deref().map(|s| s.trim().is_empty()).unwrap_or(false);
    if blank(&patch.address) || blank(&patch.name) || blank(&patch.symbol) {
        return Err(ApiError::bad_request("address, name and symbol cannot be blank"));
    }
    Ok(())
}

async fn add_whitelist(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<NewWhitelistEntry>,
) -> ApiResult<WhitelistEntry> {
    require_admin(&state, &headers)?;
    validate_new_entry(&req)?;
    let entry = state.store.add_whitelist_entry(req)?;
    state.refresh_whitelist_gauge();
    Ok(Json(entry))
}

async fn update_whitelist(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(patch): Json<WhitelistPatch>,
) -> ApiResult<WhitelistEntry> {
    require_admin(&state, &headers)?;
    validate_patch(&patch)?;
    let entry = state.store.update_whitelist_entry(&id, patch)?;
    state.refresh_whitelist_gauge();
    Ok(Json(entry))
}

async fn remove_whitelist(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    require_admin(&state, &headers)?;
    state.store.remove_whitelist_entry(&id)?;
    state.refresh_whitelist_gauge();
    Ok(Json(serde_json::json!({ "ok": true, "id": id })))
}

// ---- claims ----

async fn list_claims(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<ClaimsQuery>,
) -> ApiResult<Vec<Claim>> {
    require_admin(&state, &headers)?;
    let claims = match q.address.as_deref().map(str::trim).filter(|a| !a.is_empty()) {
        Some(address) => state.store.claims_for_address(address)?,
        None => state.store.list_claims()?,
    };
    Ok(Json(claims))
}

async fn fail_claim(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Claim> {
    let session = require_admin(&state, &headers)?;
    tracing::info!(claim_id = %id, by = %session.username, "manual claim failure requested");
    Ok(Json(state.store.fail_claim(&id)?))
}

// ---- settings ----

async fn list_settings(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Vec<Setting>> {
    require_admin(&state, &headers)?;
    Ok(Json(state.store.list_settings()?))
}

async fn get_setting(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(key): Path<String>,
) -> ApiResult<Value> {
    require_admin(&state, &headers)?;
    match state.store.get_setting(&key)? {
        Some(value) => Ok(Json(serde_json::json!({ "key": key, "value": value }))),
        None => Err(crate::store::StoreError::not_found("setting", key).into()),
    }
}

async fn set_setting(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(key): Path<String>,
    Json(req): Json<SettingValue>,
) -> ApiResult<Setting> {
    require_admin(&state, &headers)?;
    let key = key.trim().to_string();
    if key.is_empty() {
        return Err(ApiError::bad_request("setting key is required"));
    }
    let setting = state.store.set_setting(&key, &req.value)?;
    if key == SETTING_ETHPLORER_API_KEY {
        state.oracle.set_api_key(&req.value);
    }
    tracing::info!(key = %key, "setting updated");
    Ok(Json(setting))
}

async fn statistics(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Statistics> {
    require_admin(&state, &headers)?;
    Ok(Json(state.store.statistics()?))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/admin/login", post(login))
        .route("/api/admin/logout", post(logout))
        .route("/api/admin/session", get(session))
        .route("/api/admin/whitelist", get(list_whitelist).post(add_whitelist))
        .route(
            "/api/admin/whitelist/:id",
            put(update_whitelist).delete(remove_whitelist),
        )
        .route("/api/admin/claims", get(list_claims))
        .route("/api/admin/claims/:id/fail", post(fail_claim))
        .route("/api/admin/settings", get(list_settings))
        .route("/api/admin/settings/:key", get(get_setting).put(set_setting))
        .route("/api/admin/statistics", get(statistics))
}
