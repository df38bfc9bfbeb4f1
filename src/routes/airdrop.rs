//! Public airdrop endpoints
//!
//! - GET  /api/holdings/:address       - oracle passthrough
//! - GET  /api/eligibility/:address    - holdings, eligibility and claimed flag
//! - POST /api/claims                  - submit a claim
//! - GET  /api/claims/:address/status  - completed claim for an address
//! - GET  /api/whitelist               - active whitelist
//! - GET  /api/tokens/:address         - token metadata
//!
//! All of them answer 503 until installation is complete.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ApiError, ApiResult};
use crate::airdrop::types::{normalize_address, Claim, EligibilityResult, Holdings, WhitelistEntry};
use crate::airdrop::{compute_eligibility, ClaimReceipt};
use crate::app_state::AppState;
use crate::install;
use crate::metrics;
use crate::oracle::TokenInfo;
use crate::store::ClaimStore;

fn ensure_installed(state: &AppState) -> Result<(), ApiError> {
    if install::is_installed(&state.store)? {
        Ok(())
    } else {
        Err(ApiError::not_installed())
    }
}

fn require_address(raw: &str) -> Result<String, ApiError> {
    let address = normalize_address(raw);
    if address.is_empty() {
        return Err(ApiError::bad_request("address is required"));
    }
    Ok(address)
}

#[derive(Debug, Serialize)]
pub struct EligibilityResponse {
    pub address: String,
    pub holdings: Holdings,
    pub eligibility: EligibilityResult,
}

/// Token reference inside a claim request. Only the address is trusted;
/// award figures come from the stored whitelist.
#[derive(Debug, Deserialize)]
pub struct ClaimedToken {
    pub address: String,
}

#[derive(Debug, Deserialize)]
pub struct ClaimRequest {
    pub address: String,
    #[serde(default)]
    pub eligible_tokens: Vec<ClaimedToken>,
}

#[derive(Debug, Serialize)]
pub struct ClaimStatusResponse {
    pub address: String,
    pub claimed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim: Option<Claim>,
}

async fn get_holdings(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> ApiResult<Holdings> {
    ensure_installed(&state)?;
    let address = require_address(&address)?;
    Ok(Json(state.oracle.fetch_holdings(&address).await?))
}

async fn get_eligibility(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> ApiResult<EligibilityResponse> {
    ensure_installed(&state)?;
    let address = require_address(&address)?;
    metrics::ELIGIBILITY_LOOKUPS.inc();

    let holdings = state.oracle.fetch_holdings(&address).await?;
    let whitelist = state.store.list_active_whitelist()?;
    let mut eligibility = compute_eligibility(&holdings.tokens, &whitelist);
    eligibility.claimed = state.store.find_completed_claim(&address).await?.is_some();

    Ok(Json(EligibilityResponse {
        address,
        holdings,
        eligibility,
    }))
}

/// Active whitelist entries named in the request, in request order. Repeated
/// or unknown addresses are dropped.
fn reconcile(requested: &[ClaimedToken], active: &[WhitelistEntry]) -> Vec<WhitelistEntry> {
    let mut out: Vec<WhitelistEntry> = Vec::with_capacity(requested.len());
    for token in requested {
        let Some(entry) = active.iter().find(|e| e.matches(&token.address)) else {
            continue;
        };
        if out.iter().any(|kept| kept.id == entry.id) {
            continue;
        }
        out.push(entry.clone());
    }
    out
}

async fn submit_claim(
    State(state): State<AppState>,
    Json(req): Json<ClaimRequest>,
) -> ApiResult<ClaimReceipt> {
    ensure_installed(&state)?;
    let address = require_address(&req.address)?;

    let active = state.store.list_active_whitelist()?;
    let entries = reconcile(&req.eligible_tokens, &active);
    if entries.len() < req.eligible_tokens.len() {
        info!(
            address = %address,
            requested = req.eligible_tokens.len(),
            accepted = entries.len(),
            "dropped claim tokens not on the active whitelist"
        );
    }

    let receipt = state.workflow.submit_claim(&address, &entries).await?;
    Ok(Json(receipt))
}

async fn claim_status(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> ApiResult<ClaimStatusResponse> {
    ensure_installed(&state)?;
    let address = require_address(&address)?;
    let claim = state.store.find_completed_claim(&address).await?;
    Ok(Json(ClaimStatusResponse {
        address,
        claimed: claim.is_some(),
        claim,
    }))
}

async fn public_whitelist(State(state): State<AppState>) -> ApiResult<Vec<WhitelistEntry>> {
    ensure_installed(&state)?;
    Ok(Json(state.store.list_active_whitelist()?))
}

async fn token_info(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> ApiResult<TokenInfo> {
    ensure_installed(&state)?;
    let address = require_address(&address)?;
    Ok(Json(state.oracle.token_info(&address).await?))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/holdings/:address", get(get_holdings))
        .route("/api/eligibility/:address", get(get_eligibility))
        .route("/api/claims", post(submit_claim))
        .route("/api/claims/:address/status", get(claim_status))
        .route("/api/whitelist", get(public_whitelist))
        .route("/api/tokens/:address", get(token_info))
}
