//! HTTP surface. Every failure is answered with
//! `{"error": {"code": "...", "message": "..."}}`.

pub mod admin;
pub mod airdrop;
pub mod health;
pub mod install;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};

use crate::airdrop::ClaimError;
use crate::app_state::AppState;
use crate::auth::AuthError;
use crate::oracle::OracleError;
use crate::store::StoreError;
use crate::version;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", message)
    }

    pub fn not_installed() -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "not_installed",
            "airdrop hub is not installed yet",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": { "code": self.code, "message": self.message } });
        (self.status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match &e {
            StoreError::NotFound { .. } => Self::new(StatusCode::NOT_FOUND, "not_found", e.to_string()),
            StoreError::DuplicateAddress(_) => {
                Self::new(StatusCode::CONFLICT, "duplicate_address", e.to_string())
            }
            StoreError::CompletedClaimExists { .. } => {
                Self::new(StatusCode::CONFLICT, "already_claimed", e.to_string())
            }
            StoreError::IllegalTransition(_) => {
                Self::new(StatusCode::CONFLICT, "illegal_transition", e.to_string())
            }
            _ => {
                tracing::error!(err = %e, "store failure");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "persistence_error", e.to_string())
            }
        }
    }
}

impl From<ClaimError> for ApiError {
    fn from(e: ClaimError) -> Self {
        let status = match &e {
            ClaimError::AlreadyClaimed { .. } => StatusCode::CONFLICT,
            ClaimError::NotEligible { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ClaimError::Persistence { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ClaimError::Settlement { .. } => StatusCode::BAD_GATEWAY,
        };
        Self::new(status, e.code(), e.to_string())
    }
}

impl From<OracleError> for ApiError {
    fn from(e: OracleError) -> Self {
        match &e {
            OracleError::RateLimited => {
                Self::new(StatusCode::TOO_MANY_REQUESTS, "oracle_rate_limited", e.to_string())
            }
            OracleError::InvalidRequest(_) => Self::bad_request(e.to_string()),
            _ => Self::new(StatusCode::BAD_GATEWAY, "oracle_error", e.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", e.to_string())
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

/// Full application router, without CORS or body-limit layers.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(airdrop::router())
        .merge(admin::router())
        .merge(install::router())
        .with_state(state)
        .merge(version::router())
}
