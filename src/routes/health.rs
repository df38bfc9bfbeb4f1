use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::app_state::AppState;
use crate::install;
use crate::metrics;

#[derive(Serialize)]
struct HealthReport {
    status: &'static str,
    store: &'static str,
    installed: bool,
    oracle_default_key: bool,
}

async fn livez() -> &'static str {
    "ok"
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match install::is_installed(&state.store) {
        Ok(installed) => (
            StatusCode::OK,
            Json(HealthReport {
                status: "ok",
                store: "ok",
                installed,
                oracle_default_key: state.oracle.uses_default_key(),
            }),
        ),
        Err(e) => {
            tracing::error!(err = %e, "health probe could not read the store");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthReport {
                    status: "degraded",
                    store: "error",
                    installed: false,
                    oracle_default_key: state.oracle.uses_default_key(),
                }),
            )
        }
    }
}

async fn metrics_prom() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::render(),
    )
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/livez", get(livez))
        .route("/health", get(health))
        .route("/metrics.prom", get(metrics_prom))
}

#[cfg(test)]
mod tests {
    use crate::app_state::test_support::state_with;
    use crate::routes::build_router;
    use crate::routes::test_util::{get, send};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn liveness_health_and_metrics() {
        let app = build_router(state_with("http://127.0.0.1:9", None));

        let (status, body) = send(&app, get("/livez")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::Value::String("ok".into()));

        let (status, body) = send(&app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["store"], "ok");
        assert_eq!(body["installed"], false);
        assert_eq!(body["oracle_default_key"], false);

        let (status, body) = send(&app, get("/metrics.prom")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.as_str().unwrap().contains("airdrop_whitelist_active"));

        let (status, body) = send(&app, get("/version")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "airdrop-hub");
    }
}
