//! AirdropHub service: token-holder eligibility checks and one-per-address
//! airdrop claims, with an admin console API.

mod airdrop;
mod app_state;
mod auth;
mod config;
mod install;
mod metrics;
mod oracle;
mod routes;
mod store;
mod version;

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use axum::Router;
use clap::Parser;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::config::{HubConfig, DEFAULT_CONFIG_PATH};
use crate::store::AirdropStore;

#[derive(Debug, Parser)]
#[command(name = "airdrop-hub", version, about = "Token airdrop eligibility and claim service")]
struct Cli {
    /// Path to the TOML config file (falls back to AIRDROP_CONFIG, then config/airdrop-hub.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn init_tracing() {
    // AIRDROP_LOG wins over RUST_LOG
    let filter = std::env::var("AIRDROP_LOG")
        .unwrap_or_else(|_| std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()));
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

/// Dev mode allows any origin; otherwise only the configured list, and no
/// cross-origin access at all when the list is empty.
fn cors_layer(cfg: &HubConfig) -> CorsLayer {
    if cfg.dev_mode {
        return CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    }
    let list: Vec<HeaderValue> = cfg
        .cors_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(hv) => Some(hv),
            Err(_) => {
                warn!(origin = %o, "skipping invalid CORS origin");
                None
            }
        })
        .collect();
    if list.is_empty() {
        CorsLayer::new().allow_methods(Any)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(list))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

fn build_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    let limit = state.config.max_body_bytes;
    routes::build_router(state)
        .layer(RequestBodyLimitLayer::new(limit))
        .layer(cors)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let admin_token_mask = match std::env::var("AIRDROP_ADMIN_TOKEN") {
        Ok(t) if !t.is_empty() => format!("set (len={})", t.len()),
        _ => "unset".to_string(),
    };
    info!(admin_token = %admin_token_mask, "airdrop hub starting up");

    let config_path = cli
        .config
        .or_else(|| std::env::var_os("AIRDROP_CONFIG").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let cfg = HubConfig::load(&config_path)?;
    if cfg.uses_default_credentials() {
        warn!("admin credentials are the defaults (admin/admin); set AIRDROP_ADMIN_PASSWORD");
    }

    std::fs::create_dir_all(&cfg.data_dir)
        .with_context(|| format!("creating data dir {}", cfg.data_dir.display()))?;
    let store = AirdropStore::open(&cfg.data_dir)
        .with_context(|| format!("opening database in {}", cfg.data_dir.display()))?;

    metrics::init();

    let addr: SocketAddr = format!("{}:{}", cfg.bind, cfg.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", cfg.bind, cfg.port))?;

    let state = AppState::from_config(cfg, store.clone())?;
    match install::is_installed(&store) {
        Ok(true) => {}
        Ok(false) => warn!("installation not completed; public airdrop routes answer 503 until POST /api/install/complete"),
        Err(e) => warn!(err = %e, "could not read installation status"),
    }
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!(listen = %addr, "airdrop hub listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await
        .context("http server failed")?;

    store.flush().context("flushing database")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_state::test_support::state_with;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use tower::ServiceExt;

    fn preflight(origin: &str) -> Request<Body> {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/claims")
            .header("origin", origin)
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn cors_follows_configured_origins() {
        let app = build_router_with(|cfg| cfg.cors_origins = vec!["https://app.example".into()]);
        let resp = app.clone().oneshot(preflight("https://app.example")).await.unwrap();
        assert_eq!(
            resp.headers().get("access-control-allow-origin").unwrap(),
            "https://app.example"
        );

        let resp = app.oneshot(preflight("https://evil.example")).await.unwrap();
        assert!(resp.headers().get("access-control-allow-origin").is_none());
    }

    #[tokio::test]
    async fn dev_mode_allows_any_origin() {
        let app = build_router_with(|cfg| cfg.dev_mode = true);
        let resp = app.oneshot(preflight("http://localhost:3000")).await.unwrap();
        assert_eq!(resp.headers().get("access-control-allow-origin").unwrap(), "*");
    }

    #[tokio::test]
    async fn oversized_bodies_are_rejected() {
        let app = build_router_with(|cfg| cfg.max_body_bytes = 64);
        let body = format!("{{\"username\":\"{}\",\"password\":\"x\"}}", "a".repeat(200));
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/admin/login")
            .header("content-type", "application/json")
            .header("content-length", body.len())
            .body(Body::from(body))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    fn build_router_with(tweak: impl FnOnce(&mut HubConfig)) -> Router {
        let mut state = state_with("http://127.0.0.1:9", None);
        let mut cfg = (*state.config).clone();
        tweak(&mut cfg);
        state.config = std::sync::Arc::new(cfg);
        build_app(state)
    }
}
