use axum::{routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

#[derive(Serialize)]
pub struct BuildInfo {
    pub name: &'static str,
    pub version: &'static str,
    /// Set by the release pipeline through `AIRDROP_GIT_COMMIT` at compile time.
    pub git_commit: &'static str,
    pub install_version: &'static str,
    pub server_time: i64,
}

pub fn build_info() -> BuildInfo {
    BuildInfo {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        git_commit: option_env!("AIRDROP_GIT_COMMIT").unwrap_or("unknown"),
        install_version: crate::install::INSTALL_VERSION,
        server_time: Utc::now().timestamp(),
    }
}

async fn get_version() -> Json<BuildInfo> {
    Json(build_info())
}

pub fn router() -> Router {
    Router::new().route("/version", get(get_version))
}
