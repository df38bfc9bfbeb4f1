//! Admin authentication: username/password sign-in issuing session tokens,
//! plus an optional static token taken from `AIRDROP_ADMIN_TOKEN`.
//!
//! Tokens are accepted from `Authorization: Bearer <token>` or
//! `x-admin-token: <token>`.

use axum::http::HeaderMap;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::RngCore;
use serde::Serialize;
use thiserror::Error;

use crate::config::HubConfig;
use crate::metrics;

pub const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing admin token")]
    MissingToken,
    #[error("invalid or expired admin token")]
    InvalidToken,
    #[error("invalid username or password")]
    BadCredentials,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminSession {
    pub token: String,
    pub username: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl AdminSession {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(exp) if exp <= now)
    }
}

pub struct AdminAuth {
    username: String,
    password: String,
    static_token: Option<String>,
    ttl: Duration,
    sessions: DashMap<String, AdminSession>,
}

fn new_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Token presented in the request headers, if any.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    if let Some(hv) = headers.get("x-admin-token") {
        if let Ok(s) = hv.to_str() {
            let s = s.trim();
            if !s.is_empty() {
                return Some(s.to_string());
            }
        }
    }
    if let Some(hv) = headers.get(axum::http::header::AUTHORIZATION) {
        if let Ok(s) = hv.to_str() {
            if let Some(rest) = s.strip_prefix("Bearer ") {
                let rest = rest.trim();
                if !rest.is_empty() {
                    return Some(rest.to_string());
                }
            }
        }
    }
    None
}

impl AdminAuth {
    pub fn new(config: &HubConfig, static_token: Option<String>) -> Self {
        // clamp to ten years; chrono durations overflow far above that
        let ttl_secs = config.session_ttl_secs.min(10 * 365 * 24 * 3600) as i64;
        Self {
            username: config.admin_username.clone(),
            password: config.admin_password.clone(),
            static_token: static_token.filter(|t| !t.trim().is_empty()),
            ttl: Duration::seconds(ttl_secs),
            sessions: DashMap::new(),
        }
    }

    /// Reads `AIRDROP_ADMIN_TOKEN` for the static token.
    pub fn from_env(config: &HubConfig) -> Self {
        Self::new(config, std::env::var("AIRDROP_ADMIN_TOKEN").ok())
    }

    pub fn login(&self, username: &str, password: &str) -> Result<AdminSession, AuthError> {
        if username.trim() != self.username || password != self.password {
            metrics::ADMIN_LOGINS_FAILED.inc();
            tracing::warn!(username = %username.trim(), "admin login rejected");
            return Err(AuthError::BadCredentials);
        }
        let now = Utc::now();
        let session = AdminSession {
            token: new_token(),
            username: self.username.clone(),
            role: ADMIN_ROLE.to_string(),
            created_at: now,
            expires_at: Some(now + self.ttl),
        };
        self.sessions.insert(session.token.clone(), session.clone());
        self.purge_expired(now);
        tracing::info!(username = %session.username, "admin signed in");
        Ok(session)
    }

    /// Drop a session token. Returns false when it was unknown.
    pub fn logout(&self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }

    /// Resolve a token to a session. The static token maps to a synthetic
    /// session without expiry.
    pub fn validate(&self, token: &str) -> Result<AdminSession, AuthError> {
        if let Some(expected) = &self.static_token {
            if token == expected {
                return Ok(AdminSession {
                    token: token.to_string(),
                    username: self.username.clone(),
                    role: ADMIN_ROLE.to_string(),
                    created_at: Utc::now(),
                    expires_at: None,
                });
            }
        }

        let now = Utc::now();
        let session = match self.sessions.get(token) {
            Some(s) => s.clone(),
            None => return Err(AuthError::InvalidToken),
        };
        if session.is_expired(now) {
            self.sessions.remove(token);
            return Err(AuthError::InvalidToken);
        }
        Ok(session)
    }

    pub fn authorize(&self, headers: &HeaderMap) -> Result<AdminSession, AuthError> {
        let token = token_from_headers(headers).ok_or(AuthError::MissingToken)?;
        self.validate(&token)
    }

    fn purge_expired(&self, now: DateTime<Utc>) {
        self.sessions.retain(|_, s| !s.is_expired(now));
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn auth(static_token: Option<&str>) -> AdminAuth {
        let cfg = HubConfig {
            admin_username: "root".into(),
            admin_password: "pw".into(),
            ..HubConfig::default()
        };
        AdminAuth::new(&cfg, static_token.map(|s| s.to_string()))
    }

    #[test]
    fn login_issues_usable_token() {
        let a = auth(None);
        let s = a.login("root", "pw").unwrap();
        assert_eq!(s.token.len(), 64);
        assert_eq!(s.role, ADMIN_ROLE);
        assert_eq!(a.validate(&s.token).unwrap().username, "root");
        assert!(a.logout(&s.token));
        assert_eq!(a.validate(&s.token).unwrap_err(), AuthError::InvalidToken);
        assert!(!a.logout(&s.token));
    }

    #[test]
    fn wrong_password_is_rejected() {
        let a = auth(None);
        assert_eq!(a.login("root", "nope").unwrap_err(), AuthError::BadCredentials);
        assert_eq!(a.login("other", "pw").unwrap_err(), AuthError::BadCredentials);
        assert_eq!(a.session_count(), 0);
    }

    #[test]
    fn expired_sessions_are_refused() {
        let cfg = HubConfig {
            session_ttl_secs: 0,
            ..HubConfig::default()
        };
        let a = AdminAuth::new(&cfg, None);
        let s = a.login("admin", "admin").unwrap();
        assert_eq!(a.validate(&s.token).unwrap_err(), AuthError::InvalidToken);
    }

    #[test]
    fn static_token_and_header_forms() {
        let a = auth(Some("s3cret"));

        let mut headers = HeaderMap::new();
        assert_eq!(a.authorize(&headers).unwrap_err(), AuthError::MissingToken);

        headers.insert("authorization", HeaderValue::from_static("Bearer s3cret"));
        assert!(a.authorize(&headers).unwrap().expires_at.is_none());

        let mut headers = HeaderMap::new();
        headers.insert("x-admin-token", HeaderValue::from_static("wrong"));
        assert_eq!(a.authorize(&headers).unwrap_err(), AuthError::InvalidToken);
    }

    #[test]
    fn blank_static_token_is_ignored() {
        let a = auth(Some("  "));
        assert!(a.validate("  ").is_err());
        assert!(a.validate("").is_err());
    }
}
