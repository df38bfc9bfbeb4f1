use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config/airdrop-hub.toml";

/// Balance oracle (Ethplorer) connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub base_url: String,
    /// Used until an admin stores `ethplorer_api_key` in the settings collection
    pub api_key: String,
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.ethplorer.io".to_string(),
            api_key: "freekey".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Service configuration: TOML file first, then AIRDROP_* environment overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,

    /// Admin identity accepted by /api/admin/login
    pub admin_username: String,
    pub admin_password: String,
    pub session_ttl_secs: u64,

    /// Allowed CORS origins; empty means same-origin only
    pub cors_origins: Vec<String>,
    /// Dev mode: CORS allows any origin
    pub dev_mode: bool,
    pub max_body_bytes: usize,

    /// Simulated settlement wait per claim
    pub settlement_delay_ms: u64,

    pub oracle: OracleConfig,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 7080,
            data_dir: PathBuf::from("airdrop-data"),
            admin_username: "admin".to_string(),
            admin_password: "admin".to_string(),
            session_ttl_secs: 12 * 60 * 60,
            cors_origins: Vec::new(),
            dev_mode: false,
            max_body_bytes: 256 * 1024,
            settlement_delay_ms: 2000,
            oracle: OracleConfig::default(),
        }
    }
}

fn parse_flag(val: &str) -> bool {
    let v = val.trim();
    v == "1" || v.eq_ignore_ascii_case("true")
}

impl HubConfig {
    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let cfg: HubConfig =
            toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?;
        Ok(cfg)
    }

    /// Load from `path` if it exists (defaults otherwise), then apply the environment
    pub fn load(path: &Path) -> Result<Self> {
        let mut cfg = if path.exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };
        cfg.apply_env(|key| std::env::var(key).ok());
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply AIRDROP_* overrides using `lookup` to read variables
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("AIRDROP_BIND") {
            self.bind = val.trim().to_string();
        }

        if let Some(val) = lookup("AIRDROP_PORT") {
            if let Ok(num) = val.trim().parse::<u16>() {
                self.port = num;
            }
        }

        if let Some(val) = lookup("AIRDROP_DATA_DIR") {
            self.data_dir = PathBuf::from(val.trim());
        }

        if let Some(val) = lookup("AIRDROP_ADMIN_USER") {
            self.admin_username = val.trim().to_string();
        }

        if let Some(val) = lookup("AIRDROP_ADMIN_PASSWORD") {
            self.admin_password = val;
        }

        if let Some(val) = lookup("AIRDROP_SESSION_TTL_SECS") {
            if let Ok(num) = val.trim().parse::<u64>() {
                self.session_ttl_secs = num;
            }
        }

        // comma-separated; blank entries are skipped
        if let Some(val) = lookup("AIRDROP_CORS_ORIGINS") {
            self.cors_origins = val
                .split(',')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
                .collect();
        }

        if let Some(val) = lookup("AIRDROP_DEV") {
            self.dev_mode = parse_flag(&val);
        }

        if let Some(val) = lookup("AIRDROP_MAX_BODY_BYTES") {
            if let Ok(num) = val.trim().parse::<usize>() {
                self.max_body_bytes = num;
            }
        }

        if let Some(val) = lookup("AIRDROP_SETTLEMENT_DELAY_MS") {
            if let Ok(num) = val.trim().parse::<u64>() {
                self.settlement_delay_ms = num;
            }
        }

        if let Some(val) = lookup("AIRDROP_ORACLE_URL") {
            self.oracle.base_url = val.trim().to_string();
        }

        if let Some(val) = lookup("AIRDROP_ORACLE_API_KEY") {
            self.oracle.api_key = val.trim().to_string();
        }

        if let Some(val) = lookup("AIRDROP_ORACLE_TIMEOUT_SECS") {
            if let Ok(num) = val.trim().parse::<u64>() {
                self.oracle.timeout_secs = num;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.admin_username.is_empty() {
            anyhow::bail!("admin_username must not be empty");
        }
        if self.oracle.timeout_secs == 0 {
            anyhow::bail!("oracle.timeout_secs must be at least 1");
        }
        if self.max_body_bytes == 0 {
            anyhow::bail!("max_body_bytes must be positive");
        }
        Ok(())
    }

    /// True while the shipped admin/admin credentials are in use
    pub fn uses_default_credentials(&self) -> bool {
        self.admin_username == "admin" && self.admin_password == "admin"
    }
}
