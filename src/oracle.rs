//! Balance oracle adapter for the Ethplorer REST API.
//!
//! One `EthplorerOracle` is built at startup from `OracleConfig` and shared
//! through the app state. The API key it sends is whatever it was built with
//! until an admin pushes a new one through `set_api_key`.

use parking_lot::RwLock;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::airdrop::types::{HeldToken, Holdings, TokenPrice};
use crate::config::OracleConfig;
use crate::metrics;

pub const DEFAULT_API_KEY: &str = "freekey";

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("balance oracle unreachable: {0}")]
    Network(#[from] reqwest::Error),
    #[error("balance oracle rate limit exceeded")]
    RateLimited,
    #[error("balance oracle returned status {0}")]
    Status(u16),
    #[error("could not decode balance oracle response: {0}")]
    Decode(String),
    #[error("invalid oracle request: {0}")]
    InvalidRequest(String),
}

// ---- wire format -----------------------------------------------------------

/// Ethplorer sends `false` instead of a price object for unpriced tokens.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PriceField {
    Quote {
        rate: f64,
        #[serde(default)]
        currency: Option<String>,
    },
    Flag(bool),
}

impl PriceField {
    fn into_price(self) -> Option<TokenPrice> {
        match self {
            PriceField::Quote { rate, currency } => Some(TokenPrice {
                rate,
                currency: currency.unwrap_or_else(|| "USD".to_string()),
            }),
            PriceField::Flag(_) => None,
        }
    }
}

/// `decimals` arrives as a string for most tokens and as a number for some.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Decimals {
    Num(u32),
    Text(String),
}

impl Decimals {
    fn value(&self) -> u32 {
        match self {
            Decimals::Num(n) => *n,
            Decimals::Text(s) => s.trim().parse().unwrap_or(0),
        }
    }
}

#[derive(Debug, Deserialize)]
struct NativeInfo {
    #[serde(default)]
    balance: f64,
    #[serde(default)]
    price: Option<PriceField>,
}

#[derive(Debug, Deserialize)]
struct TokenInfoRaw {
    address: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    decimals: Option<Decimals>,
    #[serde(default)]
    price: Option<PriceField>,
    #[serde(default, rename = "totalSupply")]
    total_supply: Option<String>,
    #[serde(default, rename = "holdersCount")]
    holders_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TokenBalanceRaw {
    #[serde(rename = "tokenInfo")]
    token_info: TokenInfoRaw,
    #[serde(default)]
    balance: f64,
    #[serde(default, rename = "rawBalance")]
    raw_balance: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AddressInfoResponse {
    address: String,
    #[serde(rename = "ETH")]
    eth: NativeInfo,
    #[serde(default)]
    tokens: Option<Vec<TokenBalanceRaw>>,
}

impl From<AddressInfoResponse> for Holdings {
    fn from(raw: AddressInfoResponse) -> Self {
        let tokens = raw
            .tokens
            .unwrap_or_default()
            .into_iter()
            .map(|t| HeldToken {
                address: t.token_info.address,
                name: t.token_info.name.unwrap_or_default(),
                symbol: t.token_info.symbol.unwrap_or_default(),
                decimals: t.token_info.decimals.map(|d| d.value()).unwrap_or(0),
                raw_balance: t.raw_balance.unwrap_or_else(|| format!("{:.0}", t.balance)),
                balance: t.balance,
                price: t.token_info.price.and_then(PriceField::into_price),
            })
            .collect();

        Holdings {
            address: raw.address,
            native_balance: raw.eth.balance,
            native_price: raw.eth.price.and_then(PriceField::into_price),
            tokens,
        }
    }
}

/// Token metadata from `getTokenInfo`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenInfo {
    pub address: String,
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
    pub total_supply: Option<String>,
    pub holders_count: Option<u64>,
    pub price: Option<TokenPrice>,
}

impl From<TokenInfoRaw> for TokenInfo {
    fn from(raw: TokenInfoRaw) -> Self {
        TokenInfo {
            address: raw.address,
            name: raw.name.unwrap_or_default(),
            symbol: raw.symbol.unwrap_or_default(),
            decimals: raw.decimals.map(|d| d.value()).unwrap_or(0),
            total_supply: raw.total_supply,
            holders_count: raw.holders_count,
            price: raw.price.and_then(PriceField::into_price),
        }
    }
}

// ---- adapter ---------------------------------------------------------------

pub struct EthplorerOracle {
    http: Client,
    base_url: Url,
    api_key: RwLock<String>,
}

impl EthplorerOracle {
    pub fn new(config: &OracleConfig) -> anyhow::Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| anyhow::anyhow!("invalid oracle base url {}: {}", config.base_url, e))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("oracle base url {} cannot carry a path", config.base_url);
        }
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let key = if config.api_key.trim().is_empty() {
            DEFAULT_API_KEY.to_string()
        } else {
            config.api_key.trim().to_string()
        };
        Ok(Self {
            http,
            base_url,
            api_key: RwLock::new(key),
        })
    }

    pub fn set_api_key(&self, key: &str) {
        let key = key.trim();
        *self.api_key.write() = if key.is_empty() {
            DEFAULT_API_KEY.to_string()
        } else {
            key.to_string()
        };
        tracing::info!("balance oracle api key updated");
    }

    pub fn api_key(&self) -> String {
        self.api_key.read().clone()
    }

    pub fn uses_default_key(&self) -> bool {
        *self.api_key.read() == DEFAULT_API_KEY
    }

    fn endpoint(&self, method: &str, address: &str) -> Result<Url, OracleError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(OracleError::InvalidRequest("empty address".to_string()));
        }
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| OracleError::InvalidRequest("base url cannot carry a path".to_string()))?
            .pop_if_empty()
            .push(method)
            .push(address);
        url.query_pairs_mut().append_pair("apiKey", &self.api_key.read());
        Ok(url)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: Url) -> Result<T, OracleError> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(OracleError::RateLimited);
        }
        if !status.is_success() {
            return Err(OracleError::Status(status.as_u16()));
        }
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| OracleError::Decode(e.to_string()))
    }

    /// Native balance and token holdings of `address`.
    pub async fn fetch_holdings(&self, address: &str) -> Result<Holdings, OracleError> {
        let url = self.endpoint("getAddressInfo", address)?;
        tracing::debug!(address = %address, "fetching holdings");
        let result = self.get_json::<AddressInfoResponse>(url).await.map(Holdings::from);
        if let Err(e) = &result {
            metrics::ORACLE_FAILURES.inc();
            tracing::warn!(address = %address, err = %e, "holdings lookup failed");
        }
        result
    }

    /// Metadata for one token contract.
    pub async fn token_info(&self, token_address: &str) -> Result<TokenInfo, OracleError> {
        let url = self.endpoint("getTokenInfo", token_address)?;
        let result = self.get_json::<TokenInfoRaw>(url).await.map(TokenInfo::from);
        if let Err(e) = &result {
            metrics::ORACLE_FAILURES.inc();
            tracing::warn!(token = %token_address, err = %e, "token info lookup failed");
        }
        result
    }
}
