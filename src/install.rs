//! First-run installation: probe the collections, seed empty ones with the
//! default whitelist and settings, then persist the installed marker. Public
//! airdrop routes stay closed until it exists.

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::airdrop::types::{InstallationStatus, NewWhitelistEntry, SETTING_ETHPLORER_API_KEY};
use crate::store::sled_store::REQUIRED_COLLECTIONS;
use crate::store::{AirdropStore, StoreError};

pub const INSTALL_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CollectionCheck {
    pub name: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InstallCheck {
    pub ok: bool,
    pub collections: Vec<CollectionCheck>,
}

/// Tokens placed on an empty whitelist at installation:
/// (address, name, symbol, airdrop amount).
pub const DEFAULT_WHITELIST: &[(&str, &str, &str, u64)] = &[
    ("0x95ad61b0a150d79219dcf64e1e6cc01f0b64c4ce", "Shiba Inu", "SHIB", 1_000_000),
    ("0x514910771af9ca656af840dff83e8264ecf986ca", "Chainlink", "LINK", 50),
    ("0x1f9840a85d5af5bf1d1762f925bdaddc4201f984", "Uniswap", "UNI", 100),
    ("0x6b175474e89094c44da98b954eedeac495271d0f", "Dai Stablecoin", "DAI", 500),
    ("0x7d1afa7b718fb893db30a3abc0cfc608aacfebb0", "Polygon", "MATIC", 200),
    ("0x2260fac5e5542a773aa44fbcfedf7c193bc2c599", "Wrapped Bitcoin", "WBTC", 1),
];

/// Settings written when the settings collection is empty. The balance
/// oracle key is added separately with the key currently in use.
pub const DEFAULT_SETTINGS: &[(&str, &str)] = &[
    ("platform_name", "AirdropHub"),
    ("max_claims_per_address", "1"),
    ("airdrop_enabled", "true"),
];

pub fn is_installed(store: &AirdropStore) -> Result<bool, StoreError> {
    Ok(store.installation_status()?.is_installed)
}

pub fn check(store: &AirdropStore) -> InstallCheck {
    let collections: Vec<CollectionCheck> = REQUIRED_COLLECTIONS
        .iter()
        .map(|name| match store.probe_collection(name) {
            Ok(()) => CollectionCheck {
                name: name.to_string(),
                ok: true,
                error: None,
            },
            Err(e) => {
                warn!(collection = %name, err = %e, "collection probe failed");
                CollectionCheck {
                    name: name.to_string(),
                    ok: false,
                    error: Some(e.to_string()),
                }
            }
        })
        .collect();
    InstallCheck {
        ok: collections.iter().all(|c| c.ok),
        collections,
    }
}

/// Fill the whitelist and settings collections when they are empty. Each
/// collection is checked on its own; one that already holds records is left
/// alone.
pub fn seed_defaults(store: &AirdropStore, api_key: &str) -> Result<(), StoreError> {
    if store.list_whitelist()?.is_empty() {
        for &(address, name, symbol, amount) in DEFAULT_WHITELIST {
            store.add_whitelist_entry(NewWhitelistEntry {
                address: address.to_string(),
                name: name.to_string(),
                symbol: symbol.to_string(),
                airdrop_amount: amount,
                is_active: true,
            })?;
        }
        info!(count = DEFAULT_WHITELIST.len(), "default whitelist seeded");
    }

    if store.list_settings()?.is_empty() {
        store.set_setting(SETTING_ETHPLORER_API_KEY, api_key)?;
        for &(key, value) in DEFAULT_SETTINGS {
            store.set_setting(key, value)?;
        }
        info!(count = DEFAULT_SETTINGS.len() + 1, "default settings seeded");
    }
    Ok(())
}

/// Probe, seed empty collections, then write the installed marker. An
/// existing marker is kept as is and nothing is seeded.
pub fn complete(store: &AirdropStore, api_key: &str) -> Result<InstallationStatus, StoreError> {
    let current = store.installation_status()?;
    if current.is_installed {
        return Ok(current);
    }

    let report = check(store);
    if !report.ok {
        let failed: Vec<String> = report
            .collections
            .iter()
            .filter(|c| !c.ok)
            .map(|c| c.name.clone())
            .collect();
        return Err(StoreError::Unavailable(format!(
            "collections not ready: {}",
            failed.join(", ")
        )));
    }

    seed_defaults(store, api_key)?;

    let status = InstallationStatus {
        is_installed: true,
        installed_at: Some(Utc::now()),
        version: Some(INSTALL_VERSION.to_string()),
    };
    store.put_installation_status(&status)?;
    info!(version = INSTALL_VERSION, "installation completed");
    Ok(status)
}

/// Clear the installed flag; data collections are left untouched.
pub fn reset(store: &AirdropStore) -> Result<InstallationStatus, StoreError> {
    let status = InstallationStatus::default();
    store.put_installation_status(&status)?;
    warn!("installation marker reset");
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sled::Config;

    fn temp_store() -> AirdropStore {
        AirdropStore::new(Config::new().temporary(true).open().unwrap())
    }

    #[test]
    fn fresh_store_is_not_installed() {
        let store = temp_store();
        assert!(!is_installed(&store).unwrap());
        let report = check(&store);
        assert!(report.ok);
        assert_eq!(report.collections.len(), REQUIRED_COLLECTIONS.len());
    }

    #[test]
    fn complete_then_reset() {
        let store = temp_store();
        let status = complete(&store, "freekey").unwrap();
        assert!(status.is_installed);
        assert_eq!(status.version.as_deref(), Some(INSTALL_VERSION));
        assert!(is_installed(&store).unwrap());

        // second completion keeps the original timestamp
        let again = complete(&store, "freekey").unwrap();
        assert_eq!(again.installed_at, status.installed_at);

        reset(&store).unwrap();
        assert!(!is_installed(&store).unwrap());
    }

    #[test]
    fn first_completion_seeds_defaults_once() {
        let store = temp_store();
        complete(&store, "mykey").unwrap();

        let whitelist = store.list_whitelist().unwrap();
        assert_eq!(whitelist.len(), DEFAULT_WHITELIST.len());
        assert!(whitelist.iter().all(|e| e.is_active));
        assert!(whitelist.iter().any(|e| e.symbol == "WBTC" && e.airdrop_amount == 1));

        let settings = store.list_settings().unwrap();
        assert_eq!(settings.len(), 4);
        assert_eq!(store.get_setting(SETTING_ETHPLORER_API_KEY).unwrap().as_deref(), Some("mykey"));
        assert_eq!(store.get_setting("platform_name").unwrap().as_deref(), Some("AirdropHub"));
        assert_eq!(store.get_setting("airdrop_enabled").unwrap().as_deref(), Some("true"));

        complete(&store, "mykey").unwrap();
        reset(&store).unwrap();
        complete(&store, "other").unwrap();
        assert_eq!(store.list_whitelist().unwrap().len(), DEFAULT_WHITELIST.len());
        assert_eq!(store.list_settings().unwrap().len(), 4);
        assert_eq!(store.get_setting(SETTING_ETHPLORER_API_KEY).unwrap().as_deref(), Some("mykey"));
    }

    #[test]
    fn populated_collections_are_not_seeded() {
        let store = temp_store();
        store
            .add_whitelist_entry(NewWhitelistEntry {
                address: "0xmine".to_string(),
                name: "Mine".to_string(),
                symbol: "MINE".to_string(),
                airdrop_amount: 7,
                is_active: true,
            })
            .unwrap();

        complete(&store, "freekey").unwrap();

        let whitelist = store.list_whitelist().unwrap();
        assert_eq!(whitelist.len(), 1);
        assert_eq!(whitelist[0].symbol, "MINE");
        assert_eq!(store.list_settings().unwrap().len(), 4);
    }
}
