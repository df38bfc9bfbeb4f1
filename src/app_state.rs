use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::airdrop::settlement::{Settlement, SimulatedSettlement};
use crate::airdrop::types::SETTING_ETHPLORER_API_KEY;
use crate::airdrop::ClaimWorkflow;
use crate::auth::AdminAuth;
use crate::config::HubConfig;
use crate::metrics;
use crate::oracle::EthplorerOracle;
use crate::store::AirdropStore;

/// Shared handles for every route.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<HubConfig>,
    pub store: AirdropStore,
    pub oracle: Arc<EthplorerOracle>,
    pub workflow: ClaimWorkflow,
    pub auth: Arc<AdminAuth>,
}

impl AppState {
    pub fn new(
        config: HubConfig,
        store: AirdropStore,
        settlement: Arc<dyn Settlement>,
        auth: AdminAuth,
    ) -> Result<Self> {
        let oracle = EthplorerOracle::new(&config.oracle).context("building balance oracle")?;
        let workflow = ClaimWorkflow::new(Arc::new(store.clone()), settlement);
        let state = Self {
            config: Arc::new(config),
            store,
            oracle: Arc::new(oracle),
            workflow,
            auth: Arc::new(auth),
        };
        state.apply_stored_api_key()?;
        state.refresh_whitelist_gauge();
        Ok(state)
    }

    /// Wiring used by the binary: simulated settlement and the env static token.
    pub fn from_config(config: HubConfig, store: AirdropStore) -> Result<Self> {
        let settlement = Arc::new(SimulatedSettlement::new(Duration::from_millis(
            config.settlement_delay_ms,
        )));
        let auth = AdminAuth::from_env(&config);
        Self::new(config, store, settlement, auth)
    }

    /// A stored `ethplorer_api_key` setting wins over the configured key.
    fn apply_stored_api_key(&self) -> Result<()> {
        let stored = self
            .store
            .get_setting(SETTING_ETHPLORER_API_KEY)
            .context("reading stored oracle api key")?;
        if let Some(key) = stored.filter(|k| !k.trim().is_empty()) {
            self.oracle.set_api_key(&key);
        }
        if self.oracle.uses_default_key() {
            tracing::warn!("balance oracle is using the public free key; set ethplorer_api_key for production");
        }
        Ok(())
    }

    pub fn refresh_whitelist_gauge(&self) {
        match self.store.list_active_whitelist() {
            Ok(active) => metrics::WHITELIST_ACTIVE.set(active.len() as i64),
            Err(e) => tracing::warn!(err = %e, "could not count active whitelist entries"),
        }
    }
}
