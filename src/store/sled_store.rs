// Airdrop store: sled-backed persistence for whitelist, claims, settings and
// installation status.
//
// Storage format (values are JSON):
//   Tree "whitelist_tokens":      id -> WhitelistEntry
//   Tree "whitelist_by_address":  lower-case address -> id      (uniqueness index)
//   Tree "airdrop_claims":        id -> Claim
//   Tree "completed_claims":      lower-case address -> claim id (one completed claim per address)
//   Tree "admin_settings":        key -> Setting
//   Tree "installation_status":   "status" -> InstallationStatus

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{abort, ConflictableTransactionError, TransactionError};
use sled::{Db, Transactional, Tree};

use super::{ClaimStore, StoreError};
use crate::airdrop::types::{
    normalize_address, Claim, ClaimPatch, ClaimStatus, InstallationStatus, NewClaim,
    NewWhitelistEntry, Setting, Statistics, WhitelistEntry, WhitelistPatch,
};

pub const WHITELIST_TREE: &str = "whitelist_tokens";
const WHITELIST_INDEX_TREE: &str = "whitelist_by_address";
pub const CLAIMS_TREE: &str = "airdrop_claims";
const COMPLETED_INDEX_TREE: &str = "completed_claims";
pub const SETTINGS_TREE: &str = "admin_settings";
pub const INSTALLATION_TREE: &str = "installation_status";
const INSTALLATION_KEY: &[u8] = b"status";

/// Collections the installation probe expects to find.
pub const REQUIRED_COLLECTIONS: [&str; 4] =
    [WHITELIST_TREE, SETTINGS_TREE, CLAIMS_TREE, INSTALLATION_TREE];

#[derive(Clone)]
pub struct AirdropStore {
    db: Db,
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    Ok(serde_json::to_vec(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    Ok(serde_json::from_slice(bytes)?)
}

fn scan_all<T: DeserializeOwned>(tree: &Tree) -> Result<Vec<T>, StoreError> {
    let mut out = Vec::new();
    for item in tree.iter() {
        let (_, value) = item?;
        out.push(decode(&value)?);
    }
    Ok(out)
}

impl AirdropStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Open (or create) the database under `path`.
    pub fn open(path: &std::path::Path) -> Result<Self, StoreError> {
        Ok(Self::new(sled::open(path)?))
    }

    fn tree(&self, name: &str) -> Result<Tree, StoreError> {
        Ok(self.db.open_tree(name)?)
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    // ---------------------------------------------------------------- whitelist

    /// Whole whitelist, newest first.
    pub fn list_whitelist(&self) -> Result<Vec<WhitelistEntry>, StoreError> {
        let mut entries: Vec<WhitelistEntry> = scan_all(&self.tree(WHITELIST_TREE)?)?;
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }

    /// Active entries only, in the same newest-first order.
    pub fn list_active_whitelist(&self) -> Result<Vec<WhitelistEntry>, StoreError> {
        Ok(self
            .list_whitelist()?
            .into_iter()
            .filter(|e| e.is_active)
            .collect())
    }

    pub fn get_whitelist_entry(&self, id: &str) -> Result<WhitelistEntry, StoreError> {
        match self.tree(WHITELIST_TREE)?.get(id.as_bytes())? {
            Some(bytes) => decode(&bytes),
            None => Err(StoreError::not_found("whitelist entry", id)),
        }
    }

    /// Reserve `address` in the uniqueness index for `id`.
    fn reserve_address(&self, index: &Tree, address: &str, id: &str) -> Result<(), StoreError> {
        let key = normalize_address(address);
        match index.compare_and_swap(key.as_bytes(), None::<&[u8]>, Some(id.as_bytes()))? {
            Ok(()) => Ok(()),
            Err(_) => Err(StoreError::DuplicateAddress(address.trim().to_string())),
        }
    }

    pub fn add_whitelist_entry(&self, new: NewWhitelistEntry) -> Result<WhitelistEntry, StoreError> {
        let index = self.tree(WHITELIST_INDEX_TREE)?;
        let tree = self.tree(WHITELIST_TREE)?;

        let now = Utc::now();
        let entry = WhitelistEntry {
            id: uuid::Uuid::new_v4().to_string(),
            address: new.address.trim().to_string(),
            name: new.name.trim().to_string(),
            symbol: new.symbol.trim().to_string(),
            airdrop_amount: new.airdrop_amount,
            is_active: new.is_active,
            created_at: now,
            updated_at: now,
        };

        self.reserve_address(&index, &entry.address, &entry.id)?;
        if let Err(e) = tree.insert(entry.id.as_bytes(), encode(&entry)?) {
            let _ = index.remove(normalize_address(&entry.address).as_bytes());
            return Err(e.into());
        }

        tracing::info!(id = %entry.id, address = %entry.address, amount = entry.airdrop_amount, "whitelist entry added");
        Ok(entry)
    }

    pub fn update_whitelist_entry(
        &self,
        id: &str,
        patch: WhitelistPatch,
    ) -> Result<WhitelistEntry, StoreError> {
        let index = self.tree(WHITELIST_INDEX_TREE)?;
        let tree = self.tree(WHITELIST_TREE)?;
        let mut entry = self.get_whitelist_entry(id)?;

        if let Some(address) = patch.address {
            let old_key = normalize_address(&entry.address);
            if normalize_address(&address) != old_key {
                self.reserve_address(&index, &address, id)?;
                index.remove(old_key.as_bytes())?;
            }
            entry.address = address.trim().to_string();
        }
        if let Some(name) = patch.name {
            entry.name = name.trim().to_string();
        }
        if let Some(symbol) = patch.symbol {
            entry.symbol = symbol.trim().to_string();
        }
        if let Some(amount) = patch.airdrop_amount {
            entry.airdrop_amount = amount;
        }
        if let Some(active) = patch.is_active {
            entry.is_active = active;
        }
        entry.updated_at = Utc::now();

        tree.insert(entry.id.as_bytes(), encode(&entry)?)?;
        tracing::info!(id = %entry.id, active = entry.is_active, amount = entry.airdrop_amount, "whitelist entry updated");
        Ok(entry)
    }

    pub fn remove_whitelist_entry(&self, id: &str) -> Result<(), StoreError> {
        let entry = self.get_whitelist_entry(id)?;
        self.tree(WHITELIST_TREE)?.remove(id.as_bytes())?;
        let index = self.tree(WHITELIST_INDEX_TREE)?;
        let key = normalize_address(&entry.address);
        // Only drop the index slot if it still points at this entry.
        let _ = index.compare_and_swap(key.as_bytes(), Some(id.as_bytes()), None::<&[u8]>)?;
        tracing::info!(id = %id, address = %entry.address, "whitelist entry removed");
        Ok(())
    }

    // ------------------------------------------------------------------- claims

    pub fn get_claim(&self, id: &str) -> Result<Claim, StoreError> {
        match self.tree(CLAIMS_TREE)?.get(id.as_bytes())? {
            Some(bytes) => decode(&bytes),
            None => Err(StoreError::not_found("claim", id)),
        }
    }

    /// All claims, newest first.
    pub fn list_claims(&self) -> Result<Vec<Claim>, StoreError> {
        let mut claims: Vec<Claim> = scan_all(&self.tree(CLAIMS_TREE)?)?;
        claims.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(claims)
    }

    /// Claims recorded for one address (any status), newest first.
    pub fn claims_for_address(&self, address: &str) -> Result<Vec<Claim>, StoreError> {
        let key = normalize_address(address);
        Ok(self
            .list_claims()?
            .into_iter()
            .filter(|c| c.wallet_address == key)
            .collect())
    }

    fn completed_claim_for(&self, address: &str) -> Result<Option<Claim>, StoreError> {
        let key = normalize_address(address);
        let Some(id) = self.tree(COMPLETED_INDEX_TREE)?.get(key.as_bytes())? else {
            return Ok(None);
        };
        let id = String::from_utf8_lossy(&id).into_owned();
        match self.get_claim(&id) {
            Ok(claim) if claim.status == ClaimStatus::Completed => Ok(Some(claim)),
            Ok(claim) => {
                tracing::warn!(address = %key, claim_id = %id, status = ?claim.status, "completed-claim index points at a claim that is not completed");
                Ok(None)
            }
            Err(StoreError::NotFound { .. }) => {
                tracing::warn!(address = %key, claim_id = %id, "completed-claim index points at a missing claim");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn insert_claim(&self, new: NewClaim) -> Result<String, StoreError> {
        let tree = self.tree(CLAIMS_TREE)?;
        let now = Utc::now();
        let claim = Claim {
            id: uuid::Uuid::new_v4().to_string(),
            wallet_address: normalize_address(&new.wallet_address),
            tokens_claimed: new.tokens_claimed,
            total_amount: new.total_amount,
            transaction_hash: None,
            status: new.status,
            created_at: now,
            updated_at: now,
        };
        tree.insert(claim.id.as_bytes(), encode(&claim)?)?;
        Ok(claim.id)
    }

    /// Status change and completed-claim index update run as one transaction
    /// over both trees.
    fn apply_claim_patch(&self, id: &str, patch: ClaimPatch) -> Result<Claim, StoreError> {
        let claims = self.tree(CLAIMS_TREE)?;
        let index = self.tree(COMPLETED_INDEX_TREE)?;

        let result = (&claims, &index).transaction(|(tx_claims, tx_index)| {
            let bytes = match tx_claims.get(id.as_bytes())? {
                Some(bytes) => bytes,
                None => return abort(StoreError::not_found("claim", id)),
            };
            let mut claim: Claim = decode(&bytes).map_err(ConflictableTransactionError::Abort)?;
            let next = match claim.status.transition(patch.status) {
                Ok(next) => next,
                Err(e) => return abort(StoreError::from(e)),
            };

            if next == ClaimStatus::Completed {
                let key = claim.wallet_address.clone();
                if let Some(existing) = tx_index.get(key.as_bytes())? {
                    return abort(StoreError::CompletedClaimExists {
                        address: key,
                        existing: String::from_utf8_lossy(&existing).into_owned(),
                    });
                }
                tx_index.insert(key.as_bytes(), claim.id.as_bytes())?;
            }

            claim.status = next;
            if let Some(hash) = &patch.transaction_hash {
                claim.transaction_hash = Some(hash.clone());
            }
            claim.updated_at = Utc::now();

            let encoded = encode(&claim).map_err(ConflictableTransactionError::Abort)?;
            tx_claims.insert(claim.id.as_bytes(), encoded)?;
            Ok(claim)
        });

        result.map_err(|e| match e {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => StoreError::Database(e),
        })
    }

    /// Manual reconciliation of a claim stuck in `pending`.
    pub fn fail_claim(&self, id: &str) -> Result<Claim, StoreError> {
        let claim = self.apply_claim_patch(id, ClaimPatch::failed())?;
        tracing::warn!(claim_id = %id, address = %claim.wallet_address, "claim marked failed");
        Ok(claim)
    }

    // ----------------------------------------------------------------- settings

    pub fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.tree(SETTINGS_TREE)?.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(decode::<Setting>(&bytes)?.value)),
            None => Ok(None),
        }
    }

    pub fn list_settings(&self) -> Result<Vec<Setting>, StoreError> {
        let mut settings: Vec<Setting> = scan_all(&self.tree(SETTINGS_TREE)?)?;
        settings.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(settings)
    }

    /// Insert or replace a setting, keeping its original creation time.
    pub fn set_setting(&self, key: &str, value: &str) -> Result<Setting, StoreError> {
        let tree = self.tree(SETTINGS_TREE)?;
        let now = Utc::now();
        let created_at = match tree.get(key.as_bytes())? {
            Some(bytes) => decode::<Setting>(&bytes)?.created_at,
            None => now,
        };
        let setting = Setting {
            key: key.to_string(),
            value: value.to_string(),
            created_at,
            updated_at: now,
        };
        tree.insert(key.as_bytes(), encode(&setting)?)?;
        Ok(setting)
    }

    // ------------------------------------------------------------- installation

    pub fn installation_status(&self) -> Result<InstallationStatus, StoreError> {
        match self.tree(INSTALLATION_TREE)?.get(INSTALLATION_KEY)? {
            Some(bytes) => decode(&bytes),
            None => Ok(InstallationStatus::default()),
        }
    }

    pub fn put_installation_status(&self, status: &InstallationStatus) -> Result<(), StoreError> {
        let tree = self.tree(INSTALLATION_TREE)?;
        tree.insert(INSTALLATION_KEY, encode(status)?)?;
        Ok(())
    }

    /// Open a collection and read its first record to prove it is usable.
    pub fn probe_collection(&self, name: &str) -> Result<(), StoreError> {
        let tree = self.tree(name)?;
        tree.first()?;
        Ok(())
    }

    // --------------------------------------------------------------- statistics

    pub fn statistics(&self) -> Result<Statistics, StoreError> {
        let claims = self.list_claims()?;
        let whitelist = self.list_whitelist()?;

        let completed: Vec<&Claim> = claims
            .iter()
            .filter(|c| c.status == ClaimStatus::Completed)
            .collect();
        let active: Vec<&WhitelistEntry> = whitelist.iter().filter(|e| e.is_active).collect();

        Ok(Statistics {
            total_claims: claims.len(),
            completed_claims: completed.len(),
            total_distributed: completed.iter().map(|c| c.total_amount).sum(),
            active_tokens: active.len(),
            total_airdrop_pool: active.iter().map(|e| u128::from(e.airdrop_amount)).sum(),
            total_whitelist_tokens: whitelist.len(),
        })
    }
}

#[async_trait]
impl ClaimStore for AirdropStore {
    async fn find_completed_claim(&self, address: &str) -> Result<Option<Claim>, StoreError> {
        self.completed_claim_for(address)
    }

    async fn create_claim(&self, claim: NewClaim) -> Result<String, StoreError> {
        self.insert_claim(claim)
    }

    async fn update_claim(&self, id: &str, patch: ClaimPatch) -> Result<Claim, StoreError> {
        self.apply_claim_patch(id, patch)
    }
}
