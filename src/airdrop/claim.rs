//! Claim workflow: one completed claim per address.
//!
//! Sequence per call: completed-claim check, pending record, settlement,
//! completion. Steps run strictly in order and nothing is retried here;
//! a caller that wants a retry re-invokes `submit_claim`.

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::airdrop::eligibility::total_award;
use crate::airdrop::settlement::Settlement;
use crate::airdrop::types::{
    normalize_address, Claim, ClaimPatch, ClaimStatus, NewClaim, WhitelistEntry,
};
use crate::metrics;
use crate::store::{ClaimStore, StoreError};

#[derive(Debug, Error)]
pub enum ClaimError {
    #[error("airdrop already claimed for {address}")]
    AlreadyClaimed { address: String },
    #[error("no eligible tokens to claim for {address}")]
    NotEligible { address: String },
    /// The store rejected a read or write. `claim_id` is set when a pending
    /// record was already written and is left behind.
    #[error("failed to persist claim: {source}")]
    Persistence {
        claim_id: Option<String>,
        #[source]
        source: StoreError,
    },
    /// Settlement failed; the claim stays `pending`.
    #[error("settlement failed for claim {claim_id}: {reason}")]
    Settlement { claim_id: String, reason: String },
}

impl ClaimError {
    /// Short machine-readable tag, also used as a metrics label.
    pub fn code(&self) -> &'static str {
        match self {
            ClaimError::AlreadyClaimed { .. } => "already_claimed",
            ClaimError::NotEligible { .. } => "not_eligible",
            ClaimError::Persistence { .. } => "persistence_error",
            ClaimError::Settlement { .. } => "settlement_error",
        }
    }
}

/// Successful claim confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimReceipt {
    pub claim_id: String,
    pub wallet_address: String,
    pub total_amount: u128,
    pub transaction_hash: String,
    pub status: ClaimStatus,
}

#[derive(Clone)]
pub struct ClaimWorkflow {
    store: Arc<dyn ClaimStore>,
    settlement: Arc<dyn Settlement>,
}

impl ClaimWorkflow {
    pub fn new(store: Arc<dyn ClaimStore>, settlement: Arc<dyn Settlement>) -> Self {
        Self { store, settlement }
    }

    pub async fn submit_claim(
        &self,
        address: &str,
        eligible: &[WhitelistEntry],
    ) -> Result<ClaimReceipt, ClaimError> {
        metrics::CLAIMS_SUBMITTED.inc();
        let result = self.run(address, eligible).await;
        match &result {
            Ok(_) => metrics::CLAIMS_COMPLETED.inc(),
            Err(e) => metrics::CLAIMS_REJECTED.with_label_values(&[e.code()]).inc(),
        }
        result
    }

    async fn run(&self, address: &str, eligible: &[WhitelistEntry]) -> Result<ClaimReceipt, ClaimError> {
        let address = normalize_address(address);

        let existing = self
            .store
            .find_completed_claim(&address)
            .await
            .map_err(|source| ClaimError::Persistence { claim_id: None, source })?;
        if let Some(prior) = existing {
            info!(address = %address, claim_id = %prior.id, "claim rejected: already claimed");
            return Err(ClaimError::AlreadyClaimed { address });
        }

        if eligible.is_empty() {
            return Err(ClaimError::NotEligible { address });
        }

        let total_amount = total_award(eligible);
        let claim_id = self
            .store
            .create_claim(NewClaim {
                wallet_address: address.clone(),
                tokens_claimed: eligible.to_vec(),
                total_amount,
                status: ClaimStatus::Pending,
            })
            .await
            .map_err(|source| {
                error!(address = %address, err = %source, "failed to create claim record");
                ClaimError::Persistence { claim_id: None, source }
            })?;
        info!(address = %address, claim_id = %claim_id, total = %total_amount, "claim pending");

        let now = chrono::Utc::now();
        let pending = Claim {
            id: claim_id.clone(),
            wallet_address: address.clone(),
            tokens_claimed: eligible.to_vec(),
            total_amount,
            transaction_hash: None,
            status: ClaimStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        let reference = match self.settlement.settle(&pending).await {
            Ok(reference) => reference,
            Err(e) => {
                warn!(
                    claim_id = %claim_id,
                    backend = self.settlement.name(),
                    err = %e,
                    "settlement failed, claim left pending"
                );
                return Err(ClaimError::Settlement { claim_id, reason: e.0 });
            }
        };

        match self
            .store
            .update_claim(&claim_id, ClaimPatch::completed(reference.clone()))
            .await
        {
            Ok(claim) => {
                info!(
                    address = %address,
                    claim_id = %claim.id,
                    total = %claim.total_amount,
                    reference = %reference,
                    "claim completed"
                );
                Ok(ClaimReceipt {
                    claim_id: claim.id,
                    wallet_address: claim.wallet_address,
                    total_amount: claim.total_amount,
                    transaction_hash: reference,
                    status: claim.status,
                })
            }
            Err(StoreError::CompletedClaimExists { existing, .. }) => {
                warn!(address = %address, claim_id = %claim_id, winner = %existing, "lost completion race");
                if let Err(e) = self.store.update_claim(&claim_id, ClaimPatch::failed()).await {
                    error!(claim_id = %claim_id, err = %e, "could not mark losing claim failed");
                }
                Err(ClaimError::AlreadyClaimed { address })
            }
            Err(source) => {
                error!(claim_id = %claim_id, err = %source, "failed to complete claim, left pending");
                Err(ClaimError::Persistence { claim_id: Some(claim_id), source })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::airdrop::settlement::{SettlementError, SimulatedSettlement};
    use crate::store::AirdropStore;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn entry(address: &str, amount: u64) -> WhitelistEntry {
        let now = Utc::now();
        WhitelistEntry {
            id: format!("id-{}", address),
            address: address.to_string(),
            name: "Token".to_string(),
            symbol: "TKN".to_string(),
            airdrop_amount: amount,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn temp_store() -> Arc<AirdropStore> {
        Arc::new(AirdropStore::new(sled::Config::new().temporary(true).open().unwrap()))
    }

    fn workflow(store: Arc<dyn ClaimStore>) -> ClaimWorkflow {
        ClaimWorkflow::new(store, Arc::new(SimulatedSettlement::new(Duration::ZERO)))
    }

    /// Wraps a real store and fails selected operations.
    struct FlakyStore {
        inner: Arc<AirdropStore>,
        fail_find: bool,
        fail_create: bool,
        fail_update: bool,
        creates: AtomicUsize,
    }

    impl FlakyStore {
        fn new(inner: Arc<AirdropStore>) -> Self {
            Self {
                inner,
                fail_find: false,
                fail_create: false,
                fail_update: false,
                creates: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ClaimStore for FlakyStore {
        async fn find_completed_claim(&self, address: &str) -> Result<Option<Claim>, StoreError> {
            if self.fail_find {
                return Err(StoreError::Unavailable("lookup rejected".to_string()));
            }
            self.inner.find_completed_claim(address).await
        }

        async fn create_claim(&self, claim: NewClaim) -> Result<String, StoreError> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            if self.fail_create {
                return Err(StoreError::Unavailable("insert rejected".to_string()));
            }
            self.inner.create_claim(claim).await
        }

        async fn update_claim(&self, id: &str, patch: ClaimPatch) -> Result<Claim, StoreError> {
            if self.fail_update {
                return Err(StoreError::Unavailable("update rejected".to_string()));
            }
            self.inner.update_claim(id, patch).await
        }
    }

    struct BrokenSettlement;

    #[async_trait]
    impl Settlement for BrokenSettlement {
        fn name(&self) -> &str {
            "broken"
        }

        async fn settle(&self, _claim: &Claim) -> Result<String, SettlementError> {
            Err(SettlementError("node unreachable".to_string()))
        }
    }

    #[tokio::test]
    async fn successful_claim_is_completed_with_reference() {
        let store = temp_store();
        let flow = workflow(store.clone());

        let receipt = flow.submit_claim("0xCCC", &[entry("0xtok", 500)]).await.unwrap();

        assert_eq!(receipt.wallet_address, "0xccc");
        assert_eq!(receipt.total_amount, 500);
        assert_eq!(receipt.status, ClaimStatus::Completed);
        assert!(!receipt.transaction_hash.is_empty());

        let stored = store.get_claim(&receipt.claim_id).unwrap();
        assert_eq!(stored.status, ClaimStatus::Completed);
        assert_eq!(stored.total_amount, 500);
        assert_eq!(stored.tokens_claimed.len(), 1);
        assert_eq!(stored.transaction_hash.as_deref(), Some(receipt.transaction_hash.as_str()));
    }

    #[tokio::test]
    async fn second_claim_for_same_address_is_rejected_without_new_record() {
        let store = temp_store();
        let flow = workflow(store.clone());

        flow.submit_claim("0xabc", &[entry("0xtok", 10)]).await.unwrap();
        let err = flow.submit_claim("0xABC", &[entry("0xtok", 10)]).await.unwrap_err();

        assert!(matches!(err, ClaimError::AlreadyClaimed { ref address } if address == "0xabc"));
        assert_eq!(store.list_claims().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn lookup_failure_is_persistence_error_and_writes_nothing() {
        let inner = temp_store();
        let mut flaky = FlakyStore::new(inner.clone());
        flaky.fail_find = true;
        let flaky = Arc::new(flaky);
        let flow = workflow(flaky.clone());

        let err = flow.submit_claim("0xddd", &[entry("0xtok", 5)]).await.unwrap_err();

        assert!(matches!(err, ClaimError::Persistence { claim_id: None, .. }));
        assert_eq!(err.code(), "persistence_error");
        assert_eq!(flaky.creates.load(Ordering::SeqCst), 0);
        assert!(inner.list_claims().unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_failure_surfaces_persistence_error() {
        let inner = temp_store();
        let mut flaky = FlakyStore::new(inner.clone());
        flaky.fail_create = true;
        let flow = workflow(Arc::new(flaky));

        let err = flow.submit_claim("0xddd", &[entry("0xtok", 5)]).await.unwrap_err();

        assert!(matches!(err, ClaimError::Persistence { claim_id: None, .. }));
        assert!(inner.find_completed_claim("0xddd").await.unwrap().is_none());
        assert!(inner.list_claims().unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_failure_leaves_claim_pending() {
        let inner = temp_store();
        let mut flaky = FlakyStore::new(inner.clone());
        flaky.fail_update = true;
        let flow = workflow(Arc::new(flaky));

        let err = flow.submit_claim("0xeee", &[entry("0xtok", 5)]).await.unwrap_err();
        let id = match err {
            ClaimError::Persistence { claim_id: Some(id), .. } => id,
            other => panic!("expected persistence error with claim id, got {other:?}"),
        };
        assert_eq!(inner.get_claim(&id).unwrap().status, ClaimStatus::Pending);
    }

    #[tokio::test]
    async fn settlement_failure_leaves_claim_pending() {
        let store = temp_store();
        let flow = ClaimWorkflow::new(store.clone(), Arc::new(BrokenSettlement));

        let err = flow.submit_claim("0xfff", &[entry("0xtok", 5)]).await.unwrap_err();
        let (claim_id, reason) = match err {
            ClaimError::Settlement { claim_id, reason } => (claim_id, reason),
            other => panic!("expected settlement error, got {other:?}"),
        };
        assert_eq!(reason, "node unreachable");
        assert_eq!(store.get_claim(&claim_id).unwrap().status, ClaimStatus::Pending);
        assert!(store.find_completed_claim("0xfff").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_entries_are_not_eligible_and_write_nothing() {
        let inner = temp_store();
        let flaky = Arc::new(FlakyStore::new(inner.clone()));
        let flow = workflow(flaky.clone());

        let err = flow.submit_claim("0x111", &[]).await.unwrap_err();
        assert!(matches!(err, ClaimError::NotEligible { .. }));
        assert_eq!(flaky.creates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn concurrent_claims_complete_at_most_once() {
        let store = temp_store();
        // settlement delay lets both calls pass the completed-claim check first
        let flow = ClaimWorkflow::new(
            store.clone(),
            Arc::new(SimulatedSettlement::new(Duration::from_millis(20))),
        );
        let entries = vec![entry("0xtok", 1)];

        let (a, b) = tokio::join!(
            flow.submit_claim("0x222", &entries),
            flow.submit_claim("0x222", &entries)
        );
        let successes = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(successes, 1);

        let completed = store
            .claims_for_address("0x222")
            .unwrap()
            .into_iter()
            .filter(|c| c.status == ClaimStatus::Completed)
            .count();
        assert_eq!(completed, 1);
    }
}
