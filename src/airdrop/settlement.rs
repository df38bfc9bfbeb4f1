//! Settlement step run between creating and completing a claim.
//!
//! There is no on-chain transfer: `SimulatedSettlement` waits and returns a
//! fabricated `0x`-prefixed reference id. A real distributor plugs in through
//! the same trait.

use async_trait::async_trait;
use rand::RngCore;
use std::time::Duration;
use thiserror::Error;

use crate::airdrop::types::Claim;

#[derive(Debug, Clone, Error)]
#[error("settlement failed: {0}")]
pub struct SettlementError(pub String);

#[async_trait]
pub trait Settlement: Send + Sync {
    /// Human readable backend name for logs.
    fn name(&self) -> &str;

    /// Distribute the claim's award and return a reference id.
    async fn settle(&self, claim: &Claim) -> Result<String, SettlementError>;
}

pub struct SimulatedSettlement {
    delay: Duration,
}

impl SimulatedSettlement {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

/// `0x` followed by 64 hex chars.
pub fn fabricate_reference_id() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("0x{}", hex::encode(bytes))
}

#[async_trait]
impl Settlement for SimulatedSettlement {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn settle(&self, claim: &Claim) -> Result<String, SettlementError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let reference = fabricate_reference_id();
        tracing::debug!(
            claim_id = %claim.id,
            amount = %claim.total_amount,
            reference = %reference,
            "simulated settlement"
        );
        Ok(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::airdrop::types::ClaimStatus;
    use chrono::Utc;

    #[test]
    fn reference_id_shape() {
        let id = fabricate_reference_id();
        assert_eq!(id.len(), 66);
        assert!(id.starts_with("0x"));
        assert!(id[2..].chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, fabricate_reference_id());
    }

    #[tokio::test]
    async fn simulated_settlement_returns_reference() {
        let now = Utc::now();
        let claim = Claim {
            id: "c1".to_string(),
            wallet_address: "0xabc".to_string(),
            tokens_claimed: vec![],
            total_amount: 10,
            transaction_hash: None,
            status: ClaimStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        let settlement = SimulatedSettlement::new(Duration::ZERO);
        let reference = settlement.settle(&claim).await.unwrap();
        assert!(reference.starts_with("0x"));
        assert_eq!(settlement.name(), "simulated");
    }
}
