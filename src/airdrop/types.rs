//! Shared data contracts for the airdrop core.
//!
//! Records serialize with the same snake_case field names the admin console
//! and the public API use on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Lower-case, trimmed form of a chain address. All address keys go through here.
pub fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}

/// Admin-approved token address that grants an award.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelistEntry {
    pub id: String,
    pub address: String,
    pub name: String,
    pub symbol: String,
    pub airdrop_amount: u64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WhitelistEntry {
    pub fn matches(&self, address: &str) -> bool {
        normalize_address(&self.address) == normalize_address(address)
    }
}

/// Fields an admin supplies when adding a token to the whitelist.
#[derive(Debug, Clone, Deserialize)]
pub struct NewWhitelistEntry {
    pub address: String,
    pub name: String,
    pub symbol: String,
    pub airdrop_amount: u64,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Partial update of a whitelist entry; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhitelistPatch {
    pub address: Option<String>,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub airdrop_amount: Option<u64>,
    pub is_active: Option<bool>,
}

/// Price quote attached to a token or the native coin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPrice {
    pub rate: f64,
    pub currency: String,
}

/// Token balance snapshot reported by the balance oracle. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeldToken {
    pub address: String,
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
    /// Unscaled integer balance as a decimal string.
    pub raw_balance: String,
    pub balance: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<TokenPrice>,
}

/// Everything the oracle knows about one holder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holdings {
    pub address: String,
    pub native_balance: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native_price: Option<TokenPrice>,
    pub tokens: Vec<HeldToken>,
}

/// Outcome of matching a holder's tokens against the whitelist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityResult {
    pub is_eligible: bool,
    pub eligible_tokens: Vec<WhitelistEntry>,
    pub total_airdrop_amount: u128,
    pub claimed: bool,
}

impl EligibilityResult {
    pub fn empty() -> Self {
        Self {
            is_eligible: false,
            eligible_tokens: Vec::new(),
            total_airdrop_amount: 0,
            claimed: false,
        }
    }
}

/// Lifecycle of a claim record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal claim transition {from} -> {to}")]
pub struct IllegalTransition {
    pub from: ClaimStatus,
    pub to: ClaimStatus,
}

impl ClaimStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::Pending => "pending",
            ClaimStatus::Completed => "completed",
            ClaimStatus::Failed => "failed",
        }
    }

    /// Only a pending claim may move, and only to a terminal state.
    pub fn can_transition_to(self, next: ClaimStatus) -> bool {
        !self.is_terminal() && next.is_terminal()
    }

    pub fn transition(self, next: ClaimStatus) -> Result<ClaimStatus, IllegalTransition> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(IllegalTransition { from: self, to: next })
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, ClaimStatus::Pending)
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted record of a holder's request for their award.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub id: String,
    pub wallet_address: String,
    pub tokens_claimed: Vec<WhitelistEntry>,
    pub total_amount: u128,
    pub transaction_hash: Option<String>,
    pub status: ClaimStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Claim as handed to the store for creation; the store assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct NewClaim {
    pub wallet_address: String,
    pub tokens_claimed: Vec<WhitelistEntry>,
    pub total_amount: u128,
    pub status: ClaimStatus,
}

/// Status change applied to an existing claim.
#[derive(Debug, Clone)]
pub struct ClaimPatch {
    pub status: ClaimStatus,
    pub transaction_hash: Option<String>,
}

impl ClaimPatch {
    pub fn completed(reference_id: impl Into<String>) -> Self {
        Self {
            status: ClaimStatus::Completed,
            transaction_hash: Some(reference_id.into()),
        }
    }

    pub fn failed() -> Self {
        Self {
            status: ClaimStatus::Failed,
            transaction_hash: None,
        }
    }
}

/// Key-value admin setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const SETTING_ETHPLORER_API_KEY: &str = "ethplorer_api_key";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationStatus {
    pub is_installed: bool,
    pub installed_at: Option<DateTime<Utc>>,
    pub version: Option<String>,
}

/// Aggregate figures for the admin dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_claims: usize,
    pub completed_claims: usize,
    pub total_distributed: u128,
    pub active_tokens: usize,
    pub total_airdrop_pool: u128,
    pub total_whitelist_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_and_lowercases() {
        assert_eq!(normalize_address("  0xAbC "), "0xabc");
    }

    #[test]
    fn pending_moves_to_terminal_states_only() {
        assert_eq!(
            ClaimStatus::Pending.transition(ClaimStatus::Completed),
            Ok(ClaimStatus::Completed)
        );
        assert_eq!(
            ClaimStatus::Pending.transition(ClaimStatus::Failed),
            Ok(ClaimStatus::Failed)
        );
        assert!(ClaimStatus::Pending.transition(ClaimStatus::Pending).is_err());
    }

    #[test]
    fn terminal_states_are_frozen() {
        for from in [ClaimStatus::Completed, ClaimStatus::Failed] {
            for to in [ClaimStatus::Pending, ClaimStatus::Completed, ClaimStatus::Failed] {
                let err = from.transition(to).unwrap_err();
                assert_eq!(err, IllegalTransition { from, to });
            }
            assert!(from.is_terminal());
        }
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&ClaimStatus::Completed).unwrap();
        assert_eq!(json, "\"completed\"");
        let back: ClaimStatus = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(back, ClaimStatus::Failed);
    }
}
