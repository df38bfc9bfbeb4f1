//! Data access layer.
//!
//! Records live in an embedded sled database, one tree per collection. The
//! claim workflow only sees the `ClaimStore` trait so another backend can be
//! swapped in without touching it.

pub mod sled_store;

use async_trait::async_trait;
use thiserror::Error;

use crate::airdrop::types::{Claim, ClaimPatch, IllegalTransition, NewClaim};

pub use sled_store::AirdropStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sled::Error),
    #[error("record encoding error: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },
    #[error("whitelist already contains address {0}")]
    DuplicateAddress(String),
    #[error("address {address} already has completed claim {existing}")]
    CompletedClaimExists { address: String, existing: String },
    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        StoreError::NotFound { kind, id: id.into() }
    }
}

/// Claim persistence as seen by the claim workflow.
#[async_trait]
pub trait ClaimStore: Send + Sync {
    /// Completed claim for an already-normalized address, if any.
    async fn find_completed_claim(&self, address: &str) -> Result<Option<Claim>, StoreError>;

    /// Insert a new claim and return its id.
    async fn create_claim(&self, claim: NewClaim) -> Result<String, StoreError>;

    /// Apply a status change. Must reject illegal transitions and must refuse
    /// to complete a second claim for the same address
    /// (`StoreError::CompletedClaimExists`).
    async fn update_claim(&self, id: &str, patch: ClaimPatch) -> Result<Claim, StoreError>;
}
