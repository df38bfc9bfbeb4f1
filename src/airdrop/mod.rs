//! Airdrop core: eligibility matching and the claim workflow.

pub mod claim;
pub mod eligibility;
pub mod settlement;
pub mod types;

pub use claim::{ClaimError, ClaimReceipt, ClaimWorkflow};
pub use eligibility::compute_eligibility;
