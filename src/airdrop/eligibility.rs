//! Eligibility engine: matches a holder's tokens against the whitelist.

use crate::airdrop::types::{normalize_address, EligibilityResult, HeldToken, WhitelistEntry};

/// Exact integer sum of the entries' awards.
pub fn total_award(entries: &[WhitelistEntry]) -> u128 {
    entries.iter().map(|e| u128::from(e.airdrop_amount)).sum()
}

/// Compute which held tokens earn an award.
///
/// Inactive entries are ignored. Matches follow held-token order; when the
/// whitelist holds the same address twice, the first entry in whitelist order
/// wins. Tokens with no match are skipped. `claimed` is left `false`; callers
/// that know the claim history fill it in.
pub fn compute_eligibility(held: &[HeldToken], whitelist: &[WhitelistEntry]) -> EligibilityResult {
    if held.is_empty() {
        return EligibilityResult::empty();
    }

    let active: Vec<(String, &WhitelistEntry)> = whitelist
        .iter()
        .filter(|e| e.is_active)
        .map(|e| (normalize_address(&e.address), e))
        .collect();

    let eligible_tokens: Vec<WhitelistEntry> = held
        .iter()
        .filter_map(|token| {
            let key = normalize_address(&token.address);
            active
                .iter()
                .find(|(addr, _)| *addr == key)
                .map(|(_, entry)| (*entry).clone())
        })
        .collect();

    let total_airdrop_amount = total_award(&eligible_tokens);

    EligibilityResult {
        is_eligible: !eligible_tokens.is_empty(),
        eligible_tokens,
        total_airdrop_amount,
        claimed: false,
    }
}
