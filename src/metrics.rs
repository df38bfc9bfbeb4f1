//! Prometheus collectors for the hub, served as text at `/metrics.prom`.

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

pub static PROM_REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

fn counter(name: &str, help: &str) -> IntCounter {
    let c = IntCounter::new(name, help).expect("valid counter opts");
    // register, ignore error if already registered
    let _ = PROM_REGISTRY.register(Box::new(c.clone()));
    c
}

pub static ELIGIBILITY_LOOKUPS: Lazy<IntCounter> =
    Lazy::new(|| counter("airdrop_eligibility_lookups_total", "Eligibility lookups served"));

pub static CLAIMS_SUBMITTED: Lazy<IntCounter> =
    Lazy::new(|| counter("airdrop_claims_submitted_total", "Claim attempts received"));

pub static CLAIMS_COMPLETED: Lazy<IntCounter> =
    Lazy::new(|| counter("airdrop_claims_completed_total", "Claims that reached completed"));

pub static CLAIMS_REJECTED: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        Opts::new("airdrop_claims_rejected_total", "Claim attempts that failed, by reason"),
        &["reason"],
    )
    .expect("valid counter opts");
    let _ = PROM_REGISTRY.register(Box::new(c.clone()));
    c
});

pub static ORACLE_FAILURES: Lazy<IntCounter> =
    Lazy::new(|| counter("airdrop_oracle_failures_total", "Balance oracle requests that failed"));

pub static ADMIN_LOGINS_FAILED: Lazy<IntCounter> =
    Lazy::new(|| counter("airdrop_admin_logins_failed_total", "Rejected admin sign-in attempts"));

pub static WHITELIST_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    let g = IntGauge::new("airdrop_whitelist_active", "Active whitelist entries").expect("valid gauge opts");
    let _ = PROM_REGISTRY.register(Box::new(g.clone()));
    g
});

/// Touch every collector so the first scrape lists them all at zero.
pub fn init() {
    Lazy::force(&ELIGIBILITY_LOOKUPS);
    Lazy::force(&CLAIMS_SUBMITTED);
    Lazy::force(&CLAIMS_COMPLETED);
    Lazy::force(&CLAIMS_REJECTED);
    Lazy::force(&ORACLE_FAILURES);
    Lazy::force(&ADMIN_LOGINS_FAILED);
    Lazy::force(&WHITELIST_ACTIVE);
}

/// Registry contents in the Prometheus text exposition format.
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let metric_families = PROM_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).ok();
    String::from_utf8_lossy(&buffer).into_owned()
}
