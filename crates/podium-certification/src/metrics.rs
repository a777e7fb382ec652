//! Prometheus metrics for the certification core
//!
//! Registered in the default registry; the node's `/metrics` endpoint gathers them.

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec,
};

/// Aggregate workflow gate transitions
pub static CERTIFICATION_TRANSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "podium_certification_transitions_total",
        "Total certification gate transitions",
        &["gate"]
    )
    .unwrap()
});

pub static CERTIFICATION_REJECTIONS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "podium_certification_rejections_total",
        "Total certifications rejected"
    )
    .unwrap()
});

/// Guard failures by operation, e.g. tally before judge
pub static GUARD_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "podium_certification_guard_failures_total",
        "Total workflow operations refused by a precondition",
        &["operation"]
    )
    .unwrap()
});

/// Role ledger records written
pub static LEDGER_ENTRIES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "podium_ledger_entries_total",
        "Total role certification ledger records",
        &["role"]
    )
    .unwrap()
});

pub static SCORES_SUBMITTED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "podium_scores_submitted_total",
        "Total score submissions",
        &["outcome"]
    )
    .unwrap()
});

pub static SCORES_CERTIFIED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "podium_scores_certified_total",
        "Total score rows marked certified"
    )
    .unwrap()
});

/// Signatures recorded on removal / uncertification requests
pub static SIGNATURES_RECORDED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "podium_request_signatures_total",
        "Total request signatures",
        &["role"]
    )
    .unwrap()
});

pub static REQUESTS_EXECUTED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "podium_requests_executed_total",
        "Total approved requests executed",
        &["kind"]
    )
    .unwrap()
});

/// Time to aggregate one category's results (seconds)
pub static WINNER_COMPUTATION_TIME: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "podium_winner_computation_seconds",
        "Winner aggregation duration in seconds",
        vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]
    )
    .unwrap()
});
