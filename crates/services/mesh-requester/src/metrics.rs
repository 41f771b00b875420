use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

// Registry holds all requester metrics
static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

static BID_DECISIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new("requester_bid_decisions_total", "Bid decisions made, by outcome"),
        &["outcome"], // "accepted", "oversubscribed", "already_assigned"
    )
    .expect("Failed to create bid_decisions metric");
    register(Box::new(counter.clone()));
    counter
});

static VERIFICATION_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new("requester_verification_attempts_total", "Verification attempts, by outcome"),
        &["outcome"], // "not_ready", "already_verified", "verified", "error"
    )
    .expect("Failed to create verification_attempts metric");
    register(Box::new(counter.clone()));
    counter
});

static RESULT_VERDICTS: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new("requester_result_verdicts_total", "Per-node result verdicts, by verdict"),
        &["verdict"],
    )
    .expect("Failed to create result_verdicts metric");
    register(Box::new(counter.clone()));
    counter
});

static DISPATCH_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "requester_dispatch_failures_total",
        "Notifications that could not be published or recorded",
    )
    .expect("Failed to create dispatch_failures metric");
    register(Box::new(counter.clone()));
    counter
});

static TRACE_CLUSTERINGS: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "requester_trace_clusterings_total",
        "Trace consensus computations performed",
    )
    .expect("Failed to create trace_clusterings metric");
    register(Box::new(counter.clone()));
    counter
});

fn register(collector: Box<dyn prometheus::core::Collector>) {
    if let Err(e) = REGISTRY.register(collector) {
        tracing::warn!("Failed to register metric: {}", e);
    }
}

pub fn record_bid_decision(outcome: &str) {
    BID_DECISIONS.with_label_values(&[outcome]).inc();
}

pub fn record_verification_attempt(outcome: &str) {
    VERIFICATION_ATTEMPTS.with_label_values(&[outcome]).inc();
}

pub fn record_result_verdict(accepted: bool) {
    let verdict = if accepted { "accepted" } else { "rejected" };
    RESULT_VERDICTS.with_label_values(&[verdict]).inc();
}

pub fn record_dispatch_failure() {
    DISPATCH_FAILURES.inc();
}

pub fn record_trace_clustering() {
    TRACE_CLUSTERINGS.inc();
}

pub fn bid_decisions(outcome: &str) -> u64 {
    BID_DECISIONS.with_label_values(&[outcome]).get()
}

pub fn trace_clusterings() -> u64 {
    TRACE_CLUSTERINGS.get()
}

/// Renders every registered metric in the Prometheus text format.
pub fn gather() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
