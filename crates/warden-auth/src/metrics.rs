//! Decision metrics
//!
//! Recorded through the `metrics` facade; the embedding application installs
//! the recorder/exporter.

use crate::decision::AuthDecision;
use metrics::{counter, histogram};
use std::time::Duration;

/// Metric names
pub mod names {
    pub const DECISIONS_TOTAL: &str = "warden_auth_decisions_total";
    pub const DECISION_DURATION_SECONDS: &str = "warden_auth_decision_duration_seconds";
}

/// Record one decision
pub fn record_decision(decision: &AuthDecision, elapsed: Duration) {
    let reason = decision.reason().map(|r| r.as_str()).unwrap_or("none");

    counter!(
        names::DECISIONS_TOTAL,
        "outcome" => decision.outcome(),
        "reason" => reason
    )
    .increment(1);

    histogram!(
        names::DECISION_DURATION_SECONDS,
        "outcome" => decision.outcome()
    )
    .record(elapsed.as_secs_f64());
}
