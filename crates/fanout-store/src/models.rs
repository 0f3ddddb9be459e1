use chrono::{DateTime, Utc};
use fanout_core::types::DeliveryStatus;

/// Everything a worker learned from one attempt, applied to the store as a
/// single atomic write.
#[derive(Debug, Clone)]
pub struct AttemptOutcome {
    pub delivery_id: String,
    pub endpoint_id: String,
    pub status: DeliveryStatus,
    pub attempt_count: i32,
    pub response_status: Option<i32>,
    pub latency_ms: Option<i32>,
    pub error_message: Option<String>,
    /// Signature actually sent on this attempt, kept for audit.
    pub signature: Option<String>,
    pub next_attempt_at: Option<DateTime<Utc>>,
}

impl AttemptOutcome {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[derive(Debug, Clone, Default)]
pub struct DeliveryFilter {
    pub endpoint_id: Option<String>,
    pub status: Option<DeliveryStatus>,
    pub limit: Option<i64>,
}
