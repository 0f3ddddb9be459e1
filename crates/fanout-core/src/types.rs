use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Event type reserved for `test_fire`. Seeded into the catalog at startup
/// and rejected as an explicit subscription.
pub const TEST_EVENT_TYPE: &str = "test.ping";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RetryPolicy {
    None,
    Fixed,
    Linear,
    Exponential,
}

impl RetryPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetryPolicy::None => "none",
            RetryPolicy::Fixed => "fixed",
            RetryPolicy::Linear => "linear",
            RetryPolicy::Exponential => "exponential",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "none" => Some(RetryPolicy::None),
            "fixed" => Some(RetryPolicy::Fixed),
            "linear" => Some(RetryPolicy::Linear),
            "exponential" => Some(RetryPolicy::Exponential),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Processing,
    Delivered,
    Failed,
    Retrying,
    Exhausted,
}

impl DeliveryStatus {
    /// Terminal chains never transition again and bump endpoint counters
    /// exactly once.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryStatus::Delivered | DeliveryStatus::Exhausted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Processing => "processing",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Failed => "failed",
            DeliveryStatus::Retrying => "retrying",
            DeliveryStatus::Exhausted => "exhausted",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(DeliveryStatus::Pending),
            "processing" => Some(DeliveryStatus::Processing),
            "delivered" => Some(DeliveryStatus::Delivered),
            "failed" => Some(DeliveryStatus::Failed),
            "retrying" => Some(DeliveryStatus::Retrying),
            "exhausted" => Some(DeliveryStatus::Exhausted),
            _ => None,
        }
    }
}

/// A registered external HTTP receiver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEndpoint {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub url: String,
    pub events: Vec<String>,
    pub secret: String,
    pub retry_policy: RetryPolicy,
    pub max_retries: i32,
    pub retry_delay_ms: i64,
    pub timeout_ms: i64,
    pub is_active: bool,
    pub success_count: i64,
    pub failure_count: i64,
    pub last_delivery_at: Option<DateTime<Utc>>,
    pub last_delivery_status: Option<DeliveryStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Catalog entry describing an event type producers may dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEventType {
    pub name: String,
    pub category: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// One event x endpoint delivery chain: a single record whose status evolves
/// across attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookDelivery {
    pub id: String,
    pub endpoint_id: String,
    pub event_type: String,
    pub payload: JsonValue,
    pub status: DeliveryStatus,
    pub attempt_count: i32,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub response_status: Option<i32>,
    pub latency_ms: Option<i32>,
    pub error_message: Option<String>,
    pub signature: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WebhookDelivery {
    pub fn new(endpoint_id: &str, event_type: &str, payload: JsonValue) -> Self {
        let now = Utc::now();
        Self {
            id: format!("del_{}", nanoid::nanoid!(12)),
            endpoint_id: endpoint_id.to_string(),
            event_type: event_type.to_string(),
            payload,
            status: DeliveryStatus::Pending,
            attempt_count: 0,
            next_attempt_at: None,
            response_status: None,
            latency_ms: None,
            error_message: None,
            signature: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// The JSON body posted to receivers. Recomputed per attempt so a secret
/// rotation between attempts changes the signature of later attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub event: String,
    pub delivery_id: String,
    pub timestamp: DateTime<Utc>,
    pub payload: JsonValue,
}

impl EventEnvelope {
    pub fn for_delivery(delivery: &WebhookDelivery) -> Self {
        Self {
            event: delivery.event_type.clone(),
            delivery_id: delivery.id.clone(),
            timestamp: delivery.created_at,
            payload: delivery.payload.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_status_terminal() {
        assert!(DeliveryStatus::Delivered.is_terminal());
        assert!(DeliveryStatus::Exhausted.is_terminal());
        assert!(!DeliveryStatus::Pending.is_terminal());
        assert!(!DeliveryStatus::Processing.is_terminal());
        assert!(!DeliveryStatus::Retrying.is_terminal());
        assert!(!DeliveryStatus::Failed.is_terminal());
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            DeliveryStatus::Pending,
            DeliveryStatus::Processing,
            DeliveryStatus::Delivered,
            DeliveryStatus::Failed,
            DeliveryStatus::Retrying,
            DeliveryStatus::Exhausted,
        ] {
            assert_eq!(DeliveryStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(DeliveryStatus::parse("nonsense"), None);
    }

    #[test]
    fn test_retry_policy_round_trip() {
        for policy in [
            RetryPolicy::None,
            RetryPolicy::Fixed,
            RetryPolicy::Linear,
            RetryPolicy::Exponential,
        ] {
            assert_eq!(RetryPolicy::parse(policy.as_str()), Some(policy));
        }
        assert_eq!(RetryPolicy::parse("cubic"), None);
    }

    #[test]
    fn test_new_delivery_starts_pending() {
        let delivery = WebhookDelivery::new("ep_1", "order.created", serde_json::json!({"a": 1}));
        assert!(delivery.id.starts_with("del_"));
        assert_eq!(delivery.status, DeliveryStatus::Pending);
        assert_eq!(delivery.attempt_count, 0);
        assert!(delivery.next_attempt_at.is_none());
    }

    #[test]
    fn test_envelope_uses_delivery_creation_time() {
        let delivery = WebhookDelivery::new("ep_1", "order.created", serde_json::json!({}));
        let envelope = EventEnvelope::for_delivery(&delivery);
        assert_eq!(envelope.delivery_id, delivery.id);
        assert_eq!(envelope.timestamp, delivery.created_at);
        assert_eq!(envelope.event, "order.created");
    }

    #[test]
    fn test_envelope_wire_casing() {
        let delivery = WebhookDelivery::new("ep_1", "order.created", serde_json::json!({"x": 1}));
        let envelope = EventEnvelope::for_delivery(&delivery);
        let value = serde_json::to_value(&envelope).unwrap();
        assert!(value.get("deliveryId").is_some());
        assert!(value.get("event").is_some());
        assert!(value.get("payload").is_some());
    }
}
