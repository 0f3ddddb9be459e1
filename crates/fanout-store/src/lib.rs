//! Persistence seam for the delivery subsystem.
//!
//! The engine and the API talk to a [`WebhookStore`] trait object; the two
//! implementations are [`memory::MemoryStore`] (tests, embedded setups) and
//! [`postgres::PgStore`] (production). Claim and outcome writes must be
//! atomic with respect to concurrent workers: a delivery is owned by at most
//! one worker between claim and record.

pub mod memory;
pub mod models;
pub mod postgres;

use anyhow::Result;
use chrono::{DateTime, Utc};
use fanout_core::types::{WebhookDelivery, WebhookEndpoint, WebhookEventType};

use crate::models::{AttemptOutcome, DeliveryFilter};

#[async_trait::async_trait]
pub trait WebhookStore: Send + Sync {
    // endpoints
    async fn insert_endpoint(&self, endpoint: &WebhookEndpoint) -> Result<()>;
    async fn get_endpoint(&self, id: &str) -> Result<Option<WebhookEndpoint>>;
    async fn list_endpoints(&self) -> Result<Vec<WebhookEndpoint>>;
    async fn find_endpoint_by_name_url(
        &self,
        name: &str,
        url: &str,
    ) -> Result<Option<WebhookEndpoint>>;
    /// Flip the enabled flag; returns the updated record, None if missing.
    async fn toggle_endpoint(&self, id: &str) -> Result<Option<WebhookEndpoint>>;
    /// Replace the signing secret. Future attempts sign with the new value.
    async fn update_endpoint_secret(&self, id: &str, secret: &str) -> Result<bool>;
    /// Remove the endpoint and force-exhaust its non-terminal deliveries in
    /// the same operation, so no chain is left dangling.
    async fn delete_endpoint(&self, id: &str) -> Result<bool>;
    /// Active endpoints whose subscription set contains `event_type`.
    async fn subscribed_endpoints(&self, event_type: &str) -> Result<Vec<WebhookEndpoint>>;

    // event-type catalog
    async fn upsert_event_type(&self, event_type: &WebhookEventType) -> Result<()>;
    async fn get_event_type(&self, name: &str) -> Result<Option<WebhookEventType>>;
    async fn list_event_types(&self) -> Result<Vec<WebhookEventType>>;
    async fn toggle_event_type(&self, name: &str) -> Result<Option<WebhookEventType>>;

    // deliveries
    async fn insert_delivery(&self, delivery: &WebhookDelivery) -> Result<()>;
    async fn get_delivery(&self, id: &str) -> Result<Option<WebhookDelivery>>;
    async fn list_deliveries(&self, filter: &DeliveryFilter) -> Result<Vec<WebhookDelivery>>;
    /// Exclusively claim up to `limit` due deliveries (pending, or retrying
    /// with an elapsed next_attempt_at), transitioning them to processing.
    /// Test-and-set semantics: no delivery is ever returned to two callers.
    async fn claim_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<WebhookDelivery>>;
    /// Record the outcome of one attempt: delivery status + attempt fields,
    /// the endpoint's last-delivery fields, and on terminal outcomes exactly
    /// one success/failure counter bump, all in a single atomic write.
    async fn record_outcome(&self, outcome: &AttemptOutcome) -> Result<()>;
    /// Manual re-arm of a retrying/failed/exhausted chain: back to pending
    /// with a fresh attempt budget. Returns the updated record.
    async fn requeue_delivery(&self, id: &str) -> Result<Option<WebhookDelivery>>;
}
