//! In-memory store used by the integration tests and embedded setups.
//!
//! A single async mutex guards all tables, which makes every trait method
//! (claim_due and record_outcome in particular) atomic with respect to
//! concurrent workers.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use fanout_core::types::{DeliveryStatus, WebhookDelivery, WebhookEndpoint, WebhookEventType};
use tokio::sync::Mutex;

use crate::models::{AttemptOutcome, DeliveryFilter};
use crate::WebhookStore;

#[derive(Default)]
struct Tables {
    endpoints: HashMap<String, WebhookEndpoint>,
    event_types: HashMap<String, WebhookEventType>,
    deliveries: HashMap<String, WebhookDelivery>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn is_due(delivery: &WebhookDelivery, now: DateTime<Utc>) -> bool {
    match delivery.status {
        DeliveryStatus::Pending => true,
        DeliveryStatus::Retrying => delivery
            .next_attempt_at
            .map(|at| at <= now)
            .unwrap_or(true),
        _ => false,
    }
}

#[async_trait::async_trait]
impl WebhookStore for MemoryStore {
    async fn insert_endpoint(&self, endpoint: &WebhookEndpoint) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables.endpoints.insert(endpoint.id.clone(), endpoint.clone());
        Ok(())
    }

    async fn get_endpoint(&self, id: &str) -> Result<Option<WebhookEndpoint>> {
        let tables = self.tables.lock().await;
        Ok(tables.endpoints.get(id).cloned())
    }

    async fn list_endpoints(&self) -> Result<Vec<WebhookEndpoint>> {
        let tables = self.tables.lock().await;
        let mut endpoints: Vec<_> = tables.endpoints.values().cloned().collect();
        endpoints.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(endpoints)
    }

    async fn find_endpoint_by_name_url(
        &self,
        name: &str,
        url: &str,
    ) -> Result<Option<WebhookEndpoint>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .endpoints
            .values()
            .find(|ep| ep.name == name && ep.url == url)
            .cloned())
    }

    async fn toggle_endpoint(&self, id: &str) -> Result<Option<WebhookEndpoint>> {
        let mut tables = self.tables.lock().await;
        match tables.endpoints.get_mut(id) {
            Some(endpoint) => {
                endpoint.is_active = !endpoint.is_active;
                endpoint.updated_at = Utc::now();
                Ok(Some(endpoint.clone()))
            }
            None => Ok(None),
        }
    }

    async fn update_endpoint_secret(&self, id: &str, secret: &str) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        match tables.endpoints.get_mut(id) {
            Some(endpoint) => {
                endpoint.secret = secret.to_string();
                endpoint.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_endpoint(&self, id: &str) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        if tables.endpoints.remove(id).is_none() {
            return Ok(false);
        }
        let now = Utc::now();
        for delivery in tables.deliveries.values_mut() {
            if delivery.endpoint_id == id && !delivery.status.is_terminal() {
                delivery.status = DeliveryStatus::Exhausted;
                delivery.error_message = Some("endpoint deleted".to_string());
                delivery.next_attempt_at = None;
                delivery.updated_at = now;
            }
        }
        Ok(true)
    }

    async fn subscribed_endpoints(&self, event_type: &str) -> Result<Vec<WebhookEndpoint>> {
        let tables = self.tables.lock().await;
        let mut endpoints: Vec<_> = tables
            .endpoints
            .values()
            .filter(|ep| ep.is_active && ep.events.iter().any(|e| e == event_type))
            .cloned()
            .collect();
        endpoints.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(endpoints)
    }

    async fn upsert_event_type(&self, event_type: &WebhookEventType) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables
            .event_types
            .insert(event_type.name.clone(), event_type.clone());
        Ok(())
    }

    async fn get_event_type(&self, name: &str) -> Result<Option<WebhookEventType>> {
        let tables = self.tables.lock().await;
        Ok(tables.event_types.get(name).cloned())
    }

    async fn list_event_types(&self) -> Result<Vec<WebhookEventType>> {
        let tables = self.tables.lock().await;
        let mut event_types: Vec<_> = tables.event_types.values().cloned().collect();
        event_types.sort_by(|a, b| a.category.cmp(&b.category).then(a.name.cmp(&b.name)));
        Ok(event_types)
    }

    async fn toggle_event_type(&self, name: &str) -> Result<Option<WebhookEventType>> {
        let mut tables = self.tables.lock().await;
        match tables.event_types.get_mut(name) {
            Some(event_type) => {
                event_type.is_active = !event_type.is_active;
                Ok(Some(event_type.clone()))
            }
            None => Ok(None),
        }
    }

    async fn insert_delivery(&self, delivery: &WebhookDelivery) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables.deliveries.insert(delivery.id.clone(), delivery.clone());
        Ok(())
    }

    async fn get_delivery(&self, id: &str) -> Result<Option<WebhookDelivery>> {
        let tables = self.tables.lock().await;
        Ok(tables.deliveries.get(id).cloned())
    }

    async fn list_deliveries(&self, filter: &DeliveryFilter) -> Result<Vec<WebhookDelivery>> {
        let tables = self.tables.lock().await;
        let mut deliveries: Vec<_> = tables
            .deliveries
            .values()
            .filter(|d| {
                filter
                    .endpoint_id
                    .as_deref()
                    .map(|id| d.endpoint_id == id)
                    .unwrap_or(true)
                    && filter.status.map(|s| d.status == s).unwrap_or(true)
            })
            .cloned()
            .collect();
        deliveries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        if let Some(limit) = filter.limit {
            deliveries.truncate(limit.max(0) as usize);
        }
        Ok(deliveries)
    }

    async fn claim_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<WebhookDelivery>> {
        let mut tables = self.tables.lock().await;
        let mut due: Vec<(DateTime<Utc>, String)> = tables
            .deliveries
            .values()
            .filter(|d| is_due(d, now))
            .map(|d| (d.created_at, d.id.clone()))
            .collect();
        due.sort();
        due.truncate(limit);

        let mut claimed = Vec::with_capacity(due.len());
        for (_, id) in due {
            if let Some(delivery) = tables.deliveries.get_mut(&id) {
                delivery.status = DeliveryStatus::Processing;
                delivery.updated_at = now;
                claimed.push(delivery.clone());
            }
        }
        Ok(claimed)
    }

    async fn record_outcome(&self, outcome: &AttemptOutcome) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();

        if let Some(delivery) = tables.deliveries.get_mut(&outcome.delivery_id) {
            delivery.status = outcome.status;
            delivery.attempt_count = outcome.attempt_count;
            delivery.response_status = outcome.response_status;
            delivery.latency_ms = outcome.latency_ms;
            delivery.error_message = outcome.error_message.clone();
            if outcome.signature.is_some() {
                delivery.signature = outcome.signature.clone();
            }
            delivery.next_attempt_at = outcome.next_attempt_at;
            delivery.updated_at = now;
        }

        if let Some(endpoint) = tables.endpoints.get_mut(&outcome.endpoint_id) {
            endpoint.last_delivery_at = Some(now);
            endpoint.last_delivery_status = Some(outcome.status);
            if outcome.status == DeliveryStatus::Delivered {
                endpoint.success_count += 1;
            } else if outcome.status == DeliveryStatus::Exhausted {
                endpoint.failure_count += 1;
            }
            endpoint.updated_at = now;
        }

        Ok(())
    }

    async fn requeue_delivery(&self, id: &str) -> Result<Option<WebhookDelivery>> {
        let mut tables = self.tables.lock().await;
        match tables.deliveries.get_mut(id) {
            Some(delivery) => {
                delivery.status = DeliveryStatus::Pending;
                delivery.attempt_count = 0;
                delivery.next_attempt_at = None;
                delivery.error_message = None;
                delivery.updated_at = Utc::now();
                Ok(Some(delivery.clone()))
            }
            None => Ok(None),
        }
    }
}
