//! Fan-out: one dispatched event becomes one pending delivery per
//! subscribed, active endpoint.

use std::sync::Arc;

use fanout_core::error::Result;
use fanout_core::types::WebhookDelivery;
use fanout_store::WebhookStore;
use serde_json::Value as JsonValue;

#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn WebhookStore>,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn WebhookStore>) -> Self {
        Self { store }
    }

    /// Queue deliveries for every active endpoint subscribed to
    /// `event_type`. Returns the queued delivery ids.
    ///
    /// An event type missing from the catalog, or disabled, drops the event
    /// without queuing anything. Dispatch never waits on HTTP.
    pub async fn dispatch(&self, event_type: &str, payload: JsonValue) -> Result<Vec<String>> {
        match self.store.get_event_type(event_type).await? {
            Some(catalog_entry) if catalog_entry.is_active => {}
            Some(_) => {
                tracing::warn!(event_type, "event type disabled, dropping event");
                return Ok(Vec::new());
            }
            None => {
                tracing::warn!(event_type, "unknown event type, dropping event");
                return Ok(Vec::new());
            }
        }

        let endpoints = self.store.subscribed_endpoints(event_type).await?;
        let mut delivery_ids = Vec::with_capacity(endpoints.len());
        for endpoint in &endpoints {
            let delivery = WebhookDelivery::new(&endpoint.id, event_type, payload.clone());
            self.store.insert_delivery(&delivery).await?;
            delivery_ids.push(delivery.id);
        }

        tracing::info!(
            event_type,
            endpoints = endpoints.len(),
            "event dispatched"
        );
        Ok(delivery_ids)
    }
}
