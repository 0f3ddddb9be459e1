//! Endpoint registry: validated CRUD over webhook endpoints plus the
//! operator-facing delivery actions (test fire, manual retry).

use std::sync::Arc;

use fanout_core::config::Settings;
use fanout_core::error::{Error, Result};
use fanout_core::secret::generate_secret;
use fanout_core::types::{
    DeliveryStatus, RetryPolicy, WebhookDelivery, WebhookEndpoint, TEST_EVENT_TYPE,
};
use fanout_store::WebhookStore;
use nanoid::nanoid;

/// Fallbacks applied when a create request leaves retry tuning unset.
#[derive(Debug, Clone, Copy)]
pub struct EndpointDefaults {
    pub max_retries: i32,
    pub retry_delay_ms: i64,
    pub timeout_ms: i64,
}

impl From<&Settings> for EndpointDefaults {
    fn from(settings: &Settings) -> Self {
        Self {
            max_retries: settings.default_max_retries,
            retry_delay_ms: settings.default_retry_delay_ms,
            timeout_ms: settings.default_timeout_ms,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewEndpoint {
    pub name: String,
    pub description: Option<String>,
    pub url: String,
    pub events: Vec<String>,
    pub retry_policy: Option<RetryPolicy>,
    pub max_retries: Option<i32>,
    pub retry_delay_ms: Option<i64>,
    pub timeout_ms: Option<i64>,
}

#[derive(Clone)]
pub struct EndpointRegistry {
    store: Arc<dyn WebhookStore>,
    defaults: EndpointDefaults,
}

fn validate_url(url: &str) -> Result<()> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| Error::validation("url must use http or https"))?;
    let host = rest.split('/').next().unwrap_or("");
    if host.is_empty() {
        return Err(Error::validation("url must include a host"));
    }
    Ok(())
}

impl EndpointRegistry {
    pub fn new(store: Arc<dyn WebhookStore>, defaults: EndpointDefaults) -> Self {
        Self { store, defaults }
    }

    /// Register a new endpoint. The returned record carries the plaintext
    /// secret; this is the caller's only chance to read it unmasked.
    pub async fn create(&self, input: NewEndpoint) -> Result<WebhookEndpoint> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(Error::validation("name must not be empty"));
        }
        validate_url(&input.url)?;
        // An empty subscription set is allowed: the endpoint exists but
        // receives nothing until events are added.
        for event in &input.events {
            if event == TEST_EVENT_TYPE {
                return Err(Error::validation(format!(
                    "{TEST_EVENT_TYPE} is reserved and cannot be subscribed to"
                )));
            }
            if self.store.get_event_type(event).await?.is_none() {
                return Err(Error::validation(format!("unknown event type: {event}")));
            }
        }
        if let Some(max_retries) = input.max_retries {
            if max_retries < 0 {
                return Err(Error::validation("max_retries must not be negative"));
            }
        }
        if self
            .store
            .find_endpoint_by_name_url(&name, &input.url)
            .await?
            .is_some()
        {
            return Err(Error::validation("an endpoint with this name and url already exists"));
        }

        let now = chrono::Utc::now();
        let endpoint = WebhookEndpoint {
            id: format!("wh_{}", nanoid!(12)),
            name,
            description: input.description,
            url: input.url,
            events: input.events,
            secret: generate_secret(),
            retry_policy: input.retry_policy.unwrap_or(RetryPolicy::Exponential),
            max_retries: input.max_retries.unwrap_or(self.defaults.max_retries),
            retry_delay_ms: input.retry_delay_ms.unwrap_or(self.defaults.retry_delay_ms),
            timeout_ms: input.timeout_ms.unwrap_or(self.defaults.timeout_ms),
            is_active: true,
            success_count: 0,
            failure_count: 0,
            last_delivery_at: None,
            last_delivery_status: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_endpoint(&endpoint).await?;
        tracing::info!(endpoint_id = %endpoint.id, url = %endpoint.url, "endpoint registered");
        Ok(endpoint)
    }

    pub async fn get(&self, id: &str) -> Result<WebhookEndpoint> {
        self.store
            .get_endpoint(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("endpoint not found: {id}")))
    }

    pub async fn list(&self) -> Result<Vec<WebhookEndpoint>> {
        Ok(self.store.list_endpoints().await?)
    }

    pub async fn toggle(&self, id: &str) -> Result<WebhookEndpoint> {
        let endpoint = self
            .store
            .toggle_endpoint(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("endpoint not found: {id}")))?;
        tracing::info!(endpoint_id = %id, is_active = endpoint.is_active, "endpoint toggled");
        Ok(endpoint)
    }

    /// Replace the signing secret and return the new plaintext value.
    /// Attempts already in flight keep the signature they were sent with.
    pub async fn rotate_secret(&self, id: &str) -> Result<String> {
        let secret = generate_secret();
        if !self.store.update_endpoint_secret(id, &secret).await? {
            return Err(Error::not_found(format!("endpoint not found: {id}")));
        }
        tracing::info!(endpoint_id = %id, "endpoint secret rotated");
        Ok(secret)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        if !self.store.delete_endpoint(id).await? {
            return Err(Error::not_found(format!("endpoint not found: {id}")));
        }
        tracing::info!(endpoint_id = %id, "endpoint deleted");
        Ok(())
    }

    /// Queue a synthetic `test.ping` delivery against one endpoint,
    /// bypassing subscription matching.
    pub async fn test_fire(&self, id: &str) -> Result<WebhookDelivery> {
        let endpoint = self.get(id).await?;
        let payload = serde_json::json!({
            "message": "webhook endpoint test",
            "endpointId": endpoint.id,
            "timestamp": chrono::Utc::now(),
        });
        let delivery = WebhookDelivery::new(&endpoint.id, TEST_EVENT_TYPE, payload);
        self.store.insert_delivery(&delivery).await?;
        tracing::info!(endpoint_id = %id, delivery_id = %delivery.id, "test delivery queued");
        Ok(delivery)
    }

    /// Operator override: re-arm a failed, retrying, or exhausted chain with
    /// a fresh attempt budget.
    pub async fn retry_delivery(&self, delivery_id: &str) -> Result<WebhookDelivery> {
        let delivery = self
            .store
            .get_delivery(delivery_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("delivery not found: {delivery_id}")))?;
        match delivery.status {
            DeliveryStatus::Failed | DeliveryStatus::Retrying | DeliveryStatus::Exhausted => {}
            other => {
                return Err(Error::validation(format!(
                    "delivery in status {} cannot be retried",
                    other.as_str()
                )));
            }
        }
        let delivery = self
            .store
            .requeue_delivery(delivery_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("delivery not found: {delivery_id}")))?;
        tracing::info!(delivery_id = %delivery_id, "delivery requeued manually");
        Ok(delivery)
    }
}
