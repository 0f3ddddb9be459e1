//! The HTTP leg of a delivery attempt: envelope, signature, POST.

use std::time::{Duration, Instant};

use fanout_core::sign::{
    sign_payload, DELIVERY_ID_HEADER, EVENT_TYPE_HEADER, SIGNATURE_HEADER,
};
use fanout_core::types::{EventEnvelope, WebhookDelivery, WebhookEndpoint};

/// What one POST produced. A non-2xx response, a timeout, and a connection
/// failure all land here as failures rather than as errors; the worker
/// decides what happens next.
#[derive(Debug)]
pub struct SendOutcome {
    pub response_status: Option<i32>,
    pub latency_ms: i32,
    pub signature: Option<String>,
    pub error: Option<String>,
}

impl SendOutcome {
    pub fn is_success(&self) -> bool {
        self.response_status
            .map(|code| (200..300).contains(&code))
            .unwrap_or(false)
    }
}

#[derive(Clone)]
pub struct Sender {
    client: reqwest::Client,
}

impl Default for Sender {
    fn default() -> Self {
        Self::new()
    }
}

impl Sender {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// POST one attempt. The signature covers the exact bytes sent, and the
    /// secret is read from the endpoint snapshot taken for this attempt, so
    /// a rotation changes the signature of the next attempt only.
    pub async fn send(&self, endpoint: &WebhookEndpoint, delivery: &WebhookDelivery) -> SendOutcome {
        let envelope = EventEnvelope::for_delivery(delivery);
        let body = match serde_json::to_vec(&envelope) {
            Ok(body) => body,
            Err(err) => {
                return SendOutcome {
                    response_status: None,
                    latency_ms: 0,
                    signature: None,
                    error: Some(format!("failed to encode envelope: {err}")),
                };
            }
        };
        let signature = sign_payload(&endpoint.secret, &body);

        let started = Instant::now();
        let response = self
            .client
            .post(&endpoint.url)
            .header("Content-Type", "application/json")
            .header(SIGNATURE_HEADER, &signature)
            .header(DELIVERY_ID_HEADER, &delivery.id)
            .header(EVENT_TYPE_HEADER, &delivery.event_type)
            .timeout(Duration::from_millis(endpoint.timeout_ms.max(1) as u64))
            .body(body)
            .send()
            .await;
        let latency_ms = started.elapsed().as_millis().min(i32::MAX as u128) as i32;

        match response {
            Ok(response) => {
                let status = response.status().as_u16() as i32;
                let error = if (200..300).contains(&status) {
                    None
                } else {
                    Some(format!("HTTP {status}"))
                };
                SendOutcome {
                    response_status: Some(status),
                    latency_ms,
                    signature: Some(signature),
                    error,
                }
            }
            Err(err) => {
                let error = if err.is_timeout() {
                    format!("timed out after {}ms", endpoint.timeout_ms)
                } else {
                    format!("request failed: {err}")
                };
                SendOutcome {
                    response_status: None,
                    latency_ms,
                    signature: Some(signature),
                    error: Some(error),
                }
            }
        }
    }
}
