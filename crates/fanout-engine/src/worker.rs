//! Worker pool draining the delivery queue.
//!
//! Each worker claims one due delivery at a time, runs the attempt, and
//! records the outcome. Claim exclusivity comes from the store, so adding
//! workers (or worker processes) never double-sends a delivery.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use fanout_core::retry::next_delay;
use fanout_core::types::{DeliveryStatus, WebhookDelivery};
use fanout_store::models::AttemptOutcome;
use fanout_store::WebhookStore;
use tokio::sync::watch;

use crate::sender::Sender;

#[derive(Clone)]
pub struct WorkerPool {
    store: Arc<dyn WebhookStore>,
    sender: Sender,
    concurrency: usize,
    poll_interval: Duration,
}

impl WorkerPool {
    pub fn new(store: Arc<dyn WebhookStore>, concurrency: usize, poll_interval: Duration) -> Self {
        Self {
            store,
            sender: Sender::new(),
            concurrency: concurrency.max(1),
            poll_interval,
        }
    }

    /// Run until `shutdown` flips to true. Workers finish the attempt they
    /// are on before exiting; claimed-but-unfinished work is not abandoned
    /// mid-flight.
    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        let mut handles = Vec::with_capacity(self.concurrency);
        for worker_id in 0..self.concurrency {
            let store = Arc::clone(&self.store);
            let sender = self.sender.clone();
            let poll_interval = self.poll_interval;
            let mut shutdown = shutdown.clone();
            handles.push(tokio::spawn(async move {
                tracing::debug!(worker_id, "worker started");
                loop {
                    if *shutdown.borrow() {
                        break;
                    }
                    let claimed = match store.claim_due(Utc::now(), 1).await {
                        Ok(claimed) => claimed,
                        Err(err) => {
                            tracing::error!(worker_id, error = %err, "claim failed");
                            Vec::new()
                        }
                    };
                    if claimed.is_empty() {
                        tokio::select! {
                            _ = tokio::time::sleep(poll_interval) => {}
                            _ = shutdown.changed() => {}
                        }
                        continue;
                    }
                    for delivery in claimed {
                        if let Err(err) = run_attempt(store.as_ref(), &sender, &delivery).await {
                            tracing::error!(
                                worker_id,
                                delivery_id = %delivery.id,
                                error = %err,
                                "attempt bookkeeping failed"
                            );
                        }
                    }
                }
                tracing::debug!(worker_id, "worker stopped");
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }
    }

    /// Claim and process everything currently due, once. Used by tests and
    /// embedded setups that drive the queue manually.
    pub async fn run_once(&self) -> anyhow::Result<usize> {
        let claimed = self.store.claim_due(Utc::now(), 256).await?;
        let processed = claimed.len();
        for delivery in claimed {
            run_attempt(self.store.as_ref(), &self.sender, &delivery).await?;
        }
        Ok(processed)
    }
}

/// One claimed delivery, start to finish: endpoint snapshot, optional POST,
/// outcome.
async fn run_attempt(
    store: &dyn WebhookStore,
    sender: &Sender,
    delivery: &WebhookDelivery,
) -> anyhow::Result<()> {
    // Snapshot the endpoint at attempt time so secret rotations, timeout
    // changes, and disables made between attempts take effect.
    let endpoint = match store.get_endpoint(&delivery.endpoint_id).await? {
        Some(endpoint) => endpoint,
        None => {
            tracing::warn!(delivery_id = %delivery.id, "endpoint gone, exhausting delivery");
            store
                .record_outcome(&AttemptOutcome {
                    delivery_id: delivery.id.clone(),
                    endpoint_id: delivery.endpoint_id.clone(),
                    status: DeliveryStatus::Exhausted,
                    attempt_count: delivery.attempt_count,
                    response_status: None,
                    latency_ms: None,
                    error_message: Some("endpoint deleted".to_string()),
                    signature: None,
                    next_attempt_at: None,
                })
                .await?;
            return Ok(());
        }
    };

    if !endpoint.is_active {
        tracing::info!(
            delivery_id = %delivery.id,
            endpoint_id = %endpoint.id,
            "endpoint disabled, exhausting delivery without an attempt"
        );
        store
            .record_outcome(&AttemptOutcome {
                delivery_id: delivery.id.clone(),
                endpoint_id: endpoint.id.clone(),
                status: DeliveryStatus::Exhausted,
                attempt_count: delivery.attempt_count,
                response_status: None,
                latency_ms: None,
                error_message: Some("endpoint disabled".to_string()),
                signature: None,
                next_attempt_at: None,
            })
            .await?;
        return Ok(());
    }

    let attempt = delivery.attempt_count + 1;
    let sent = sender.send(&endpoint, delivery).await;

    let outcome = if sent.is_success() {
        tracing::info!(
            delivery_id = %delivery.id,
            endpoint_id = %endpoint.id,
            attempt,
            status = sent.response_status,
            latency_ms = sent.latency_ms,
            "delivered"
        );
        AttemptOutcome {
            delivery_id: delivery.id.clone(),
            endpoint_id: endpoint.id.clone(),
            status: DeliveryStatus::Delivered,
            attempt_count: attempt,
            response_status: sent.response_status,
            latency_ms: Some(sent.latency_ms),
            error_message: None,
            signature: sent.signature,
            next_attempt_at: None,
        }
    } else {
        let delay = next_delay(
            endpoint.retry_policy,
            Duration::from_millis(endpoint.retry_delay_ms.max(0) as u64),
            endpoint.max_retries.max(0) as u32,
            attempt as u32,
        );
        let (status, next_attempt_at) = match delay {
            Some(delay) => (
                DeliveryStatus::Retrying,
                Some(Utc::now() + chrono::Duration::from_std(delay)?),
            ),
            None => (DeliveryStatus::Exhausted, None),
        };
        tracing::warn!(
            delivery_id = %delivery.id,
            endpoint_id = %endpoint.id,
            attempt,
            status = status.as_str(),
            error = sent.error.as_deref().unwrap_or("unknown"),
            "attempt failed"
        );
        AttemptOutcome {
            delivery_id: delivery.id.clone(),
            endpoint_id: endpoint.id.clone(),
            status,
            attempt_count: attempt,
            response_status: sent.response_status,
            latency_ms: Some(sent.latency_ms),
            error_message: sent.error,
            signature: sent.signature,
            next_attempt_at,
        }
    };

    store.record_outcome(&outcome).await?;
    Ok(())
}
