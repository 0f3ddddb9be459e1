//! Management API tests over a real listener.

use std::sync::Arc;

use chrono::Utc;
use fanout_api::state::AppState;
use fanout_core::types::{WebhookEventType, TEST_EVENT_TYPE};
use fanout_engine::EndpointDefaults;
use fanout_store::memory::MemoryStore;
use fanout_store::WebhookStore;
use serde_json::{json, Value};

const DEFAULTS: EndpointDefaults = EndpointDefaults {
    max_retries: 3,
    retry_delay_ms: 100,
    timeout_ms: 2_000,
};

async fn serve() -> (String, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    for name in ["order.created", "order.paid", TEST_EVENT_TYPE] {
        store
            .upsert_event_type(&WebhookEventType {
                name: name.to_string(),
                category: "test".to_string(),
                description: None,
                is_active: true,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    let trait_store: Arc<dyn WebhookStore> = store.clone();
    let app = fanout_api::app(AppState::new(trait_store, DEFAULTS));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (base, store)
}

fn endpoint_body(name: &str) -> Value {
    json!({
        "name": name,
        "url": "https://receiver.example/hook",
        "events": ["order.created"],
        "retryPolicy": "exponential",
    })
}

async fn create_endpoint(client: &reqwest::Client, base: &str, name: &str) -> Value {
    let response = client
        .post(format!("{base}/v1/endpoints"))
        .json(&endpoint_body(name))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    response.json().await.unwrap()
}

#[tokio::test]
async fn test_health_and_request_id() {
    let (base, _store) = serve().await;
    let response = reqwest::get(format!("{base}/health")).await.unwrap();
    assert_eq!(response.status(), 200);
    let request_id = response
        .headers()
        .get("X-Request-Id")
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(request_id.starts_with("req_"));
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_create_exposes_secret_once() {
    let (base, _store) = serve().await;
    let client = reqwest::Client::new();

    let created = create_endpoint(&client, &base, "billing").await;
    let id = created["id"].as_str().unwrap();
    assert!(id.starts_with("wh_"));
    let secret = created["secret"].as_str().unwrap();
    assert!(secret.starts_with("whsec_"));
    assert!(!secret.contains("****"), "create response carries the plaintext secret");
    assert_eq!(created["isActive"], true);
    assert_eq!(created["maxRetries"], 3);

    let fetched: Value = client
        .get(format!("{base}/v1/endpoints/{id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let masked = fetched["secret"].as_str().unwrap();
    assert!(masked.starts_with("whsec_****"), "reads mask the secret");
    assert!(masked.ends_with(&secret[secret.len() - 4..]));

    let listed: Value = client
        .get(format!("{base}/v1/endpoints"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed["items"].as_array().unwrap().len(), 1);
    assert!(listed["items"][0]["secret"]
        .as_str()
        .unwrap()
        .starts_with("whsec_****"));
}

#[tokio::test]
async fn test_create_validation() {
    let (base, _store) = serve().await;
    let client = reqwest::Client::new();

    let cases = [
        json!({"name": "a", "url": "ftp://x.example/h", "events": ["order.created"]}),
        json!({"name": "  ", "url": "https://x.example/h", "events": ["order.created"]}),
        json!({"name": "a", "url": "https://x.example/h", "events": ["listing.sold"]}),
        json!({"name": "a", "url": "https://x.example/h", "events": [TEST_EVENT_TYPE]}),
        json!({"name": "a", "url": "https://x.example/h", "events": ["order.created"], "retryPolicy": "cubic"}),
    ];
    for body in cases {
        let response = client
            .post(format!("{base}/v1/endpoints"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400, "expected rejection of {body}");
        let error: Value = response.json().await.unwrap();
        assert_eq!(error["error"]["code"], "invalid_request");
    }

    let empty_events = client
        .post(format!("{base}/v1/endpoints"))
        .json(&json!({"name": "unsubscribed", "url": "https://x.example/h", "events": []}))
        .send()
        .await
        .unwrap();
    assert_eq!(empty_events.status(), 201, "empty subscription set is allowed");

    create_endpoint(&client, &base, "dup").await;
    let response = client
        .post(format!("{base}/v1/endpoints"))
        .json(&endpoint_body("dup"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400, "duplicate name and url is rejected");
}

#[tokio::test]
async fn test_toggle_rotate_and_delete() {
    let (base, _store) = serve().await;
    let client = reqwest::Client::new();
    let created = create_endpoint(&client, &base, "orders").await;
    let id = created["id"].as_str().unwrap();
    let original_secret = created["secret"].as_str().unwrap();

    let toggled: Value = client
        .post(format!("{base}/v1/endpoints/{id}/toggle"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(toggled["isActive"], false);

    let rotated: Value = client
        .post(format!("{base}/v1/endpoints/{id}/rotate-secret"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let new_secret = rotated["secret"].as_str().unwrap();
    assert!(new_secret.starts_with("whsec_"));
    assert_ne!(new_secret, original_secret);

    let missing = client
        .post(format!("{base}/v1/endpoints/wh_missing/rotate-secret"))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);

    let deleted: Value = client
        .delete(format!("{base}/v1/endpoints/{id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(deleted["deleted"], true);

    let gone = client
        .get(format!("{base}/v1/endpoints/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(gone.status(), 404);
}

#[tokio::test]
async fn test_dispatch_and_delivery_listing() {
    let (base, _store) = serve().await;
    let client = reqwest::Client::new();
    let created = create_endpoint(&client, &base, "orders").await;
    let endpoint_id = created["id"].as_str().unwrap();

    let response = client
        .post(format!("{base}/v1/dispatch"))
        .json(&json!({"eventType": "order.created", "payload": {"orderId": "ord_9"}}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 202);
    let dispatched: Value = response.json().await.unwrap();
    assert_eq!(dispatched["queued"], 1);
    let delivery_id = dispatched["deliveryIds"][0].as_str().unwrap();

    let listed: Value = client
        .get(format!(
            "{base}/v1/deliveries?endpointId={endpoint_id}&status=pending"
        ))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed["items"].as_array().unwrap().len(), 1);
    assert_eq!(listed["items"][0]["id"], delivery_id);

    let fetched: Value = client
        .get(format!("{base}/v1/deliveries/{delivery_id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["status"], "pending");
    assert_eq!(fetched["payload"]["orderId"], "ord_9");

    let bad_status = client
        .get(format!("{base}/v1/deliveries?status=bogus"))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_status.status(), 400);

    // Pending chains are owned by the worker; manual retry is rejected.
    let retry = client
        .post(format!("{base}/v1/deliveries/{delivery_id}/retry"))
        .send()
        .await
        .unwrap();
    assert_eq!(retry.status(), 400);

    let retry_missing = client
        .post(format!("{base}/v1/deliveries/del_missing/retry"))
        .send()
        .await
        .unwrap();
    assert_eq!(retry_missing.status(), 404);
}

#[tokio::test]
async fn test_endpoint_test_fire() {
    let (base, store) = serve().await;
    let client = reqwest::Client::new();
    let created = create_endpoint(&client, &base, "orders").await;
    let endpoint_id = created["id"].as_str().unwrap();

    let response = client
        .post(format!("{base}/v1/endpoints/{endpoint_id}/test"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 202);
    let delivery: Value = response.json().await.unwrap();
    assert_eq!(delivery["eventType"], TEST_EVENT_TYPE);
    assert_eq!(delivery["status"], "pending");

    let stored = store
        .get_delivery(delivery["id"].as_str().unwrap())
        .await
        .unwrap();
    assert!(stored.is_some(), "test delivery is queued for the worker");
}

#[tokio::test]
async fn test_event_type_catalog() {
    let (base, _store) = serve().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/v1/event-types"))
        .json(&json!({"name": "listing.sold", "category": "listings"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);

    let listed: Value = client
        .get(format!("{base}/v1/event-types"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let names: Vec<&str> = listed["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"listing.sold"));
    assert!(names.contains(&TEST_EVENT_TYPE));

    let toggled: Value = client
        .post(format!("{base}/v1/event-types/listing.sold/toggle"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(toggled["isActive"], false);

    let missing = client
        .post(format!("{base}/v1/event-types/nope/toggle"))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);

    let invalid = client
        .post(format!("{base}/v1/event-types"))
        .json(&json!({"name": "  ", "category": "x"}))
        .send()
        .await
        .unwrap();
    assert_eq!(invalid.status(), 400);
}
