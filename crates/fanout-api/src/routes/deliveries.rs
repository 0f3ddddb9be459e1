use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use fanout_core::types::{DeliveryStatus, WebhookDelivery};
use fanout_store::models::DeliveryFilter;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/deliveries", get(list_deliveries))
        .route("/v1/deliveries/{id}", get(get_delivery))
        .route("/v1/deliveries/{id}/retry", post(retry_delivery))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDeliveriesQuery {
    endpoint_id: Option<String>,
    status: Option<String>,
    limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryResponse {
    id: String,
    endpoint_id: String,
    event_type: String,
    payload: JsonValue,
    status: String,
    attempt_count: i32,
    next_attempt_at: Option<DateTime<Utc>>,
    response_status: Option<i32>,
    latency_ms: Option<i32>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<WebhookDelivery> for DeliveryResponse {
    fn from(delivery: WebhookDelivery) -> Self {
        Self {
            id: delivery.id,
            endpoint_id: delivery.endpoint_id,
            event_type: delivery.event_type,
            payload: delivery.payload,
            status: delivery.status.as_str().to_string(),
            attempt_count: delivery.attempt_count,
            next_attempt_at: delivery.next_attempt_at,
            response_status: delivery.response_status,
            latency_ms: delivery.latency_ms,
            error_message: delivery.error_message,
            created_at: delivery.created_at,
            updated_at: delivery.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeliveryListResponse {
    items: Vec<DeliveryResponse>,
}

async fn list_deliveries(
    State(state): State<AppState>,
    Query(query): Query<ListDeliveriesQuery>,
) -> ApiResult<Json<DeliveryListResponse>> {
    let status = query
        .status
        .as_deref()
        .map(|raw| {
            DeliveryStatus::parse(raw)
                .ok_or_else(|| ApiError::BadRequest(format!("unknown status: {raw}")))
        })
        .transpose()?;

    let items = state
        .store
        .list_deliveries(&DeliveryFilter {
            endpoint_id: query.endpoint_id,
            status,
            limit: query.limit,
        })
        .await?
        .into_iter()
        .map(DeliveryResponse::from)
        .collect();
    Ok(Json(DeliveryListResponse { items }))
}

async fn get_delivery(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeliveryResponse>> {
    let delivery = state
        .store
        .get_delivery(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("delivery not found: {id}")))?;
    Ok(Json(DeliveryResponse::from(delivery)))
}

async fn retry_delivery(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeliveryResponse>> {
    let delivery = state.registry.retry_delivery(&id).await?;
    Ok(Json(DeliveryResponse::from(delivery)))
}
