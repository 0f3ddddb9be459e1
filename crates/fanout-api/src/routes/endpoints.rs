use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use fanout_core::secret::mask_secret;
use fanout_core::types::{RetryPolicy, WebhookEndpoint};
use fanout_engine::NewEndpoint;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ApiError, ApiResult},
    routes::deliveries::DeliveryResponse,
    state::AppState,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/endpoints", post(create_endpoint).get(list_endpoints))
        .route("/v1/endpoints/{id}", get(get_endpoint).delete(delete_endpoint))
        .route("/v1/endpoints/{id}/toggle", post(toggle_endpoint))
        .route("/v1/endpoints/{id}/rotate-secret", post(rotate_secret))
        .route("/v1/endpoints/{id}/test", post(test_endpoint))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateEndpointRequest {
    name: String,
    description: Option<String>,
    url: String,
    events: Vec<String>,
    retry_policy: Option<String>,
    max_retries: Option<i32>,
    retry_delay_ms: Option<i64>,
    timeout_ms: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointResponse {
    id: String,
    name: String,
    description: Option<String>,
    url: String,
    events: Vec<String>,
    secret: String,
    retry_policy: String,
    max_retries: i32,
    retry_delay_ms: i64,
    timeout_ms: i64,
    is_active: bool,
    success_count: i64,
    failure_count: i64,
    last_delivery_at: Option<DateTime<Utc>>,
    last_delivery_status: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl EndpointResponse {
    /// Masked form, used everywhere except the create response.
    fn masked(endpoint: WebhookEndpoint) -> Self {
        let mut response = Self::with_secret(endpoint);
        response.secret = mask_secret(&response.secret);
        response
    }

    fn with_secret(endpoint: WebhookEndpoint) -> Self {
        Self {
            id: endpoint.id,
            name: endpoint.name,
            description: endpoint.description,
            url: endpoint.url,
            events: endpoint.events,
            secret: endpoint.secret,
            retry_policy: endpoint.retry_policy.as_str().to_string(),
            max_retries: endpoint.max_retries,
            retry_delay_ms: endpoint.retry_delay_ms,
            timeout_ms: endpoint.timeout_ms,
            is_active: endpoint.is_active,
            success_count: endpoint.success_count,
            failure_count: endpoint.failure_count,
            last_delivery_at: endpoint.last_delivery_at,
            last_delivery_status: endpoint
                .last_delivery_status
                .map(|s| s.as_str().to_string()),
            created_at: endpoint.created_at,
            updated_at: endpoint.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EndpointListResponse {
    items: Vec<EndpointResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RotateSecretResponse {
    id: String,
    secret: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteEndpointResponse {
    id: String,
    deleted: bool,
}

async fn create_endpoint(
    State(state): State<AppState>,
    Json(payload): Json<CreateEndpointRequest>,
) -> ApiResult<(StatusCode, Json<EndpointResponse>)> {
    let retry_policy = payload
        .retry_policy
        .as_deref()
        .map(|raw| {
            RetryPolicy::parse(raw)
                .ok_or_else(|| ApiError::BadRequest(format!("unknown retry policy: {raw}")))
        })
        .transpose()?;

    let endpoint = state
        .registry
        .create(NewEndpoint {
            name: payload.name,
            description: payload.description,
            url: payload.url,
            events: payload.events,
            retry_policy,
            max_retries: payload.max_retries,
            retry_delay_ms: payload.retry_delay_ms,
            timeout_ms: payload.timeout_ms,
        })
        .await?;

    // The only response that carries the plaintext secret.
    Ok((StatusCode::CREATED, Json(EndpointResponse::with_secret(endpoint))))
}

async fn list_endpoints(State(state): State<AppState>) -> ApiResult<Json<EndpointListResponse>> {
    let items = state
        .registry
        .list()
        .await?
        .into_iter()
        .map(EndpointResponse::masked)
        .collect();
    Ok(Json(EndpointListResponse { items }))
}

async fn get_endpoint(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<EndpointResponse>> {
    let endpoint = state.registry.get(&id).await?;
    Ok(Json(EndpointResponse::masked(endpoint)))
}

async fn toggle_endpoint(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<EndpointResponse>> {
    let endpoint = state.registry.toggle(&id).await?;
    Ok(Json(EndpointResponse::masked(endpoint)))
}

async fn rotate_secret(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<RotateSecretResponse>> {
    let secret = state.registry.rotate_secret(&id).await?;
    Ok(Json(RotateSecretResponse { id, secret }))
}

async fn test_endpoint(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<DeliveryResponse>)> {
    let delivery = state.registry.test_fire(&id).await?;
    Ok((StatusCode::ACCEPTED, Json(DeliveryResponse::from(delivery))))
}

async fn delete_endpoint(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteEndpointResponse>> {
    state.registry.delete(&id).await?;
    Ok(Json(DeleteEndpointResponse { id, deleted: true }))
}
