//! Postgres-backed store.
//!
//! Claiming uses `FOR UPDATE SKIP LOCKED` so concurrent workers never pick
//! up the same delivery, and outcome writes run inside one transaction so the
//! delivery row and the endpoint stats can never drift apart.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use fanout_core::types::{
    DeliveryStatus, RetryPolicy, WebhookDelivery, WebhookEndpoint, WebhookEventType,
};
use serde_json::Value as JsonValue;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};

use crate::models::{AttemptOutcome, DeliveryFilter};
use crate::WebhookStore;

const ENDPOINT_COLUMNS: &str = "id, name, description, url, events, secret, retry_policy, \
     max_retries, retry_delay_ms, timeout_ms, is_active, success_count, failure_count, \
     last_delivery_at, last_delivery_status, created_at, updated_at";

const DELIVERY_COLUMNS: &str = "id, endpoint_id, event_type, payload, status, attempt_count, \
     next_attempt_at, response_status, latency_ms, error_message, signature, \
     created_at, updated_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("failed to connect to postgres")?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("failed to run migrations")?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// Enum fields travel as text; row structs own the conversion back into the
// domain types.
#[derive(FromRow)]
struct EndpointRow {
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

impl EndpointRow {
    fn into_endpoint(self) -> Result<WebhookEndpoint> {
        let retry_policy = RetryPolicy::parse(&self.retry_policy)
            .ok_or_else(|| anyhow!("unknown retry policy in row: {}", self.retry_policy))?;
        let last_delivery_status = match self.last_delivery_status {
            Some(ref s) => Some(
                DeliveryStatus::parse(s)
                    .ok_or_else(|| anyhow!("unknown delivery status in row: {s}"))?,
            ),
            None => None,
        };
        Ok(WebhookEndpoint {
            id: self.id,
            name: self.name,
            description: self.description,
            url: self.url,
            events: self.events,
            secret: self.secret,
            retry_policy,
            max_retries: self.max_retries,
            retry_delay_ms: self.retry_delay_ms,
            timeout_ms: self.timeout_ms,
            is_active: self.is_active,
            success_count: self.success_count,
            failure_count: self.failure_count,
            last_delivery_at: self.last_delivery_at,
            last_delivery_status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct DeliveryRow {
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
    signature: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DeliveryRow {
    fn into_delivery(self) -> Result<WebhookDelivery> {
        let status = DeliveryStatus::parse(&self.status)
            .ok_or_else(|| anyhow!("unknown delivery status in row: {}", self.status))?;
        Ok(WebhookDelivery {
            id: self.id,
            endpoint_id: self.endpoint_id,
            event_type: self.event_type,
            payload: self.payload,
            status,
            attempt_count: self.attempt_count,
            next_attempt_at: self.next_attempt_at,
            response_status: self.response_status,
            latency_ms: self.latency_ms,
            error_message: self.error_message,
            signature: self.signature,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct EventTypeRow {
    name: String,
    category: String,
    description: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl EventTypeRow {
    fn into_event_type(self) -> WebhookEventType {
        WebhookEventType {
            name: self.name,
            category: self.category,
            description: self.description,
            is_active: self.is_active,
            created_at: self.created_at,
        }
    }
}

#[async_trait::async_trait]
impl WebhookStore for PgStore {
    async fn insert_endpoint(&self, endpoint: &WebhookEndpoint) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO webhook_endpoints
                (id, name, description, url, events, secret, retry_policy,
                 max_retries, retry_delay_ms, timeout_ms, is_active,
                 success_count, failure_count, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(&endpoint.id)
        .bind(&endpoint.name)
        .bind(&endpoint.description)
        .bind(&endpoint.url)
        .bind(&endpoint.events)
        .bind(&endpoint.secret)
        .bind(endpoint.retry_policy.as_str())
        .bind(endpoint.max_retries)
        .bind(endpoint.retry_delay_ms)
        .bind(endpoint.timeout_ms)
        .bind(endpoint.is_active)
        .bind(endpoint.success_count)
        .bind(endpoint.failure_count)
        .bind(endpoint.created_at)
        .bind(endpoint.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_endpoint(&self, id: &str) -> Result<Option<WebhookEndpoint>> {
        let row = sqlx::query_as::<_, EndpointRow>(&format!(
            "SELECT {ENDPOINT_COLUMNS} FROM webhook_endpoints WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(EndpointRow::into_endpoint).transpose()
    }

    async fn list_endpoints(&self) -> Result<Vec<WebhookEndpoint>> {
        let rows = sqlx::query_as::<_, EndpointRow>(&format!(
            "SELECT {ENDPOINT_COLUMNS} FROM webhook_endpoints ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(EndpointRow::into_endpoint).collect()
    }

    async fn find_endpoint_by_name_url(
        &self,
        name: &str,
        url: &str,
    ) -> Result<Option<WebhookEndpoint>> {
        let row = sqlx::query_as::<_, EndpointRow>(&format!(
            "SELECT {ENDPOINT_COLUMNS} FROM webhook_endpoints WHERE name = $1 AND url = $2"
        ))
        .bind(name)
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        row.map(EndpointRow::into_endpoint).transpose()
    }

    async fn toggle_endpoint(&self, id: &str) -> Result<Option<WebhookEndpoint>> {
        let row = sqlx::query_as::<_, EndpointRow>(&format!(
            r#"
            UPDATE webhook_endpoints
            SET is_active = NOT is_active, updated_at = now()
            WHERE id = $1
            RETURNING {ENDPOINT_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(EndpointRow::into_endpoint).transpose()
    }

    async fn update_endpoint_secret(&self, id: &str, secret: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE webhook_endpoints
            SET secret = $1, updated_at = now()
            WHERE id = $2
            "#,
        )
        .bind(secret)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_endpoint(&self, id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE webhook_deliveries
            SET status = 'exhausted',
                error_message = 'endpoint deleted',
                next_attempt_at = NULL,
                updated_at = now()
            WHERE endpoint_id = $1 AND status NOT IN ('delivered', 'exhausted')
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM webhook_endpoints WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn subscribed_endpoints(&self, event_type: &str) -> Result<Vec<WebhookEndpoint>> {
        let rows = sqlx::query_as::<_, EndpointRow>(&format!(
            r#"
            SELECT {ENDPOINT_COLUMNS}
            FROM webhook_endpoints
            WHERE is_active AND $1 = ANY(events)
            ORDER BY created_at
            "#
        ))
        .bind(event_type)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(EndpointRow::into_endpoint).collect()
    }

    async fn upsert_event_type(&self, event_type: &WebhookEventType) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO webhook_event_types (name, category, description, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (name) DO UPDATE
            SET category = EXCLUDED.category,
                description = EXCLUDED.description,
                is_active = EXCLUDED.is_active
            "#,
        )
        .bind(&event_type.name)
        .bind(&event_type.category)
        .bind(&event_type.description)
        .bind(event_type.is_active)
        .bind(event_type.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_event_type(&self, name: &str) -> Result<Option<WebhookEventType>> {
        let row = sqlx::query_as::<_, EventTypeRow>(
            r#"
            SELECT name, category, description, is_active, created_at
            FROM webhook_event_types
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(EventTypeRow::into_event_type))
    }

    async fn list_event_types(&self) -> Result<Vec<WebhookEventType>> {
        let rows = sqlx::query_as::<_, EventTypeRow>(
            r#"
            SELECT name, category, description, is_active, created_at
            FROM webhook_event_types
            ORDER BY category, name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(EventTypeRow::into_event_type).collect())
    }

    async fn toggle_event_type(&self, name: &str) -> Result<Option<WebhookEventType>> {
        let row = sqlx::query_as::<_, EventTypeRow>(
            r#"
            UPDATE webhook_event_types
            SET is_active = NOT is_active
            WHERE name = $1
            RETURNING name, category, description, is_active, created_at
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(EventTypeRow::into_event_type))
    }

    async fn insert_delivery(&self, delivery: &WebhookDelivery) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO webhook_deliveries
                (id, endpoint_id, event_type, payload, status, attempt_count,
                 next_attempt_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&delivery.id)
        .bind(&delivery.endpoint_id)
        .bind(&delivery.event_type)
        .bind(&delivery.payload)
        .bind(delivery.status.as_str())
        .bind(delivery.attempt_count)
        .bind(delivery.next_attempt_at)
        .bind(delivery.created_at)
        .bind(delivery.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_delivery(&self, id: &str) -> Result<Option<WebhookDelivery>> {
        let row = sqlx::query_as::<_, DeliveryRow>(&format!(
            "SELECT {DELIVERY_COLUMNS} FROM webhook_deliveries WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(DeliveryRow::into_delivery).transpose()
    }

    async fn list_deliveries(&self, filter: &DeliveryFilter) -> Result<Vec<WebhookDelivery>> {
        let mut builder = sqlx::QueryBuilder::new(format!(
            "SELECT {DELIVERY_COLUMNS} FROM webhook_deliveries WHERE true"
        ));
        if let Some(ref endpoint_id) = filter.endpoint_id {
            builder.push(" AND endpoint_id = ").push_bind(endpoint_id);
        }
        if let Some(status) = filter.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        builder.push(" ORDER BY created_at DESC");
        builder
            .push(" LIMIT ")
            .push_bind(filter.limit.unwrap_or(100));

        let rows = builder
            .build_query_as::<DeliveryRow>()
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(DeliveryRow::into_delivery).collect()
    }

    async fn claim_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<WebhookDelivery>> {
        let rows = sqlx::query_as::<_, DeliveryRow>(&format!(
            r#"
            UPDATE webhook_deliveries
            SET status = 'processing', updated_at = now()
            WHERE id IN (
                SELECT id FROM webhook_deliveries
                WHERE status = 'pending'
                   OR (status = 'retrying' AND (next_attempt_at IS NULL OR next_attempt_at <= $1))
                ORDER BY created_at
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {DELIVERY_COLUMNS}
            "#
        ))
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(DeliveryRow::into_delivery).collect()
    }

    async fn record_outcome(&self, outcome: &AttemptOutcome) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE webhook_deliveries
            SET status = $1,
                attempt_count = $2,
                response_status = $3,
                latency_ms = $4,
                error_message = $5,
                signature = COALESCE($6, signature),
                next_attempt_at = $7,
                updated_at = now()
            WHERE id = $8
            "#,
        )
        .bind(outcome.status.as_str())
        .bind(outcome.attempt_count)
        .bind(outcome.response_status)
        .bind(outcome.latency_ms)
        .bind(&outcome.error_message)
        .bind(&outcome.signature)
        .bind(outcome.next_attempt_at)
        .bind(&outcome.delivery_id)
        .execute(&mut *tx)
        .await?;

        let (success_bump, failure_bump) = match outcome.status {
            DeliveryStatus::Delivered => (1i64, 0i64),
            DeliveryStatus::Exhausted => (0, 1),
            _ => (0, 0),
        };

        // The endpoint may have been deleted mid-flight; the delivery update
        // above still stands on its own.
        sqlx::query(
            r#"
            UPDATE webhook_endpoints
            SET last_delivery_at = now(),
                last_delivery_status = $1,
                success_count = success_count + $2,
                failure_count = failure_count + $3,
                updated_at = now()
            WHERE id = $4
            "#,
        )
        .bind(outcome.status.as_str())
        .bind(success_bump)
        .bind(failure_bump)
        .bind(&outcome.endpoint_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn requeue_delivery(&self, id: &str) -> Result<Option<WebhookDelivery>> {
        let row = sqlx::query_as::<_, DeliveryRow>(&format!(
            r#"
            UPDATE webhook_deliveries
            SET status = 'pending',
                attempt_count = 0,
                next_attempt_at = NULL,
                error_message = NULL,
                updated_at = now()
            WHERE id = $1
            RETURNING {DELIVERY_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(DeliveryRow::into_delivery).transpose()
    }
}
