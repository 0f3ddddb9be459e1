use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use fanout_api::state::AppState;
use fanout_core::config::Settings;
use fanout_core::types::{WebhookEventType, TEST_EVENT_TYPE};
use fanout_engine::EndpointDefaults;
use fanout_store::postgres::PgStore;
use fanout_store::WebhookStore;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let settings = Settings::from_env()?;

    let store = PgStore::connect(&settings.database_url).await?;
    store.migrate().await?;
    let store: Arc<dyn WebhookStore> = Arc::new(store);

    // The reserved test event is always present and active.
    if store.get_event_type(TEST_EVENT_TYPE).await?.is_none() {
        store
            .upsert_event_type(&WebhookEventType {
                name: TEST_EVENT_TYPE.to_string(),
                category: "system".to_string(),
                description: Some("Synthetic event for endpoint testing".to_string()),
                is_active: true,
                created_at: Utc::now(),
            })
            .await?;
    }

    let state = AppState::new(store, EndpointDefaults::from(&settings));
    let app = fanout_api::app(state);

    let addr: SocketAddr = settings.api_bind.parse()?;
    info!(%addr, "starting api");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
