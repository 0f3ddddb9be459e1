use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use fanout_core::config::Settings;
use fanout_engine::WorkerPool;
use fanout_store::postgres::PgStore;
use fanout_store::WebhookStore;
use tokio::sync::watch;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let settings = Settings::from_env()?;

    let store = PgStore::connect(&settings.database_url).await?;
    store.migrate().await?;
    let store: Arc<dyn WebhookStore> = Arc::new(store);

    let pool = WorkerPool::new(
        store,
        settings.worker_concurrency,
        Duration::from_millis(settings.poll_interval_ms),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    info!(concurrency = settings.worker_concurrency, "worker starting");
    pool.run(shutdown_rx).await;
    info!("worker stopped");

    Ok(())
}
