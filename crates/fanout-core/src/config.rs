use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database_url: String,
    pub fanout_env: String,
    pub api_bind: String,
    pub worker_concurrency: usize,
    pub poll_interval_ms: u64,
    pub default_timeout_ms: i64,
    pub default_max_retries: i32,
    pub default_retry_delay_ms: i64,
}

impl Settings {
    pub fn from_env() -> Result<Self, std::env::VarError> {
        let database_url =
            std::env::var("DATABASE_URL").or_else(|_| std::env::var("FANOUT_DATABASE_URL"))?;
        let fanout_env = std::env::var("FANOUT_ENV").unwrap_or_else(|_| "dev".to_string());
        let api_bind =
            std::env::var("FANOUT_API_BIND").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let worker_concurrency = std::env::var("FANOUT_WORKER_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(4);
        let poll_interval_ms = std::env::var("FANOUT_POLL_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(250);
        let default_timeout_ms = std::env::var("FANOUT_DEFAULT_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30_000);
        let default_max_retries = std::env::var("FANOUT_DEFAULT_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);
        let default_retry_delay_ms = std::env::var("FANOUT_DEFAULT_RETRY_DELAY_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1_000);

        Ok(Self {
            database_url,
            fanout_env,
            api_bind,
            worker_concurrency,
            poll_interval_ms,
            default_timeout_ms,
            default_max_retries,
            default_retry_delay_ms,
        })
    }
}
