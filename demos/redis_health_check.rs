//! Redis connectivity check
//!
//! Usage:
//!   cargo run --example redis_health_check --features redis
//!
//! Environment variables:
//!   REDIS_URL - Redis connection URL (default: redis://127.0.0.1:6379)

use cache_guard::{RedisStore, RedisStoreConfig};
use tracing::{error, info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let config = RedisStoreConfig::from_env();
    info!("Checking Redis at {}", config.url);

    let store = RedisStore::with_config(config).await?;
    match store.health_check().await {
        Ok(true) => info!("✓ Redis is healthy"),
        Ok(false) => error!("✗ Redis answered PING with an unexpected reply"),
        Err(e) => error!("✗ Health check failed: {}", e),
    }
    Ok(())
}
