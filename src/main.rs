use tracing_subscriber::{EnvFilter, fmt};
use tracing::info;

use yoga_app::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let config = ServerConfig::from_env()?;
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "yoga_app",
        "yoga_app starting: RUST_LOG='{}', http_port={}, jwt_ttl_ms={}",
        rust_log, config.http_port, config.jwt_expiration_ms
    );

    yoga_app::server::run_with_config(config).await
}
