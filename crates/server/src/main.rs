//! Cell arena server.

use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Cell arena server v{}", env!("CARGO_PKG_VERSION"));

    let config = server::Config::load()?;
    info!("Loaded configuration");
    info!("  Port: {}", config.server.port);
    info!("  Border: {}x{}", config.border.width, config.border.height);
    info!("  Tick: {}ms", config.server.tick_interval_ms);
    info!("  Deposit required: {}", config.economy.require_deposit);

    server::run(config).await
}
