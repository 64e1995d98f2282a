use anyhow::Context;

use keystone_api::server;
use keystone_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    keystone_observability::init();

    let config = AppConfig::from_env().context("reading configuration")?;
    tracing::debug!(?config, "configuration loaded");

    let app = keystone_api::app::build_app(&config).await?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    server::serve(listener, app, server::shutdown_signal(), config.shutdown_grace).await
}
