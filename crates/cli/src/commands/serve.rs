//! `mentora serve` — Start the HTTP API server.

use mentora_config::AppConfig;
use std::path::Path;
use tracing::info;

pub async fn run(
    config_path: Option<&Path>,
    port: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load(config_path)?;
    if let Some(port) = port {
        config.server.port = port;
    }

    info!(
        host = %config.server.host,
        port = config.server.port,
        model = %config.llm.model,
        mode = ?config.llm.mode,
        "Starting Mentora"
    );

    mentora_gateway::start(config).await
}
