//! `mentora migrate` — Apply database migrations.
//!
//! Opening the database applies the schema, so this exists for
//! deployments that want migrations as an explicit step before
//! starting the server.

use mentora_config::AppConfig;
use mentora_storage::Database;
use std::path::Path;
use tracing::info;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load(config_path)?;
    Database::open(&config.database.path).await?;
    info!(path = %config.database.path, "Migrations applied");
    println!("✅ Database ready: {}", config.database.path);
    Ok(())
}
