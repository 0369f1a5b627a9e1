//! `mentora onboard` — First-time setup.

use mentora_config::AppConfig;
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let workspace_dir = AppConfig::workspace_dir();
    let config_path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(AppConfig::default_path);

    println!("🎓 Mentora — First-Time Setup");
    println!("=============================\n");

    if !workspace_dir.exists() {
        std::fs::create_dir_all(&workspace_dir)?;
        println!("✅ Created workspace directory: {}", workspace_dir.display());
    } else {
        println!("  Workspace directory exists: {}", workspace_dir.display());
    }

    let templates_dir = workspace_dir.join("prompts");
    if !templates_dir.exists() {
        std::fs::create_dir_all(&templates_dir)?;
        println!("✅ Created prompts directory: {}", templates_dir.display());
    }

    if !config_path.exists() {
        let config = AppConfig::default();
        std::fs::write(&config_path, toml::to_string_pretty(&config)?)?;
        println!("✅ Wrote default config: {}", config_path.display());
        println!("\nNext steps:");
        println!("  1. Set llm.api_url in the config (or export MENTORA_API_URL)");
        println!("  2. Export MENTORA_API_KEY if your endpoint needs one");
        println!("  3. Export MENTORA_TOKEN_SECRET so logins survive restarts");
        println!("  4. Run `mentora serve`");
    } else {
        println!("  Config file exists: {}", config_path.display());
    }

    Ok(())
}
