//! `mentora doctor` — Diagnose configuration and database health.

use mentora_config::AppConfig;
use mentora_storage::Database;
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Mentora Doctor — System Diagnostics");
    println!("======================================\n");

    let mut issues = 0;

    let config = match AppConfig::load(config_path) {
        Ok(config) => {
            println!("  ✅ Config valid");
            if config.llm.api_key.is_some() {
                println!("  ✅ API key configured");
            } else {
                println!("  ⚠️  No API key — set MENTORA_API_KEY if your endpoint needs one");
            }
            if config.auth.token_secret.is_none() {
                println!("  ⚠️  No token secret — logins will not survive restarts");
                issues += 1;
            } else {
                println!("  ✅ Token secret configured");
            }
            Some(config)
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            issues += 1;
            None
        }
    };

    if let Some(config) = &config {
        match Database::open(&config.database.path).await {
            Ok(db) => {
                println!("  ✅ Database reachable: {}", config.database.path);
                let pruned = db.prune_tokens().await?;
                if pruned > 0 {
                    println!("  ✅ Pruned {pruned} stale token(s)");
                }
            }
            Err(e) => {
                println!("  ❌ Database unreachable: {e}");
                issues += 1;
            }
        }

        if config.chat.templates_dir.exists() {
            println!(
                "  ✅ Prompts directory exists: {}",
                config.chat.templates_dir.display()
            );
        } else {
            println!("  ⚠️  No prompts directory — run `mentora onboard`");
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
