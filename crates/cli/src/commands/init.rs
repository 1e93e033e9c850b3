//! Initialize .plansync.toml configuration

use anyhow::Result;
use plansync_core::config::CONFIG_FILENAME;
use plansync_core::PlansyncConfig;
use std::path::Path;

pub fn run(path: Option<&Path>) -> Result<()> {
    let target_path = path.unwrap_or_else(|| Path::new("."));
    let config_path = target_path.join(CONFIG_FILENAME);

    if config_path.exists() {
        println!("⚠️  {} already exists at {:?}", CONFIG_FILENAME, config_path);
        return Ok(());
    }

    let config = PlansyncConfig::default();
    config.save(&config_path)?;

    println!("✅ Created {} at {:?}", CONFIG_FILENAME, config_path);
    println!("\nSet [backend].url, then sign in with:");
    println!("  plansync auth --token <ACCESS_TOKEN>");

    Ok(())
}
