//! `treeprice config` — Print the effective configuration.

use std::path::Path;

use treeprice_config::AppConfig;

pub fn show(config: &AppConfig, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        println!("# Loaded from {}", path.display());
    } else {
        println!("# No config file at {} — showing defaults", path.display());
    }
    println!("{}", toml::to_string_pretty(config)?.trim_end());
    Ok(())
}
