//! Config command handlers.

use anyhow::{Context, Result};
use palaver_core::config::{paths, Config};

pub fn path() -> Result<()> {
    println!("{}", paths::config_path().display());
    Ok(())
}

pub fn init(config: &Config) -> Result<()> {
    let path = paths::config_path();
    if path.exists() {
        println!("Config already exists at {}", path.display());
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("create config directory")?;
    }
    let contents = toml::to_string_pretty(config).context("serialize config")?;
    std::fs::write(&path, contents)
        .with_context(|| format!("write config to {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}
