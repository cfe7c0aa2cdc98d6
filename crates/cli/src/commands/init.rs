//! `parley init`: write a default config file.

use std::path::Path;

use anyhow::Context;
use parley_config::AppConfig;

pub fn run(path: Option<&Path>, force: bool) -> anyhow::Result<()> {
    let config_path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"));

    if write_default(&config_path, force)? {
        println!("Created {}", config_path.display());
        println!("Next: set OPENAI_API_KEY or edit the file, then run `parley chat -m \"hello\"`.");
    } else {
        println!("Config already exists at {}", config_path.display());
        println!("Use --force to overwrite it.");
    }
    Ok(())
}

/// Returns false when the file exists and `force` is not set.
fn write_default(config_path: &Path, force: bool) -> anyhow::Result<bool> {
    if config_path.exists() && !force {
        return Ok(false);
    }
    if let Some(dir) = config_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    std::fs::write(config_path, AppConfig::default_toml())
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    Ok(true)
}
