//! `codewright init`: Write a default configuration file.

use std::path::Path;

use codewright_config::AppConfig;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"));

    if write_default(&path)? {
        println!("  Wrote default config to {}", path.display());
        println!("  Set CODEWRIGHT_API_KEY (or add api_key to the file) to get started.");
    } else {
        println!("  Config already exists at {}; leaving it untouched.", path.display());
    }
    Ok(())
}

/// Write the default config unless a file is already there.
fn write_default(path: &Path) -> std::io::Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, AppConfig::default_toml())?;
    Ok(true)
}
