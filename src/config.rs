use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use howlguard::SuppressorConfig;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub suppressor: SuppressorConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_block_size")]
    pub block_size: usize,
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default)]
    pub events: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            block_size: default_block_size(),
            directory: None,
            events: None,
        }
    }
}

fn default_block_size() -> usize { 160 }

/// Explicit path, else `howlguard.toml` in the working directory, else the
/// user's config directory.
pub fn find_config(explicit: Option<PathBuf>) -> Option<PathBuf> {
    if explicit.is_some() {
        return explicit;
    }

    let local = PathBuf::from("howlguard.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("howlguard").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("howlguard").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Failed to parse config: {}", path.display()))
}

fn parse_config(content: &str) -> Result<Config> {
    Ok(toml::from_str(content)?)
}
