//! Application configuration management.
//!
//! This module handles loading and saving the configuration shared by the
//! cache and sync subsystems: the cache version tag, the remote store base
//! URL, the learner identity, and the sync interval.
//!
//! Configuration is stored at `~/.config/lectern/config.json`.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "lectern";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Default minutes between periodic sync attempts
const DEFAULT_SYNC_INTERVAL_MINUTES: u64 = 15;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Version tag embedded in the active cache generation name
    pub cache_version: String,
    /// Base URL of the remote progress store
    pub remote_base_url: Option<String>,
    /// Identity of the signed-in learner, if any
    pub learner_id: Option<String>,
    /// Minutes between periodic sync attempts
    pub sync_interval_minutes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_version: "v1".to_string(),
            remote_base_url: None,
            learner_id: None,
            sync_interval_minutes: DEFAULT_SYNC_INTERVAL_MINUTES,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Name of the cache generation for the configured version,
    /// e.g. `app-cache-v1`.
    pub fn generation_id(&self) -> String {
        format!("app-cache-{}", self.cache_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_generation_id() {
        let config = Config::default();
        assert_eq!(config.generation_id(), "app-cache-v1");
    }

    #[test]
    fn test_generation_id_tracks_version() {
        let config = Config {
            cache_version: "2026-08".to_string(),
            ..Default::default()
        };
        assert_eq!(config.generation_id(), "app-cache-2026-08");
    }
}
