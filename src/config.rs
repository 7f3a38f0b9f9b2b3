//! Configuration file for the hidlink binary

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use hidlink_session::{HidApiConfig, SessionConfig, WatcherConfig};

/// Top-level config, one TOML table per concern
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HidlinkConfig {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub hidapi: HidApiConfig,
    #[serde(default)]
    pub watcher: WatcherConfig,
}

impl HidlinkConfig {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hidlink")
            .join("config.toml")
    }

    /// Load config from a file, or return default if not found
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: HidlinkConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to a file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("hidlink-test-missing/config.toml");
        let config = HidlinkConfig::load(&path).unwrap();
        assert_eq!(config, HidlinkConfig::default());
    }

    #[test]
    fn test_partial_tables() {
        let config: HidlinkConfig = toml::from_str(
            r#"
            [session]
            blocking = false

            [watcher]
            poll_interval_ms = 1000
            "#,
        )
        .unwrap();
        assert!(!config.session.blocking);
        assert_eq!(config.session.wait_timeout_ms, 1000);
        assert_eq!(config.watcher.poll_interval_ms, 1000);
        assert_eq!(config.hidapi, HidApiConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = std::env::temp_dir().join(format!("hidlink-test-{}", std::process::id()));
        let path = dir.join("config.toml");
        let mut config = HidlinkConfig::default();
        config.hidapi.input_report_length = 32;

        config.save(&path).unwrap();
        assert_eq!(HidlinkConfig::load(&path).unwrap(), config);
        let _ = std::fs::remove_dir_all(dir);
    }
}
