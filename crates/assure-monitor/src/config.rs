//! Monitor Configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Monitor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Control catalog (JSON)
    pub catalog_path: PathBuf,
    /// Asset snapshot (JSON array of assets)
    pub assets_path: PathBuf,
    /// Report destination; stdout when unset
    pub report_path: Option<PathBuf>,
    /// Evaluate controls concurrently
    pub concurrent: bool,
    /// Default log filter when RUST_LOG is unset
    pub log_filter: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            catalog_path: "/etc/assure/catalog.json".into(),
            assets_path: "/var/lib/assure/assets.json".into(),
            report_path: None,
            concurrent: true,
            log_filter: "info".into(),
        }
    }
}

impl MonitorConfig {
    /// Load from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Save to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: MonitorConfig =
            serde_json::from_str(r#"{ "catalog_path": "/tmp/catalog.json" }"#).unwrap();
        assert_eq!(config.catalog_path, PathBuf::from("/tmp/catalog.json"));
        assert_eq!(config.assets_path, MonitorConfig::default().assets_path);
        assert!(config.concurrent);
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("assure-monitor-{}.json", uuid::Uuid::new_v4()));
        let config = MonitorConfig {
            report_path: Some("/tmp/report.json".into()),
            concurrent: false,
            ..Default::default()
        };
        config.save(&path).unwrap();

        let loaded = MonitorConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file() {
        assert!(MonitorConfig::load("/nonexistent/assure.json").is_err());
    }
}
