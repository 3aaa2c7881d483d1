//! Configuration schema for Postroom
//!
//! Configuration is stored at `~/.config/postroom/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Admin API settings
    pub api: ApiConfig,

    /// Module bootstrap settings
    pub bootstrap: BootstrapConfig,

    /// Offline cache settings
    pub cache: CacheConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Admin API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the mail admin API; its host classifies API requests
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
        }
    }
}

/// Module bootstrap configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Initialization attempts before a module is abandoned
    pub max_attempts: u32,

    /// Backoff unit; retry N waits `base_delay_ms * N`
    pub base_delay_ms: u64,

    /// Element polling interval
    pub poll_interval_ms: u64,

    /// How long to wait for an element before giving up
    pub element_timeout_ms: u64,

    /// Page modules in load order, with their dependencies
    pub modules: Vec<ModuleEntry>,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay_ms: 100,
            poll_interval_ms: 100,
            element_timeout_ms: 5000,
            modules: vec![],
        }
    }
}

/// A page module declared in config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleEntry {
    /// Module name
    pub name: String,

    /// Modules that must be initialized first
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// Offline cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Origin the admin page is served from
    pub origin: String,

    /// Versioned name of the static asset partition
    pub shell_partition: String,

    /// Versioned name of the API response partition
    pub data_partition: String,

    /// Asset paths precached at install time
    pub shell_assets: Vec<String>,

    /// Path extensions served cache-first
    pub static_extensions: Vec<String>,

    /// Page served when a navigation fails offline
    pub offline_page: String,

    /// Last-resort page for offline navigations
    pub root_page: String,

    /// Background sync tag reserved for folder refresh
    pub sync_tag: String,

    /// Promote a freshly installed worker without waiting for clients
    pub skip_waiting_on_install: bool,

    /// Override for the partition storage directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_dir: Option<PathBuf>,

    /// Network timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:8080".to_string(),
            shell_partition: "admin-shell-v1".to_string(),
            data_partition: "admin-data-v1".to_string(),
            shell_assets: vec![
                "/index.html".to_string(),
                "/admin/".to_string(),
                "/css/admin.css".to_string(),
                "/js/config.js".to_string(),
                "/js/app-init.js".to_string(),
                "/js/module-loader.js".to_string(),
            ],
            static_extensions: [".js", ".css", ".png", ".svg", ".jpg", ".woff2"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            offline_page: "/admin/".to_string(),
            root_page: "/index.html".to_string(),
            sync_tag: "refresh-mail-folders".to_string(),
            skip_waiting_on_install: true,
            storage_dir: None,
            request_timeout_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[general]"));
        assert!(toml.contains("[cache]"));
        assert!(toml.contains("admin-shell-v1"));
    }

    #[test]
    fn config_deserializes_empty() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.bootstrap.max_attempts, 10);
        assert_eq!(config.cache.data_partition, "admin-data-v1");
        assert_eq!(config.cache.root_page, "/index.html");
        assert!(config.cache.shell_assets.contains(&config.cache.root_page));
    }

    #[test]
    fn config_deserializes_partial() {
        let toml = r#"
            [cache]
            shell_partition = "admin-shell-v2"

            [[bootstrap.modules]]
            name = "folders"
            depends_on = ["navigation"]

            [[bootstrap.modules]]
            name = "navigation"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.cache.shell_partition, "admin-shell-v2");
        assert_eq!(config.cache.data_partition, "admin-data-v1"); // default preserved
        assert_eq!(config.bootstrap.modules.len(), 2);
        assert!(config.bootstrap.modules[1].depends_on.is_empty());
    }
}
