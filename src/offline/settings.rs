//! Validated runtime settings for the offline controller

use crate::config::Config;
use crate::error::{PostroomError, PostroomResult};
use std::time::Duration;
use url::Url;

/// The two cache partitions the current worker version owns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionNames {
    pub shell: String,
    pub data: String,
}

impl PartitionNames {
    pub fn new(shell: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
            data: data.into(),
        }
    }

    /// Whether `name` belongs to the current version
    pub fn is_current(&self, name: &str) -> bool {
        name == self.shell || name == self.data
    }
}

/// Everything the controller needs to classify and cache requests
#[derive(Debug, Clone)]
pub struct OfflineSettings {
    pub origin: Url,
    pub api_base: Url,
    pub partitions: PartitionNames,
    pub shell_assets: Vec<Url>,
    pub static_extensions: Vec<String>,
    pub offline_page: Url,
    pub root_page: Url,
    pub sync_tag: String,
    pub skip_waiting_on_install: bool,
    pub request_timeout: Duration,
}

impl OfflineSettings {
    /// Build settings from configuration, resolving asset paths against the origin
    pub fn from_config(config: &Config) -> PostroomResult<Self> {
        let origin = parse_url("cache.origin", &config.cache.origin)?;
        let api_base = parse_url("api.base_url", &config.api.base_url)?;
        if api_base.host_str().is_none() {
            return Err(PostroomError::SettingInvalid {
                key: "api.base_url".to_string(),
                reason: "URL has no host".to_string(),
            });
        }

        let shell_assets = config
            .cache
            .shell_assets
            .iter()
            .map(|path| join_url("cache.shell_assets", &origin, path))
            .collect::<PostroomResult<Vec<_>>>()?;

        let static_extensions = config
            .cache
            .static_extensions
            .iter()
            .map(|ext| {
                let ext = ext.trim().to_ascii_lowercase();
                if ext.starts_with('.') {
                    ext
                } else {
                    format!(".{}", ext)
                }
            })
            .collect();

        Ok(Self {
            offline_page: join_url("cache.offline_page", &origin, &config.cache.offline_page)?,
            root_page: join_url("cache.root_page", &origin, &config.cache.root_page)?,
            origin,
            api_base,
            partitions: PartitionNames::new(
                config.cache.shell_partition.clone(),
                config.cache.data_partition.clone(),
            ),
            shell_assets,
            static_extensions,
            sync_tag: config.cache.sync_tag.clone(),
            skip_waiting_on_install: config.cache.skip_waiting_on_install,
            request_timeout: Duration::from_secs(config.cache.request_timeout_secs.max(1)),
        })
    }

    /// `host:port` of the API, the key requests are classified by
    pub fn api_authority(&self) -> Option<String> {
        authority(&self.api_base)
    }
}

/// `host:port` of a URL, using the scheme's default port when absent
pub fn authority(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    match url.port_or_known_default() {
        Some(port) => Some(format!("{}:{}", host.to_ascii_lowercase(), port)),
        None => Some(host.to_ascii_lowercase()),
    }
}

fn parse_url(key: &str, value: &str) -> PostroomResult<Url> {
    Url::parse(value).map_err(|e| PostroomError::SettingInvalid {
        key: key.to_string(),
        reason: format!("'{}': {}", value, e),
    })
}

fn join_url(key: &str, origin: &Url, path: &str) -> PostroomResult<Url> {
    origin.join(path).map_err(|e| PostroomError::SettingInvalid {
        key: key.to_string(),
        reason: format!("'{}': {}", path, e),
    })
}
