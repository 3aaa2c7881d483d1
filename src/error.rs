//! Error types for Postroom
//!
//! All modules use `PostroomResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Postroom operations
pub type PostroomResult<T> = Result<T, PostroomError>;

/// All errors that can occur in Postroom
#[derive(Error, Debug)]
pub enum PostroomError {
    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Invalid setting {key}: {reason}")]
    SettingInvalid { key: String, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Bootstrap errors
    #[error("Dependency cycle detected: {cycle}")]
    DependencyCycle { cycle: String },

    // Offline cache errors
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Network request failed for {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("Network unavailable and no cached copy of {0}")]
    OfflineMiss(String),

    #[error("Cache storage error: {0}")]
    CacheStorage(String),

    #[error("Worker is gone: {0}")]
    WorkerGone(String),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl PostroomError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a network error for a URL
    pub fn network(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::OfflineMiss(_))
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::DependencyCycle { .. } => {
                Some("Remove one of the depends_on edges in [[bootstrap.modules]]")
            }
            Self::OfflineMiss(_) => Some("Run: postroom cache install while online"),
            Self::ConfigInvalid { .. } => Some("Run: postroom config init --force"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = PostroomError::DependencyCycle {
            cycle: "a -> b -> a".to_string(),
        };
        assert!(err.to_string().contains("a -> b -> a"));
    }

    #[test]
    fn error_hint() {
        let err = PostroomError::OfflineMiss("http://localhost/api".to_string());
        assert_eq!(err.hint(), Some("Run: postroom cache install while online"));
        assert_eq!(PostroomError::Internal("x".to_string()).hint(), None);
    }

    #[test]
    fn error_retryable() {
        assert!(PostroomError::network("http://x", "refused").is_retryable());
        assert!(!PostroomError::CacheStorage("full".to_string()).is_retryable());
    }
}
