//! Core error types for telemetry-proxy.
//!
//! Only two things can fail inside this crate: loading configuration and
//! building a proxy. Call-time failures never surface here; the engine
//! re-raises the target's own failure unchanged.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while constructing a proxy.
#[derive(Debug, Error)]
pub enum ProxyCreationError {
    /// The target implementation could not be instantiated.
    #[error("Failed to construct '{implementation}': {reason}")]
    Construction {
        /// Type name of the implementation.
        implementation: &'static str,
        /// Why construction failed.
        reason: String,
    },

    /// A constructed value could not be exposed as the requested interface.
    #[error("Cannot bind '{implementation}' as interface '{interface}'")]
    Binding {
        /// Type name of the requested interface.
        interface: &'static str,
        /// Type name of the value that was produced.
        implementation: &'static str,
    },

    /// The effective configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ProxyCreationError {
    /// Build a construction error for implementation type `T`.
    pub fn construction<T: ?Sized>(reason: impl std::fmt::Display) -> Self {
        Self::Construction {
            implementation: std::any::type_name::<T>(),
            reason: reason.to_string(),
        }
    }
}

/// Errors while binding [`ProxyOptions`](crate::ProxyOptions) from external
/// configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read '{path}': {source}")]
    Io {
        /// The file that was being read.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// TOML syntax or shape error.
    #[error("Invalid TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON shape error.
    #[error("Invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for proxy construction.
pub type ProxyResult<T> = std::result::Result<T, ProxyCreationError>;

/// Result type alias for configuration loading.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
