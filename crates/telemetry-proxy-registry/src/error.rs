//! Error types for the service registry.

use thiserror::Error;

use telemetry_proxy::telemetry_proxy_core::ProxyCreationError;

/// Errors raised while resolving services.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Nothing was registered for the interface.
    #[error("No registration for interface '{0}'")]
    NotRegistered(&'static str),

    /// A scoped service was resolved outside a scope.
    #[error("Interface '{0}' is scoped and must be resolved from a scope")]
    ScopeRequired(&'static str),

    /// The registered factory failed.
    #[error("Failed to create '{interface}': {source}")]
    Creation {
        /// The interface being resolved.
        interface: &'static str,
        /// Why creation failed.
        #[source]
        source: ProxyCreationError,
    },
}

/// Result type for registry operations.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
