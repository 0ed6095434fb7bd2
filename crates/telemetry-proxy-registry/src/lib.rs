//! Telemetry Proxy Service Registry
//!
//! This crate registers implementations under their interfaces so that every
//! resolved service is a telemetry proxy. Three lifetimes are supported:
//!
//! - [`Lifetime::Singleton`]: one instance per registry
//! - [`Lifetime::Scoped`]: one instance per [`Scope`]
//! - [`Lifetime::Transient`]: a new instance on every resolution
//!
//! # Usage
//!
//! ```ignore
//! use telemetry_proxy_registry::ServiceRegistry;
//!
//! let registry = ServiceRegistry::new(ProxyFactory::trace());
//! registry
//!     .register_scoped::<dyn Weather, WeatherService>()
//!     .register_singleton::<dyn Clock, SystemClock>();
//!
//! let scope = registry.scope();
//! let weather = scope.resolve::<dyn Weather>()?;
//! ```

pub mod error;
pub mod registry;

pub use error::{RegistryError, RegistryResult};
pub use registry::{Lifetime, Scope, ServiceRegistry};
