//! Telemetry Proxy Core - Call Interception Engine
//!
//! This crate provides the engine that wraps a service behind an interface
//! and records telemetry for every call without changing the call's result.
//! It includes:
//!
//! - [`Interceptor`]: gates, renders and emits around forwarded calls
//! - [`Proxy`]: an interceptor bound to one target
//! - [`intercept!`]: implements an interface for `Proxy<dyn Interface>`
//! - [`FilterPolicy`] and [`ProxyOptions`]: which calls are instrumented
//! - [`render`](render::render): trace-safe argument rendering
//!
//! # Quick Start
//!
//! ```ignore
//! use telemetry_proxy_core::prelude::*;
//!
//! pub trait Greeter: Send + Sync {
//!     fn greet(&self, name: &str) -> String;
//! }
//!
//! telemetry_proxy_core::intercept! {
//!     impl Greeter {
//!         fn greet(&self, name: &str) -> String;
//!     }
//! }
//!
//! let interceptor = Interceptor::new(ProxyOptions::shared_default(), emitter);
//! let greeter: Arc<dyn Greeter> = Proxy::new(target, interceptor).into_interface();
//! greeter.greet("world");
//! ```
//!
//! # Guarantees
//!
//! 1. **Transparency**: the caller observes exactly what the target returns,
//!    including `Err` values and panics
//! 2. **Exactly once**: every intercepted call reaches the target once
//! 3. **Filtering**: excluded calls are forwarded without any telemetry
//! 4. **Rendering never fails**: unformattable arguments degrade to a fallback

pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
mod macros;
pub mod outcome;
pub mod render;
pub mod site;

// Re-export main types at crate root
pub use config::{MatchMode, ProxyOptions, REDACTED, SECRET_NAMES, SECTION};
pub use engine::{Call, Emission, Emitter, Interceptor, Interface, Proxy};
pub use error::{ConfigError, ConfigResult, ProxyCreationError, ProxyResult};
pub use filter::FilterPolicy;
pub use outcome::{Failure, FailureKind, Outcome};
pub use render::{ArgValue, Argument};
pub use site::{CallSite, Invocation, Visibility};

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```ignore
/// use telemetry_proxy_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{MatchMode, ProxyOptions};
    pub use crate::engine::{Emission, Emitter, Interceptor, Interface, Proxy};
    pub use crate::error::{ProxyCreationError, ProxyResult};
    pub use crate::filter::FilterPolicy;
    pub use crate::outcome::{Failure, FailureKind, Outcome};
    pub use crate::render::{ArgValue, Argument};
    pub use crate::site::{CallSite, Invocation, Visibility};
}
