//! # Telemetry Proxy - Transparent Call Instrumentation
//!
//! Telemetry Proxy wraps any service behind its interface and emits a trace
//! span or a structured log record for every call, without the service
//! author writing instrumentation code.
//!
//! ## Features
//!
//! - **Transparent**: results, `Err` values and panics reach the caller unchanged
//! - **Declarative**: one [`intercept!`] block per interface
//! - **Filterable**: skip namespaces, types or private members
//! - **Substitutable**: bring your own span exporter, log sink or emitter
//!
//! ## Quick Start
//!
//! ```ignore
//! use telemetry_proxy::prelude::*;
//!
//! pub trait Weather: Send + Sync {
//!     fn summary(&self, index: usize) -> Option<String>;
//! }
//!
//! intercept! {
//!     impl Weather {
//!         fn summary(&self, index: usize) -> Option<String>;
//!     }
//! }
//!
//! #[derive(Default)]
//! struct WeatherService;
//! impl Weather for WeatherService { /* ... */ }
//!
//! let factory = ProxyFactory::builder(EngineKind::Trace)
//!     .with_options(ProxyOptions::new().ignore_namespace("app::health"))
//!     .build();
//!
//! let weather: Arc<dyn Weather> = factory.create::<dyn Weather, WeatherService>()?;
//! weather.summary(3);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    Your Application                     │
//! ├─────────────────────────────────────────────────────────┤
//! │                 telemetry-proxy (facade)                │
//! │                   ┌────────────────┐                    │
//! │                   │  ProxyFactory  │                    │
//! │                   └───────┬────────┘                    │
//! │                           │                             │
//! │  ┌────────────────────────┴──┬──────────────────────┐   │
//! │  │ telemetry-proxy-core      │ telemetry-proxy-     │   │
//! │  │ (engine, filter, render)  │ observe (spans, logs)│   │
//! │  └───────────────────────────┴──────────────────────┘   │
//! └─────────────────────────────────────────────────────────┘
//! ```

use std::convert::Infallible;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use telemetry_proxy_core::{
    Emitter, Interceptor, Interface, Proxy, ProxyCreationError, ProxyOptions, ProxyResult,
};
use telemetry_proxy_observe::{LogEmitter, LogSink, TraceEmitter, TraceSource, TracingLogSink};

// Re-export from sub-crates
pub use telemetry_proxy_core;
pub use telemetry_proxy_core::intercept;
pub use telemetry_proxy_observe;

/// Which telemetry the factory's proxies emit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum EngineKind {
    /// One trace span per call.
    #[default]
    Trace,
    /// One structured log record per call.
    Log,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineKind::Trace => write!(f, "trace"),
            EngineKind::Log => write!(f, "log"),
        }
    }
}

/// Instantiates an implementation from constructor arguments.
///
/// Every `Default` type is activatable without arguments. Implement
/// `Activate<Args>` for implementations that need explicit arguments.
pub trait Activate<Args = ()>: Sized {
    /// Why activation failed.
    type Error: fmt::Display;

    /// Build an instance.
    fn activate(args: Args) -> Result<Self, Self::Error>;
}

impl<T: Default> Activate for T {
    type Error = Infallible;

    fn activate(_args: ()) -> Result<Self, Infallible> {
        Ok(T::default())
    }
}

/// Builder for configuring a [`ProxyFactory`].
pub struct ProxyFactoryBuilder {
    kind: EngineKind,
    options: Option<Arc<ProxyOptions>>,
    trace_source: Option<Arc<TraceSource>>,
    log_sink: Option<Arc<dyn LogSink>>,
    emitter: Option<Arc<dyn Emitter>>,
}

impl ProxyFactoryBuilder {
    /// Create a builder for the given engine with default collaborators.
    pub fn new(kind: EngineKind) -> Self {
        Self {
            kind,
            options: None,
            trace_source: None,
            log_sink: None,
            emitter: None,
        }
    }

    /// Use these interception options.
    pub fn with_options(self, options: ProxyOptions) -> Self {
        self.with_shared_options(Arc::new(options))
    }

    /// Use interception options shared with other factories.
    pub fn with_shared_options(mut self, options: Arc<ProxyOptions>) -> Self {
        self.options = Some(options);
        self
    }

    /// Load interception options from the `[TelemetryProxy]` table of a TOML file.
    pub fn with_config_file(self, path: impl AsRef<Path>) -> ProxyResult<Self> {
        let options = ProxyOptions::from_toml_file(path)?;
        Ok(self.with_options(options))
    }

    /// Emit spans through this source instead of the shared one.
    pub fn with_trace_source(mut self, source: Arc<TraceSource>) -> Self {
        self.trace_source = Some(source);
        self
    }

    /// Write log records to this sink instead of the shared one.
    pub fn with_log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.log_sink = Some(sink);
        self
    }

    /// Use a custom emitter. Overrides the engine kind's collaborators.
    pub fn with_emitter(mut self, emitter: Arc<dyn Emitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    /// Build the factory.
    pub fn build(self) -> ProxyFactory {
        let options = self.options.unwrap_or_else(ProxyOptions::shared_default);
        let emitter: Arc<dyn Emitter> = match (self.emitter, self.kind) {
            (Some(emitter), _) => emitter,
            (None, EngineKind::Trace) => Arc::new(TraceEmitter::new(
                self.trace_source.unwrap_or_else(TraceSource::shared),
            )),
            (None, EngineKind::Log) => Arc::new(LogEmitter::new(
                self.log_sink
                    .unwrap_or_else(|| TracingLogSink::shared() as Arc<dyn LogSink>),
            )),
        };

        info!(engine = %self.kind, emitter = emitter.name(), "Proxy factory configured");

        ProxyFactory {
            kind: self.kind,
            interceptor: Interceptor::new(options, emitter),
        }
    }
}

impl Default for ProxyFactoryBuilder {
    fn default() -> Self {
        Self::new(EngineKind::default())
    }
}

/// Creates interface-typed proxies routed through one interceptor.
///
/// Cloning a factory is cheap; clones share options and collaborators.
#[derive(Debug, Clone)]
pub struct ProxyFactory {
    kind: EngineKind,
    interceptor: Interceptor,
}

impl ProxyFactory {
    /// Create a factory builder.
    pub fn builder(kind: EngineKind) -> ProxyFactoryBuilder {
        ProxyFactoryBuilder::new(kind)
    }

    /// Trace engine with the shared options and shared trace source.
    pub fn trace() -> Self {
        ProxyFactoryBuilder::new(EngineKind::Trace).build()
    }

    /// Log engine with the shared options and shared log sink.
    pub fn logging() -> Self {
        ProxyFactoryBuilder::new(EngineKind::Log).build()
    }

    /// The engine variant.
    pub fn kind(&self) -> EngineKind {
        self.kind
    }

    /// The interceptor every proxy from this factory shares.
    pub fn interceptor(&self) -> &Interceptor {
        &self.interceptor
    }

    /// The interception options in effect.
    pub fn options(&self) -> &ProxyOptions {
        self.interceptor.policy().options()
    }

    /// Instantiate `T` with no arguments and wrap it as `I`.
    pub fn create<I, T>(&self) -> ProxyResult<Arc<I>>
    where
        I: ?Sized + Interface<T> + Interface<Proxy<I>>,
        T: Activate,
    {
        self.create_with::<I, T, ()>(())
    }

    /// Instantiate `T` from constructor arguments and wrap it as `I`.
    pub fn create_with<I, T, A>(&self, args: A) -> ProxyResult<Arc<I>>
    where
        I: ?Sized + Interface<T> + Interface<Proxy<I>>,
        T: Activate<A>,
    {
        let target = <T as Activate<A>>::activate(args).map_err(|reason| {
            let error = ProxyCreationError::construction::<T>(reason);
            warn!(error = %error, "Proxy construction failed");
            error
        })?;
        Ok(self.wrap::<I, T>(target))
    }

    /// Wrap an existing implementation as `I`.
    pub fn wrap<I, T>(&self, target: T) -> Arc<I>
    where
        I: ?Sized + Interface<T> + Interface<Proxy<I>>,
    {
        self.wrap_shared(<I as Interface<T>>::upcast(Arc::new(target)))
    }

    /// Wrap a shared implementation as `I`.
    pub fn wrap_shared<I>(&self, target: Arc<I>) -> Arc<I>
    where
        I: ?Sized + Interface<Proxy<I>>,
    {
        debug!(
            interface = std::any::type_name::<I>(),
            engine = %self.kind,
            "Wrapping target"
        );
        self.proxy(target).into_interface()
    }

    /// Bind the interceptor to a target without upcasting.
    pub fn proxy<I: ?Sized>(&self, target: Arc<I>) -> Proxy<I> {
        Proxy::new(target, self.interceptor.clone())
    }
}

impl Default for ProxyFactory {
    fn default() -> Self {
        Self::trace()
    }
}

/// Prelude module for convenient imports.
pub mod prelude {
    // Main types
    pub use crate::{Activate, EngineKind, ProxyFactory, ProxyFactoryBuilder, intercept};

    // Core types
    pub use telemetry_proxy_core::{
        Argument, Emission, Emitter, Failure, FailureKind, Interface, MatchMode, Outcome, Proxy,
        ProxyCreationError, ProxyOptions, ProxyResult, Visibility,
    };

    // Observability types
    pub use telemetry_proxy_observe::{
        CollectingExporter, CollectingLogSink, LogLevel, LogRecord, LogSink, SpanExporter,
        SpanRecord, SpanStatus, TraceSource, TracingExporter, TracingLogSink,
    };

    // Common std types
    pub use std::sync::Arc;
}
