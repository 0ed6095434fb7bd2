//! Telemetry Proxy Observability
//!
//! This crate provides the telemetry collaborators the interception engine
//! writes to:
//!
//! - [`TraceSource`]: produces spans and fans them out to [`SpanExporter`]s
//! - [`LogSink`]: receives one structured [`LogRecord`] per call
//! - [`TraceEmitter`] and [`LogEmitter`]: the two engine variants
//!
//! # Trace Spans
//!
//! ```ignore
//! use telemetry_proxy_observe::{CollectingExporter, TraceSource};
//! use std::sync::Arc;
//!
//! let source = TraceSource::shared();
//! let collector = Arc::new(CollectingExporter::default());
//! source.add_exporter(collector.clone());
//!
//! // ... call through a proxy ...
//!
//! for span in collector.spans() {
//!     println!("{} {:?}", span.name, span.tags);
//! }
//! ```
//!
//! # Log Records
//!
//! ```ignore
//! use telemetry_proxy_observe::{CollectingLogSink, LogEmitter};
//!
//! let sink = Arc::new(CollectingLogSink::default());
//! let emitter = LogEmitter::new(sink.clone());
//! ```

pub mod emitter;
pub mod log;
pub mod trace;

// Re-export main types
pub use emitter::{LogEmitter, TraceEmitter};
pub use log::{CollectingLogSink, LogLevel, LogRecord, LogSink, TracingLogSink};
pub use trace::{
    ActiveSpan, CollectingExporter, DEFAULT_SOURCE_NAME, SpanExporter, SpanId, SpanRecord,
    SpanStatus, TraceSource, TracingExporter,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::emitter::{LogEmitter, TraceEmitter};
    pub use crate::log::{LogRecord, LogSink};
    pub use crate::trace::{SpanExporter, SpanRecord, TraceSource};
}
