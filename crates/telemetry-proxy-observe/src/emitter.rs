//! [`Emitter`] implementations for the two telemetry variants.

use std::sync::Arc;

use telemetry_proxy_core::{CallSite, Emission, Emitter, Outcome};

use crate::log::{LogRecord, LogSink};
use crate::trace::{ActiveSpan, SpanStatus, TraceSource};

/// Opens one span per call, named after the method.
#[derive(Debug, Clone)]
pub struct TraceEmitter {
    source: Arc<TraceSource>,
}

impl TraceEmitter {
    /// Emit spans through `source`.
    pub fn new(source: Arc<TraceSource>) -> Self {
        Self { source }
    }

    /// The span source.
    pub fn source(&self) -> &Arc<TraceSource> {
        &self.source
    }
}

impl Default for TraceEmitter {
    fn default() -> Self {
        Self::new(TraceSource::shared())
    }
}

impl Emitter for TraceEmitter {
    fn name(&self) -> &str {
        "trace"
    }

    fn begin(&self, site: &CallSite) -> Option<Box<dyn Emission>> {
        let span = self.source.start_span(site.method())?;
        Some(Box::new(SpanEmission { span }))
    }
}

struct SpanEmission {
    span: ActiveSpan,
}

impl Emission for SpanEmission {
    fn record_argument(&mut self, name: &str, value: String) {
        self.span.set_tag(name, value);
    }

    fn finish(self: Box<Self>, outcome: Outcome) {
        self.span.finish(SpanStatus::from(&outcome));
    }
}

/// Writes one structured record per call to a [`LogSink`].
///
/// Successful calls produce an info record; failed calls an error record with
/// the failure attached.
#[derive(Clone)]
pub struct LogEmitter {
    sink: Arc<dyn LogSink>,
}

impl LogEmitter {
    /// Emit records to `sink`.
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }

    /// The record sink.
    pub fn sink(&self) -> &Arc<dyn LogSink> {
        &self.sink
    }
}

impl Default for LogEmitter {
    fn default() -> Self {
        Self::new(crate::log::TracingLogSink::shared())
    }
}

impl std::fmt::Debug for LogEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogEmitter").finish_non_exhaustive()
    }
}

impl Emitter for LogEmitter {
    fn name(&self) -> &str {
        "log"
    }

    fn begin(&self, site: &CallSite) -> Option<Box<dyn Emission>> {
        Some(Box::new(RecordEmission {
            sink: Arc::clone(&self.sink),
            record: LogRecord::new(site.type_name(), site.method()),
        }))
    }
}

struct RecordEmission {
    sink: Arc<dyn LogSink>,
    record: LogRecord,
}

impl Emission for RecordEmission {
    fn record_argument(&mut self, name: &str, value: String) {
        self.record.push_parameter(name, value);
    }

    fn finish(self: Box<Self>, outcome: Outcome) {
        let RecordEmission { sink, mut record } = *self;
        if let Outcome::Failed(failure) = outcome {
            record.fail(failure);
        }
        sink.log(&record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{CollectingLogSink, LogLevel};
    use crate::trace::{CollectingExporter, SpanExporter};
    use telemetry_proxy_core::{Failure, FailureKind};

    static SITE: CallSite = CallSite::new("do_work", "app", "Worker");

    #[test]
    fn test_trace_emitter_without_listener() {
        let emitter = TraceEmitter::new(Arc::new(TraceSource::new("t")));
        assert!(emitter.begin(&SITE).is_none());
    }

    #[test]
    fn test_trace_emitter_span() {
        let source = Arc::new(TraceSource::new("t"));
        let collector = Arc::new(CollectingExporter::new(10));
        source.add_exporter(Arc::clone(&collector) as Arc<dyn SpanExporter>);
        let emitter = TraceEmitter::new(source);

        let mut emission = emitter.begin(&SITE).unwrap();
        emission.record_argument("x", "5".to_string());
        emission.finish(Outcome::Success);

        let spans = collector.spans();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name, "do_work");
        assert_eq!(spans[0].tag("x"), Some("5"));
        assert_eq!(spans[0].status, SpanStatus::Ok);
    }

    #[test]
    fn test_log_emitter_success() {
        let sink = Arc::new(CollectingLogSink::new(10));
        let emitter = LogEmitter::new(Arc::clone(&sink) as Arc<dyn LogSink>);

        let mut emission = emitter.begin(&SITE).unwrap();
        emission.record_argument("x", "5".to_string());
        emission.finish(Outcome::Success);

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, LogLevel::Info);
        assert_eq!(records[0].category, "Worker");
        assert_eq!(records[0].message(), "do_work\n\tParameters:\n\t\tx: 5");
    }

    #[test]
    fn test_log_emitter_failure() {
        let sink = Arc::new(CollectingLogSink::new(10));
        let emitter = LogEmitter::new(Arc::clone(&sink) as Arc<dyn LogSink>);

        let emission = emitter.begin(&SITE).unwrap();
        emission.finish(Outcome::Failed(Failure::new(FailureKind::Error, "boom")));

        let records = sink.records();
        assert_eq!(records[0].level, LogLevel::Error);
        assert_eq!(records[0].error.as_ref().map(|f| f.message.as_str()), Some("boom"));
    }
}
