//! Trace spans produced by the trace engine.
//!
//! A [`TraceSource`] hands out [`ActiveSpan`]s while at least one
//! [`SpanExporter`] is attached. Finished spans are exported as
//! [`SpanRecord`]s; exporting is fire-and-forget.

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant, SystemTime};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use telemetry_proxy_core::{FailureKind, Outcome};

/// Fallback source name when the executable name is unavailable.
pub const DEFAULT_SOURCE_NAME: &str = "telemetry-proxy";

/// Unique identifier for a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpanId(Uuid);

impl SpanId {
    /// Create a new random span ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SpanId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Final status of a span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum SpanStatus {
    /// Ended without a recorded outcome.
    Unset,
    /// The call succeeded.
    Ok,
    /// The call failed.
    Error {
        /// Failure category.
        kind: FailureKind,
        /// Failure detail.
        message: String,
    },
}

impl SpanStatus {
    /// Check if the span recorded a failure.
    pub fn is_error(&self) -> bool {
        matches!(self, SpanStatus::Error { .. })
    }
}

impl From<&Outcome> for SpanStatus {
    fn from(outcome: &Outcome) -> Self {
        match outcome {
            Outcome::Success => SpanStatus::Ok,
            Outcome::Failed(failure) => SpanStatus::Error {
                kind: failure.kind,
                message: failure.message.clone(),
            },
        }
    }
}

/// A finished span.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpanRecord {
    /// Span identifier.
    pub id: SpanId,
    /// Name of the source that produced the span.
    pub source: String,
    /// Span name: the intercepted method.
    pub name: String,
    /// Wall-clock start time.
    pub started_at: SystemTime,
    /// Time between start and finish.
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Tags in the order they were set.
    pub tags: Vec<(String, String)>,
    /// Final status.
    pub status: SpanStatus,
}

impl SpanRecord {
    /// Look up a tag value by key.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Receives finished spans.
pub trait SpanExporter: Send + Sync {
    /// Called once per finished span.
    fn export(&self, span: &SpanRecord);
}

/// A span in progress.
///
/// Dropping an unfinished span exports it with [`SpanStatus::Unset`].
pub struct ActiveSpan {
    record: Option<SpanRecord>,
    started: Instant,
    exporters: Vec<Arc<dyn SpanExporter>>,
}

impl ActiveSpan {
    /// Span identifier.
    pub fn id(&self) -> Option<SpanId> {
        self.record.as_ref().map(|record| record.id)
    }

    /// Set a tag. Setting an existing key replaces its value.
    pub fn set_tag(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let Some(record) = self.record.as_mut() else {
            return;
        };
        let key = key.into();
        let value = value.into();
        match record.tags.iter_mut().find(|(name, _)| *name == key) {
            Some(existing) => existing.1 = value,
            None => record.tags.push((key, value)),
        }
    }

    /// Finish the span and export it.
    pub fn finish(mut self, status: SpanStatus) {
        self.export(status);
    }

    fn export(&mut self, status: SpanStatus) {
        let Some(mut record) = self.record.take() else {
            return;
        };
        record.duration = self.started.elapsed();
        record.status = status;
        for exporter in &self.exporters {
            exporter.export(&record);
        }
    }
}

impl Drop for ActiveSpan {
    fn drop(&mut self) {
        self.export(SpanStatus::Unset);
    }
}

impl fmt::Debug for ActiveSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveSpan")
            .field("record", &self.record)
            .field("exporter_count", &self.exporters.len())
            .finish()
    }
}

/// Named producer of spans.
pub struct TraceSource {
    name: String,
    exporters: RwLock<Vec<Arc<dyn SpanExporter>>>,
}

impl TraceSource {
    /// Create a source with no exporters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            exporters: RwLock::new(Vec::new()),
        }
    }

    /// Process-wide default source, named after the running executable.
    pub fn shared() -> Arc<TraceSource> {
        static SHARED: OnceLock<Arc<TraceSource>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| Arc::new(TraceSource::new(default_source_name()))))
    }

    /// Source name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attach an exporter.
    pub fn add_exporter(&self, exporter: Arc<dyn SpanExporter>) {
        self.exporters.write().push(exporter);
        info!(source = %self.name, "Span exporter attached");
    }

    /// Detach all exporters.
    pub fn clear_exporters(&self) {
        self.exporters.write().clear();
    }

    /// Get exporter count.
    pub fn exporter_count(&self) -> usize {
        self.exporters.read().len()
    }

    /// Check if anything would receive a span.
    pub fn has_listeners(&self) -> bool {
        !self.exporters.read().is_empty()
    }

    /// Start a span, or `None` when nothing is listening.
    pub fn start_span(&self, name: impl Into<String>) -> Option<ActiveSpan> {
        let exporters = self.exporters.read().clone();
        if exporters.is_empty() {
            return None;
        }
        Some(ActiveSpan {
            record: Some(SpanRecord {
                id: SpanId::new(),
                source: self.name.clone(),
                name: name.into(),
                started_at: SystemTime::now(),
                duration: Duration::ZERO,
                tags: Vec::new(),
                status: SpanStatus::Unset,
            }),
            started: Instant::now(),
            exporters,
        })
    }
}

impl fmt::Debug for TraceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceSource")
            .field("name", &self.name)
            .field("exporter_count", &self.exporter_count())
            .finish()
    }
}

fn default_source_name() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|path| path.file_stem().map(|stem| stem.to_string_lossy().into_owned()))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_SOURCE_NAME.to_string())
}

/// An exporter that keeps spans in memory for later inspection.
pub struct CollectingExporter {
    spans: RwLock<Vec<SpanRecord>>,
    max_spans: usize,
}

impl CollectingExporter {
    /// Create an exporter keeping at most `max_spans` spans.
    pub fn new(max_spans: usize) -> Self {
        Self {
            spans: RwLock::new(Vec::new()),
            max_spans,
        }
    }

    /// Get collected spans.
    pub fn spans(&self) -> Vec<SpanRecord> {
        self.spans.read().clone()
    }

    /// Get collected spans with the given name.
    pub fn spans_named(&self, name: &str) -> Vec<SpanRecord> {
        self.spans
            .read()
            .iter()
            .filter(|span| span.name == name)
            .cloned()
            .collect()
    }

    /// Clear collected spans.
    pub fn clear(&self) {
        self.spans.write().clear();
    }

    /// Get span count.
    pub fn len(&self) -> usize {
        self.spans.read().len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.spans.read().is_empty()
    }
}

impl Default for CollectingExporter {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl SpanExporter for CollectingExporter {
    fn export(&self, span: &SpanRecord) {
        let mut spans = self.spans.write();
        if spans.len() < self.max_spans {
            spans.push(span.clone());
        }
    }
}

/// An exporter that writes spans as `tracing` events.
#[derive(Debug, Default)]
pub struct TracingExporter;

impl TracingExporter {
    /// Create a new tracing exporter.
    pub fn new() -> Self {
        Self
    }
}

impl SpanExporter for TracingExporter {
    fn export(&self, span: &SpanRecord) {
        let tags = span
            .tags
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(", ");

        match &span.status {
            SpanStatus::Error { kind, message } => {
                tracing::warn!(
                    span_id = %span.id,
                    source = %span.source,
                    name = %span.name,
                    duration_us = span.duration.as_micros(),
                    tags = %tags,
                    kind = %kind,
                    error = %message,
                    "Span failed"
                );
            }
            status => {
                tracing::info!(
                    span_id = %span.id,
                    source = %span.source,
                    name = %span.name,
                    duration_us = span.duration.as_micros(),
                    tags = %tags,
                    status = ?status,
                    "Span finished"
                );
            }
        }
    }
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        u64::try_from(duration.as_nanos())
            .unwrap_or(u64::MAX)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let nanos = u64::deserialize(deserializer)?;
        Ok(Duration::from_nanos(nanos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use telemetry_proxy_core::Failure;

    fn source_with_collector() -> (TraceSource, Arc<CollectingExporter>) {
        let source = TraceSource::new("test");
        let collector = Arc::new(CollectingExporter::new(100));
        source.add_exporter(Arc::clone(&collector) as Arc<dyn SpanExporter>);
        (source, collector)
    }

    #[test]
    fn test_no_listeners_no_span() {
        let source = TraceSource::new("test");
        assert!(!source.has_listeners());
        assert!(source.start_span("do_work").is_none());
    }

    #[test]
    fn test_span_finish_exports_once() {
        let (source, collector) = source_with_collector();

        let mut span = source.start_span("do_work").unwrap();
        span.set_tag("x", "5");
        span.finish(SpanStatus::Ok);

        let spans = collector.spans();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name, "do_work");
        assert_eq!(spans[0].source, "test");
        assert_eq!(spans[0].tag("x"), Some("5"));
        assert_eq!(spans[0].status, SpanStatus::Ok);
    }

    #[test]
    fn test_dropped_span_is_unset() {
        let (source, collector) = source_with_collector();

        drop(source.start_span("abandoned"));

        assert_eq!(collector.len(), 1);
        assert_eq!(collector.spans()[0].status, SpanStatus::Unset);
    }

    #[test]
    fn test_set_tag_replaces() {
        let (source, collector) = source_with_collector();

        let mut span = source.start_span("m").unwrap();
        span.set_tag("a", "1");
        span.set_tag("a", "2");
        span.finish(SpanStatus::Ok);

        assert_eq!(collector.spans()[0].tags, vec![("a".to_string(), "2".to_string())]);
    }

    #[test]
    fn test_status_from_outcome() {
        assert_eq!(SpanStatus::from(&Outcome::Success), SpanStatus::Ok);
        let failed = Outcome::Failed(Failure::new(FailureKind::Panic, "boom"));
        let status = SpanStatus::from(&failed);
        assert!(status.is_error());
        assert_eq!(
            status,
            SpanStatus::Error {
                kind: FailureKind::Panic,
                message: "boom".to_string()
            }
        );
    }

    #[test]
    fn test_collecting_exporter_max_spans() {
        let source = TraceSource::new("test");
        let collector = Arc::new(CollectingExporter::new(2));
        source.add_exporter(Arc::clone(&collector) as Arc<dyn SpanExporter>);

        for i in 0..5 {
            source.start_span(format!("span_{i}")).unwrap().finish(SpanStatus::Ok);
        }

        assert_eq!(collector.len(), 2);
    }

    #[test]
    fn test_spans_named() {
        let (source, collector) = source_with_collector();
        source.start_span("summary").unwrap().finish(SpanStatus::Ok);
        source.start_span("forecast").unwrap().finish(SpanStatus::Ok);
        source.start_span("summary").unwrap().finish(SpanStatus::Unset);

        assert_eq!(collector.spans_named("summary").len(), 2);
        assert_eq!(collector.spans_named("forecast")[0].status, SpanStatus::Ok);
        assert!(collector.spans_named("connect").is_empty());
    }

    #[test]
    fn test_clear_exporters_stops_spans() {
        let (source, collector) = source_with_collector();
        source.clear_exporters();

        assert_eq!(source.exporter_count(), 0);
        assert!(source.start_span("m").is_none());
        assert!(collector.is_empty());
    }

    #[test]
    fn test_multiple_exporters() {
        let (source, first) = source_with_collector();
        let second = Arc::new(CollectingExporter::default());
        source.add_exporter(Arc::clone(&second) as Arc<dyn SpanExporter>);
        source.add_exporter(Arc::new(TracingExporter::new()));

        source.start_span("m").unwrap().finish(SpanStatus::Ok);

        assert_eq!(source.exporter_count(), 3);
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn test_span_record_json() {
        let (source, collector) = source_with_collector();
        let mut span = source.start_span("m").unwrap();
        span.set_tag("k", "v");
        span.finish(SpanStatus::Error {
            kind: FailureKind::Error,
            message: "boom".to_string(),
        });

        let json = collector.spans()[0].to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["name"], "m");
        assert_eq!(value["status"]["code"], "error");
        assert_eq!(value["status"]["message"], "boom");
        assert_eq!(value["tags"][0][1], "v");
    }

    #[test]
    fn test_shared_source_is_reused() {
        let first = TraceSource::shared();
        let second = TraceSource::shared();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(!first.name().is_empty());
    }
}
