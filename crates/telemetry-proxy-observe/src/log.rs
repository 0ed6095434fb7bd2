//! Structured log records produced by the log engine.

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use telemetry_proxy_core::Failure;

/// Severity of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Very fine-grained detail.
    Trace,
    /// Debugging detail.
    Debug,
    /// A completed call.
    Info,
    /// Something unexpected.
    Warn,
    /// A failed call.
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// One record per intercepted call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Severity.
    pub level: LogLevel,
    /// Logger category: the declaring type name.
    pub category: String,
    /// Intercepted method.
    pub method: String,
    /// Rendered arguments, in call order.
    pub parameters: Vec<(String, String)>,
    /// The failure, for error records.
    pub error: Option<Failure>,
}

impl LogRecord {
    /// Start an informational record for a call.
    pub fn new(category: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            level: LogLevel::Info,
            category: category.into(),
            method: method.into(),
            parameters: Vec::new(),
            error: None,
        }
    }

    /// Append a rendered argument.
    pub fn push_parameter(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.parameters.push((name.into(), value.into()));
    }

    /// Turn this record into an error record carrying `failure`.
    pub fn fail(&mut self, failure: Failure) {
        self.level = LogLevel::Error;
        self.error = Some(failure);
    }

    /// Check if this is an error record.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Render the message body.
    ///
    /// ```text
    /// summary
    ///     Parameters:
    ///         index: 3
    /// ```
    ///
    /// Lines are tab-indented.
    pub fn message(&self) -> String {
        let mut message = self.method.clone();
        message.push_str("\n\tParameters:");
        for (name, value) in &self.parameters {
            message.push_str("\n\t\t");
            message.push_str(name);
            message.push_str(": ");
            message.push_str(value);
        }
        message
    }
}

/// Receives log records.
pub trait LogSink: Send + Sync {
    /// Check if records of this level are wanted.
    fn is_enabled(&self, _level: LogLevel) -> bool {
        true
    }

    /// Called once per intercepted call.
    fn log(&self, record: &LogRecord);
}

/// A sink that writes records as `tracing` events.
#[derive(Debug, Default)]
pub struct TracingLogSink;

impl TracingLogSink {
    /// Create a new tracing sink.
    pub fn new() -> Self {
        Self
    }

    /// Process-wide default sink.
    pub fn shared() -> Arc<TracingLogSink> {
        static SHARED: OnceLock<Arc<TracingLogSink>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| Arc::new(TracingLogSink::new())))
    }
}

impl LogSink for TracingLogSink {
    fn log(&self, record: &LogRecord) {
        let message = record.message();
        match (&record.error, record.level) {
            (Some(failure), _) => {
                tracing::error!(
                    category = %record.category,
                    method = %record.method,
                    error = %failure,
                    "{message}"
                );
            }
            (None, LogLevel::Trace) => {
                tracing::trace!(category = %record.category, method = %record.method, "{message}");
            }
            (None, LogLevel::Debug) => {
                tracing::debug!(category = %record.category, method = %record.method, "{message}");
            }
            (None, LogLevel::Info) => {
                tracing::info!(category = %record.category, method = %record.method, "{message}");
            }
            (None, LogLevel::Warn) => {
                tracing::warn!(category = %record.category, method = %record.method, "{message}");
            }
            (None, LogLevel::Error) => {
                tracing::error!(category = %record.category, method = %record.method, "{message}");
            }
        }
    }
}

/// A sink that collects records for later analysis.
pub struct CollectingLogSink {
    records: RwLock<Vec<(Instant, LogRecord)>>,
    max_records: usize,
    min_level: LogLevel,
}

impl CollectingLogSink {
    /// Create a sink keeping at most `max_records` records.
    pub fn new(max_records: usize) -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            max_records,
            min_level: LogLevel::Trace,
        }
    }

    /// Only accept records at or above `level`.
    pub fn with_min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Get collected records.
    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .read()
            .iter()
            .map(|(_, record)| record.clone())
            .collect()
    }

    /// Get collected records with the time they arrived.
    pub fn timed_records(&self) -> Vec<(Instant, LogRecord)> {
        self.records.read().clone()
    }

    /// Clear collected records.
    pub fn clear(&self) {
        self.records.write().clear();
    }

    /// Get record count.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl Default for CollectingLogSink {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl LogSink for CollectingLogSink {
    fn is_enabled(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }

    fn log(&self, record: &LogRecord) {
        if !self.is_enabled(record.level) {
            return;
        }
        let mut records = self.records.write();
        if records.len() < self.max_records {
            records.push((Instant::now(), record.clone()));
        }
    }
}
