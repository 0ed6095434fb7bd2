//! Call outcomes as seen by telemetry.

use std::any::Any;
use std::fmt;

use serde::{Deserialize, Serialize};

/// How a call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The target returned an `Err` value.
    Error,
    /// The target panicked.
    Panic,
    /// The call never completed, e.g. its future was dropped.
    Cancelled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Error => write!(f, "error"),
            FailureKind::Panic => write!(f, "panic"),
            FailureKind::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Failure detail recorded on an emission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// Failure category.
    pub kind: FailureKind,
    /// Rendered failure.
    pub message: String,
}

impl Failure {
    /// Create a failure.
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Failure describing a caught panic payload.
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        Self::new(FailureKind::Panic, panic_message(payload))
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Final state of an intercepted call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The target returned normally.
    Success,
    /// The target failed.
    Failed(Failure),
}

impl Outcome {
    /// Check if the call succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    /// The failure detail, if any.
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Outcome::Success => None,
            Outcome::Failed(failure) => Some(failure),
        }
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

/// Looks at a returned value and reports whether it represents a failure.
///
/// Use as `(&&&Inspect(&value)).failure()` with [`ViaDisplayError`],
/// [`ViaDebugError`] and [`ViaValue`] in scope. `Result::Err` values are
/// failures, rendered through `Display` when available and `Debug`
/// otherwise; every other value is a success.
pub struct Inspect<'a, R>(pub &'a R);

/// Route for `Result<T, E>` with `E: Display`.
pub trait ViaDisplayError {
    /// Failure text, if the value is an error.
    fn failure(&self) -> Option<String>;
}

/// Route for `Result<T, E>` with `E: Debug`.
pub trait ViaDebugError {
    /// Failure text, if the value is an error.
    fn failure(&self) -> Option<String>;
}

/// Route for any other return value.
pub trait ViaValue {
    /// Always `None`.
    fn failure(&self) -> Option<String>;
}

impl<T, E: fmt::Display> ViaDisplayError for &&Inspect<'_, Result<T, E>> {
    fn failure(&self) -> Option<String> {
        self.0.as_ref().err().map(ToString::to_string)
    }
}

impl<T, E: fmt::Debug> ViaDebugError for &Inspect<'_, Result<T, E>> {
    fn failure(&self) -> Option<String> {
        self.0.as_ref().err().map(|error| format!("{error:?}"))
    }
}

impl<R> ViaValue for Inspect<'_, R> {
    fn failure(&self) -> Option<String> {
        None
    }
}
