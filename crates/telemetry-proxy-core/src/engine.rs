//! The interception engine.
//!
//! An [`Interceptor`] runs the per-call protocol shared by every telemetry
//! variant:
//!
//! 1. gate the call through the [`FilterPolicy`],
//! 2. open an [`Emission`] through the configured [`Emitter`],
//! 3. tag it with each rendered argument,
//! 4. forward the call to the target exactly once,
//! 5. finish the emission with the call's [`Outcome`] and hand the result
//!    (or the original panic) back to the caller unchanged.
//!
//! Variants differ only in their [`Emitter`]: one opens trace spans, the
//! other builds structured log records. A [`Proxy`] binds an interceptor to
//! one target and is what the [`intercept!`](crate::intercept) macro
//! implements interfaces for.

use std::fmt;
use std::future::{Future, poll_fn};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::task::Poll;

use tracing::trace;

use crate::config::{ProxyOptions, REDACTED};
use crate::filter::FilterPolicy;
use crate::outcome::{Failure, FailureKind, Outcome};
use crate::render::render;
use crate::site::{CallSite, Invocation};

/// Produces one telemetry emission per instrumented call.
pub trait Emitter: Send + Sync {
    /// Short name of this emitter, for diagnostics.
    fn name(&self) -> &str;

    /// Start an emission for a call through `site`.
    ///
    /// Returning `None` means nobody is listening; the call is still
    /// forwarded but nothing is recorded.
    fn begin(&self, site: &CallSite) -> Option<Box<dyn Emission>>;
}

/// Telemetry for a single call: a span or a log record in progress.
pub trait Emission: Send {
    /// Attach one rendered argument.
    fn record_argument(&mut self, name: &str, value: String);

    /// Finalize with the call's outcome.
    fn finish(self: Box<Self>, outcome: Outcome);
}

/// Gate, render and emit around forwarded calls.
#[derive(Clone)]
pub struct Interceptor {
    policy: FilterPolicy,
    emitter: Arc<dyn Emitter>,
}

impl Interceptor {
    /// Create an interceptor over shared options and an emitter.
    pub fn new(options: Arc<ProxyOptions>, emitter: Arc<dyn Emitter>) -> Self {
        Self {
            policy: FilterPolicy::new(options),
            emitter,
        }
    }

    /// The filter policy in effect.
    pub fn policy(&self) -> &FilterPolicy {
        &self.policy
    }

    /// The emitter in effect.
    pub fn emitter(&self) -> &Arc<dyn Emitter> {
        &self.emitter
    }

    /// Run the entry, gate and tagging steps for one call.
    ///
    /// The returned [`Call`] must then be forwarded to the target.
    pub fn begin(&self, invocation: &Invocation<'_>) -> Call {
        let site = invocation.site();

        if self.policy.should_ignore(site) {
            trace!(
                method = site.method(),
                type_name = site.type_name(),
                "Call excluded by filter policy"
            );
            return Call::passthrough();
        }

        let Some(mut emission) = self.emitter.begin(site) else {
            return Call::passthrough();
        };

        let options = self.policy.options();
        for (name, value) in invocation.named_arguments() {
            let rendered = if options.redacts(&name) {
                REDACTED.to_string()
            } else {
                render(value)
            };
            emission.record_argument(&name, rendered);
        }

        Call {
            emission: Some(emission),
        }
    }
}

impl fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptor")
            .field("emitter", &self.emitter.name())
            .field("options", self.policy.options())
            .finish()
    }
}

/// A call that passed the gate and is waiting to be forwarded.
///
/// Dropping a `Call` without forwarding it finishes its emission as
/// [`FailureKind::Cancelled`].
#[must_use = "a call must be forwarded to reach the target"]
pub struct Call {
    emission: Option<Box<dyn Emission>>,
}

impl Call {
    /// A call that records nothing.
    pub fn passthrough() -> Self {
        Self { emission: None }
    }

    /// Whether telemetry is being recorded for this call.
    pub fn is_instrumented(&self) -> bool {
        self.emission.is_some()
    }

    /// Invoke the target and finish the emission.
    ///
    /// `inspect` decides whether the returned value represents a failure.
    /// A panic raised by `invoke` is recorded and then resumed with its
    /// original payload.
    pub fn forward<R>(
        mut self,
        invoke: impl FnOnce() -> R,
        inspect: impl FnOnce(&R) -> Option<String>,
    ) -> R {
        let Some(emission) = self.emission.take() else {
            return invoke();
        };

        match panic::catch_unwind(AssertUnwindSafe(invoke)) {
            Ok(value) => {
                emission.finish(outcome_of(inspect(&value)));
                value
            }
            Err(payload) => {
                emission.finish(Outcome::Failed(Failure::from_panic(payload.as_ref())));
                panic::resume_unwind(payload)
            }
        }
    }

    /// Invoke a fallible target; an `Err` is recorded and returned unchanged.
    pub fn forward_result<T, E: fmt::Display>(
        self,
        invoke: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E> {
        self.forward(invoke, |result| {
            result.as_ref().err().map(ToString::to_string)
        })
    }

    /// Await the target's future and finish the emission.
    ///
    /// A panic raised while polling is recorded and then resumed with its
    /// original payload. If the returned future is dropped before completion
    /// the emission is finished as cancelled.
    pub async fn forward_async<F: Future>(
        mut self,
        future: F,
        inspect: impl FnOnce(&F::Output) -> Option<String>,
    ) -> F::Output {
        if self.emission.is_none() {
            return future.await;
        }

        let mut future = Box::pin(future);
        let caught = poll_fn(|cx| {
            match panic::catch_unwind(AssertUnwindSafe(|| future.as_mut().poll(cx))) {
                Ok(Poll::Ready(output)) => Poll::Ready(Ok(output)),
                Ok(Poll::Pending) => Poll::Pending,
                Err(payload) => Poll::Ready(Err(payload)),
            }
        })
        .await;

        match caught {
            Ok(output) => {
                if let Some(emission) = self.emission.take() {
                    emission.finish(outcome_of(inspect(&output)));
                }
                output
            }
            Err(payload) => {
                if let Some(emission) = self.emission.take() {
                    emission.finish(Outcome::Failed(Failure::from_panic(payload.as_ref())));
                }
                panic::resume_unwind(payload)
            }
        }
    }
}

impl Drop for Call {
    fn drop(&mut self) {
        if let Some(emission) = self.emission.take() {
            emission.finish(Outcome::Failed(Failure::new(
                FailureKind::Cancelled,
                "call did not complete",
            )));
        }
    }
}

impl fmt::Debug for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call")
            .field("instrumented", &self.is_instrumented())
            .finish()
    }
}

fn outcome_of(failure: Option<String>) -> Outcome {
    match failure {
        Some(message) => Outcome::Failed(Failure::new(FailureKind::Error, message)),
        None => Outcome::Success,
    }
}

/// Converts a shared implementation into a shared interface object.
///
/// Implemented by [`intercept!`](crate::intercept) as
/// `impl<T: Iface + 'static> Interface<T> for dyn Iface`.
pub trait Interface<T> {
    /// Upcast a shared implementation.
    fn upcast(target: Arc<T>) -> Arc<Self>;
}

/// An interceptor bound to exactly one target.
///
/// `Proxy<dyn Iface>` implements `Iface` once the interface has been
/// declared with [`intercept!`](crate::intercept).
pub struct Proxy<I: ?Sized> {
    target: Arc<I>,
    interceptor: Interceptor,
}

impl<I: ?Sized> Proxy<I> {
    /// Bind an interceptor to a target.
    pub fn new(target: Arc<I>, interceptor: Interceptor) -> Self {
        Self {
            target,
            interceptor,
        }
    }

    /// The wrapped target.
    pub fn target(&self) -> &I {
        &self.target
    }

    /// The interceptor in effect.
    pub fn interceptor(&self) -> &Interceptor {
        &self.interceptor
    }

    /// Start intercepting one call.
    pub fn begin(&self, invocation: &Invocation<'_>) -> Call {
        self.interceptor.begin(invocation)
    }

    /// Expose this proxy as the interface it wraps.
    pub fn into_interface(self) -> Arc<I>
    where
        I: Interface<Proxy<I>>,
    {
        I::upcast(Arc::new(self))
    }
}

impl<I: ?Sized> Clone for Proxy<I> {
    fn clone(&self) -> Self {
        Self {
            target: Arc::clone(&self.target),
            interceptor: self.interceptor.clone(),
        }
    }
}

impl<I: ?Sized> fmt::Debug for Proxy<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("interface", &std::any::type_name::<I>())
            .field("interceptor", &self.interceptor)
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingEmitter;
    use super::*;
    use crate::render::ArgValue;

    static DO_WORK: CallSite = CallSite::new("do_work", "app::services", "Worker")
        .with_parameters(&["x"]);

    fn interceptor(options: ProxyOptions) -> (Interceptor, Arc<RecordingEmitter>) {
        let emitter = Arc::new(RecordingEmitter::default());
        let interceptor = Interceptor::new(Arc::new(options), Arc::clone(&emitter) as Arc<dyn Emitter>);
        (interceptor, emitter)
    }

    #[test]
    fn test_success_emits_once() {
        let (interceptor, emitter) = interceptor(ProxyOptions::default());
        let x = 5;
        let arguments = [ArgValue::Primitive(&x)];

        let call = interceptor.begin(&Invocation::new(&DO_WORK, &arguments));
        assert!(call.is_instrumented());
        let result = call.forward(|| x * 2, |_| None);

        assert_eq!(result, 10);
        let records = emitter.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].method, "do_work");
        assert_eq!(records[0].arguments, vec![("x".to_string(), "5".to_string())]);
        assert!(records[0].outcome.is_success());
    }

    #[test]
    fn test_filtered_call_is_forwarded_without_emission() {
        let (interceptor, emitter) = interceptor(ProxyOptions::new().ignore_type("Worker"));
        let mut invoked = 0;

        let call = interceptor.begin(&Invocation::new(&DO_WORK, &[]));
        assert!(!call.is_instrumented());
        call.forward(|| invoked += 1, |_| None);

        assert_eq!(invoked, 1);
        assert!(emitter.records().is_empty());
    }

    #[test]
    fn test_no_listener_still_forwards() {
        let emitter = Arc::new(RecordingEmitter {
            silent: true,
            ..Default::default()
        });
        let interceptor = Interceptor::new(
            ProxyOptions::shared_default(),
            Arc::clone(&emitter) as Arc<dyn Emitter>,
        );

        let call = interceptor.begin(&Invocation::new(&DO_WORK, &[]));
        assert_eq!(call.forward(|| "value", |_| None), "value");
        assert!(emitter.records().is_empty());
    }

    #[test]
    fn test_error_result_is_recorded_and_returned() {
        let (interceptor, emitter) = interceptor(ProxyOptions::default());

        let call = interceptor.begin(&Invocation::new(&DO_WORK, &[]));
        let result: Result<(), String> = call.forward_result(|| Err("boom".to_string()));

        assert_eq!(result, Err("boom".to_string()));
        let records = emitter.records();
        assert_eq!(records.len(), 1);
        let failure = records[0].outcome.failure().unwrap();
        assert_eq!(failure.kind, FailureKind::Error);
        assert_eq!(failure.message, "boom");
    }

    #[test]
    fn test_panic_is_recorded_then_resumed() {
        let (interceptor, emitter) = interceptor(ProxyOptions::default());

        let caught = panic::catch_unwind(AssertUnwindSafe(|| {
            let call = interceptor.begin(&Invocation::new(&DO_WORK, &[]));
            call.forward(|| -> i32 { panic!("boom") }, |_| None)
        }));

        let payload = caught.unwrap_err();
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"boom"));

        let records = emitter.records();
        assert_eq!(records.len(), 1);
        let failure = records[0].outcome.failure().unwrap();
        assert_eq!(failure.kind, FailureKind::Panic);
        assert_eq!(failure.message, "boom");
    }

    #[test]
    fn test_surplus_arguments_get_synthetic_names() {
        let (interceptor, emitter) = interceptor(ProxyOptions::default());
        let a = 1;
        let arguments = [ArgValue::Primitive(&a), ArgValue::Null, ArgValue::Text("three")];

        interceptor
            .begin(&Invocation::new(&DO_WORK, &arguments))
            .forward(|| (), |_| None);

        let records = emitter.records();
        assert_eq!(
            records[0].arguments,
            vec![
                ("x".to_string(), "1".to_string()),
                ("arg1".to_string(), "null".to_string()),
                ("arg2".to_string(), "three".to_string()),
            ]
        );
    }

    #[test]
    fn test_missing_arguments_produce_no_entries() {
        static SITE: CallSite = CallSite::new("m", "ns", "T").with_parameters(&["a", "b", "c"]);
        let (interceptor, emitter) = interceptor(ProxyOptions::default());
        let a = 1;

        interceptor
            .begin(&Invocation::new(&SITE, &[ArgValue::Primitive(&a)]))
            .forward(|| (), |_| None);

        assert_eq!(emitter.records()[0].arguments.len(), 1);
    }

    #[test]
    fn test_redaction() {
        static LOGIN: CallSite =
            CallSite::new("login", "app", "Auth").with_parameters(&["user", "password"]);
        let (interceptor, emitter) = interceptor(ProxyOptions::new().with_redact_secrets(true));

        let arguments = [ArgValue::Text("alice"), ArgValue::Text("hunter2")];
        interceptor
            .begin(&Invocation::new(&LOGIN, &arguments))
            .forward(|| (), |_| None);

        assert_eq!(
            emitter.records()[0].arguments,
            vec![
                ("user".to_string(), "alice".to_string()),
                ("password".to_string(), "***".to_string()),
            ]
        );
    }

    #[test]
    fn test_dropped_call_is_cancelled() {
        let (interceptor, emitter) = interceptor(ProxyOptions::default());

        drop(interceptor.begin(&Invocation::new(&DO_WORK, &[])));

        let records = emitter.records();
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].outcome.failure().map(|f| f.kind),
            Some(FailureKind::Cancelled)
        );
    }

    #[tokio::test]
    async fn test_forward_async() {
        let (interceptor, emitter) = interceptor(ProxyOptions::default());

        let call = interceptor.begin(&Invocation::new(&DO_WORK, &[]));
        let value = call.forward_async(async { 41 + 1 }, |_| None).await;

        assert_eq!(value, 42);
        assert!(emitter.records()[0].outcome.is_success());
    }

    #[tokio::test]
    async fn test_forward_async_error() {
        let (interceptor, emitter) = interceptor(ProxyOptions::default());

        let call = interceptor.begin(&Invocation::new(&DO_WORK, &[]));
        let value: Result<u8, String> = call
            .forward_async(async { Err("late boom".to_string()) }, |result| {
                result.as_ref().err().cloned()
            })
            .await;

        assert_eq!(value, Err("late boom".to_string()));
        assert_eq!(
            emitter.records()[0].outcome.failure().map(|f| f.message.clone()),
            Some("late boom".to_string())
        );
    }

    async fn explode_later() -> u8 {
        tokio::task::yield_now().await;
        panic!("async boom")
    }

    #[tokio::test]
    async fn test_forward_async_panic_is_recorded() {
        let (interceptor, emitter) = interceptor(ProxyOptions::default());

        let handle = tokio::spawn(async move {
            let call = interceptor.begin(&Invocation::new(&DO_WORK, &[]));
            call.forward_async(explode_later(), |_| None).await
        });

        let error = handle.await.unwrap_err();
        assert!(error.is_panic());
        let payload = error.into_panic();
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"async boom"));

        let records = emitter.records();
        assert_eq!(records.len(), 1);
        let failure = records[0].outcome.failure().unwrap();
        assert_eq!(failure.kind, FailureKind::Panic);
        assert_eq!(failure.message, "async boom");
    }

    #[tokio::test]
    async fn test_dropped_async_call_is_cancelled() {
        let (interceptor, emitter) = interceptor(ProxyOptions::default());

        let call = interceptor.begin(&Invocation::new(&DO_WORK, &[]));
        let pending = call.forward_async(std::future::pending::<u8>(), |_| None);
        drop(pending);

        assert_eq!(
            emitter.records()[0].outcome.failure().map(|f| f.kind),
            Some(FailureKind::Cancelled)
        );
    }
}
