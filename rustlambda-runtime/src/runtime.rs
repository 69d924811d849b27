//! The invocation loop
//!
//! One cycle is fetch, dispatch, report. Exactly one invocation is in flight
//! at a time: the response for invocation N is posted before the fetch for
//! N+1 is issued. The shutdown flag is only checked at the top of a cycle,
//! so an in-flight handler always runs to completion and its result is
//! still reported.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use rustlambda_core::RuntimeError;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};

use crate::client::RuntimeApi;
use crate::context::Context;
use crate::environment::Environment;
use crate::handler::Handler;
use crate::registry::HandlerRegistry;

const TRACE_ID_ENV: &str = "_X_AMZN_TRACE_ID";

/// How a single cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The handler succeeded and its result was posted
    Responded,
    /// The handler (or decoding) failed and the error was posted
    ReportedError,
    /// `next` could not be fetched, nothing to report to
    FetchFailed,
    /// Posting the response or error failed
    ReportFailed,
}

impl CycleOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Responded => "responded",
            Self::ReportedError => "reported_error",
            Self::FetchFailed => "fetch_failed",
            Self::ReportFailed => "report_failed",
        }
    }
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cloneable handle to the shutdown flag
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    /// Stop the loop at the next cycle boundary
    pub fn request(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

enum Dispatch {
    Single(Handler),
    Registry(HandlerRegistry),
}

impl Dispatch {
    fn resolve(&self, name: &str) -> Result<&Handler, RuntimeError> {
        match self {
            Self::Single(handler) => Ok(handler),
            Self::Registry(registry) => registry
                .get(name)
                .ok_or_else(|| RuntimeError::UnknownHandler(name.to_string())),
        }
    }
}

/// Drives invocation cycles against a [`RuntimeApi`]
///
/// The handler (or registry) is bound at construction and never changes.
pub struct Runtime {
    client: Arc<dyn RuntimeApi>,
    environment: Arc<Environment>,
    dispatch: Dispatch,
    shutdown: ShutdownHandle,
}

impl Runtime {
    /// Runtime with a single bound handler
    pub fn new(
        client: impl RuntimeApi + 'static,
        environment: Environment,
        handler: Handler,
    ) -> Self {
        Self::build(client, environment, Dispatch::Single(handler))
    }

    /// Runtime that looks up `environment.handler_name` in `registry` every cycle
    pub fn with_registry(
        client: impl RuntimeApi + 'static,
        environment: Environment,
        registry: HandlerRegistry,
    ) -> Self {
        Self::build(client, environment, Dispatch::Registry(registry))
    }

    fn build(
        client: impl RuntimeApi + 'static,
        environment: Environment,
        dispatch: Dispatch,
    ) -> Self {
        Self {
            client: Arc::new(client),
            environment: Arc::new(environment),
            dispatch,
            shutdown: ShutdownHandle::default(),
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Run cycles until shutdown is requested
    pub async fn run(self) {
        info!(
            handler = %self.environment.handler,
            function = %self.environment.function_name,
            "Runtime loop started"
        );

        while !self.shutdown.is_requested() {
            let outcome = self.run_cycle().await;
            debug!(%outcome, "Cycle finished");
        }

        info!("Runtime loop shut down");
    }

    /// Spawn [`Runtime::run`] on the current tokio runtime
    pub fn start(self) -> RuntimeHandle {
        let shutdown = self.shutdown_handle();
        let task = tokio::spawn(self.run());
        RuntimeHandle { shutdown, task }
    }

    /// Execute one fetch, dispatch, report cycle
    ///
    /// Never fails: every fault is either logged or posted as an error.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let (invocation, payload) = match self.client.next_invocation().await {
            Ok(next) => next,
            Err(e) => {
                error!(error = %e, "Failed to fetch next invocation");
                return CycleOutcome::FetchFailed;
            }
        };

        // Only one invocation is in flight, so no handler observes this mid-write
        std::env::set_var(TRACE_ID_ENV, &invocation.trace_id);

        let request_id = invocation.request_id.clone();
        let ctx = Context::new(invocation, Arc::clone(&self.environment), Handle::current());
        let span = ctx.span().clone();

        let result = match self.dispatch.resolve(&self.environment.handler_name) {
            Ok(handler) => AssertUnwindSafe(async { handler(payload, ctx).await })
                .catch_unwind()
                .instrument(span.clone())
                .await
                .unwrap_or_else(|panic| Err(RuntimeError::handler(panic_message(&*panic)))),
            Err(e) => Err(e),
        };

        let report = async {
            match result {
                Ok(output) => {
                    debug!("Handler succeeded");
                    self.client
                        .post_response(&request_id, output)
                        .await
                        .map(|()| CycleOutcome::Responded)
                }
                Err(e) => {
                    if matches!(e, RuntimeError::Decode(_)) {
                        warn!(error = %e, error_type = e.kind().error_type(), "Payload rejected");
                    } else {
                        error!(error = %e, error_type = e.kind().error_type(), "Invocation failed");
                    }
                    self.client
                        .post_error(&request_id, &e)
                        .await
                        .map(|()| CycleOutcome::ReportedError)
                }
            }
        }
        .instrument(span)
        .await;

        report.unwrap_or_else(|e| {
            error!(error = %e, "Failed to report invocation result");
            CycleOutcome::ReportFailed
        })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown cause");
    format!("Handler panicked: {detail}")
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dispatch = match &self.dispatch {
            Dispatch::Single(_) => "single".to_string(),
            Dispatch::Registry(registry) => format!("{registry:?}"),
        };
        f.debug_struct("Runtime")
            .field("handler", &self.environment.handler)
            .field("dispatch", &dispatch)
            .field("shutdown", &self.shutdown)
            .finish_non_exhaustive()
    }
}

/// A started runtime
#[derive(Debug)]
pub struct RuntimeHandle {
    shutdown: ShutdownHandle,
    task: JoinHandle<()>,
}

impl RuntimeHandle {
    /// Request shutdown at the next cycle boundary
    pub fn shutdown(&self) {
        self.shutdown.request();
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Resolve once the loop has terminated
    pub async fn wait(self) {
        if let Err(e) = self.task.await {
            error!(error = %e, "Runtime loop task failed");
        }
    }

    /// Cancel the loop without waiting for the in-flight cycle
    pub fn abort(&self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{codable, codable_blocking};
    use crate::handler::handler_fn;
    use crate::invocation::Invocation;
    use async_trait::async_trait;
    use bytes::Bytes;
    use chrono::{Duration, Utc};
    use parking_lot::Mutex;
    use rustlambda_core::{BoxError, ErrorDocument};
    use serde::{Deserialize, Serialize};
    use std::collections::{HashMap, VecDeque};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Next,
        Response(String, Option<Bytes>),
        Error(String, &'static str, String),
    }

    #[derive(Default)]
    struct FakeApi {
        queue: Mutex<VecDeque<Result<(Invocation, Bytes), RuntimeError>>>,
        calls: Arc<Mutex<Vec<Call>>>,
        fail_posts: bool,
    }

    impl FakeApi {
        fn with_payloads(payloads: &[&str]) -> Self {
            let api = Self::default();
            for (i, payload) in payloads.iter().enumerate() {
                api.push(&format!("req-{i}"), payload);
            }
            api
        }

        fn push(&self, request_id: &str, payload: &str) {
            self.queue
                .lock()
                .push_back(Ok((invocation(request_id), Bytes::from(payload.to_string()))));
        }

        fn push_fault(&self, error: RuntimeError) {
            self.queue.lock().push_back(Err(error));
        }

        fn calls(&self) -> Arc<Mutex<Vec<Call>>> {
            Arc::clone(&self.calls)
        }
    }

    #[async_trait]
    impl RuntimeApi for FakeApi {
        async fn next_invocation(&self) -> Result<(Invocation, Bytes), RuntimeError> {
            self.calls.lock().push(Call::Next);
            let next = self.queue.lock().pop_front();
            match next {
                Some(next) => next,
                None => {
                    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                    Err(RuntimeError::Endpoint("no invocation queued".to_string()))
                }
            }
        }

        async fn post_response(
            &self,
            request_id: &str,
            payload: Option<Bytes>,
        ) -> Result<(), RuntimeError> {
            self.calls
                .lock()
                .push(Call::Response(request_id.to_string(), payload));
            if self.fail_posts {
                return Err(RuntimeError::Endpoint("connection refused".to_string()));
            }
            Ok(())
        }

        async fn post_error(
            &self,
            request_id: &str,
            error: &RuntimeError,
        ) -> Result<(), RuntimeError> {
            self.calls.lock().push(Call::Error(
                request_id.to_string(),
                error.kind().error_type(),
                ErrorDocument::from(error).to_json(),
            ));
            if self.fail_posts {
                return Err(RuntimeError::Endpoint("connection refused".to_string()));
            }
            Ok(())
        }
    }

    fn invocation(request_id: &str) -> Invocation {
        Invocation {
            request_id: request_id.to_string(),
            deadline: Utc::now() + Duration::seconds(3),
            invoked_function_arn: "arn:aws:lambda:us-east-1:123456789012:function:test".to_string(),
            trace_id: format!("Root=1-{request_id}"),
            client_context: None,
            cognito_identity: None,
        }
    }

    fn environment(handler: &str) -> Environment {
        Environment::from_map(HashMap::from([
            ("AWS_LAMBDA_RUNTIME_API".to_string(), "localhost:9001".to_string()),
            ("_HANDLER".to_string(), handler.to_string()),
        ]))
        .unwrap()
    }

    #[derive(Debug, Deserialize, Serialize)]
    struct Greeting {
        name: String,
    }

    fn greet() -> Handler {
        codable(|event: Greeting, _ctx| async move {
            Ok::<_, BoxError>(Greeting {
                name: format!("hello {}", event.name),
            })
        })
    }

    #[tokio::test]
    async fn test_cycles_alternate_fetch_and_report() {
        let api =
            FakeApi::with_payloads(&[r#"{"name":"a"}"#, r#"{"name":"b"}"#, r#"{"name":"c"}"#]);
        let calls = api.calls();
        let runtime = Runtime::new(api, environment("main.greet"), greet());

        for _ in 0..3 {
            assert_eq!(runtime.run_cycle().await, CycleOutcome::Responded);
        }

        let calls = calls.lock().clone();
        assert_eq!(calls.len(), 6);
        for (i, pair) in calls.chunks(2).enumerate() {
            assert_eq!(pair[0], Call::Next);
            match &pair[1] {
                Call::Response(id, Some(body)) => {
                    assert_eq!(id, &format!("req-{i}"));
                    assert!(String::from_utf8_lossy(body).contains("hello"));
                }
                other => panic!("expected response, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_decode_failure_posts_one_error() {
        let api = FakeApi::with_payloads(&[r#"{"nom":"a"}"#]);
        let calls = api.calls();
        let runtime = Runtime::new(api, environment("main.greet"), greet());

        assert_eq!(runtime.run_cycle().await, CycleOutcome::ReportedError);

        let calls = calls.lock().clone();
        assert_eq!(calls.len(), 2);
        match &calls[1] {
            Call::Error(id, error_type, document) => {
                assert_eq!(id, "req-0");
                assert_eq!(*error_type, "Runtime.DecodeError");
                assert!(document.contains("data corrupted"));
            }
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_registry_miss_reports_unknown_handler() {
        let api = FakeApi::with_payloads(&["{}"]);
        let calls = api.calls();
        let registry = HandlerRegistry::new().with("greet", greet());
        let runtime = Runtime::with_registry(api, environment("main.api"), registry);

        assert_eq!(runtime.run_cycle().await, CycleOutcome::ReportedError);

        let calls = calls.lock().clone();
        let errors: Vec<_> = calls
            .iter()
            .filter_map(|call| match call {
                Call::Error(_, error_type, document) => Some((*error_type, document.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, "Runtime.UnknownHandler");
        assert!(errors[0].1.contains("Unknown lambda handler: api"));
    }

    #[tokio::test]
    async fn test_registry_dispatches_by_name() {
        let api = FakeApi::with_payloads(&[r#"{"name":"x"}"#]);
        let calls = api.calls();
        let registry = HandlerRegistry::new()
            .with("greet", greet())
            .with("other", handler_fn(|_payload, _ctx| async move { Ok(None) }));
        let runtime = Runtime::with_registry(api, environment("main.greet"), registry);

        assert_eq!(runtime.run_cycle().await, CycleOutcome::Responded);
        assert!(matches!(
            &calls.lock()[1],
            Call::Response(_, Some(body)) if body.as_ref() == br#"{"name":"hello x"}"#
        ));
    }

    #[tokio::test]
    async fn test_fetch_failure_continues() {
        let api = FakeApi::default();
        api.push_fault(RuntimeError::MissingHeader("Lambda-Runtime-Trace-Id"));
        api.push("req-1", r#"{"name":"a"}"#);
        let calls = api.calls();
        let runtime = Runtime::new(api, environment("main.greet"), greet());

        assert_eq!(runtime.run_cycle().await, CycleOutcome::FetchFailed);
        assert_eq!(runtime.run_cycle().await, CycleOutcome::Responded);

        let calls = calls.lock().clone();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0], Call::Next);
        assert_eq!(calls[1], Call::Next);
    }

    #[tokio::test]
    async fn test_report_failure_is_swallowed() {
        let api = FakeApi {
            fail_posts: true,
            ..FakeApi::with_payloads(&[r#"{"name":"a"}"#, r#"{"name":"b"}"#])
        };
        let runtime = Runtime::new(api, environment("main.greet"), greet());

        assert_eq!(runtime.run_cycle().await, CycleOutcome::ReportFailed);
        assert_eq!(runtime.run_cycle().await, CycleOutcome::ReportFailed);
    }

    #[tokio::test]
    async fn test_shutdown_mid_cycle_still_reports() {
        let api = FakeApi::with_payloads(&["{}", "{}"]);
        let calls = api.calls();
        let shutdown = ShutdownHandle::default();

        let flag = shutdown.clone();
        let handler = handler_fn(move |_payload, _ctx| {
            let flag = flag.clone();
            async move {
                flag.request();
                Ok(Some(Bytes::from_static(b"done")))
            }
        });
        let mut runtime = Runtime::new(api, environment("main.stop"), handler);
        runtime.shutdown = shutdown;

        runtime.run().await;

        let calls = calls.lock().clone();
        assert_eq!(
            calls,
            vec![
                Call::Next,
                Call::Response("req-0".to_string(), Some(Bytes::from_static(b"done"))),
            ]
        );
    }

    #[tokio::test]
    async fn test_shutdown_before_start_skips_fetch() {
        let api = FakeApi::with_payloads(&["{}"]);
        let calls = api.calls();
        let runtime = Runtime::new(api, environment("main.greet"), greet());

        runtime.shutdown_handle().request();
        runtime.run().await;

        assert!(calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_started_runtime_stops_on_shutdown() {
        let api = FakeApi::with_payloads(&[r#"{"name":"a"}"#]);
        let calls = api.calls();
        let handle = Runtime::new(api, environment("main.greet"), greet()).start();

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        handle.shutdown();
        tokio::time::timeout(std::time::Duration::from_secs(2), handle.wait())
            .await
            .expect("runtime did not stop");

        let calls = calls.lock().clone();
        assert!(calls.contains(&Call::Response(
            "req-0".to_string(),
            Some(Bytes::from_static(br#"{"name":"hello a"}"#))
        )));
    }

    #[tokio::test]
    async fn test_blocking_handler_result_is_posted() {
        let api = FakeApi::with_payloads(&[r#"{"name":"slow"}"#]);
        let calls = api.calls();
        let handler = codable_blocking(|event: Greeting, _ctx| {
            std::thread::sleep(std::time::Duration::from_millis(20));
            Ok::<_, BoxError>(Greeting {
                name: event.name.to_uppercase(),
            })
        });
        let runtime = Runtime::new(api, environment("main.slow"), handler);

        assert_eq!(runtime.run_cycle().await, CycleOutcome::Responded);
        assert_eq!(
            calls.lock()[1],
            Call::Response(
                "req-0".to_string(),
                Some(Bytes::from_static(br#"{"name":"SLOW"}"#))
            )
        );
    }

    #[tokio::test]
    async fn test_trace_id_exported() {
        let api = FakeApi::with_payloads(&["{}"]);
        let calls = api.calls();
        let handler = handler_fn(|_payload, _ctx| async move {
            Ok(std::env::var(TRACE_ID_ENV).ok().map(Bytes::from))
        });
        let runtime = Runtime::new(api, environment("main.trace"), handler);

        assert_eq!(runtime.run_cycle().await, CycleOutcome::Responded);
        assert_eq!(
            calls.lock()[1],
            Call::Response(
                "req-0".to_string(),
                Some(Bytes::from(invocation("req-0").trace_id))
            )
        );
    }

    #[tokio::test]
    async fn test_handler_panic_reported_and_loop_continues() {
        let api = FakeApi::with_payloads(&[r#"{"name":"boom"}"#, r#"{"name":"b"}"#]);
        let calls = api.calls();
        let handler = codable(|event: Greeting, _ctx| async move {
            if event.name == "boom" {
                panic!("greeting exploded");
            }
            Ok::<_, BoxError>(event)
        });
        let handle = Runtime::new(api, environment("main.panic"), handler).start();

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        handle.shutdown();
        tokio::time::timeout(std::time::Duration::from_secs(2), handle.wait())
            .await
            .expect("runtime did not stop");

        let calls = calls.lock().clone();
        assert!(calls.len() >= 4);
        assert_eq!(calls[0], Call::Next);
        match &calls[1] {
            Call::Error(id, error_type, document) => {
                assert_eq!(id, "req-0");
                assert_eq!(*error_type, "Function.HandlerError");
                assert!(document.contains("greeting exploded"));
            }
            other => panic!("expected error, got {other:?}"),
        }
        assert_eq!(calls[2], Call::Next);
        assert_eq!(
            calls[3],
            Call::Response(
                "req-1".to_string(),
                Some(Bytes::from_static(br#"{"name":"b"}"#))
            )
        );
    }
}
