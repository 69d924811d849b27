//! Per-invocation execution context

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::Span;

use crate::environment::Environment;
use crate::invocation::Invocation;

/// Everything a handler may know about the invocation it is serving
///
/// Owned by a single cycle. The span tags every event emitted while the
/// handler runs with the request and trace ids.
#[derive(Debug, Clone)]
pub struct Context {
    invocation: Invocation,
    environment: Arc<Environment>,
    span: Span,
    runtime: Handle,
}

impl Context {
    pub fn new(invocation: Invocation, environment: Arc<Environment>, runtime: Handle) -> Self {
        let span = tracing::info_span!(
            "invocation",
            request_id = %invocation.request_id,
            trace_id = %invocation.trace_id
        );

        Self {
            invocation,
            environment,
            span,
            runtime,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.invocation.request_id
    }

    pub fn trace_id(&self) -> &str {
        &self.invocation.trace_id
    }

    pub fn invoked_function_arn(&self) -> &str {
        &self.invocation.invoked_function_arn
    }

    pub fn deadline(&self) -> DateTime<Utc> {
        self.invocation.deadline
    }

    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Logger tagged with this invocation
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Time left until the deadline, negative once it has passed
    pub fn remaining_time(&self) -> Duration {
        self.invocation.deadline - Utc::now()
    }

    /// Scheduler the handler may use for timers and spawned work
    pub fn runtime_handle(&self) -> &Handle {
        &self.runtime
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn environment() -> Arc<Environment> {
        let vars = HashMap::from([
            ("AWS_LAMBDA_RUNTIME_API".to_string(), "localhost:9001".to_string()),
            ("_HANDLER".to_string(), "main.echo".to_string()),
        ]);
        Arc::new(Environment::from_map(vars).unwrap())
    }

    fn invocation(deadline: DateTime<Utc>) -> Invocation {
        Invocation {
            request_id: "req-1".to_string(),
            deadline,
            invoked_function_arn: "arn:aws:lambda:us-east-1:123456789012:function:echo".to_string(),
            trace_id: "Root=1-abc".to_string(),
            client_context: None,
            cognito_identity: None,
        }
    }

    #[tokio::test]
    async fn test_remaining_time() {
        let ctx = Context::new(
            invocation(Utc::now() + Duration::seconds(3)),
            environment(),
            Handle::current(),
        );

        let remaining = ctx.remaining_time();
        assert!(remaining > Duration::seconds(2));
        assert!(remaining <= Duration::seconds(3));
        assert_eq!(ctx.request_id(), "req-1");
        assert_eq!(ctx.environment().handler_name, "echo");
    }

    #[tokio::test]
    async fn test_remaining_time_past_deadline() {
        let ctx = Context::new(
            invocation(Utc::now() - Duration::seconds(1)),
            environment(),
            Handle::current(),
        );

        assert!(ctx.remaining_time() < Duration::zero());
    }

    #[tokio::test]
    async fn test_runtime_handle_schedules_work() {
        let ctx = Context::new(invocation(Utc::now()), environment(), Handle::current());

        let value = ctx.runtime_handle().spawn(async { 42 }).await.unwrap();
        assert_eq!(value, 42);
    }
}
