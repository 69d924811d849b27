//! Mock Lambda Runtime API
//!
//! Serves invocations queued by the test and records every call the runtime
//! makes, in arrival order.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::invocation::InvocationBuilder;
use crate::{TestError, WAIT_TIMEOUT_SECS};

const ERROR_TYPE_HEADER: &str = "Lambda-Runtime-Function-Error-Type";

/// A call received from the runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlPlaneEvent {
    /// `GET /invocation/next` arrived
    Next,
    /// `POST /invocation/{id}/response`
    Response { request_id: String, body: Bytes },
    /// `POST /invocation/{id}/error`
    Error {
        request_id: String,
        error_type: Option<String>,
        body: Bytes,
    },
}

impl ControlPlaneEvent {
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::Next => None,
            Self::Response { request_id, .. } | Self::Error { request_id, .. } => Some(request_id),
        }
    }

    pub fn is_next(&self) -> bool {
        matches!(self, Self::Next)
    }

    /// `errorMessage` of a posted error document
    pub fn error_message(&self) -> Option<String> {
        let Self::Error { body, .. } = self else {
            return None;
        };
        let document: serde_json::Value = serde_json::from_slice(body).ok()?;
        document
            .get("errorMessage")
            .and_then(|message| message.as_str())
            .map(str::to_string)
    }
}

struct Queued {
    status: StatusCode,
    headers: Vec<(String, String)>,
    body: Bytes,
}

#[derive(Default)]
struct ControlPlaneState {
    queue: Mutex<VecDeque<Queued>>,
    available: Notify,
    events: Mutex<Vec<ControlPlaneEvent>>,
    fail_posts: AtomicBool,
}

impl ControlPlaneState {
    fn push(&self, queued: Queued) {
        self.queue.lock().push_back(queued);
        self.available.notify_one();
    }

    fn record(&self, event: ControlPlaneEvent) {
        self.events.lock().push(event);
    }

    fn post_status(&self) -> StatusCode {
        if self.fail_posts.load(Ordering::SeqCst) {
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            StatusCode::ACCEPTED
        }
    }
}

/// An in-process Runtime API bound to `127.0.0.1` on a random port
pub struct MockControlPlane {
    address: SocketAddr,
    state: Arc<ControlPlaneState>,
    task: JoinHandle<()>,
}

impl MockControlPlane {
    pub async fn start() -> Result<Self, TestError> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| TestError::BindFailed(e.to_string()))?;
        let address = listener
            .local_addr()
            .map_err(|e| TestError::BindFailed(e.to_string()))?;

        let state = Arc::new(ControlPlaneState::default());
        let app = router(Arc::clone(&state));

        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "Mock control plane stopped");
            }
        });

        debug!(%address, "Mock control plane listening");

        Ok(Self {
            address,
            state,
            task,
        })
    }

    /// `host:port`, the value for `AWS_LAMBDA_RUNTIME_API`
    pub fn address(&self) -> String {
        self.address.to_string()
    }

    /// Queue an invocation, returning its request id
    pub fn enqueue(&self, invocation: InvocationBuilder) -> String {
        let request_id = invocation.request_id().to_string();
        self.state.push(Queued {
            status: StatusCode::OK,
            headers: invocation
                .headers()
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
            body: invocation.payload().clone(),
        });
        request_id
    }

    pub fn enqueue_payload(&self, payload: impl Into<Bytes>) -> String {
        self.enqueue(InvocationBuilder::new(payload))
    }

    /// Queue an arbitrary response to the next `GET /invocation/next`
    pub fn enqueue_raw(&self, status: u16, headers: Vec<(String, String)>, body: impl Into<Bytes>) {
        self.state.push(Queued {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            headers,
            body: body.into(),
        });
    }

    /// Answer response and error posts with 500
    pub fn fail_posts(&self, fail: bool) {
        self.state.fail_posts.store(fail, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<ControlPlaneEvent> {
        self.state.events.lock().clone()
    }

    /// Response and error posts, without the `Next` markers
    pub fn reports(&self) -> Vec<ControlPlaneEvent> {
        self.events().into_iter().filter(|e| !e.is_next()).collect()
    }

    /// Wait until at least `count` calls have been recorded
    pub async fn wait_for_events(&self, count: usize) -> Result<Vec<ControlPlaneEvent>, TestError> {
        self.wait_until(count, |events| events.len()).await
    }

    /// Wait until at least `count` response or error posts have been recorded
    pub async fn wait_for_reports(
        &self,
        count: usize,
    ) -> Result<Vec<ControlPlaneEvent>, TestError> {
        self.wait_until(count, |events| events.iter().filter(|e| !e.is_next()).count())
            .await
    }

    async fn wait_until<F>(
        &self,
        count: usize,
        measure: F,
    ) -> Result<Vec<ControlPlaneEvent>, TestError>
    where
        F: Fn(&[ControlPlaneEvent]) -> usize,
    {
        let start = std::time::Instant::now();

        loop {
            let events = self.events();
            let received = measure(&events);
            if received >= count {
                return Ok(events);
            }
            if start.elapsed() >= Duration::from_secs(WAIT_TIMEOUT_SECS) {
                return Err(TestError::Timeout {
                    expected: count,
                    received,
                });
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl Drop for MockControlPlane {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn router(state: Arc<ControlPlaneState>) -> Router {
    Router::new()
        .route(
            "/2018-06-01/runtime/invocation/next",
            get(get_next_invocation),
        )
        .route(
            "/2018-06-01/runtime/invocation/:request_id/response",
            post(post_invocation_response),
        )
        .route(
            "/2018-06-01/runtime/invocation/:request_id/error",
            post(post_invocation_error),
        )
        .with_state(state)
}

/// GET /runtime/invocation/next
///
/// Blocks until an invocation is queued.
async fn get_next_invocation(State(state): State<Arc<ControlPlaneState>>) -> Response {
    state.record(ControlPlaneEvent::Next);

    let queued = loop {
        let next = state.queue.lock().pop_front();
        if let Some(queued) = next {
            break queued;
        }
        state.available.notified().await;
    };

    let mut response = Response::builder().status(queued.status);
    for (name, value) in &queued.headers {
        response = response.header(name.as_str(), value.as_str());
    }

    response
        .body(Body::from(queued.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// POST /runtime/invocation/{requestId}/response
async fn post_invocation_response(
    State(state): State<Arc<ControlPlaneState>>,
    Path(request_id): Path<String>,
    body: Bytes,
) -> StatusCode {
    debug!(request_id = %request_id, "Runtime sent response");

    state.record(ControlPlaneEvent::Response { request_id, body });
    state.post_status()
}

/// POST /runtime/invocation/{requestId}/error
async fn post_invocation_error(
    State(state): State<Arc<ControlPlaneState>>,
    Path(request_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let error_type = headers
        .get(ERROR_TYPE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    debug!(request_id = %request_id, error_type = ?error_type, "Runtime sent error");

    state.record(ControlPlaneEvent::Error {
        request_id,
        error_type,
        body,
    });
    state.post_status()
}
