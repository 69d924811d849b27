//! Invocations queued on the mock control plane

use bytes::Bytes;
use chrono::{Duration, Utc};
use uuid::Uuid;

pub const REQUEST_ID: &str = "Lambda-Runtime-Aws-Request-Id";
pub const DEADLINE_MS: &str = "Lambda-Runtime-Deadline-Ms";
pub const INVOKED_FUNCTION_ARN: &str = "Lambda-Runtime-Invoked-Function-Arn";
pub const TRACE_ID: &str = "Lambda-Runtime-Trace-Id";
pub const CLIENT_CONTEXT: &str = "Lambda-Runtime-Client-Context";
pub const COGNITO_IDENTITY: &str = "Lambda-Runtime-Cognito-Identity";

pub const DEFAULT_FUNCTION_ARN: &str = "arn:aws:lambda:us-east-1:123456789012:function:custom-runtime";

/// Builds the headers and body served by `GET /invocation/next`
#[derive(Debug, Clone)]
pub struct InvocationBuilder {
    request_id: String,
    deadline_ms: String,
    function_arn: String,
    trace_id: String,
    client_context: Option<String>,
    cognito_identity: Option<String>,
    omitted: Vec<&'static str>,
    payload: Bytes,
}

impl InvocationBuilder {
    /// Invocation with a fresh request id and a deadline three seconds out
    pub fn new(payload: impl Into<Bytes>) -> Self {
        let request_id = Uuid::new_v4().to_string();
        let deadline = Utc::now() + Duration::seconds(3);

        Self {
            trace_id: format!(
                "Root=1-{:x}-{};Sampled=1",
                deadline.timestamp(),
                &request_id.replace('-', "")[..24]
            ),
            request_id,
            deadline_ms: deadline.timestamp_millis().to_string(),
            function_arn: DEFAULT_FUNCTION_ARN.to_string(),
            client_context: None,
            cognito_identity: None,
            omitted: Vec::new(),
            payload: payload.into(),
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    /// Raw deadline header value, not validated
    pub fn with_deadline_ms(mut self, deadline_ms: impl Into<String>) -> Self {
        self.deadline_ms = deadline_ms.into();
        self
    }

    pub fn with_function_arn(mut self, arn: impl Into<String>) -> Self {
        self.function_arn = arn.into();
        self
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = trace_id.into();
        self
    }

    pub fn with_client_context(mut self, client_context: impl Into<String>) -> Self {
        self.client_context = Some(client_context.into());
        self
    }

    pub fn with_cognito_identity(mut self, identity: impl Into<String>) -> Self {
        self.cognito_identity = Some(identity.into());
        self
    }

    /// Leave `name` out of the response headers
    pub fn without_header(mut self, name: &'static str) -> Self {
        self.omitted.push(name);
        self
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let optional = [
            (CLIENT_CONTEXT, self.client_context.clone()),
            (COGNITO_IDENTITY, self.cognito_identity.clone()),
        ];

        [
            (REQUEST_ID, self.request_id.clone()),
            (DEADLINE_MS, self.deadline_ms.clone()),
            (INVOKED_FUNCTION_ARN, self.function_arn.clone()),
            (TRACE_ID, self.trace_id.clone()),
        ]
        .into_iter()
        .chain(optional.into_iter().filter_map(|(name, value)| value.map(|v| (name, v))))
        .filter(|(name, _)| !self.omitted.contains(name))
        .collect()
    }
}
