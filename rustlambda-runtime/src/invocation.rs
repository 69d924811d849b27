//! Invocation metadata delivered by `GET /runtime/invocation/next`

use chrono::{DateTime, TimeZone, Utc};
use rustlambda_core::RuntimeError;

/// Runtime API response header names
pub mod header {
    pub const REQUEST_ID: &str = "Lambda-Runtime-Aws-Request-Id";
    pub const DEADLINE_MS: &str = "Lambda-Runtime-Deadline-Ms";
    pub const INVOKED_FUNCTION_ARN: &str = "Lambda-Runtime-Invoked-Function-Arn";
    pub const TRACE_ID: &str = "Lambda-Runtime-Trace-Id";
    pub const CLIENT_CONTEXT: &str = "Lambda-Runtime-Client-Context";
    pub const COGNITO_IDENTITY: &str = "Lambda-Runtime-Cognito-Identity";
    pub const FUNCTION_ERROR_TYPE: &str = "Lambda-Runtime-Function-Error-Type";
}

/// One unit of work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub request_id: String,
    pub deadline: DateTime<Utc>,
    pub invoked_function_arn: String,
    pub trace_id: String,
    pub client_context: Option<String>,
    pub cognito_identity: Option<String>,
}

impl Invocation {
    /// Build from response headers
    ///
    /// `lookup` returns the value of a header by name. Every header except
    /// the client context and Cognito identity is required. A deadline that
    /// is not an integer number of milliseconds counts as missing.
    pub fn from_headers<F>(lookup: F) -> Result<Self, RuntimeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| lookup(name).ok_or(RuntimeError::MissingHeader(name));

        let request_id = required(header::REQUEST_ID)?;
        let deadline = required(header::DEADLINE_MS)?
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .ok_or(RuntimeError::MissingHeader(header::DEADLINE_MS))?;
        let invoked_function_arn = required(header::INVOKED_FUNCTION_ARN)?;
        let trace_id = required(header::TRACE_ID)?;

        Ok(Self {
            request_id,
            deadline,
            invoked_function_arn,
            trace_id,
            client_context: lookup(header::CLIENT_CONTEXT),
            cognito_identity: lookup(header::COGNITO_IDENTITY),
        })
    }

    pub fn deadline_ms(&self) -> i64 {
        self.deadline.timestamp_millis()
    }
}
