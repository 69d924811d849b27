//! Lambda Runtime API client
//!
//! Implements the three calls a custom runtime makes against
//! `http://{AWS_LAMBDA_RUNTIME_API}/2018-06-01/runtime`. No call is retried
//! here.

use async_trait::async_trait;
use bytes::Bytes;
use rustlambda_core::{ErrorDocument, RuntimeError};
use tracing::debug;

use crate::environment::Environment;
use crate::invocation::{header, Invocation};

pub const API_VERSION: &str = "2018-06-01";

/// The control plane as seen by the runtime loop
#[async_trait]
pub trait RuntimeApi: Send + Sync {
    /// Block until the next invocation is available
    async fn next_invocation(&self) -> Result<(Invocation, Bytes), RuntimeError>;

    /// Report a successful result, `None` posts an empty body
    async fn post_response(
        &self,
        request_id: &str,
        payload: Option<Bytes>,
    ) -> Result<(), RuntimeError>;

    /// Report a failed invocation
    async fn post_error(&self, request_id: &str, error: &RuntimeError) -> Result<(), RuntimeError>;
}

/// HTTP implementation of [`RuntimeApi`]
#[derive(Debug, Clone)]
pub struct RuntimeApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl RuntimeApiClient {
    /// Create a client for the Runtime API at `host:port`
    pub fn new(address: &str) -> Self {
        Self {
            base_url: format!("http://{address}/{API_VERSION}/runtime"),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_environment(environment: &Environment) -> Self {
        Self::new(&environment.runtime_api)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post(
        &self,
        url: String,
        body: Bytes,
        error_type: Option<&'static str>,
    ) -> Result<(), RuntimeError> {
        let mut request = self.client.post(&url).body(body);
        if let Some(error_type) = error_type {
            request = request
                .header(header::FUNCTION_ERROR_TYPE, error_type)
                .header(reqwest::header::CONTENT_TYPE, "application/json");
        }

        let response = request.send().await.map_err(endpoint_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RuntimeError::Endpoint(format!(
                "POST {url} returned {status}: {body}"
            )));
        }

        Ok(())
    }
}

fn endpoint_error(error: reqwest::Error) -> RuntimeError {
    RuntimeError::Endpoint(error.to_string())
}

#[async_trait]
impl RuntimeApi for RuntimeApiClient {
    async fn next_invocation(&self) -> Result<(Invocation, Bytes), RuntimeError> {
        let url = format!("{}/invocation/next", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(endpoint_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(RuntimeError::Endpoint(format!("GET {url} returned {status}")));
        }

        let headers = response.headers();
        let invocation = Invocation::from_headers(|name| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        })?;

        let payload = response.bytes().await.map_err(endpoint_error)?;
        if payload.is_empty() {
            return Err(RuntimeError::MissingBody);
        }

        debug!(
            request_id = %invocation.request_id,
            bytes = payload.len(),
            "Received invocation"
        );

        Ok((invocation, payload))
    }

    async fn post_response(
        &self,
        request_id: &str,
        payload: Option<Bytes>,
    ) -> Result<(), RuntimeError> {
        let url = format!("{}/invocation/{request_id}/response", self.base_url);
        self.post(url, payload.unwrap_or_default(), None).await
    }

    async fn post_error(&self, request_id: &str, error: &RuntimeError) -> Result<(), RuntimeError> {
        let url = format!("{}/invocation/{request_id}/error", self.base_url);
        let document = ErrorDocument::from(error);
        self.post(
            url,
            Bytes::from(document.to_json()),
            Some(error.kind().error_type()),
        )
        .await
    }
}
