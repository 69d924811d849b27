//! Runtime error taxonomy and the error document posted to the Runtime API

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Boxed error returned by user handlers
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Discriminant shared by every runtime fault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing or invalid configuration, fatal before the loop starts
    Startup,
    /// The control plane misbehaved or could not be reached
    Protocol,
    /// The invocation payload did not match the expected envelope
    Decode,
    /// The typed handler returned an error
    Handler,
    /// The configured handler name is not registered
    UnknownHandler,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Startup => "Startup",
            Self::Protocol => "Protocol",
            Self::Decode => "Decode",
            Self::Handler => "Handler",
            Self::UnknownHandler => "UnknownHandler",
        }
    }

    /// Value for the `Lambda-Runtime-Function-Error-Type` header
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Startup => "Runtime.StartupError",
            Self::Protocol => "Runtime.ProtocolError",
            Self::Decode => "Runtime.DecodeError",
            Self::Handler => "Function.HandlerError",
            Self::UnknownHandler => "Runtime.UnknownHandler",
        }
    }

    /// Whether a fault of this kind aborts startup
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Startup)
    }
}

/// Payload decoding faults
///
/// Every message carries "data corrupted" so the posted error document
/// names the fault class.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("data corrupted: {}", json_detail(.0))]
    Json(#[from] serde_json::Error),

    #[error("data corrupted: expected exactly one key, but got {found}")]
    ExpectedOneDiscriminant { found: usize },

    #[error("data corrupted: expected date to be in format `{format}`, but got `{value}`")]
    InvalidTimestamp { value: String, format: &'static str },

    #[error("data corrupted: invalid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("data corrupted: body is empty")]
    EmptyBody,

    #[error("data corrupted: unexpected value \"{value}\" for key {key}, expected {expected}")]
    UnexpectedDataType {
        key: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("data corrupted: invalid HTTP method `{0}`")]
    InvalidHttpMethod(String),
}

/// Nested decode faults reach serde as custom messages that already carry the prefix
fn json_detail(error: &serde_json::Error) -> String {
    let message = error.to_string();
    match message.strip_prefix("data corrupted: ") {
        Some(detail) => detail.to_string(),
        None => message,
    }
}

/// Every fault the runtime can observe
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Missing environment variable: {0}")]
    MissingEnvironmentVariable(String),

    #[error("Invalid handler name: {0}")]
    InvalidHandlerName(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invocation missing header: {0}")]
    MissingHeader(&'static str),

    #[error("Invocation missing data")]
    MissingBody,

    #[error("Endpoint error: {0}")]
    Endpoint(String),

    #[error("Decoding failed, {0}")]
    Decode(#[from] DecodeError),

    #[error("{0}")]
    Handler(BoxError),

    #[error("Unknown lambda handler: {0}")]
    UnknownHandler(String),
}

impl RuntimeError {
    /// Wrap an error raised by a typed handler
    pub fn handler(error: impl Into<BoxError>) -> Self {
        Self::Handler(error.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingEnvironmentVariable(_)
            | Self::InvalidHandlerName(_)
            | Self::Configuration(_) => ErrorKind::Startup,
            Self::MissingHeader(_) | Self::MissingBody | Self::Endpoint(_) => ErrorKind::Protocol,
            Self::Decode(_) => ErrorKind::Decode,
            Self::Handler(_) => ErrorKind::Handler,
            Self::UnknownHandler(_) => ErrorKind::UnknownHandler,
        }
    }
}

impl From<serde_json::Error> for RuntimeError {
    fn from(error: serde_json::Error) -> Self {
        Self::Decode(DecodeError::Json(error))
    }
}

/// Body of `POST /runtime/invocation/{requestId}/error`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDocument {
    pub error_message: String,
}

impl ErrorDocument {
    pub fn new(error_message: impl Into<String>) -> Self {
        Self {
            error_message: error_message.into(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| format!(r#"{{"errorMessage":{:?}}}"#, self.error_message))
    }
}

impl From<&RuntimeError> for ErrorDocument {
    fn from(error: &RuntimeError) -> Self {
        Self::new(error.to_string())
    }
}
