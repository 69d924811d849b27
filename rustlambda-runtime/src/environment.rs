//! Startup configuration
//!
//! Lambda describes the function to the runtime through environment
//! variables. They are read once, before the first invocation is fetched.

use rustlambda_core::RuntimeError;
use serde::Deserialize;
use std::collections::HashMap;

pub const RUNTIME_API: &str = "AWS_LAMBDA_RUNTIME_API";
pub const HANDLER: &str = "_HANDLER";

/// Static configuration of the running function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    /// `host:port` of the Runtime API
    pub runtime_api: String,
    /// The full `_HANDLER` value, e.g. `EventSources.sns`
    pub handler: String,
    /// Selector after the first `.` of `_HANDLER`
    pub handler_name: String,
    pub function_name: String,
    pub function_version: String,
    pub log_group_name: String,
    pub log_stream_name: String,
    pub memory_limit_in_mb: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub region: String,
}

/// Keys arrive lowercased from the `config` environment source
#[derive(Debug, Deserialize)]
struct RawEnvironment {
    aws_lambda_runtime_api: Option<String>,
    #[serde(rename = "_handler")]
    handler: Option<String>,
    #[serde(default)]
    aws_lambda_function_name: String,
    #[serde(default)]
    aws_lambda_function_version: String,
    #[serde(default)]
    aws_lambda_log_group_name: String,
    #[serde(default)]
    aws_lambda_log_stream_name: String,
    #[serde(default)]
    aws_lambda_function_memory_size: String,
    #[serde(default)]
    aws_access_key_id: String,
    #[serde(default)]
    aws_secret_access_key: String,
    #[serde(default)]
    aws_session_token: String,
    #[serde(default = "default_region")]
    aws_region: String,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl Environment {
    /// Read the process environment
    pub fn from_env() -> Result<Self, RuntimeError> {
        Self::load(config::Environment::default())
    }

    /// Read from an explicit variable map instead of the process environment
    pub fn from_map(vars: HashMap<String, String>) -> Result<Self, RuntimeError> {
        let source = vars.into_iter().collect::<config::Map<_, _>>();
        Self::load(config::Environment::default().source(Some(source)))
    }

    fn load(source: config::Environment) -> Result<Self, RuntimeError> {
        let raw = config::Config::builder()
            .add_source(source)
            .build()
            .and_then(|config| config.try_deserialize::<RawEnvironment>())
            .map_err(|e| RuntimeError::Configuration(e.to_string()))?;

        Self::validate(raw)
    }

    fn validate(raw: RawEnvironment) -> Result<Self, RuntimeError> {
        let runtime_api = raw
            .aws_lambda_runtime_api
            .filter(|value| !value.is_empty())
            .ok_or_else(|| RuntimeError::MissingEnvironmentVariable(RUNTIME_API.to_string()))?;

        let handler = raw
            .handler
            .filter(|value| !value.is_empty())
            .ok_or_else(|| RuntimeError::MissingEnvironmentVariable(HANDLER.to_string()))?;

        let handler_name = match handler.split_once('.') {
            Some((_, name)) if !name.is_empty() => name.to_string(),
            _ => return Err(RuntimeError::InvalidHandlerName(handler)),
        };

        Ok(Self {
            runtime_api,
            handler,
            handler_name,
            function_name: raw.aws_lambda_function_name,
            function_version: raw.aws_lambda_function_version,
            log_group_name: raw.aws_lambda_log_group_name,
            log_stream_name: raw.aws_lambda_log_stream_name,
            memory_limit_in_mb: raw.aws_lambda_function_memory_size,
            access_key_id: raw.aws_access_key_id,
            secret_access_key: raw.aws_secret_access_key,
            session_token: raw.aws_session_token,
            region: raw.aws_region,
        })
    }
}
