//! Custom runtime for AWS Lambda
//!
//! Polls the Lambda Runtime API for invocations, hands each payload to a
//! bound handler and reports the result back, one invocation at a time.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rustlambda_runtime::{codable, Environment, Runtime, RuntimeApiClient};
//! use rustlambda_runtime::BoxError;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), BoxError> {
//!     let environment = Environment::from_env()?;
//!     let client = RuntimeApiClient::from_environment(&environment);
//!
//!     let handler = codable(|event: serde_json::Value, _ctx| async move {
//!         Ok::<_, BoxError>(event)
//!     });
//!
//!     Runtime::new(client, environment, handler).run().await;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod codec;
pub mod context;
pub mod environment;
pub mod handler;
pub mod invocation;
pub mod registry;
pub mod runtime;

pub use client::{RuntimeApi, RuntimeApiClient};
pub use codec::{
    adapt, codable, codable_blocking, codable_no_result, AlbCodec, ApiGatewayCodec, EventCodec,
    JsonCodec,
};
pub use context::Context;
pub use environment::Environment;
pub use handler::{handler_fn, log_payload, Handler, HandlerFuture};
pub use invocation::Invocation;
pub use registry::HandlerRegistry;
pub use runtime::{CycleOutcome, Runtime, RuntimeHandle, ShutdownHandle};

pub use rustlambda_core::{BoxError, DecodeError, ErrorKind, RuntimeError};
