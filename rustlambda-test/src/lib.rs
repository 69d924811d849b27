//! Test utilities for RustLambda
//!
//! Provides utilities for integration testing a custom runtime:
//! - An in-process mock of the Lambda Runtime API on a random port
//! - Builders for invocations, including malformed ones
//! - Waiting on the calls the runtime made
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rustlambda_test::{InvocationBuilder, MockControlPlane};
//!
//! #[tokio::test]
//! async fn test_echo() {
//!     let control_plane = MockControlPlane::start().await.unwrap();
//!     control_plane.enqueue(InvocationBuilder::new(r#"{"hello":"world"}"#));
//!
//!     // Point AWS_LAMBDA_RUNTIME_API at the mock
//!     println!("Runtime API at: {}", control_plane.address());
//!
//!     let events = control_plane.wait_for_events(2).await.unwrap();
//! }
//! ```

pub mod control_plane;
pub mod invocation;

pub use control_plane::{ControlPlaneEvent, MockControlPlane};
pub use invocation::InvocationBuilder;

/// Timeout for waiting on runtime calls
pub const WAIT_TIMEOUT_SECS: u64 = 5;

/// Install a test log subscriber honouring `RUST_LOG`, once per process
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Errors that can occur with the mock control plane
#[derive(Debug)]
pub enum TestError {
    BindFailed(String),
    Timeout { expected: usize, received: usize },
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::BindFailed(msg) => write!(f, "Failed to bind control plane: {}", msg),
            TestError::Timeout { expected, received } => write!(
                f,
                "Timed out waiting for {} runtime calls, received {}",
                expected, received
            ),
        }
    }
}

impl std::error::Error for TestError {}
