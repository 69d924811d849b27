//! Raw handler contract: payload bytes in, payload bytes out

use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt};
use rustlambda_core::RuntimeError;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

use crate::context::Context;

pub type HandlerFuture = BoxFuture<'static, Result<Option<Bytes>, RuntimeError>>;

/// A function from the raw invocation payload to the raw response
///
/// `Ok(None)` posts an empty response body.
pub type Handler = Arc<dyn Fn(Bytes, Context) -> HandlerFuture + Send + Sync>;

/// Build a [`Handler`] from an async function over raw bytes
pub fn handler_fn<F, Fut>(f: F) -> Handler
where
    F: Fn(Bytes, Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<Bytes>, RuntimeError>> + Send + 'static,
{
    Arc::new(move |payload, ctx| f(payload, ctx).boxed())
}

/// Log the raw payload at debug level before delegating
pub fn log_payload(handler: Handler) -> Handler {
    Arc::new(move |payload: Bytes, ctx: Context| {
        ctx.span().in_scope(|| {
            debug!(payload = %String::from_utf8_lossy(&payload), "Invocation payload");
        });
        handler(payload, ctx)
    })
}
