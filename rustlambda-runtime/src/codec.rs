//! Typed handler adapters
//!
//! An adapter turns a typed handler into a raw [`Handler`]: decode the
//! payload, invoke, encode the output. A payload that fails to decode never
//! reaches the typed handler and is reported as a decode fault.

use bytes::Bytes;
use futures::future::FutureExt;
use http::StatusCode;
use rustlambda_core::{BoxError, DecodeError, RuntimeError};
use rustlambda_events::{alb, apigateway, ResponseEncoding};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{error, warn};

use crate::context::Context;
use crate::handler::Handler;

/// Wire format of a trigger type
pub trait EventCodec: Send + Sync + 'static {
    type Event: Send + 'static;
    type Output: Send + 'static;

    fn decode(&self, payload: &[u8]) -> Result<Self::Event, DecodeError>;

    fn encode(&self, output: Self::Output) -> Result<Option<Bytes>, RuntimeError>;

    /// Output to send instead of reporting a failed typed handler
    fn recover(&self, _error: &RuntimeError) -> Option<Self::Output> {
        None
    }
}

/// Plain JSON in, JSON out
pub struct JsonCodec<E, O> {
    _marker: PhantomData<fn() -> (E, O)>,
}

impl<E, O> JsonCodec<E, O> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<E, O> Default for JsonCodec<E, O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E, O> EventCodec for JsonCodec<E, O>
where
    E: DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
{
    type Event = E;
    type Output = O;

    fn decode(&self, payload: &[u8]) -> Result<E, DecodeError> {
        Ok(serde_json::from_slice(payload)?)
    }

    fn encode(&self, output: O) -> Result<Option<Bytes>, RuntimeError> {
        let bytes = serde_json::to_vec(&output).map_err(RuntimeError::handler)?;
        Ok(Some(Bytes::from(bytes)))
    }
}

/// JSON in, empty response out
struct JsonEventCodec<E> {
    _marker: PhantomData<fn() -> E>,
}

impl<E> EventCodec for JsonEventCodec<E>
where
    E: DeserializeOwned + Send + 'static,
{
    type Event = E;
    type Output = ();

    fn decode(&self, payload: &[u8]) -> Result<E, DecodeError> {
        Ok(serde_json::from_slice(payload)?)
    }

    fn encode(&self, _output: ()) -> Result<Option<Bytes>, RuntimeError> {
        Ok(None)
    }
}

/// API Gateway proxy requests and responses
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiGatewayCodec {
    pub encoding: ResponseEncoding,
    /// Answer `500 Internal Server Error` when the typed handler fails
    pub internal_error_on_failure: bool,
}

impl ApiGatewayCodec {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_encoding(mut self, encoding: ResponseEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    #[must_use]
    pub fn with_internal_error_on_failure(mut self, enabled: bool) -> Self {
        self.internal_error_on_failure = enabled;
        self
    }
}

impl EventCodec for ApiGatewayCodec {
    type Event = apigateway::Request;
    type Output = apigateway::Response;

    fn decode(&self, payload: &[u8]) -> Result<Self::Event, DecodeError> {
        Ok(serde_json::from_slice(payload)?)
    }

    fn encode(&self, output: Self::Output) -> Result<Option<Bytes>, RuntimeError> {
        let bytes = output
            .encode(self.encoding)
            .map_err(RuntimeError::handler)?;
        Ok(Some(Bytes::from(bytes)))
    }

    fn recover(&self, _error: &RuntimeError) -> Option<Self::Output> {
        self.internal_error_on_failure
            .then(|| apigateway::Response::new(StatusCode::INTERNAL_SERVER_ERROR))
    }
}

/// ALB target group requests and responses
#[derive(Debug, Clone, Copy, Default)]
pub struct AlbCodec {
    pub encoding: ResponseEncoding,
    /// Answer `500 Internal Server Error` when the typed handler fails
    pub internal_error_on_failure: bool,
}

impl AlbCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Codec for a target group with multi-value headers enabled
    pub fn multi_value_headers() -> Self {
        Self {
            encoding: ResponseEncoding::multi_value(),
            internal_error_on_failure: false,
        }
    }

    #[must_use]
    pub fn with_internal_error_on_failure(mut self, enabled: bool) -> Self {
        self.internal_error_on_failure = enabled;
        self
    }
}

impl EventCodec for AlbCodec {
    type Event = alb::TargetGroupRequest;
    type Output = alb::TargetGroupResponse;

    fn decode(&self, payload: &[u8]) -> Result<Self::Event, DecodeError> {
        Ok(serde_json::from_slice(payload)?)
    }

    fn encode(&self, output: Self::Output) -> Result<Option<Bytes>, RuntimeError> {
        let bytes = output
            .encode(self.encoding)
            .map_err(RuntimeError::handler)?;
        Ok(Some(Bytes::from(bytes)))
    }

    fn recover(&self, _error: &RuntimeError) -> Option<Self::Output> {
        self.internal_error_on_failure
            .then(|| alb::TargetGroupResponse::new(StatusCode::INTERNAL_SERVER_ERROR))
    }
}

/// Wrap a typed handler with `codec`
pub fn adapt<C, F, Fut, Error>(codec: C, handler: F) -> Handler
where
    C: EventCodec,
    F: Fn(C::Event, Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<C::Output, Error>> + Send + 'static,
    Error: Into<BoxError>,
{
    let codec = Arc::new(codec);
    let handler = Arc::new(handler);

    Arc::new(move |payload: Bytes, ctx: Context| {
        let codec = Arc::clone(&codec);
        let handler = Arc::clone(&handler);

        async move {
            let event = match codec.decode(&payload) {
                Ok(event) => event,
                Err(err) => {
                    warn!(error = %err, "Failed to decode invocation payload");
                    return Err(RuntimeError::Decode(err));
                }
            };

            match handler(event, ctx).await {
                Ok(output) => codec.encode(output),
                Err(err) => {
                    let err = RuntimeError::handler(err);
                    match codec.recover(&err) {
                        Some(fallback) => {
                            error!(error = %err, "Unhandled error, responding with HTTP 500");
                            codec.encode(fallback)
                        }
                        None => Err(err),
                    }
                }
            }
        }
        .boxed()
    })
}

/// JSON event in, JSON result out
pub fn codable<E, O, F, Fut, Error>(handler: F) -> Handler
where
    E: DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
    F: Fn(E, Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, Error>> + Send + 'static,
    Error: Into<BoxError>,
{
    adapt(JsonCodec::<E, O>::new(), handler)
}

/// JSON event in, empty response out
pub fn codable_no_result<E, F, Fut, Error>(handler: F) -> Handler
where
    E: DeserializeOwned + Send + 'static,
    F: Fn(E, Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
    Error: Into<BoxError>,
{
    adapt(
        JsonEventCodec::<E> {
            _marker: PhantomData,
        },
        handler,
    )
}

/// JSON in and out for a synchronous handler
///
/// The handler runs on the blocking pool so the loop's scheduler stays free.
/// Its result comes back over a oneshot channel.
pub fn codable_blocking<E, O, F, Error>(handler: F) -> Handler
where
    E: DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
    F: Fn(E, Context) -> Result<O, Error> + Send + Sync + 'static,
    Error: Into<BoxError> + Send + 'static,
{
    let handler = Arc::new(handler);

    codable(move |event: E, ctx: Context| {
        let handler = Arc::clone(&handler);
        let span = ctx.span().clone();
        let runtime = ctx.runtime_handle().clone();
        let (tx, rx) = oneshot::channel::<Result<O, BoxError>>();

        runtime.spawn_blocking(move || {
            let _entered = span.enter();
            let _ = tx.send(handler(event, ctx).map_err(Into::into));
        });

        async move {
            rx.await
                .unwrap_or_else(|_| Err(BoxError::from("blocking handler did not complete")))
        }
    })
}
