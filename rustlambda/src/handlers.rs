//! Event source handlers served by the binary
//!
//! Each handler is selected by the part of `_HANDLER` after the first `.`,
//! e.g. `EventSources.sqs`.

use http::StatusCode;
use rustlambda_events::{alb, apigateway, cloudwatch, dynamodb, s3, sns, sqs, DecodableBody};
use rustlambda_runtime::{
    adapt, codable_no_result, handler_fn, log_payload, AlbCodec, ApiGatewayCodec, BoxError,
    Context, HandlerRegistry,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Body published to the SNS topic
#[derive(Debug, Deserialize)]
pub struct Notification {
    pub name: String,
    #[serde(default)]
    pub detail: Option<String>,
}

/// Echoed back by the HTTP handlers
#[derive(Debug, Serialize)]
struct RouteInfo<'a> {
    path: &'a str,
    method: &'a str,
}

pub async fn handle_sns(event: sns::Event, ctx: Context) -> Result<(), BoxError> {
    let record = event
        .records
        .first()
        .ok_or("SNS event contains no records")?;
    let notification: Notification = record.sns.decode_body()?;

    ctx.span().in_scope(|| {
        info!(
            message_id = %record.sns.message_id,
            name = %notification.name,
            detail = ?notification.detail,
            "Received notification"
        );
    });
    Ok(())
}

pub async fn handle_sqs(event: sqs::Event, ctx: Context) -> Result<(), BoxError> {
    ctx.span().in_scope(|| {
        for message in &event.records {
            if !message.verify_md5_of_body() {
                warn!(message_id = %message.message_id, "Body does not match md5OfBody");
            }
        }
        info!(messages = event.records.len(), "Payload: {:?}", event);
    });
    Ok(())
}

pub async fn handle_dynamo_stream(event: dynamodb::Event, ctx: Context) -> Result<(), BoxError> {
    ctx.span()
        .in_scope(|| info!(records = event.records.len(), "Payload: {:?}", event));
    Ok(())
}

pub async fn handle_schedule(
    event: cloudwatch::Event<cloudwatch::ScheduledEvent>,
    ctx: Context,
) -> Result<(), BoxError> {
    ctx.span().in_scope(|| info!("Payload: {:?}", event));
    Ok(())
}

pub async fn handle_s3(event: s3::Event, ctx: Context) -> Result<(), BoxError> {
    ctx.span().in_scope(|| {
        for record in &event.records {
            info!(
                bucket = %record.s3.bucket.name,
                key = %record.s3.object.decoded_key(),
                event = %record.event_name,
                "Object notification"
            );
        }
    });
    Ok(())
}

pub async fn handle_api_request(
    request: apigateway::Request,
    ctx: Context,
) -> Result<apigateway::Response, BoxError> {
    ctx.span().in_scope(|| info!("Payload: {:?}", request));

    let payload = RouteInfo {
        path: &request.path,
        method: request.http_method.as_str(),
    };
    Ok(apigateway::Response::with_payload(StatusCode::OK, &payload)?)
}

pub async fn handle_load_balancer_request(
    request: alb::TargetGroupRequest,
    ctx: Context,
) -> Result<alb::TargetGroupResponse, BoxError> {
    ctx.span().in_scope(|| info!("Payload: {:?}", request));

    let payload = RouteInfo {
        path: &request.path,
        method: request.http_method.as_str(),
    };
    Ok(alb::TargetGroupResponse::with_payload(StatusCode::OK, &payload)?)
}

/// Every handler the binary serves, each logging its raw payload first
pub fn registry() -> HandlerRegistry {
    HandlerRegistry::new()
        .with("sns", log_payload(codable_no_result(handle_sns)))
        .with("sqs", log_payload(codable_no_result(handle_sqs)))
        .with("dynamo", log_payload(codable_no_result(handle_dynamo_stream)))
        .with("schedule", log_payload(codable_no_result(handle_schedule)))
        .with("s3", log_payload(codable_no_result(handle_s3)))
        .with(
            "api",
            log_payload(adapt(ApiGatewayCodec::new(), handle_api_request)),
        )
        .with(
            "loadbalancer",
            log_payload(adapt(
                AlbCodec::multi_value_headers(),
                handle_load_balancer_request,
            )),
        )
        .with(
            "echo",
            log_payload(handler_fn(|payload, _ctx| async move { Ok(Some(payload)) })),
        )
}
