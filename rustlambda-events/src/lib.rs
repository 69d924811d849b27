//! Trigger event envelopes
//!
//! Decoders for the JSON payloads AWS services hand to a function, and
//! encoders for the HTTP-style responses API Gateway and ALB expect back.

pub mod alb;
pub mod apigateway;
pub mod body;
pub mod cloudwatch;
pub mod dynamodb;
pub mod iot;
mod response;
pub mod s3;
pub mod sns;
pub mod sqs;

pub use body::DecodableBody;
pub use response::ResponseEncoding;
