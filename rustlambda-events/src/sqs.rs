//! SQS queue events

use base64::{engine::general_purpose::STANDARD, Engine as _};
use md5::{Digest, Md5};
use rustlambda_core::{AwsNumber, DecodeError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::body::DecodableBody;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "Records")]
    pub records: Vec<Message>,
}

/// A single queue message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub message_id: String,
    pub receipt_handle: String,
    pub body: String,
    pub md5_of_body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5_of_message_attributes: Option<String>,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    #[serde(default)]
    pub message_attributes: HashMap<String, MessageAttribute>,
    pub event_source: String,
    #[serde(rename = "eventSourceARN")]
    pub event_source_arn: String,
    pub aws_region: String,
}

impl Message {
    /// Check `md5OfBody` against the body actually received
    pub fn verify_md5_of_body(&self) -> bool {
        let digest = Md5::digest(self.body.as_bytes());
        format!("{digest:x}").eq_ignore_ascii_case(&self.md5_of_body)
    }
}

impl DecodableBody for Message {
    fn body(&self) -> Option<&str> {
        Some(&self.body)
    }
}

/// A message attribute, discriminated on the wire by `dataType`
///
/// Custom types such as `Number.float` are classified by their base type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAttribute", into = "RawAttribute")]
pub enum MessageAttribute {
    String(String),
    Binary(Vec<u8>),
    Number(AwsNumber),
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAttribute {
    data_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    string_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    binary_value: Option<String>,
}

impl TryFrom<RawAttribute> for MessageAttribute {
    type Error = DecodeError;

    fn try_from(raw: RawAttribute) -> Result<Self, Self::Error> {
        let base_type = raw.data_type.split('.').next().unwrap_or_default();
        match (base_type, raw.string_value, raw.binary_value) {
            ("String", Some(value), _) => Ok(Self::String(value)),
            ("Number", Some(value), _) => Ok(Self::Number(AwsNumber::new(value))),
            ("Binary", _, Some(value)) => Ok(Self::Binary(STANDARD.decode(value)?)),
            _ => Err(DecodeError::UnexpectedDataType {
                key: "dataType",
                value: raw.data_type,
                expected: "String, Number or Binary with a matching value",
            }),
        }
    }
}

impl From<MessageAttribute> for RawAttribute {
    fn from(attribute: MessageAttribute) -> Self {
        match attribute {
            MessageAttribute::String(value) => Self {
                data_type: "String".to_string(),
                string_value: Some(value),
                binary_value: None,
            },
            MessageAttribute::Number(value) => Self {
                data_type: "Number".to_string(),
                string_value: Some(value.into_string()),
                binary_value: None,
            },
            MessageAttribute::Binary(value) => Self {
                data_type: "Binary".to_string(),
                string_value: None,
                binary_value: Some(STANDARD.encode(value)),
            },
        }
    }
}
