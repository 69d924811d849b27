//! SNS notification events

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use rustlambda_core::timestamp::milliseconds;
use rustlambda_core::DecodeError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::body::DecodableBody;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "Records")]
    pub records: Vec<Record>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Record {
    pub event_version: String,
    pub event_subscription_arn: String,
    pub event_source: String,
    pub sns: Message,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Message {
    #[serde(rename = "Type")]
    pub message_type: String,
    pub message_id: String,
    pub topic_arn: String,
    #[serde(default)]
    pub subject: Option<String>,
    pub message: String,
    #[serde(with = "milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub signature_version: String,
    pub signature: String,
    pub signing_cert_url: String,
    pub unsubscribe_url: String,
    #[serde(default)]
    pub message_attributes: HashMap<String, MessageAttribute>,
}

impl DecodableBody for Message {
    fn body(&self) -> Option<&str> {
        Some(&self.message)
    }
}

/// A message attribute, discriminated on the wire by `Type`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawAttribute", into = "RawAttribute")]
pub enum MessageAttribute {
    String(String),
    Binary(Vec<u8>),
}

#[derive(Serialize, Deserialize)]
struct RawAttribute {
    #[serde(rename = "Type")]
    data_type: String,
    #[serde(rename = "Value")]
    value: String,
}

impl TryFrom<RawAttribute> for MessageAttribute {
    type Error = DecodeError;

    fn try_from(raw: RawAttribute) -> Result<Self, Self::Error> {
        match raw.data_type.as_str() {
            "String" => Ok(Self::String(raw.value)),
            "Binary" => Ok(Self::Binary(STANDARD.decode(raw.value)?)),
            _ => Err(DecodeError::UnexpectedDataType {
                key: "Type",
                value: raw.data_type,
                expected: "String or Binary",
            }),
        }
    }
}

impl From<MessageAttribute> for RawAttribute {
    fn from(attribute: MessageAttribute) -> Self {
        match attribute {
            MessageAttribute::String(value) => Self {
                data_type: "String".to_string(),
                value,
            },
            MessageAttribute::Binary(value) => Self {
                data_type: "Binary".to_string(),
                value: STANDARD.encode(value),
            },
        }
    }
}
