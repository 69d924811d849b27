//! DynamoDB stream events and the `AttributeValue` tagged union

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use rustlambda_core::timestamp::epoch_seconds_option;
use rustlambda_core::{AwsNumber, DecodeError};
use serde::de::{self, IgnoredAny, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// DynamoDB item representation
pub type Item = HashMap<String, AttributeValue>;

/// A DynamoDB attribute value
///
/// On the wire this is an object with exactly one discriminant key
/// (`B`, `BOOL`, `BS`, `L`, `M`, `N`, `NS`, `NULL`, `S`, `SS`). Binary data
/// travels as base64 text.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Boolean(bool),
    Binary(Vec<u8>),
    BinarySet(Vec<Vec<u8>>),
    String(String),
    StringSet(Vec<String>),
    Null,
    Number(AwsNumber),
    NumberSet(Vec<AwsNumber>),
    List(Vec<AttributeValue>),
    Map(HashMap<String, AttributeValue>),
}

impl AttributeValue {
    pub fn string(s: impl Into<String>) -> Self {
        AttributeValue::String(s.into())
    }

    pub fn number(n: impl Into<AwsNumber>) -> Self {
        AttributeValue::Number(n.into())
    }

    /// Get the string value if this is an S type
    pub fn as_string(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the number if this is an N type
    pub fn as_number(&self) -> Option<&AwsNumber> {
        match self {
            AttributeValue::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<String, AttributeValue>> {
        match self {
            AttributeValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// The wire discriminant for this value
    pub fn type_key(&self) -> &'static str {
        match self {
            AttributeValue::Boolean(_) => "BOOL",
            AttributeValue::Binary(_) => "B",
            AttributeValue::BinarySet(_) => "BS",
            AttributeValue::String(_) => "S",
            AttributeValue::StringSet(_) => "SS",
            AttributeValue::Null => "NULL",
            AttributeValue::Number(_) => "N",
            AttributeValue::NumberSet(_) => "NS",
            AttributeValue::List(_) => "L",
            AttributeValue::Map(_) => "M",
        }
    }
}

impl Serialize for AttributeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        let key = self.type_key();
        match self {
            AttributeValue::Boolean(b) => map.serialize_entry(key, b)?,
            AttributeValue::Binary(bytes) => map.serialize_entry(key, &STANDARD.encode(bytes))?,
            AttributeValue::BinarySet(set) => {
                let encoded: Vec<String> = set.iter().map(|b| STANDARD.encode(b)).collect();
                map.serialize_entry(key, &encoded)?;
            }
            AttributeValue::String(s) => map.serialize_entry(key, s)?,
            AttributeValue::StringSet(set) => map.serialize_entry(key, set)?,
            AttributeValue::Null => map.serialize_entry(key, &true)?,
            AttributeValue::Number(n) => map.serialize_entry(key, n)?,
            AttributeValue::NumberSet(set) => map.serialize_entry(key, set)?,
            AttributeValue::List(list) => map.serialize_entry(key, list)?,
            AttributeValue::Map(m) => map.serialize_entry(key, m)?,
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for AttributeValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(AttributeValueVisitor)
    }
}

struct AttributeValueVisitor;

impl<'de> Visitor<'de> for AttributeValueVisitor {
    type Value = AttributeValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an object with exactly one of B, BOOL, BS, L, M, N, NS, NULL, S, SS")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut value = None;
        let mut found = 0;

        while let Some(key) = map.next_key::<String>()? {
            let decoded = match key.as_str() {
                "B" => AttributeValue::Binary(decode_binary::<A::Error>(
                    &map.next_value::<String>()?,
                )?),
                "BOOL" => AttributeValue::Boolean(map.next_value()?),
                "BS" => AttributeValue::BinarySet(
                    map.next_value::<Vec<String>>()?
                        .iter()
                        .map(|s| decode_binary::<A::Error>(s))
                        .collect::<Result<_, _>>()?,
                ),
                "L" => AttributeValue::List(map.next_value()?),
                "M" => AttributeValue::Map(map.next_value()?),
                "N" => AttributeValue::Number(map.next_value()?),
                "NS" => AttributeValue::NumberSet(map.next_value()?),
                "NULL" => {
                    map.next_value::<IgnoredAny>()?;
                    AttributeValue::Null
                }
                "S" => AttributeValue::String(map.next_value()?),
                "SS" => AttributeValue::StringSet(map.next_value()?),
                _ => {
                    map.next_value::<IgnoredAny>()?;
                    continue;
                }
            };

            found += 1;
            value.get_or_insert(decoded);
        }

        match value {
            Some(value) if found == 1 => Ok(value),
            _ => Err(de::Error::custom(DecodeError::ExpectedOneDiscriminant {
                found,
            })),
        }
    }
}

fn decode_binary<E: de::Error>(text: &str) -> Result<Vec<u8>, E> {
    STANDARD
        .decode(text)
        .map_err(|e| E::custom(DecodeError::InvalidBase64(e)))
}

/// A batch of stream records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "Records")]
    pub records: Vec<EventRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    #[serde(rename = "eventID")]
    pub event_id: String,
    pub event_name: OperationType,
    pub event_version: String,
    pub event_source: String,
    pub aws_region: String,
    pub dynamodb: StreamRecord,
    #[serde(rename = "eventSourceARN")]
    pub event_source_arn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_identity: Option<UserIdentity>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationType {
    Insert,
    Modify,
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamViewType {
    KeysOnly,
    NewImage,
    OldImage,
    NewAndOldImages,
}

/// The `dynamodb` section of a stream record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StreamRecord {
    #[serde(
        default,
        with = "epoch_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub approximate_creation_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub keys: Item,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_image: Option<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_image: Option<Item>,
    pub sequence_number: String,
    pub size_bytes: i64,
    pub stream_view_type: StreamViewType,
}

/// Present when a record was removed by TTL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    #[serde(rename = "type")]
    pub identity_type: String,
    pub principal_id: String,
}
