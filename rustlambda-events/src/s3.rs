//! S3 bucket notification events

use chrono::{DateTime, Utc};
use percent_encoding::percent_decode_str;
use rustlambda_core::timestamp::milliseconds;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "Records")]
    pub records: Vec<Record>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub event_version: String,
    pub event_source: String,
    pub aws_region: String,
    #[serde(with = "milliseconds")]
    pub event_time: DateTime<Utc>,
    pub event_name: String,
    pub user_identity: UserIdentity,
    pub request_parameters: RequestParameters,
    #[serde(default)]
    pub response_elements: HashMap<String, String>,
    pub s3: Entity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestParameters {
    #[serde(rename = "sourceIPAddress")]
    pub source_ip_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub principal_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub configuration_id: String,
    #[serde(rename = "s3SchemaVersion")]
    pub schema_version: String,
    pub bucket: Bucket,
    pub object: Object,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub name: String,
    pub owner_identity: UserIdentity,
    pub arn: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Object {
    /// URL-encoded object key, `+` standing for a space
    pub key: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_decoded_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
    #[serde(default)]
    pub e_tag: String,
    pub sequencer: String,
}

impl Object {
    /// The object key as stored in the bucket
    pub fn decoded_key(&self) -> String {
        if let Some(key) = &self.url_decoded_key {
            return key.clone();
        }

        let plus_decoded = self.key.replace('+', " ");
        percent_decode_str(&plus_decoded)
            .decode_utf8_lossy()
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVENT_PAYLOAD: &str = r#"{
      "Records": [
        {
          "eventVersion": "2.1",
          "eventSource": "aws:s3",
          "awsRegion": "eu-central-1",
          "eventTime": "2020-01-13T09:25:40.621Z",
          "eventName": "ObjectCreated:Put",
          "userIdentity": {"principalId": "AWS:AAAAAAAJ2MQ4YFQZ7AULJ"},
          "requestParameters": {"sourceIPAddress": "123.123.123.123"},
          "responseElements": {
            "x-amz-request-id": "01AFA1430E18C358",
            "x-amz-id-2": "JsbNw6sHGFwgzguQjbYcew//bfAeZITyTYLfjuu1U4QYqCq5CPlSyYLtvWQS+gw0RxcroItGwm8="
          },
          "s3": {
            "s3SchemaVersion": "1.0",
            "configurationId": "98b55bc4-3c0c-4007-b727-c6b77a259dde",
            "bucket": {
              "name": "eventsources",
              "ownerIdentity": {"principalId": "AAAAAAAAAAAAAA"},
              "arn": "arn:aws:s3:::eventsources"
            },
            "object": {
              "key": "Hi+there%21.txt",
              "size": 2205,
              "eTag": "ba4b6c7e1f1c9e1e3b9c1b1a1f1e1d1c",
              "sequencer": "005E1C37948E783A6E"
            }
          }
        }
      ]
    }"#;

    #[test]
    fn test_event_from_json() {
        let event: Event = serde_json::from_str(EVENT_PAYLOAD).unwrap();
        let record = &event.records[0];

        assert_eq!(record.event_name, "ObjectCreated:Put");
        assert_eq!(record.event_time.timestamp_millis(), 1_578_907_540_621);
        assert_eq!(record.request_parameters.source_ip_address, "123.123.123.123");
        assert_eq!(record.response_elements.len(), 2);
        assert_eq!(record.s3.schema_version, "1.0");
        assert_eq!(record.s3.bucket.name, "eventsources");
        assert_eq!(record.s3.object.size, 2205);
        assert_eq!(record.s3.object.decoded_key(), "Hi there!.txt");
    }

    #[test]
    fn test_missing_response_elements() {
        let payload = EVENT_PAYLOAD.replace("\"responseElements\"", "\"ignored\"");
        let event: Event = serde_json::from_str(&payload).unwrap();
        assert!(event.records[0].response_elements.is_empty());
    }

    #[test]
    fn test_explicit_decoded_key() {
        let object = Object {
            key: "a%2Bb".to_string(),
            size: 0,
            url_decoded_key: Some("a+b".to_string()),
            version_id: None,
            e_tag: String::new(),
            sequencer: String::new(),
        };
        assert_eq!(object.decoded_key(), "a+b");
    }
}
