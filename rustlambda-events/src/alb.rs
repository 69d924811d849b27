//! Application Load Balancer target group integration

use base64::{engine::general_purpose::STANDARD, Engine as _};
use http::{Method, StatusCode};
use rustlambda_core::{DecodeError, MultiValueMap};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::apigateway::parse_method;
use crate::body::DecodableBody;
use crate::response::{EncodedResponse, ResponseEncoding};

/// Request delivered by an ALB target group
///
/// Which header shape arrives depends on whether multi-value headers are
/// enabled on the target group. Both are reconciled into [`MultiValueMap`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawTargetGroupRequest")]
pub struct TargetGroupRequest {
    pub http_method: Method,
    pub path: String,
    pub query_string_parameters: MultiValueMap,
    pub headers: MultiValueMap,
    pub request_context: TargetGroupContext,
    pub is_base64_encoded: bool,
    /// `None` when the load balancer sent an empty body
    pub body: Option<String>,
}

impl DecodableBody for TargetGroupRequest {
    fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    fn is_base64_encoded(&self) -> bool {
        self.is_base64_encoded
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetGroupContext {
    pub elb: ElbContext,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElbContext {
    pub target_group_arn: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTargetGroupRequest {
    http_method: String,
    path: String,
    #[serde(default)]
    query_string_parameters: Option<HashMap<String, String>>,
    #[serde(default)]
    multi_value_query_string_parameters: Option<HashMap<String, Vec<String>>>,
    #[serde(default)]
    headers: Option<HashMap<String, String>>,
    #[serde(default)]
    multi_value_headers: Option<HashMap<String, Vec<String>>>,
    request_context: TargetGroupContext,
    is_base64_encoded: bool,
    #[serde(default)]
    body: Option<String>,
}

fn missing(key: &'static str) -> DecodeError {
    DecodeError::UnexpectedDataType {
        key,
        value: "null".to_string(),
        expected: "a single or multi value map",
    }
}

impl TryFrom<RawTargetGroupRequest> for TargetGroupRequest {
    type Error = DecodeError;

    fn try_from(raw: RawTargetGroupRequest) -> Result<Self, Self::Error> {
        let query_string_parameters = MultiValueMap::reconcile(
            raw.multi_value_query_string_parameters,
            raw.query_string_parameters,
        )
        .ok_or_else(|| missing("queryStringParameters"))?;
        let headers = MultiValueMap::reconcile(raw.multi_value_headers, raw.headers)
            .ok_or_else(|| missing("headers"))?;

        Ok(Self {
            http_method: parse_method(&raw.http_method)?,
            path: raw.path,
            query_string_parameters,
            headers,
            request_context: raw.request_context,
            is_base64_encoded: raw.is_base64_encoded,
            body: raw.body.filter(|body| !body.is_empty()),
        })
    }
}

/// Response returned to an ALB target group
#[derive(Debug, Clone, PartialEq)]
pub struct TargetGroupResponse {
    pub status_code: StatusCode,
    pub status_description: Option<String>,
    pub headers: MultiValueMap,
    pub body: String,
    pub is_base64_encoded: bool,
}

impl TargetGroupResponse {
    pub fn new(status_code: StatusCode) -> Self {
        Self {
            status_code,
            status_description: None,
            headers: MultiValueMap::new(),
            body: String::new(),
            is_base64_encoded: false,
        }
    }

    /// JSON response, adds `Content-Type: application/json`
    pub fn with_payload<T: Serialize>(
        status_code: StatusCode,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        let mut response = Self::new(status_code);
        response.headers.append("Content-Type", "application/json");
        response.body = serde_json::to_string(payload)?;
        Ok(response)
    }

    /// Arbitrary bytes, sent base64 encoded
    pub fn with_bytes(status_code: StatusCode, bytes: &[u8]) -> Self {
        let mut response = Self::new(status_code);
        response.body = STANDARD.encode(bytes);
        response.is_base64_encoded = true;
        response
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    #[must_use]
    pub fn with_status_description(mut self, description: impl Into<String>) -> Self {
        self.status_description = Some(description.into());
        self
    }

    /// Encode with the header shape the target group is configured for
    pub fn encode(&self, encoding: ResponseEncoding) -> Result<Vec<u8>, serde_json::Error> {
        let mut encoded = EncodedResponse::new(self.status_code.as_u16(), &self.headers, encoding);
        encoded.status_description = self.status_description.as_deref();
        encoded.body = Some(&self.body);
        encoded.is_base64_encoded = self.is_base64_encoded;
        encoded.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn request_json() -> Value {
        json!({
            "requestContext": {
                "elb": {
                    "targetGroupArn": "arn:aws:elasticloadbalancing:us-east-1:123456789012:targetgroup/lambda-target/abc"
                }
            },
            "httpMethod": "POST",
            "path": "/todos",
            "queryStringParameters": {"page": "2"},
            "headers": {"content-type": "application/json", "host": "lb.example.com"},
            "isBase64Encoded": false,
            "body": "{\"hello\":\"world\"}"
        })
    }

    #[test]
    fn test_single_value_request() {
        let request: TargetGroupRequest = serde_json::from_value(request_json()).unwrap();

        assert_eq!(request.http_method, Method::POST);
        assert_eq!(request.query_string_parameters.get_all("page"), ["2"]);
        assert_eq!(request.headers.get("host"), Some("lb.example.com"));
        assert!(request.request_context.elb.target_group_arn.contains("lambda-target"));

        let payload: Value = request.decode_body().unwrap();
        assert_eq!(payload["hello"], "world");
    }

    #[test]
    fn test_multi_value_request() {
        let mut json = request_json();
        let object = json.as_object_mut().unwrap();
        object.remove("queryStringParameters");
        object.remove("headers");
        object.insert(
            "multiValueQueryStringParameters".to_string(),
            json!({"page": ["2", "3"]}),
        );
        object.insert(
            "multiValueHeaders".to_string(),
            json!({"cookie": ["a=1", "b=2"]}),
        );

        let request: TargetGroupRequest = serde_json::from_value(json).unwrap();
        assert_eq!(request.query_string_parameters.get_all("page"), ["2", "3"]);
        assert_eq!(request.headers.get_all("cookie"), ["a=1", "b=2"]);
    }

    #[test]
    fn test_missing_headers_is_decode_fault() {
        let mut json = request_json();
        json.as_object_mut().unwrap().remove("headers");

        let err = serde_json::from_value::<TargetGroupRequest>(json).unwrap_err();
        assert!(err.to_string().contains("data corrupted"));
    }

    #[test]
    fn test_empty_body_is_absent() {
        let mut json = request_json();
        json["body"] = json!("");

        let request: TargetGroupRequest = serde_json::from_value(json).unwrap();
        assert!(request.body.is_none());
        assert!(request.decode_body::<Value>().is_err());
    }

    #[test]
    fn test_encoding_flag_selects_shape() {
        let response = TargetGroupResponse::new(StatusCode::OK)
            .with_header("Set-Cookie", "a=1")
            .with_header("Set-Cookie", "b=2")
            .with_status_description("200 OK");

        let single: Value =
            serde_json::from_slice(&response.encode(ResponseEncoding::single_value()).unwrap())
                .unwrap();
        assert_eq!(single["headers"]["Set-Cookie"], "b=2");
        assert!(single.get("multiValueHeaders").is_none());
        assert_eq!(single["statusDescription"], "200 OK");
        assert_eq!(single["body"], "");

        let multi: Value =
            serde_json::from_slice(&response.encode(ResponseEncoding::multi_value()).unwrap())
                .unwrap();
        assert_eq!(multi["multiValueHeaders"]["Set-Cookie"], json!(["a=1", "b=2"]));
        assert!(multi.get("headers").is_none());
    }

    #[test]
    fn test_no_headers_still_emits_one_shape() {
        let response = TargetGroupResponse::new(StatusCode::NO_CONTENT);
        let encoded: Value =
            serde_json::from_slice(&response.encode(ResponseEncoding::default()).unwrap()).unwrap();

        assert_eq!(encoded["headers"], json!({}));
        assert!(encoded.get("multiValueHeaders").is_none());
    }

    #[test]
    fn test_bytes_response() {
        let response = TargetGroupResponse::with_bytes(StatusCode::OK, b"base64");
        assert_eq!(response.body, "YmFzZTY0");
        assert!(response.is_base64_encoded);
    }
}
