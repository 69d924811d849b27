//! API Gateway proxy integration (REST API, payload format 1.0)

use http::{Method, StatusCode};
use rustlambda_core::{DecodeError, MultiValueMap};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::body::DecodableBody;
use crate::response::{EncodedResponse, ResponseEncoding};

/// API Gateway request with reconciled headers and query parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRequest", into = "RawRequest")]
pub struct Request {
    pub resource: String,
    pub path: String,
    pub http_method: Method,
    pub query_string_parameters: MultiValueMap,
    pub headers: MultiValueMap,
    pub path_parameters: HashMap<String, String>,
    pub stage_variables: HashMap<String, String>,
    pub request_context: RequestContext,
    pub body: Option<String>,
    pub is_base64_encoded: bool,
}

impl DecodableBody for Request {
    fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    fn is_base64_encoded(&self) -> bool {
        self.is_base64_encoded
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    pub resource_id: String,
    pub api_id: String,
    pub resource_path: String,
    pub http_method: String,
    pub request_id: String,
    pub account_id: String,
    pub stage: String,
    pub identity: Identity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended_request_id: Option<String>,
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cognito_identity_pool_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cognito_authentication_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cognito_authentication_provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
}

/// Wire form, either header shape may be present or null
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRequest {
    resource: String,
    path: String,
    http_method: String,
    #[serde(default)]
    query_string_parameters: Option<HashMap<String, String>>,
    #[serde(default)]
    multi_value_query_string_parameters: Option<HashMap<String, Vec<String>>>,
    #[serde(default)]
    headers: Option<HashMap<String, String>>,
    #[serde(default)]
    multi_value_headers: Option<HashMap<String, Vec<String>>>,
    #[serde(default)]
    path_parameters: Option<HashMap<String, String>>,
    #[serde(default)]
    stage_variables: Option<HashMap<String, String>>,
    request_context: RequestContext,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    is_base64_encoded: bool,
}

pub(crate) fn parse_method(method: &str) -> Result<Method, DecodeError> {
    Method::from_bytes(method.as_bytes())
        .map_err(|_| DecodeError::InvalidHttpMethod(method.to_string()))
}

impl TryFrom<RawRequest> for Request {
    type Error = DecodeError;

    fn try_from(raw: RawRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            http_method: parse_method(&raw.http_method)?,
            resource: raw.resource,
            path: raw.path,
            query_string_parameters: MultiValueMap::reconcile(
                raw.multi_value_query_string_parameters,
                raw.query_string_parameters,
            )
            .unwrap_or_default(),
            headers: MultiValueMap::reconcile(raw.multi_value_headers, raw.headers)
                .unwrap_or_default(),
            path_parameters: raw.path_parameters.unwrap_or_default(),
            stage_variables: raw.stage_variables.unwrap_or_default(),
            request_context: raw.request_context,
            body: raw.body,
            is_base64_encoded: raw.is_base64_encoded,
        })
    }
}

impl From<Request> for RawRequest {
    fn from(request: Request) -> Self {
        Self {
            resource: request.resource,
            path: request.path,
            http_method: request.http_method.to_string(),
            query_string_parameters: Some(
                request.query_string_parameters.to_single_value().into_iter().collect(),
            ),
            multi_value_query_string_parameters: Some(
                request.query_string_parameters.to_multi_value().into_iter().collect(),
            ),
            headers: Some(request.headers.to_single_value().into_iter().collect()),
            multi_value_headers: Some(request.headers.to_multi_value().into_iter().collect()),
            path_parameters: Some(request.path_parameters),
            stage_variables: Some(request.stage_variables),
            request_context: request.request_context,
            body: request.body,
            is_base64_encoded: request.is_base64_encoded,
        }
    }
}

/// API Gateway proxy response
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status_code: StatusCode,
    pub headers: MultiValueMap,
    pub body: Option<String>,
    pub is_base64_encoded: bool,
}

impl Response {
    pub fn new(status_code: StatusCode) -> Self {
        Self {
            status_code,
            headers: MultiValueMap::new(),
            body: None,
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
        response.body = Some(serde_json::to_string(payload)?);
        Ok(response)
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Encode to the JSON document API Gateway expects
    pub fn encode(&self, encoding: ResponseEncoding) -> Result<Vec<u8>, serde_json::Error> {
        let mut encoded = EncodedResponse::new(self.status_code.as_u16(), &self.headers, encoding);
        encoded.body = self.body.as_deref();
        encoded.is_base64_encoded = self.is_base64_encoded;
        encoded.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn request_json(query: Value) -> Value {
        let mut request = json!({
            "resource": "/todos/{id}",
            "path": "/todos/1",
            "httpMethod": "GET",
            "headers": {"Accept": "application/json"},
            "pathParameters": {"id": "1"},
            "stageVariables": null,
            "requestContext": {
                "resourceId": "abc123",
                "apiId": "api123",
                "resourcePath": "/todos/{id}",
                "httpMethod": "GET",
                "requestId": "req-123",
                "accountId": "123456789012",
                "stage": "prod",
                "identity": {"sourceIp": "127.0.0.1", "userAgent": "curl/7.64.1"},
                "path": "/prod/todos/1"
            },
            "body": null,
            "isBase64Encoded": false
        });
        if let (Some(target), Some(extra)) = (request.as_object_mut(), query.as_object()) {
            target.extend(extra.clone());
        }
        request
    }

    #[test]
    fn test_multi_value_query() {
        let json = request_json(json!({"multiValueQueryStringParameters": {"a": ["1", "2"]}}));
        let request: Request = serde_json::from_value(json).unwrap();

        assert_eq!(request.query_string_parameters.get_all("a"), ["1", "2"]);
        assert_eq!(request.http_method, Method::GET);
        assert_eq!(request.headers.get("Accept"), Some("application/json"));
        assert_eq!(request.path_parameters["id"], "1");
        assert!(request.stage_variables.is_empty());
        assert_eq!(request.request_context.identity.source_ip.as_deref(), Some("127.0.0.1"));
    }

    #[test]
    fn test_single_and_multi_query_converge() {
        let single: Request =
            serde_json::from_value(request_json(json!({"queryStringParameters": {"a": "1"}})))
                .unwrap();
        let multi: Request = serde_json::from_value(request_json(
            json!({"multiValueQueryStringParameters": {"a": ["1"]}}),
        ))
        .unwrap();

        assert_eq!(single.query_string_parameters.get_all("a"), ["1"]);
        assert_eq!(single.query_string_parameters, multi.query_string_parameters);
    }

    #[test]
    fn test_missing_query_is_empty() {
        let request: Request = serde_json::from_value(request_json(json!({}))).unwrap();
        assert!(request.query_string_parameters.is_empty());
    }

    #[test]
    fn test_invalid_method() {
        let mut json = request_json(json!({}));
        json["httpMethod"] = json!("GE T");
        let err = serde_json::from_value::<Request>(json).unwrap_err();
        assert!(err.to_string().contains("invalid HTTP method"));
    }

    #[test]
    fn test_base64_body() {
        let mut json = request_json(json!({}));
        json["body"] = json!("eyJoZWxsbyI6IndvcmxkIn0=");
        json["isBase64Encoded"] = json!(true);
        let request: Request = serde_json::from_value(json).unwrap();

        let payload: Value = request.decode_body().unwrap();
        assert_eq!(payload, json!({"hello": "world"}));
    }

    #[test]
    fn test_single_value_encoding() {
        let response = Response::with_payload(StatusCode::OK, &json!({"ok": true})).unwrap();
        let encoded: Value =
            serde_json::from_slice(&response.encode(ResponseEncoding::default()).unwrap()).unwrap();

        assert_eq!(encoded["statusCode"], 200);
        assert_eq!(encoded["headers"]["Content-Type"], "application/json");
        assert!(encoded.get("multiValueHeaders").is_none());
        assert_eq!(encoded["body"], r#"{"ok":true}"#);
    }

    #[test]
    fn test_multi_value_encoding() {
        let response = Response::new(StatusCode::CREATED)
            .with_header("Set-Cookie", "a=1")
            .with_header("Set-Cookie", "b=2");
        let encoded: Value =
            serde_json::from_slice(&response.encode(ResponseEncoding::multi_value()).unwrap())
                .unwrap();

        assert_eq!(encoded["statusCode"], 201);
        assert_eq!(encoded["multiValueHeaders"]["Set-Cookie"], json!(["a=1", "b=2"]));
        assert!(encoded.get("headers").is_none());
        assert!(encoded.get("body").is_none());
    }

    #[test]
    fn test_request_re_encodes() {
        let json = request_json(json!({"multiValueQueryStringParameters": {"a": ["1", "2"]}}));
        let request: Request = serde_json::from_value(json).unwrap();

        let encoded = serde_json::to_value(&request).unwrap();
        let decoded: Request = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, request);
    }
}
