//! Wire shape shared by API Gateway and ALB responses

use rustlambda_core::MultiValueMap;
use serde::Serialize;
use std::collections::BTreeMap;

/// Response header shape selection for HTTP-style responses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResponseEncoding {
    /// Emit `multiValueHeaders` instead of `headers`
    pub multi_value_headers_enabled: bool,
}

impl ResponseEncoding {
    pub fn single_value() -> Self {
        Self::default()
    }

    pub fn multi_value() -> Self {
        Self {
            multi_value_headers_enabled: true,
        }
    }
}

/// Exactly one of `headers` / `multiValueHeaders` is populated
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EncodedResponse<'a> {
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multi_value_headers: Option<BTreeMap<String, Vec<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<&'a str>,
    pub is_base64_encoded: bool,
}

impl<'a> EncodedResponse<'a> {
    pub fn new(status_code: u16, headers: &MultiValueMap, encoding: ResponseEncoding) -> Self {
        let (headers, multi_value_headers) = if encoding.multi_value_headers_enabled {
            (None, Some(headers.to_multi_value()))
        } else {
            (Some(headers.to_single_value()), None)
        };

        Self {
            status_code,
            status_description: None,
            headers,
            multi_value_headers,
            body: None,
            is_base64_encoded: false,
        }
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
