//! String-preserving number used by DynamoDB and SQS payloads

use serde::{Deserialize, Serialize};
use std::fmt;

/// A decimal or integer carried on the wire as a JSON string
///
/// Equality compares the original text, so `"1.0"` and `"1"` differ.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AwsNumber(String);

impl AwsNumber {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn from_i64(value: i64) -> Self {
        Self(value.to_string())
    }

    pub fn from_f64(value: f64) -> Self {
        Self(value.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Integer view, `None` for decimals or out-of-range values
    pub fn as_i64(&self) -> Option<i64> {
        self.0.parse().ok()
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.0.parse().ok()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for AwsNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for AwsNumber {
    fn from(value: i64) -> Self {
        Self::from_i64(value)
    }
}

impl From<f64> for AwsNumber {
    fn from(value: f64) -> Self {
        Self::from_f64(value)
    }
}
