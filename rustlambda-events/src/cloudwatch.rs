//! CloudWatch (EventBridge) events

use chrono::{DateTime, Utc};
use rustlambda_core::timestamp::seconds;
use serde::{Deserialize, Serialize};

/// An event with a source-specific `detail` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event<Detail> {
    pub id: String,
    #[serde(rename = "detail-type")]
    pub detail_type: String,
    pub source: String,
    #[serde(rename = "account")]
    pub account_id: String,
    #[serde(with = "seconds")]
    pub time: DateTime<Utc>,
    pub region: String,
    #[serde(default)]
    pub resources: Vec<String>,
    pub detail: Detail,
}

/// The empty `detail` of a scheduled rule
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledEvent {}
