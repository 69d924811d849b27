//! AWS IoT button events

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonEvent {
    pub serial_number: String,
    pub click_type: String,
    pub battery_voltage: String,
}
