//! Hit model sent to analytics sinks
//!
//! A hit is either a structured event (category/action/label/value plus the
//! region dimension) or a screen view. Each tracker wraps the hit in a
//! `HitPayload` carrying its own tracking id before handing it to transport.

use crate::domain::category::EventCategory;
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Generate a new UUIDv7 (time-sortable)
pub fn new_uuid_v7() -> String {
    Uuid::now_v7().to_string()
}

/// Get current epoch milliseconds
#[inline]
pub fn epoch_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

/// Structured event, built once per dispatch and shared by all trackers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    pub category: EventCategory,
    pub action: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<i64>,
    /// Custom dimension 1
    pub region: String,
}

impl EventRecord {
    pub fn new(
        category: EventCategory,
        action: impl Into<String>,
        label: impl Into<String>,
        value: Option<i64>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            category,
            action: action.into(),
            label: label.into(),
            value,
            region: region.into(),
        }
    }
}

/// What a tracker sends
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum Hit {
    Event(EventRecord),
    #[serde(rename = "screenview")]
    ScreenView { screen_name: String },
}

impl Hit {
    #[inline]
    pub fn kind(&self) -> &'static str {
        match self {
            Hit::Event(_) => "event",
            Hit::ScreenView { .. } => "screenview",
        }
    }
}

/// Hit as delivered to a transport
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HitPayload {
    /// Tracking id of the sending tracker
    pub tid: String,
    /// Unique hit id (UUIDv7)
    pub hid: String,
    /// Timestamp (epoch ms)
    pub ts: u64,
    /// Screen active on the tracker when the hit was sent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screen: Option<String>,
    #[serde(flatten)]
    pub hit: Hit,
}

impl HitPayload {
    pub fn new(tid: &str, screen: Option<String>, hit: Hit) -> Self {
        Self { tid: tid.to_string(), hid: new_uuid_v7(), ts: epoch_ms(), screen, hit }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
