//! Data models for push notifications.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Rendered title and body of a notification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct NotificationMessage {
    /// Short title.
    pub title: String,
    /// Body text.
    pub body: String,
}

/// A registered push token for a user's device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceToken {
    /// Owner of the device.
    pub user_id: i64,
    /// Opaque gateway token.
    pub token: String,
    /// `ios`, `android`, ... when known.
    pub platform: Option<String>,
}

/// A message addressed to a single device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PushMessage {
    /// Destination device token.
    pub token: String,
    /// Rendered content.
    pub message: NotificationMessage,
    /// String key/value pairs delivered alongside the notification.
    pub data: BTreeMap<String, String>,
}
