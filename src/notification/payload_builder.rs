//! Construction of the JSON body posted to the push gateway.

use serde_json::{Value, json};

use crate::models::PushMessage;

/// Android notification channel alerts are delivered on.
pub const ANDROID_CHANNEL_ID: &str = "alerts";

/// Builds the gateway payload for a single device.
///
/// Android deliveries are sent with high priority on the `alerts` channel;
/// iOS deliveries play the default sound and set the badge to one.
pub fn build_push_payload(message: &PushMessage) -> Value {
    json!({
        "token": message.token,
        "notification": {
            "title": message.message.title,
            "body": message.message.body,
        },
        "data": message.data,
        "android": {
            "priority": "high",
            "notification": {
                "channel_id": ANDROID_CHANNEL_ID,
                "sound": "default",
                "priority": "high",
            },
        },
        "apns": {
            "payload": {
                "aps": {
                    "sound": "default",
                    "badge": 1,
                },
            },
        },
    })
}
