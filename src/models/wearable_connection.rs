//! Stored OAuth credentials for a patient's wearable account.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A patient's wearable OAuth connection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WearableConnection {
    /// The owning patient.
    pub patient_id: i64,
    /// Current bearer token.
    pub access_token: String,
    /// Token used to obtain a new access token.
    pub refresh_token: Option<String>,
    /// Expiry of `access_token`, if the vendor reported one.
    pub expires_at: Option<DateTime<Utc>>,
    /// Usually `bearer`.
    pub token_type: Option<String>,
    /// Granted scopes.
    pub scope: Option<String>,
}

impl WearableConnection {
    /// Whether the access token expires within `margin` of `now`.
    pub fn expires_within(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at - margin <= now,
            None => false,
        }
    }
}

/// Tokens returned by a successful refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedTokens {
    /// New access token.
    pub access_token: String,
    /// New refresh token; the previous one is kept when absent.
    pub refresh_token: Option<String>,
    /// New expiry.
    pub expires_at: Option<DateTime<Utc>>,
}
