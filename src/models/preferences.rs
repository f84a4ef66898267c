//! Per-user notification preferences.

use serde::{Deserialize, Serialize};

use super::alert::AlertPriority;

/// Per-user toggles consulted before any push is sent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPreferences {
    /// Master switch.
    pub alerts_enabled: bool,
    /// High priority alerts.
    pub high_priority_enabled: bool,
    /// Mid priority alerts.
    pub mid_priority_enabled: bool,
    /// Low priority alerts.
    pub low_priority_enabled: bool,
}

impl Default for NotificationPreferences {
    /// A user without stored preferences receives everything.
    fn default() -> Self {
        Self {
            alerts_enabled: true,
            high_priority_enabled: true,
            mid_priority_enabled: true,
            low_priority_enabled: true,
        }
    }
}

impl NotificationPreferences {
    /// Whether an alert of `priority` may be pushed to this user.
    pub fn allows(&self, priority: AlertPriority) -> bool {
        if !self.alerts_enabled {
            return false;
        }
        match priority {
            AlertPriority::High => self.high_priority_enabled,
            AlertPriority::Mid => self.mid_priority_enabled,
            AlertPriority::Low => self.low_priority_enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_allow_every_priority() {
        let prefs = NotificationPreferences::default();
        for p in AlertPriority::ALL {
            assert!(prefs.allows(p));
        }
    }

    #[test]
    fn test_master_switch_overrides_tiers() {
        let prefs = NotificationPreferences { alerts_enabled: false, ..Default::default() };
        assert!(!prefs.allows(AlertPriority::High));
    }

    #[test]
    fn test_tier_switch() {
        let prefs = NotificationPreferences { mid_priority_enabled: false, ..Default::default() };
        assert!(prefs.allows(AlertPriority::High));
        assert!(!prefs.allows(AlertPriority::Mid));
        assert!(prefs.allows(AlertPriority::Low));
    }
}
