//! Override change events
//!
//! Stores publish one event per effective change: setting an override (even to the
//! same value) publishes `OverrideSet`, removing an existing override publishes
//! `OverrideCleared`, removing a missing one publishes nothing.
//! Subscribers use [`OverrideEvent::affects`] to ignore changes to other coordinates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Store-level override change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum OverrideEvent {
    /// Override created or replaced
    OverrideSet(OverrideSetEvent),
    /// Override removed
    OverrideCleared(OverrideClearedEvent),
}

/// Event data for a stored override
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideSetEvent {
    pub application_name: String,
    pub setting_name: String,
    pub value: String,
    pub tier: String,
    /// `None` targets every data center
    pub data_center: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Event data for a removed override
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideClearedEvent {
    pub application_name: String,
    pub setting_name: String,
    pub tier: String,
    pub data_center: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl OverrideEvent {
    pub fn set(
        application_name: &str,
        setting_name: &str,
        value: &str,
        tier: &str,
        data_center: Option<&str>,
    ) -> Self {
        OverrideEvent::OverrideSet(OverrideSetEvent {
            application_name: application_name.to_string(),
            setting_name: setting_name.to_string(),
            value: value.to_string(),
            tier: tier.to_string(),
            data_center: data_center.map(str::to_string),
            timestamp: Utc::now(),
        })
    }

    pub fn cleared(application_name: &str, setting_name: &str, tier: &str, data_center: Option<&str>) -> Self {
        OverrideEvent::OverrideCleared(OverrideClearedEvent {
            application_name: application_name.to_string(),
            setting_name: setting_name.to_string(),
            tier: tier.to_string(),
            data_center: data_center.map(str::to_string),
            timestamp: Utc::now(),
        })
    }

    pub fn application_name(&self) -> &str {
        match self {
            OverrideEvent::OverrideSet(e) => &e.application_name,
            OverrideEvent::OverrideCleared(e) => &e.application_name,
        }
    }

    pub fn setting_name(&self) -> &str {
        match self {
            OverrideEvent::OverrideSet(e) => &e.setting_name,
            OverrideEvent::OverrideCleared(e) => &e.setting_name,
        }
    }

    fn target(&self) -> (&str, Option<&str>) {
        match self {
            OverrideEvent::OverrideSet(e) => (&e.tier, e.data_center.as_deref()),
            OverrideEvent::OverrideCleared(e) => (&e.tier, e.data_center.as_deref()),
        }
    }

    /// Whether a process running at (application, tier, data center) can observe this change.
    pub fn affects(&self, application_name: &str, tier: &str, data_center: &str) -> bool {
        let (event_tier, event_data_center) = self.target();
        self.application_name() == application_name
            && event_tier == tier
            && event_data_center.map_or(true, |dc| dc == data_center)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_set_event_creation() {
        let event = OverrideEvent::set("Tests", "FeatureFlags.FoobarEnabled", "true", "Local", None);

        match &event {
            OverrideEvent::OverrideSet(e) => {
                assert_eq!(e.application_name, "Tests");
                assert_eq!(e.value, "true");
                assert!(e.data_center.is_none());
            }
            _ => panic!("Expected OverrideSet event"),
        }
        assert_eq!(event.setting_name(), "FeatureFlags.FoobarEnabled");
    }

    #[test]
    fn test_affects_matches_coordinate() {
        let everywhere = OverrideEvent::set("Tests", "A", "1", "Local", None);
        assert!(everywhere.affects("Tests", "Local", "London"));
        assert!(everywhere.affects("Tests", "Local", "NewYork"));
        assert!(!everywhere.affects("Tests", "Prod", "London"));
        assert!(!everywhere.affects("Other", "Local", "London"));

        let london = OverrideEvent::cleared("Tests", "A", "Local", Some("London"));
        assert!(london.affects("Tests", "Local", "London"));
        assert!(!london.affects("Tests", "Local", "NewYork"));
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let event = OverrideEvent::cleared("Tests", "A", "Local", None);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "override_cleared");
        assert_eq!(json["setting_name"], "A");
    }
}
