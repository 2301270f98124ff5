//! Stored override records
//!
//! Records are keyed by dimension *names* so a backend can be shared by
//! processes that only agree on names.

use serde::{Deserialize, Serialize};

/// Location of a group of overrides: one application at one (tier, data center).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OverrideKey {
    pub application_name: String,
    pub tier: String,
    /// `None` targets every data center
    pub data_center: Option<String>,
}

/// One stored override
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideRecord {
    pub application_name: String,
    pub setting_name: String,
    pub value: String,
    pub tier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_center: Option<String>,
}

impl OverrideRecord {
    pub fn key(&self) -> OverrideKey {
        OverrideKey {
            application_name: self.application_name.clone(),
            tier: self.tier.clone(),
            data_center: self.data_center.clone(),
        }
    }

    /// Stable identity hashed into the commit token.
    pub(crate) fn identity(&self) -> String {
        format!(
            "{}\u{1f}{}\u{1f}{}\u{1f}{}\u{1f}{}",
            self.application_name,
            self.tier,
            self.data_center.as_deref().unwrap_or(""),
            self.setting_name,
            self.value
        )
    }
}
