//! Seed overrides from YAML
//!
//! ```yaml
//! - setting: FeatureFlags.FoobarEnabled
//!   value: "true"
//!   tier: Local
//!   data_center: London   # optional, omitted means every data center
//! ```

use super::memory::MemoryStore;
use crate::contract::{SettingsError, SettingsGroup, SettingsStore};
use crate::domain::validation::parse_data_center;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SeedOverride {
    setting: String,
    value: String,
    tier: String,
    #[serde(default)]
    data_center: Option<String>,
}

impl<S: SettingsGroup> MemoryStore<S> {
    /// Apply every override in `yaml` for the application. Each entry is validated
    /// like an admin request; the first invalid entry aborts the load.
    pub async fn seed_from_yaml(&self, application_name: &str, yaml: &str) -> Result<usize, SettingsError> {
        let entries: Vec<SeedOverride> = serde_yaml::from_str(yaml).map_err(|e| SettingsError::Config {
            message: format!("invalid override seed: {}", e),
        })?;

        for entry in &entries {
            let tier = <S::Tier as crate::contract::Dimension>::parse(&entry.tier).ok_or_else(|| {
                SettingsError::Config {
                    message: format!("override seed names unknown tier `{}`", entry.tier),
                }
            })?;
            let data_center = parse_data_center::<S::DataCenter>(entry.data_center.as_deref())?;
            self.set_override(application_name, &entry.setting, &entry.value, tier, data_center)
                .await?;
        }

        tracing::info!(application = application_name, count = entries.len(), "Seeded overrides");
        Ok(entries.len())
    }

    pub async fn seed_from_file(&self, application_name: &str, path: &Path) -> Result<usize, SettingsError> {
        let yaml = tokio::fs::read_to_string(path).await.map_err(|e| SettingsError::Config {
            message: format!("cannot read override seed {}: {}", path.display(), e),
        })?;
        self.seed_from_yaml(application_name, &yaml).await
    }
}
