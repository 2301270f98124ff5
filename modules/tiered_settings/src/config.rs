//! Configuration for the tiered settings module
//!
//! Loaded with figment: built-in defaults, then an optional YAML file, then
//! `TIERED_SETTINGS_*` environment variables.

use crate::contract::{Coordinate, Dimension, SettingsError};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Prefix of environment variables overriding file configuration
pub const ENV_PREFIX: &str = "TIERED_SETTINGS_";

/// Colors cycled over tiers that have no configured color
pub const DEFAULT_TIER_COLORS: [&str; 4] = ["#228b22", "#4682b4", "#ff8c00", "#ff0000"];

/// Tiered settings configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Application whose overrides this process reads
    #[serde(default)]
    pub application_name: String,

    /// Tier name of this process
    #[serde(default)]
    pub tier: String,

    /// Data center name of this process
    #[serde(default)]
    pub data_center: String,

    /// Path the admin API is mounted at
    #[serde(default = "default_admin_prefix")]
    pub admin_prefix: String,

    /// Display color per tier name, e.g. `Prod: "#ff0000"`
    #[serde(default)]
    pub tier_colors: BTreeMap<String, String>,

    /// Upper bound for a single store call made by the admin API
    #[serde(default = "default_store_timeout", with = "humantime_serde")]
    pub store_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            application_name: String::new(),
            tier: String::new(),
            data_center: String::new(),
            admin_prefix: default_admin_prefix(),
            tier_colors: BTreeMap::new(),
            store_timeout: default_store_timeout(),
        }
    }
}

fn default_admin_prefix() -> String {
    "/settings".to_string()
}

fn default_store_timeout() -> Duration {
    Duration::from_secs(5)
}

impl Config {
    /// Load defaults, then `path` (if any), then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
            .map_err(|e| SettingsError::Config { message: e.to_string() })
    }

    /// Parse the configured identity of this process.
    pub fn coordinate<T: Dimension, D: Dimension>(&self) -> Result<Coordinate<T, D>, SettingsError> {
        let application_name = self.application_name.trim();
        if application_name.is_empty() {
            return Err(config_error("application_name must not be empty"));
        }
        let tier = T::parse(&self.tier)
            .ok_or_else(|| config_error(format!("unknown tier `{}`", self.tier)))?;
        let data_center = D::parse(&self.data_center)
            .ok_or_else(|| config_error(format!("unknown data center `{}`", self.data_center)))?;
        Ok(Coordinate::new(application_name, tier, data_center))
    }

    /// Color of every tier, configured colors first, defaults cycled otherwise.
    pub fn tier_colors<T: Dimension>(&self) -> BTreeMap<String, String> {
        T::variants()
            .iter()
            .enumerate()
            .map(|(index, tier)| {
                let configured = self
                    .tier_colors
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(tier.name()))
                    .map(|(_, color)| color.clone());
                let color = configured
                    .unwrap_or_else(|| DEFAULT_TIER_COLORS[index % DEFAULT_TIER_COLORS.len()].to_string());
                (tier.name().to_string(), color)
            })
            .collect()
    }

    /// Admin prefix with a leading slash and no trailing slash; empty for the root.
    pub fn normalized_prefix(&self) -> String {
        let trimmed = self.admin_prefix.trim().trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{}", trimmed)
        }
    }
}

fn config_error(message: impl Into<String>) -> SettingsError {
    SettingsError::Config {
        message: message.into(),
    }
}
