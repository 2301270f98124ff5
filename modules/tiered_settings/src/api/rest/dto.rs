//! REST DTOs with serde derives for the admin API

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// Full settings document returned by `GET {prefix}/json`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SettingsDocumentDto {
    #[schema(example = "Orders")]
    pub application_name: String,

    #[schema(example = "Prod")]
    pub tier: String,

    #[schema(example = "London")]
    pub data_center: String,

    /// Commit token of the override set the values were resolved from
    pub commit: String,

    /// Every data center an override can target
    pub available_data_centers: Vec<String>,

    /// Display color per tier
    pub tier_colors: BTreeMap<String, String>,

    pub settings: Vec<SettingDto>,
}

/// One setting as resolved for the running process
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SettingDto {
    /// Dotted setting name
    #[schema(example = "FeatureFlags.FoobarEnabled")]
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Primitive value type (bool, integer, float, string, json)
    #[serde(rename = "type")]
    pub kind: String,

    /// Effective value at the running coordinate
    pub value: String,

    pub is_default: bool,

    pub is_override: bool,

    /// Whether an override for the running data center would apply
    pub allows_override: bool,

    /// Data centers of the running tier where an override is allowed
    pub overridable_data_centers: Vec<String>,

    /// Whether an override for every data center of the tier is allowed
    pub allows_override_for_all_data_centers: bool,

    pub defaults: Vec<DefaultValueDto>,

    /// Overrides stored for the running tier
    pub overrides: Vec<OverrideDto>,
}

/// A declared default
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DefaultValueDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_center: Option<String>,

    pub value: String,

    pub allows_overrides: bool,
}

/// A stored override
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OverrideDto {
    pub tier: String,

    /// Absent when the override targets every data center
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_center: Option<String>,

    pub value: String,
}

/// Body of `POST {prefix}/set`
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetOverrideRequest {
    #[serde(default)]
    pub setting_name: String,

    #[serde(default)]
    pub value: String,

    /// Omit (or leave empty) to target every data center
    #[serde(default)]
    pub data_center: Option<String>,
}

/// Body of `POST {prefix}/clear`
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClearOverrideRequest {
    #[serde(default)]
    pub setting_name: String,

    #[serde(default)]
    pub data_center: Option<String>,
}
