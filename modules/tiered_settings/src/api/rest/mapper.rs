//! Mapper implementations for converting contract models into REST DTOs

use super::dto::*;
use crate::contract::{
    DefaultRule, Dimension, ResolvedSettings, SettingInfo, SettingValueOverride, SettingsGroup,
};

impl<T: Dimension, D: Dimension> From<&DefaultRule<T, D>> for DefaultValueDto {
    fn from(rule: &DefaultRule<T, D>) -> Self {
        Self {
            tier: rule.tier.map(|t| t.name().to_string()),
            data_center: rule.data_center.map(|d| d.name().to_string()),
            value: rule.value.clone(),
            allows_overrides: rule.allow_overrides,
        }
    }
}

impl<T: Dimension, D: Dimension> From<&SettingValueOverride<T, D>> for OverrideDto {
    fn from(model: &SettingValueOverride<T, D>) -> Self {
        Self {
            tier: model.tier.name().to_string(),
            data_center: model.data_center.map(|d| d.name().to_string()),
            value: model.value.clone(),
        }
    }
}

/// Describe one setting as seen by the process running at `settings`' coordinate.
pub fn setting_dto<S: SettingsGroup>(
    info: &SettingInfo<S::Tier, S::DataCenter>,
    settings: &ResolvedSettings<S>,
) -> SettingDto {
    let tier = settings.tier();
    let definition = &info.definition;
    let resolved = settings.value(&definition.name);

    SettingDto {
        name: definition.name.clone(),
        description: definition.description.clone(),
        kind: definition.kind.as_str().to_string(),
        value: resolved
            .map(|v| v.value.clone())
            .unwrap_or_else(|| definition.default_value.clone()),
        is_default: resolved.map_or(true, |v| !v.is_override()),
        is_override: resolved.is_some_and(|v| v.is_override()),
        allows_override: info.can_set_override_for(tier, Some(settings.data_center())),
        overridable_data_centers: S::DataCenter::variants()
            .iter()
            .filter(|dc| info.can_set_override_for(tier, Some(**dc)))
            .map(|dc| dc.name().to_string())
            .collect(),
        allows_override_for_all_data_centers: info.can_set_override_for(tier, None),
        defaults: definition.tiered_defaults.iter().map(DefaultValueDto::from).collect(),
        overrides: info
            .overrides
            .iter()
            .filter(|o| o.tier == tier)
            .map(OverrideDto::from)
            .collect(),
    }
}
