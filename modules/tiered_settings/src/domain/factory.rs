//! Settings factory: materializes settings trees and validates overrides

use crate::contract::{
    Coordinate, ResolvedSettings, ResolvedValue, SettingInfo, SettingValueOverride, SettingsError,
    SettingsGroup, ValueSource,
};
use crate::domain::tree::SettingsTree;
use crate::domain::validation::{data_center_label, require_setting_name};
use std::collections::BTreeMap;
use std::sync::Arc;

type Override<S> = SettingValueOverride<<S as SettingsGroup>::Tier, <S as SettingsGroup>::DataCenter>;
type Info<S> = SettingInfo<<S as SettingsGroup>::Tier, <S as SettingsGroup>::DataCenter>;

/// Builds [`ResolvedSettings`] for a coordinate from the tree's defaults plus overrides.
pub struct SettingsFactory<S: SettingsGroup> {
    tree: Arc<SettingsTree<S>>,
}

impl<S: SettingsGroup> SettingsFactory<S> {
    /// Discover and validate the settings tree of `S`.
    pub fn new() -> Result<Self, SettingsError> {
        Ok(Self::from_tree(Arc::new(SettingsTree::discover()?)))
    }

    pub fn from_tree(tree: Arc<SettingsTree<S>>) -> Self {
        Self { tree }
    }

    pub fn tree(&self) -> &Arc<SettingsTree<S>> {
        &self.tree
    }

    /// Resolve every setting at the coordinate and build a fresh tree.
    ///
    /// Overrides are honored only where the applicable default allows them; an
    /// override for the exact data center wins over a data-center-less one.
    pub fn materialize(
        &self,
        coordinate: &Coordinate<S::Tier, S::DataCenter>,
        commit: impl Into<String>,
        overrides: &[Override<S>],
    ) -> Result<ResolvedSettings<S>, SettingsError> {
        let tier = coordinate.tier;
        let data_center = Some(coordinate.data_center);
        let mut texts = Vec::with_capacity(self.tree.setting_count());
        let mut values = BTreeMap::new();

        for entry in self.tree.entries() {
            let definition = &entry.definition;
            let default = definition.resolve_default(tier, data_center);
            let mut resolved = ResolvedValue {
                value: default.value.to_string(),
                source: if default.rule.is_some() {
                    ValueSource::TieredDefault
                } else {
                    ValueSource::Default
                },
            };

            if default.allow_overrides {
                if let Some(found) = find_override::<S>(overrides, &definition.name, tier, data_center) {
                    resolved = ResolvedValue {
                        value: found.value.clone(),
                        source: ValueSource::Override,
                    };
                }
            }

            texts.push(resolved.value.clone());
            values.insert(definition.name.clone(), resolved);
        }

        let texts: Vec<&str> = texts.iter().map(String::as_str).collect();
        let root = self.tree.build_root(&texts)?;
        Ok(ResolvedSettings::new(coordinate.clone(), commit.into(), root, values))
    }

    /// Parse and constraint-check `value` for the named setting.
    pub fn check_value(&self, setting_name: &str, value: &str) -> Result<(), SettingsError> {
        let entry = self.tree.entry(setting_name).ok_or_else(|| SettingsError::UnknownSetting {
            name: setting_name.to_string(),
        })?;
        (entry.check)(value).map_err(|reason| SettingsError::InvalidValue {
            name: setting_name.to_string(),
            value: value.to_string(),
            reason,
        })
    }

    pub fn is_valid_string_for_setting(&self, setting_name: &str, value: &str) -> bool {
        self.check_value(setting_name, value).is_ok()
    }

    /// Whether `info` accepts an override at (tier, data center); `None` means all data centers.
    pub fn can_set_override_for(&self, info: &Info<S>, tier: S::Tier, data_center: Option<S::DataCenter>) -> bool {
        info.can_set_override_for(tier, data_center)
    }

    /// Everything a store checks before writing an override.
    pub fn validate_override(
        &self,
        setting_name: &str,
        value: &str,
        tier: S::Tier,
        data_center: Option<S::DataCenter>,
    ) -> Result<(), SettingsError> {
        let setting_name = require_setting_name(setting_name)?;
        let definition = self.tree.setting(setting_name).ok_or_else(|| SettingsError::UnknownSetting {
            name: setting_name.to_string(),
        })?;
        if !definition.resolve_default(tier, data_center).allow_overrides {
            return Err(SettingsError::OverrideNotAllowed {
                name: setting_name.to_string(),
                tier: crate::contract::Dimension::name(&tier).to_string(),
                data_center: data_center_label(data_center),
            });
        }
        self.check_value(setting_name, value)
    }

    /// Pair every definition with the overrides stored for it.
    pub fn setting_infos(&self, overrides: &[Override<S>]) -> Vec<Info<S>> {
        self.tree
            .settings()
            .map(|definition| SettingInfo {
                definition: definition.clone(),
                overrides: overrides
                    .iter()
                    .filter(|o| o.setting_name == definition.name)
                    .cloned()
                    .collect(),
            })
            .collect()
    }

    pub fn setting_info(&self, setting_name: &str, overrides: &[Override<S>]) -> Option<Info<S>> {
        self.tree.setting(setting_name).map(|definition| SettingInfo {
            definition: definition.clone(),
            overrides: overrides
                .iter()
                .filter(|o| o.setting_name == setting_name)
                .cloned()
                .collect(),
        })
    }
}

impl<S: SettingsGroup> std::fmt::Debug for SettingsFactory<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsFactory").field("tree", &self.tree).finish()
    }
}

fn find_override<'a, S: SettingsGroup>(
    overrides: &'a [Override<S>],
    setting_name: &str,
    tier: S::Tier,
    data_center: Option<S::DataCenter>,
) -> Option<&'a Override<S>> {
    let candidates = || overrides.iter().filter(|o| o.setting_name == setting_name);
    candidates()
        .find(|o| o.targets(tier, data_center))
        .or_else(|| candidates().find(|o| o.targets(tier, None)))
}
