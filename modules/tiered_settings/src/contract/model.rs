//! Contract models for tiered settings
//!
//! These models are transport-agnostic. NO serde derives - the REST layer has its own DTOs.

use crate::contract::{Dimension, ValueKind};
use crate::domain::tree::GroupBuilder;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// A node of the settings tree.
///
/// Leaves and nested groups are declared in [`SettingsGroup::describe`]; nested
/// groups are held as `Arc<C>` fields so resolved trees share them cheaply.
pub trait SettingsGroup: Default + Send + Sync + 'static {
    type Tier: Dimension;
    type DataCenter: Dimension;

    fn describe(group: &mut GroupBuilder<Self>);
}

/// A default value scoped to a tier, a data center, both or neither.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultRule<T, D> {
    pub tier: Option<T>,
    pub data_center: Option<D>,
    pub value: String,
    pub allow_overrides: bool,
}

impl<T: Dimension, D: Dimension> DefaultRule<T, D> {
    pub fn new(tier: Option<T>, data_center: Option<D>, value: impl Into<String>) -> Self {
        Self {
            tier,
            data_center,
            value: value.into(),
            allow_overrides: true,
        }
    }

    /// Catch-all rule matching every coordinate.
    pub fn any(value: impl Into<String>) -> Self {
        Self::new(None, None, value)
    }

    pub fn tier(tier: T, value: impl Into<String>) -> Self {
        Self::new(Some(tier), None, value)
    }

    pub fn data_center(data_center: D, value: impl Into<String>) -> Self {
        Self::new(None, Some(data_center), value)
    }

    pub fn tier_data_center(tier: T, data_center: D, value: impl Into<String>) -> Self {
        Self::new(Some(tier), Some(data_center), value)
    }

    pub fn without_overrides(mut self) -> Self {
        self.allow_overrides = false;
        self
    }

    /// Higher is more specific: tier+dc, tier, dc, catch-all.
    pub fn specificity(&self) -> u8 {
        match (self.tier.is_some(), self.data_center.is_some()) {
            (true, true) => 3,
            (true, false) => 2,
            (false, true) => 1,
            (false, false) => 0,
        }
    }

    /// Whether the rule covers the coordinate. A data-center-less coordinate only
    /// matches rules without a data center.
    pub fn applies_to(&self, tier: T, data_center: Option<D>) -> bool {
        self.tier.map_or(true, |t| t == tier)
            && self.data_center.map_or(true, |d| Some(d) == data_center)
    }

    /// Human-readable coordinate, e.g. `tier Prod, data center London`.
    pub fn describe_coordinate(&self) -> String {
        match (self.tier, self.data_center) {
            (Some(t), Some(d)) => format!("tier {}, data center {}", t.name(), d.name()),
            (Some(t), None) => format!("tier {}", t.name()),
            (None, Some(d)) => format!("data center {}", d.name()),
            (None, None) => "every coordinate".to_string(),
        }
    }
}

/// The default that applies at one coordinate.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedDefault<'a, T, D> {
    pub value: &'a str,
    pub allow_overrides: bool,
    /// `None` when the global default applies.
    pub rule: Option<&'a DefaultRule<T, D>>,
}

/// Static description of one leaf setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingDefinition<T, D> {
    /// Dotted path from the root, e.g. `FeatureFlags.FoobarEnabled`
    pub name: String,
    pub kind: ValueKind,
    pub description: Option<String>,
    pub default_value: String,
    pub allow_overrides: bool,
    pub tiered_defaults: Vec<DefaultRule<T, D>>,
}

impl<T: Dimension, D: Dimension> SettingDefinition<T, D> {
    /// Most specific default rule matching the coordinate, falling back to the global default.
    pub fn resolve_default(&self, tier: T, data_center: Option<D>) -> ResolvedDefault<'_, T, D> {
        self.tiered_defaults
            .iter()
            .filter(|rule| rule.applies_to(tier, data_center))
            .max_by_key(|rule| rule.specificity())
            .map(|rule| ResolvedDefault {
                value: &rule.value,
                allow_overrides: rule.allow_overrides,
                rule: Some(rule),
            })
            .unwrap_or(ResolvedDefault {
                value: &self.default_value,
                allow_overrides: self.allow_overrides,
                rule: None,
            })
    }
}

/// A runtime override stored for (tier, data center); `None` targets every data center.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingValueOverride<T, D> {
    pub setting_name: String,
    pub value: String,
    pub tier: T,
    pub data_center: Option<D>,
}

impl<T: Dimension, D: Dimension> SettingValueOverride<T, D> {
    pub fn targets(&self, tier: T, data_center: Option<D>) -> bool {
        self.tier == tier && self.data_center == data_center
    }
}

/// A definition together with all overrides currently stored for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingInfo<T, D> {
    pub definition: SettingDefinition<T, D>,
    pub overrides: Vec<SettingValueOverride<T, D>>,
}

impl<T: Dimension, D: Dimension> SettingInfo<T, D> {
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// Whether an override may be set at the coordinate; `None` means all data centers.
    pub fn can_set_override_for(&self, tier: T, data_center: Option<D>) -> bool {
        self.definition.resolve_default(tier, data_center).allow_overrides
    }
}

/// The identity of a running process.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Coordinate<T, D> {
    pub application_name: String,
    pub tier: T,
    pub data_center: D,
}

impl<T: Dimension, D: Dimension> Coordinate<T, D> {
    pub fn new(application_name: impl Into<String>, tier: T, data_center: D) -> Self {
        Self {
            application_name: application_name.into(),
            tier,
            data_center,
        }
    }
}

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    Default,
    TieredDefault,
    Override,
}

/// The effective text of one setting at a coordinate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedValue {
    pub value: String,
    pub source: ValueSource,
}

impl ResolvedValue {
    pub fn is_override(&self) -> bool {
        self.source == ValueSource::Override
    }
}

/// A fully materialized, immutable settings tree for one coordinate.
///
/// Dereferences to the root group so leaves read as plain fields.
pub struct ResolvedSettings<S: SettingsGroup> {
    coordinate: Coordinate<S::Tier, S::DataCenter>,
    commit: String,
    root: Arc<S>,
    values: BTreeMap<String, ResolvedValue>,
}

impl<S: SettingsGroup> ResolvedSettings<S> {
    pub(crate) fn new(
        coordinate: Coordinate<S::Tier, S::DataCenter>,
        commit: String,
        root: Arc<S>,
        values: BTreeMap<String, ResolvedValue>,
    ) -> Self {
        Self {
            coordinate,
            commit,
            root,
            values,
        }
    }

    pub fn coordinate(&self) -> &Coordinate<S::Tier, S::DataCenter> {
        &self.coordinate
    }

    pub fn application_name(&self) -> &str {
        &self.coordinate.application_name
    }

    pub fn tier(&self) -> S::Tier {
        self.coordinate.tier
    }

    pub fn data_center(&self) -> S::DataCenter {
        self.coordinate.data_center
    }

    /// Opaque token of the override set this tree was built from.
    pub fn commit(&self) -> &str {
        &self.commit
    }

    pub fn root(&self) -> &Arc<S> {
        &self.root
    }

    pub fn value(&self, name: &str) -> Option<&ResolvedValue> {
        self.values.get(name)
    }

    /// Resolved text of every setting, ordered by name.
    pub fn values(&self) -> impl Iterator<Item = (&str, &ResolvedValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl<S: SettingsGroup> Deref for ResolvedSettings<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.root
    }
}

impl<S: SettingsGroup> fmt::Debug for ResolvedSettings<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedSettings")
            .field("coordinate", &self.coordinate)
            .field("commit", &self.commit)
            .field("settings", &self.values.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::dimension! {
        enum Tier { Local, Dev, Prod }
    }

    crate::dimension! {
        enum DataCenter { Local, London, NewYork }
    }

    fn definition(rules: Vec<DefaultRule<Tier, DataCenter>>) -> SettingDefinition<Tier, DataCenter> {
        SettingDefinition {
            name: "Connection".to_string(),
            kind: ValueKind::String,
            description: None,
            default_value: "G".to_string(),
            allow_overrides: true,
            tiered_defaults: rules,
        }
    }

    #[test]
    fn test_most_specific_rule_wins() {
        let def = definition(vec![
            DefaultRule::tier(Tier::Local, "L"),
            DefaultRule::tier_data_center(Tier::Local, DataCenter::NewYork, "LN"),
            DefaultRule::data_center(DataCenter::London, "DL"),
        ]);

        assert_eq!(def.resolve_default(Tier::Local, Some(DataCenter::NewYork)).value, "LN");
        assert_eq!(def.resolve_default(Tier::Local, Some(DataCenter::London)).value, "L");
        assert_eq!(def.resolve_default(Tier::Dev, Some(DataCenter::London)).value, "DL");
        assert_eq!(def.resolve_default(Tier::Dev, Some(DataCenter::NewYork)).value, "G");
        assert!(def.resolve_default(Tier::Dev, Some(DataCenter::NewYork)).rule.is_none());
    }

    #[test]
    fn test_catch_all_rule_beats_global_default() {
        let def = definition(vec![DefaultRule::any("C").without_overrides()]);
        let resolved = def.resolve_default(Tier::Prod, None);
        assert_eq!(resolved.value, "C");
        assert!(!resolved.allow_overrides);
    }

    #[test]
    fn test_data_center_rules_ignored_without_data_center() {
        let def = definition(vec![
            DefaultRule::tier(Tier::Prod, "P"),
            DefaultRule::tier_data_center(Tier::Prod, DataCenter::London, "PL").without_overrides(),
        ]);
        let info = SettingInfo {
            definition: def,
            overrides: vec![],
        };

        assert!(info.can_set_override_for(Tier::Prod, None));
        assert!(!info.can_set_override_for(Tier::Prod, Some(DataCenter::London)));
        assert!(info.can_set_override_for(Tier::Prod, Some(DataCenter::NewYork)));
    }
}
