//! Record to model mappers
//!
//! Conversions between stored override records and contract models

use super::entity::OverrideRecord;
use crate::contract::{Dimension, SettingValueOverride, SettingsError};

impl OverrideRecord {
    pub fn from_override<T: Dimension, D: Dimension>(
        application_name: &str,
        model: &SettingValueOverride<T, D>,
    ) -> Self {
        Self {
            application_name: application_name.to_string(),
            setting_name: model.setting_name.clone(),
            value: model.value.clone(),
            tier: model.tier.name().to_string(),
            data_center: model.data_center.map(|dc| dc.name().to_string()),
        }
    }
}

impl<T: Dimension, D: Dimension> TryFrom<&OverrideRecord> for SettingValueOverride<T, D> {
    type Error = SettingsError;

    fn try_from(record: &OverrideRecord) -> Result<Self, Self::Error> {
        let tier = T::parse(&record.tier).ok_or_else(|| {
            SettingsError::store(format!(
                "override of `{}` names unknown tier `{}`",
                record.setting_name, record.tier
            ))
        })?;
        let data_center = match record.data_center.as_deref() {
            None => None,
            Some(name) => Some(D::parse(name).ok_or_else(|| {
                SettingsError::store(format!(
                    "override of `{}` names unknown data center `{}`",
                    record.setting_name, name
                ))
            })?),
        };

        Ok(Self {
            setting_name: record.setting_name.clone(),
            value: record.value.clone(),
            tier,
            data_center,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::dimension! {
        enum Tier { Local, Prod }
    }

    crate::dimension! {
        enum DataCenter { Local, London }
    }

    #[test]
    fn test_record_maps_to_override() {
        let record = OverrideRecord {
            application_name: "Tests".into(),
            setting_name: "A".into(),
            value: "1".into(),
            tier: "Prod".into(),
            data_center: Some("London".into()),
        };
        let model = SettingValueOverride::<Tier, DataCenter>::try_from(&record).unwrap();
        assert_eq!(model.tier, Tier::Prod);
        assert_eq!(model.data_center, Some(DataCenter::London));
        assert_eq!(OverrideRecord::from_override("Tests", &model), record);
    }

    #[test]
    fn test_unknown_tier_is_a_store_error() {
        let record = OverrideRecord {
            application_name: "Tests".into(),
            setting_name: "A".into(),
            value: "1".into(),
            tier: "Staging".into(),
            data_center: None,
        };
        let err = SettingValueOverride::<Tier, DataCenter>::try_from(&record).unwrap_err();
        assert!(matches!(err, SettingsError::Store { .. }));
    }
}
