//! Abstract settings store
//!
//! A store persists overrides per application and pushes change notifications
//! to subscribers. [`crate::infra::storage::MemoryStore`] is the reference implementation.

use crate::contract::{
    Coordinate, ResolvedSettings, SettingInfo, SettingsError, SettingsGroup,
};
use crate::domain::factory::SettingsFactory;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Receives a freshly materialized tree (or the failure to build one) after a change.
pub type SettingsListener<S> =
    Arc<dyn Fn(Result<Arc<ResolvedSettings<S>>, SettingsError>) + Send + Sync>;

type SettingInfoOf<S> = SettingInfo<<S as SettingsGroup>::Tier, <S as SettingsGroup>::DataCenter>;

#[async_trait]
pub trait SettingsStore<S: SettingsGroup>: Send + Sync {
    /// Factory used to materialize and validate settings.
    fn factory(&self) -> &SettingsFactory<S>;

    /// Materialize settings for the coordinate from the current overrides.
    async fn get_app_settings(
        &self,
        application_name: &str,
        tier: S::Tier,
        data_center: S::DataCenter,
    ) -> Result<ResolvedSettings<S>, SettingsError>;

    /// Create or replace an override; `None` targets every data center of the tier.
    async fn set_override(
        &self,
        application_name: &str,
        setting_name: &str,
        value: &str,
        tier: S::Tier,
        data_center: Option<S::DataCenter>,
    ) -> Result<(), SettingsError>;

    /// Remove an override. Removing a missing override succeeds without notifying anyone.
    async fn clear_override(
        &self,
        application_name: &str,
        setting_name: &str,
        tier: S::Tier,
        data_center: Option<S::DataCenter>,
    ) -> Result<(), SettingsError>;

    /// Every setting definition with the overrides stored for it.
    async fn get_all_setting_infos(
        &self,
        application_name: &str,
    ) -> Result<Vec<SettingInfoOf<S>>, SettingsError>;

    async fn get_setting_info(
        &self,
        application_name: &str,
        setting_name: &str,
    ) -> Result<Option<SettingInfoOf<S>>, SettingsError>;

    /// Token of the application's current override set.
    async fn get_current_commit(&self, application_name: &str) -> Result<String, SettingsError>;

    /// Deliver a rebuilt tree to `listener` whenever overrides affecting the coordinate change.
    fn subscribe(
        &self,
        coordinate: Coordinate<S::Tier, S::DataCenter>,
        listener: SettingsListener<S>,
    ) -> Subscription;

    fn is_valid_string_for_setting(&self, setting_name: &str, value: &str) -> bool {
        self.factory().is_valid_string_for_setting(setting_name, value)
    }
}

/// Handle to a store subscription. Cancelled when dropped.
#[derive(Debug)]
pub struct Subscription {
    token: CancellationToken,
}

impl Subscription {
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
