//! In-memory settings store
//!
//! [`MemoryBackend`] holds override records and broadcasts every change.
//! [`MemoryStore`] is a typed [`SettingsStore`] view over a backend; several
//! stores sharing one backend behave like several processes sharing one database.

use super::entity::{OverrideKey, OverrideRecord};
use crate::contract::{
    Coordinate, Dimension, ResolvedSettings, SettingInfo, SettingValueOverride, SettingsError,
    SettingsGroup, SettingsListener, SettingsStore, Subscription,
};
use crate::domain::events::OverrideEvent;
use crate::domain::factory::SettingsFactory;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use xxhash_rust::xxh3::xxh3_64;

const EVENT_CAPACITY: usize = 256;

type Records = BTreeMap<OverrideKey, BTreeMap<String, OverrideRecord>>;

/// Shared override storage with change broadcast.
pub struct MemoryBackend {
    overrides: RwLock<Records>,
    events: broadcast::Sender<OverrideEvent>,
}

impl MemoryBackend {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self {
            overrides: RwLock::new(BTreeMap::new()),
            events,
        })
    }

    /// Create or replace a record. Always publishes an event.
    pub fn put(&self, record: OverrideRecord) {
        let event = OverrideEvent::set(
            &record.application_name,
            &record.setting_name,
            &record.value,
            &record.tier,
            record.data_center.as_deref(),
        );
        self.overrides
            .write()
            .entry(record.key())
            .or_default()
            .insert(record.setting_name.clone(), record);
        self.publish(event);
    }

    /// Remove a record. Publishes an event only when something was removed.
    pub fn remove(&self, key: &OverrideKey, setting_name: &str) -> bool {
        let removed = {
            let mut overrides = self.overrides.write();
            let removed = overrides
                .get_mut(key)
                .and_then(|settings| settings.remove(setting_name))
                .is_some();
            if overrides.get(key).is_some_and(BTreeMap::is_empty) {
                overrides.remove(key);
            }
            removed
        };
        if removed {
            self.publish(OverrideEvent::cleared(
                &key.application_name,
                setting_name,
                &key.tier,
                key.data_center.as_deref(),
            ));
        }
        removed
    }

    /// Every record of the application.
    pub fn records(&self, application_name: &str) -> Vec<OverrideRecord> {
        let overrides = self.overrides.read();
        application_records(&overrides, application_name).cloned().collect()
    }

    /// Records visible at (tier, data center) and the application's commit, read atomically.
    pub fn snapshot_at(
        &self,
        application_name: &str,
        tier: &str,
        data_center: &str,
    ) -> (Vec<OverrideRecord>, String) {
        let overrides = self.overrides.read();
        let visible = application_records(&overrides, application_name)
            .filter(|r| r.tier == tier && r.data_center.as_deref().map_or(true, |dc| dc == data_center))
            .cloned()
            .collect();
        (visible, commit_of(&overrides, application_name))
    }

    /// Commit token of the application's override set; empty when there are no overrides.
    pub fn commit(&self, application_name: &str) -> String {
        commit_of(&self.overrides.read(), application_name)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OverrideEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: OverrideEvent) {
        // no receivers is fine
        let _ = self.events.send(event);
    }
}

fn application_records<'a>(
    overrides: &'a Records,
    application_name: &'a str,
) -> impl Iterator<Item = &'a OverrideRecord> + 'a {
    overrides
        .iter()
        .filter(move |(key, _)| key.application_name == application_name)
        .flat_map(|(_, settings)| settings.values())
}

/// Order-independent fingerprint of the application's overrides.
fn commit_of(overrides: &Records, application_name: &str) -> String {
    let mut records = application_records(overrides, application_name).peekable();
    if records.peek().is_none() {
        return String::new();
    }
    let fingerprint = records.fold(0u64, |acc, record| acc ^ xxh3_64(record.identity().as_bytes()));
    format!("{:016x}", fingerprint)
}

/// Reference [`SettingsStore`] over a [`MemoryBackend`].
pub struct MemoryStore<S: SettingsGroup> {
    backend: Arc<MemoryBackend>,
    factory: Arc<SettingsFactory<S>>,
}

impl<S: SettingsGroup> Clone for MemoryStore<S> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            factory: Arc::clone(&self.factory),
        }
    }
}

impl<S: SettingsGroup> MemoryStore<S> {
    /// Store over a fresh, private backend.
    pub fn new(factory: Arc<SettingsFactory<S>>) -> Self {
        Self::with_backend(factory, MemoryBackend::new())
    }

    pub fn with_backend(factory: Arc<SettingsFactory<S>>, backend: Arc<MemoryBackend>) -> Self {
        Self { backend, factory }
    }

    pub fn backend(&self) -> &Arc<MemoryBackend> {
        &self.backend
    }

    fn overrides(
        records: &[OverrideRecord],
    ) -> Result<Vec<SettingValueOverride<S::Tier, S::DataCenter>>, SettingsError> {
        records.iter().map(SettingValueOverride::try_from).collect()
    }
}

fn require_application(application_name: &str) -> Result<&str, SettingsError> {
    let application_name = application_name.trim();
    if application_name.is_empty() {
        return Err(SettingsError::Config {
            message: "application name must not be empty".to_string(),
        });
    }
    Ok(application_name)
}

#[async_trait]
impl<S: SettingsGroup> SettingsStore<S> for MemoryStore<S> {
    fn factory(&self) -> &SettingsFactory<S> {
        &self.factory
    }

    async fn get_app_settings(
        &self,
        application_name: &str,
        tier: S::Tier,
        data_center: S::DataCenter,
    ) -> Result<ResolvedSettings<S>, SettingsError> {
        let application_name = require_application(application_name)?;
        let (records, commit) = self
            .backend
            .snapshot_at(application_name, tier.name(), data_center.name());
        let overrides = Self::overrides(&records)?;
        let coordinate = Coordinate::new(application_name, tier, data_center);
        self.factory.materialize(&coordinate, commit, &overrides)
    }

    async fn set_override(
        &self,
        application_name: &str,
        setting_name: &str,
        value: &str,
        tier: S::Tier,
        data_center: Option<S::DataCenter>,
    ) -> Result<(), SettingsError> {
        let application_name = require_application(application_name)?;
        self.factory.validate_override(setting_name, value, tier, data_center)?;

        let model = SettingValueOverride {
            setting_name: setting_name.trim().to_string(),
            value: value.to_string(),
            tier,
            data_center,
        };
        self.backend.put(OverrideRecord::from_override(application_name, &model));
        info!(
            application = application_name,
            setting = %model.setting_name,
            tier = tier.name(),
            data_center = data_center.map(|dc| dc.name()),
            "Override set"
        );
        Ok(())
    }

    async fn clear_override(
        &self,
        application_name: &str,
        setting_name: &str,
        tier: S::Tier,
        data_center: Option<S::DataCenter>,
    ) -> Result<(), SettingsError> {
        let application_name = require_application(application_name)?;
        let key = OverrideKey {
            application_name: application_name.to_string(),
            tier: tier.name().to_string(),
            data_center: data_center.map(|dc| dc.name().to_string()),
        };
        if self.backend.remove(&key, setting_name.trim()) {
            info!(application = application_name, setting = setting_name, "Override cleared");
        } else {
            debug!(application = application_name, setting = setting_name, "No override to clear");
        }
        Ok(())
    }

    async fn get_all_setting_infos(
        &self,
        application_name: &str,
    ) -> Result<Vec<SettingInfo<S::Tier, S::DataCenter>>, SettingsError> {
        let application_name = require_application(application_name)?;
        let overrides = Self::overrides(&self.backend.records(application_name))?;
        Ok(self.factory.setting_infos(&overrides))
    }

    async fn get_setting_info(
        &self,
        application_name: &str,
        setting_name: &str,
    ) -> Result<Option<SettingInfo<S::Tier, S::DataCenter>>, SettingsError> {
        let application_name = require_application(application_name)?;
        let overrides = Self::overrides(&self.backend.records(application_name))?;
        Ok(self.factory.setting_info(setting_name, &overrides))
    }

    async fn get_current_commit(&self, application_name: &str) -> Result<String, SettingsError> {
        let application_name = require_application(application_name)?;
        Ok(self.backend.commit(application_name))
    }

    fn subscribe(
        &self,
        coordinate: Coordinate<S::Tier, S::DataCenter>,
        listener: SettingsListener<S>,
    ) -> Subscription {
        let mut events = self.backend.subscribe();
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let store = self.clone();

        tokio::spawn(async move {
            let tier = coordinate.tier.name();
            let data_center = coordinate.data_center.name();
            loop {
                let received = tokio::select! {
                    _ = cancelled.cancelled() => break,
                    received = events.recv() => received,
                };
                match received {
                    Ok(event) if !event.affects(&coordinate.application_name, tier, data_center) => continue,
                    Ok(event) => debug!(setting = event.setting_name(), "Override change received"),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Override events lagged; reloading settings");
                    }
                    Err(RecvError::Closed) => break,
                }

                let result = store
                    .get_app_settings(&coordinate.application_name, coordinate.tier, coordinate.data_center)
                    .await
                    .map(Arc::new);
                listener(result);
            }
            debug!(application = %coordinate.application_name, "Settings subscription ended");
        });

        Subscription::new(token)
    }
}
