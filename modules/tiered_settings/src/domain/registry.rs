//! Registry of live settings per settings root type
//!
//! Each root type `S` is registered at most once; the registry hands out the
//! shared [`SettingsWithStore`] bundle to the admin API and to application code.

use crate::contract::{ResolvedSettings, SettingsError, SettingsGroup, SettingsStore, Subscription};
use crate::domain::cache::GroupResolverCache;
use crate::domain::factory::SettingsFactory;
use crate::domain::live::{ChangeSignal, LiveSettings};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::any::{type_name, Any, TypeId};
use std::sync::Arc;

/// Live settings of one root type together with the store they came from.
pub struct SettingsWithStore<S: SettingsGroup> {
    live: Arc<LiveSettings<S>>,
    store: Arc<dyn SettingsStore<S>>,
    factory: Arc<SettingsFactory<S>>,
    cache: GroupResolverCache<S>,
    subscription: Mutex<Option<Subscription>>,
}

impl<S: SettingsGroup> SettingsWithStore<S> {
    pub fn new(
        initial: impl Into<Arc<ResolvedSettings<S>>>,
        store: Arc<dyn SettingsStore<S>>,
        factory: Arc<SettingsFactory<S>>,
    ) -> Self {
        let live = Arc::new(LiveSettings::new(initial));
        let cache = GroupResolverCache::new(Arc::clone(&live), Arc::clone(factory.tree()));
        Self {
            live,
            store,
            factory,
            cache,
            subscription: Mutex::new(None),
        }
    }

    /// Current snapshot.
    pub fn settings(&self) -> Arc<ResolvedSettings<S>> {
        self.live.current()
    }

    pub fn signal(&self) -> ChangeSignal {
        self.live.signal()
    }

    pub fn live(&self) -> &Arc<LiveSettings<S>> {
        &self.live
    }

    pub fn store(&self) -> &Arc<dyn SettingsStore<S>> {
        &self.store
    }

    pub fn factory(&self) -> &Arc<SettingsFactory<S>> {
        &self.factory
    }

    pub fn cache(&self) -> &GroupResolverCache<S> {
        &self.cache
    }

    /// Current instance of the only `C` in the tree.
    pub fn group<C: SettingsGroup>(&self) -> Result<Arc<C>, SettingsError> {
        self.cache.get::<C>()
    }

    /// Publish a rebuilt snapshot unless its commit matches the current one.
    pub fn update_settings(&self, settings: impl Into<Arc<ResolvedSettings<S>>>) -> Option<u64> {
        let published = self.live.update_if_changed(settings);
        if published.is_some() {
            self.cache.evict_stale();
        }
        published
    }

    /// Publish a snapshot fetched while `expected` was the live generation.
    ///
    /// Discarded if anything was published in the meantime.
    pub fn update_settings_at(
        &self,
        expected: u64,
        settings: impl Into<Arc<ResolvedSettings<S>>>,
    ) -> Option<u64> {
        let published = self.live.update_if_generation(expected, settings);
        if published.is_some() {
            self.cache.evict_stale();
        }
        published
    }

    /// Keep the store subscription alive for as long as this bundle lives.
    pub fn attach_subscription(&self, subscription: Subscription) {
        if let Some(previous) = self.subscription.lock().replace(subscription) {
            previous.cancel();
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.lock().as_ref().is_some_and(Subscription::is_active)
    }
}

/// Process-wide registry keyed by the settings root type.
#[derive(Default)]
pub struct SettingsRegistry {
    entries: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl SettingsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<S: SettingsGroup>(&self) -> Option<Arc<SettingsWithStore<S>>> {
        let entry = self.entries.get(&TypeId::of::<S>())?;
        Arc::clone(entry.value()).downcast::<SettingsWithStore<S>>().ok()
    }

    /// Registered bundle for `S`, or [`SettingsError::NotRegistered`].
    pub fn require<S: SettingsGroup>(&self) -> Result<Arc<SettingsWithStore<S>>, SettingsError> {
        self.get::<S>().ok_or(SettingsError::NotRegistered {
            settings_type: type_name::<S>(),
        })
    }

    pub fn contains<S: SettingsGroup>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<S>())
    }

    /// Register `entry` unless `S` is already registered; returns the registered bundle.
    pub fn register<S: SettingsGroup>(&self, entry: Arc<SettingsWithStore<S>>) -> Arc<SettingsWithStore<S>> {
        let registered = self
            .entries
            .entry(TypeId::of::<S>())
            .or_insert_with(|| entry.clone() as Arc<dyn Any + Send + Sync>)
            .value()
            .clone();
        registered.downcast::<SettingsWithStore<S>>().unwrap_or(entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for SettingsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsRegistry")
            .field("entries", &self.entries.len())
            .finish()
    }
}
