//! Module declaration and lifecycle
//!
//! [`SettingsModule::init`] discovers the settings tree, connects the configured
//! store, registers the live settings and keeps them current from store
//! notifications. [`SettingsModule::router`] exposes the admin API.

use crate::config::Config;
use crate::contract::{
    Coordinate, ResolvedSettings, SettingsError, SettingsGroup, SettingsListener, SettingsStore,
    Subscription,
};
use crate::domain::{SettingsFactory, SettingsRegistry, SettingsWithStore};
use crate::infra::storage::{MemoryBackend, MemoryStore};
use anyhow::{Context, Result};
use futures::future::BoxFuture;
use parking_lot::RwLock;
use std::any::type_name;
use std::sync::{Arc, Weak};

/// What a store factory hands back: the initial settings, the store, and
/// optionally the subscription feeding the update listener.
pub struct StoreConnection<S: SettingsGroup> {
    pub settings: ResolvedSettings<S>,
    pub store: Arc<dyn SettingsStore<S>>,
    pub subscription: Option<Subscription>,
}

type StoreFactory<S> = Box<
    dyn FnOnce(Arc<SettingsFactory<S>>, SettingsListener<S>) -> BoxFuture<'static, Result<StoreConnection<S>, SettingsError>>
        + Send,
>;

/// Chooses how a settings root gets its store.
pub struct SettingsBuilder<S: SettingsGroup> {
    factory: Option<StoreFactory<S>>,
}

impl<S: SettingsGroup> Default for SettingsBuilder<S> {
    fn default() -> Self {
        Self { factory: None }
    }
}

impl<S: SettingsGroup> SettingsBuilder<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom store. `factory` receives the settings factory and the
    /// listener that must be called with every rebuilt tree.
    pub fn use_factory<F, Fut>(mut self, factory: F) -> Self
    where
        F: FnOnce(Arc<SettingsFactory<S>>, SettingsListener<S>) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<StoreConnection<S>, SettingsError>> + Send + 'static,
    {
        self.factory = Some(Box::new(move |settings_factory, listener| {
            Box::pin(factory(settings_factory, listener))
        }));
        self
    }

    /// Use a [`MemoryStore`] over `backend`, subscribed for `coordinate`.
    pub fn use_memory_store(
        self,
        coordinate: Coordinate<S::Tier, S::DataCenter>,
        backend: Arc<MemoryBackend>,
    ) -> Result<Self, SettingsError> {
        if coordinate.application_name.trim().is_empty() {
            return Err(SettingsError::Config {
                message: "application name must not be empty".to_string(),
            });
        }

        Ok(self.use_factory(move |factory, listener| async move {
            let store = MemoryStore::with_backend(factory, backend);
            let settings = store
                .get_app_settings(&coordinate.application_name, coordinate.tier, coordinate.data_center)
                .await?;
            let subscription = store.subscribe(coordinate, listener);
            Ok::<_, SettingsError>(StoreConnection {
                settings,
                store: Arc::new(store) as Arc<dyn SettingsStore<S>>,
                subscription: Some(subscription),
            })
        }))
    }

    async fn connect(
        self,
        factory: Arc<SettingsFactory<S>>,
        listener: SettingsListener<S>,
    ) -> Result<StoreConnection<S>, SettingsError> {
        let connect = self.factory.ok_or_else(|| SettingsError::Config {
            message: format!("no settings store configured for `{}`", type_name::<S>()),
        })?;
        connect(factory, listener).await
    }
}

/// Tiered settings module
pub struct SettingsModule {
    config: RwLock<Config>,
    registry: Arc<SettingsRegistry>,
}

impl Default for SettingsModule {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl SettingsModule {
    pub fn new(config: Config) -> Self {
        Self {
            config: RwLock::new(config),
            registry: Arc::new(SettingsRegistry::new()),
        }
    }

    pub fn config(&self) -> Config {
        self.config.read().clone()
    }

    pub fn registry(&self) -> &Arc<SettingsRegistry> {
        &self.registry
    }

    /// Register live settings for `S`. Initializing an already registered root
    /// returns the existing bundle.
    pub async fn init<S: SettingsGroup>(&self, builder: SettingsBuilder<S>) -> Result<Arc<SettingsWithStore<S>>> {
        if let Some(existing) = self.registry.get::<S>() {
            return Ok(existing);
        }

        let factory = Arc::new(
            SettingsFactory::<S>::new()
                .with_context(|| format!("invalid settings definition `{}`", type_name::<S>()))?,
        );
        let listener = update_listener::<S>(Arc::downgrade(&self.registry));
        let connection = builder
            .connect(Arc::clone(&factory), listener)
            .await
            .with_context(|| format!("failed to connect settings store for `{}`", type_name::<S>()))?;

        let entry = Arc::new(SettingsWithStore::new(connection.settings, connection.store, factory));
        if let Some(subscription) = connection.subscription {
            entry.attach_subscription(subscription);
        }
        let entry = self.registry.register(entry);
        catch_up(&entry).await;

        let settings = entry.settings();
        tracing::info!(
            settings = type_name::<S>(),
            application = settings.application_name(),
            commit = settings.commit(),
            "Tiered settings initialized"
        );
        Ok(entry)
    }

    /// Admin API for `S`, mounted at the configured prefix.
    pub fn router<S: SettingsGroup>(&self) -> axum::Router {
        crate::api::rest::routes::admin_router::<S>(Arc::clone(&self.registry), self.config())
    }
}

/// Listener that publishes rebuilt trees into the registered bundle.
///
/// Failures never replace the current settings.
fn update_listener<S: SettingsGroup>(registry: Weak<SettingsRegistry>) -> SettingsListener<S> {
    Arc::new(move |result: Result<Arc<ResolvedSettings<S>>, SettingsError>| match result {
        Ok(settings) => {
            let Some(entry) = registry.upgrade().and_then(|r| r.get::<S>()) else {
                tracing::debug!(settings = type_name::<S>(), "Settings update arrived before registration");
                return;
            };
            let commit = settings.commit().to_string();
            if let Some(generation) = entry.update_settings(settings) {
                tracing::info!(settings = type_name::<S>(), generation, commit = %commit, "Settings updated");
            }
        }
        Err(error) => {
            tracing::error!(
                settings = type_name::<S>(),
                error = %error,
                "Settings store reported an error; keeping current settings"
            );
        }
    })
}

/// Pick up changes that landed between the initial load and registration.
async fn catch_up<S: SettingsGroup>(entry: &SettingsWithStore<S>) {
    let snapshot = entry.live().snapshot();
    let current = snapshot.settings();
    let store = entry.store();
    let latest = match store.get_current_commit(current.application_name()).await {
        Ok(commit) if commit != current.commit() => {
            store
                .get_app_settings(current.application_name(), current.tier(), current.data_center())
                .await
        }
        Ok(_) => return,
        Err(error) => Err(error),
    };
    match latest {
        Ok(settings) => {
            let commit = settings.commit().to_string();
            if entry.update_settings_at(snapshot.generation(), settings).is_none() {
                tracing::debug!(commit = %commit, "Kept settings published during registration");
            }
        }
        Err(error) => {
            tracing::warn!(error = %error, "Could not refresh settings after registration");
        }
    }
}
