//! Tiered Settings Module
//!
//! Strongly typed, hierarchical application settings whose values depend on the
//! deployment tier and data center, with runtime overrides pushed live to every
//! process and an admin HTTP API to manage them.
//!
//! A settings root is a tree of [`SettingsGroup`]s. At startup the tree is
//! discovered and validated; a [`SettingsStore`] then materializes immutable
//! [`ResolvedSettings`] snapshots, which [`LiveSettings`] publishes lock-free.

// Public exports
pub mod contract;
pub use contract::{
    Coordinate, DefaultRule, DefinitionError, Dimension, ErrorClass, ResolvedSettings,
    SettingDefinition, SettingInfo, SettingValue, SettingValueOverride, SettingsError,
    SettingsGroup, SettingsListener, SettingsStore, Subscription, ValueKind, ValueSource,
};

pub mod domain;
pub use domain::{
    ChangeSignal, GroupAccessor, GroupBuilder, GroupResolverCache, LiveSettings, Setting,
    SettingsFactory, SettingsRegistry, SettingsTree, SettingsWithStore, WatchedGroup,
};

pub mod infra;
pub use infra::storage::{MemoryBackend, MemoryStore};

pub mod config;
pub use config::Config;

pub mod module;
pub use module::{SettingsBuilder, SettingsModule, StoreConnection};

pub mod api;
pub use api::rest::admin_router;
