//! Common test utilities and a shared settings tree

#![allow(dead_code)]

use serde_json::json;
use std::sync::Arc;
use tiered_settings::{
    Coordinate, DefaultRule, GroupBuilder, MemoryBackend, MemoryStore, Setting, SettingsFactory,
    SettingsGroup,
};

pub const APPLICATION: &str = "Tests";

tiered_settings::dimension! {
    pub enum Tier { Local, Dev, Test, Prod }
}

tiered_settings::dimension! {
    pub enum DataCenter { Local, London, NewYork }
}

/// Root of the test tree
#[derive(Debug, Default)]
pub struct Settings {
    pub feature_flags: Arc<FeatureFlagSettings>,
    pub primary: Arc<EndpointSettings>,
    pub replica: Arc<EndpointSettings>,
    pub secrets: Arc<SecretSettings>,
    pub limits: Arc<LimitSettings>,
}

impl SettingsGroup for Settings {
    type Tier = Tier;
    type DataCenter = DataCenter;

    fn describe(group: &mut GroupBuilder<Self>) {
        group
            .group("FeatureFlags", |s| &s.feature_flags, |s| &mut s.feature_flags)
            .group("Primary", |s| &s.primary, |s| &mut s.primary)
            .group("Replica", |s| &s.replica, |s| &mut s.replica)
            .group("Secrets", |s| &s.secrets, |s| &mut s.secrets)
            .group("Limits", |s| &s.limits, |s| &mut s.limits);
    }
}

#[derive(Debug, Default)]
pub struct FeatureFlagSettings {
    pub foobar_enabled: bool,
}

impl SettingsGroup for FeatureFlagSettings {
    type Tier = Tier;
    type DataCenter = DataCenter;

    fn describe(group: &mut GroupBuilder<Self>) {
        group.setting(
            "FoobarEnabled",
            |f| &mut f.foobar_enabled,
            Setting::new(false).description("Enables the foobar feature"),
        );
    }
}

/// Used at two positions of the tree
#[derive(Debug, Default)]
pub struct EndpointSettings {
    pub connection: String,
    pub port: u16,
}

impl SettingsGroup for EndpointSettings {
    type Tier = Tier;
    type DataCenter = DataCenter;

    fn describe(group: &mut GroupBuilder<Self>) {
        group
            .setting(
                "Connection",
                |e| &mut e.connection,
                Setting::new("global".to_string())
                    .tier(Tier::Local, "local".to_string())
                    .tier_data_center(Tier::Local, DataCenter::NewYork, "local-new-york".to_string())
                    .data_center(DataCenter::London, "london".to_string()),
            )
            .setting("Port", |e| &mut e.port, Setting::new(5432).tier(Tier::Prod, 6432));
    }
}

#[derive(Debug, Default)]
pub struct SecretSettings {
    pub api_key: String,
}

impl SettingsGroup for SecretSettings {
    type Tier = Tier;
    type DataCenter = DataCenter;

    fn describe(group: &mut GroupBuilder<Self>) {
        group.setting(
            "ApiKey",
            |s| &mut s.api_key,
            Setting::new("dev-key".to_string())
                .rule(DefaultRule::tier(Tier::Prod, "from-vault").without_overrides())
                .rule(DefaultRule::tier_data_center(Tier::Test, DataCenter::London, "test-london").without_overrides()),
        );
    }
}

#[derive(Debug, Default)]
pub struct LimitSettings {
    pub max_items: u32,
    pub sample_rate: f64,
    pub retry_policy: serde_json::Value,
}

impl SettingsGroup for LimitSettings {
    type Tier = Tier;
    type DataCenter = DataCenter;

    fn describe(group: &mut GroupBuilder<Self>) {
        group
            .setting(
                "MaxItems",
                |l| &mut l.max_items,
                Setting::new(100).constraint(json!({"type": "integer", "minimum": 1, "maximum": 1000})),
            )
            .setting("SampleRate", |l| &mut l.sample_rate, Setting::new(0.5))
            .setting(
                "RetryPolicy",
                |l| &mut l.retry_policy,
                Setting::new(json!({"attempts": 3})).constraint(json!({
                    "type": "object",
                    "required": ["attempts"]
                })),
            );
    }
}

pub fn coordinate(tier: Tier, data_center: DataCenter) -> Coordinate<Tier, DataCenter> {
    Coordinate::new(APPLICATION, tier, data_center)
}

pub fn local() -> Coordinate<Tier, DataCenter> {
    coordinate(Tier::Local, DataCenter::Local)
}

pub fn factory() -> Arc<SettingsFactory<Settings>> {
    Arc::new(SettingsFactory::new().expect("test settings tree is valid"))
}

/// A store over a fresh backend
pub fn memory_store() -> MemoryStore<Settings> {
    MemoryStore::new(factory())
}

/// Two stores sharing one backend, like two processes sharing a database
pub fn shared_stores() -> (MemoryStore<Settings>, MemoryStore<Settings>) {
    let backend = MemoryBackend::new();
    let factory = factory();
    (
        MemoryStore::with_backend(Arc::clone(&factory), Arc::clone(&backend)),
        MemoryStore::with_backend(factory, backend),
    )
}

pub fn print_test_header(test_name: &str, purpose: &[&str]) {
    println!("\n🧪 TEST: {}", test_name);
    if let Some(first) = purpose.first() {
        println!("📋 PURPOSE: {}", first);
    }
    for line in purpose.iter().skip(1) {
        println!("   {}", line);
    }
}

/// Poll `check` until it holds or a second passes.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    check()
}
