//! Resolution of defaults and overrides into typed settings trees

use serde_json::json;
use std::sync::Arc;
use tiered_settings::{SettingValueOverride, SettingsError, ValueSource};

mod common;
use common::{coordinate, factory, print_test_header, DataCenter, Tier};

fn override_of(name: &str, value: &str, tier: Tier, data_center: Option<DataCenter>) -> SettingValueOverride<Tier, DataCenter> {
    SettingValueOverride {
        setting_name: name.to_string(),
        value: value.to_string(),
        tier,
        data_center,
    }
}

#[test]
fn test_default_precedence_per_coordinate() {
    print_test_header(
        "test_default_precedence_per_coordinate",
        &["tier+data center beats tier, tier beats data center, data center beats the global default."],
    );
    let factory = factory();

    let cases = [
        (Tier::Local, DataCenter::NewYork, "local-new-york"),
        (Tier::Local, DataCenter::London, "local"),
        (Tier::Dev, DataCenter::London, "london"),
        (Tier::Dev, DataCenter::NewYork, "global"),
    ];
    for (tier, data_center, expected) in cases {
        println!("\n📝 Stage: {:?} / {:?}", tier, data_center);
        let settings = factory.materialize(&coordinate(tier, data_center), "", &[]).unwrap();
        assert_eq!(settings.primary.connection, expected);
        assert_eq!(settings.replica.connection, expected);
    }

    let prod = factory.materialize(&coordinate(Tier::Prod, DataCenter::London), "", &[]).unwrap();
    assert_eq!(prod.primary.port, 6432);
    assert_eq!(prod.secrets.api_key, "from-vault");
    assert_eq!(prod.value("Primary.Port").map(|v| v.source), Some(ValueSource::TieredDefault));
    assert_eq!(prod.value("Limits.SampleRate").map(|v| v.source), Some(ValueSource::Default));
}

#[test]
fn test_overrides_apply_per_position_and_data_center() {
    print_test_header(
        "test_overrides_apply_per_position_and_data_center",
        &[
            "Overrides address one position of a reused group type.",
            "An override for the exact data center wins over an all-data-center one.",
        ],
    );
    let factory = factory();
    let overrides = vec![
        override_of("Replica.Connection", "replica-all", Tier::Dev, None),
        override_of("Replica.Connection", "replica-ny", Tier::Dev, Some(DataCenter::NewYork)),
        override_of("FeatureFlags.FoobarEnabled", "TRUE", Tier::Dev, None),
    ];

    println!("\n📝 Stage 1: London sees the all-data-center override");
    let london = factory.materialize(&coordinate(Tier::Dev, DataCenter::London), "c1", &overrides).unwrap();
    assert_eq!(london.replica.connection, "replica-all");
    assert_eq!(london.primary.connection, "london");
    assert!(london.feature_flags.foobar_enabled);
    assert_eq!(london.commit(), "c1");

    println!("\n📝 Stage 2: NewYork sees its own override");
    let new_york = factory.materialize(&coordinate(Tier::Dev, DataCenter::NewYork), "c1", &overrides).unwrap();
    assert_eq!(new_york.replica.connection, "replica-ny");
    assert!(new_york.value("Replica.Connection").unwrap().is_override());

    println!("\n📝 Stage 3: Other tiers are untouched");
    let local = factory.materialize(&coordinate(Tier::Local, DataCenter::London), "c1", &overrides).unwrap();
    assert_eq!(local.replica.connection, "local");
    assert!(!local.feature_flags.foobar_enabled);
}

#[test]
fn test_forbidden_overrides_are_ignored_and_rejected() {
    print_test_header(
        "test_forbidden_overrides_are_ignored_and_rejected",
        &["A default that disallows overrides wins over any stored override and refuses new ones."],
    );
    let factory = factory();
    let overrides = vec![
        override_of("Secrets.ApiKey", "leaked", Tier::Prod, None),
        override_of("Secrets.ApiKey", "test-override", Tier::Test, None),
    ];

    println!("\n📝 Stage 1: Materialization ignores forbidden overrides");
    let prod = factory.materialize(&coordinate(Tier::Prod, DataCenter::NewYork), "", &overrides).unwrap();
    assert_eq!(prod.secrets.api_key, "from-vault");
    let test_london = factory.materialize(&coordinate(Tier::Test, DataCenter::London), "", &overrides).unwrap();
    assert_eq!(test_london.secrets.api_key, "test-london");
    let test_new_york = factory.materialize(&coordinate(Tier::Test, DataCenter::NewYork), "", &overrides).unwrap();
    assert_eq!(test_new_york.secrets.api_key, "test-override");

    println!("\n📝 Stage 2: Validation refuses them");
    assert!(matches!(
        factory.validate_override("Secrets.ApiKey", "x", Tier::Prod, None),
        Err(SettingsError::OverrideNotAllowed { .. })
    ));
    assert!(matches!(
        factory.validate_override("Secrets.ApiKey", "x", Tier::Test, Some(DataCenter::London)),
        Err(SettingsError::OverrideNotAllowed { .. })
    ));
    assert!(factory.validate_override("Secrets.ApiKey", "x", Tier::Test, None).is_ok());
}

#[test]
fn test_value_parsing_and_constraints() {
    print_test_header(
        "test_value_parsing_and_constraints",
        &["Values must parse as the setting's type and satisfy its schema."],
    );
    let factory = factory();

    println!("\n📝 Stage 1: Typed parsing");
    assert!(factory.is_valid_string_for_setting("Primary.Port", "8080"));
    assert!(!factory.is_valid_string_for_setting("Primary.Port", "70000"));
    assert!(!factory.is_valid_string_for_setting("FeatureFlags.FoobarEnabled", "yes"));
    assert!(factory.is_valid_string_for_setting("Limits.SampleRate", "0.25"));
    assert!(!factory.is_valid_string_for_setting("Limits.SampleRate", "NaN"));
    assert!(!factory.is_valid_string_for_setting("Nope", "1"));

    println!("\n📝 Stage 2: Schema constraints");
    assert!(factory.is_valid_string_for_setting("Limits.MaxItems", "1000"));
    assert!(matches!(
        factory.check_value("Limits.MaxItems", "1001"),
        Err(SettingsError::InvalidValue { .. })
    ));
    assert!(factory.is_valid_string_for_setting("Limits.RetryPolicy", r#"{"attempts": 5, "backoff": "1s"}"#));
    assert!(!factory.is_valid_string_for_setting("Limits.RetryPolicy", r#"{"backoff": "1s"}"#));

    println!("\n📝 Stage 3: JSON override lands in the tree");
    let overrides = vec![override_of("Limits.RetryPolicy", r#"{"attempts": 5}"#, Tier::Dev, None)];
    let settings = factory.materialize(&coordinate(Tier::Dev, DataCenter::London), "", &overrides).unwrap();
    assert_eq!(settings.limits.retry_policy, json!({"attempts": 5}));
}

#[test]
fn test_unchanged_groups_are_fresh_instances() {
    print_test_header(
        "test_unchanged_groups_are_fresh_instances",
        &["Each materialization builds a new tree; values agree but instances differ."],
    );
    let factory = factory();
    let at = coordinate(Tier::Dev, DataCenter::London);
    let first = factory.materialize(&at, "", &[]).unwrap();
    let second = factory.materialize(&at, "", &[]).unwrap();
    assert_eq!(first.primary.connection, second.primary.connection);
    assert!(!Arc::ptr_eq(first.root(), second.root()));
}
