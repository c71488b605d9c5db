//! Tests for engine configuration loading

use trueno_privacy::config::{BudgetPolicyKind, PrivacyConfig};
use trueno_privacy::{Error, PrivacyEngine};

#[test]
fn test_parse_fixed_cap_json() {
    let config = PrivacyConfig::from_json_str(
        r#"{ "budget": { "policy": "fixed_cap", "ceiling": 1.5 }, "noise": { "seed": 9 } }"#,
    )
    .unwrap();

    assert_eq!(config.budget.policy, BudgetPolicyKind::FixedCap);
    assert_eq!(config.budget.ceiling, Some(1.5));
    assert_eq!(config.noise.seed, Some(9));
}

#[test]
fn test_missing_sections_use_defaults() {
    let config = PrivacyConfig::from_json_str("{}").unwrap();
    assert_eq!(config, PrivacyConfig::unlimited());

    let config = PrivacyConfig::from_json_str(r#"{ "budget": { "policy": "unlimited" } }"#).unwrap();
    assert_eq!(config.noise.seed, None);
}

#[test]
fn test_cap_without_ceiling_rejected() {
    let result = PrivacyConfig::from_json_str(r#"{ "budget": { "policy": "shared_pool" } }"#);
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}

#[test]
fn test_negative_ceiling_rejected() {
    let result =
        PrivacyConfig::from_json_str(r#"{ "budget": { "policy": "fixed_cap", "ceiling": -1.0 } }"#);
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}

#[test]
fn test_unknown_policy_is_json_error() {
    let result = PrivacyConfig::from_json_str(r#"{ "budget": { "policy": "gaussian" } }"#);
    assert!(matches!(result, Err(Error::Json(_))));
}

#[test]
fn test_config_roundtrip_through_file() {
    let path = std::env::temp_dir().join("trueno_privacy_config_test.json");
    let config = PrivacyConfig::shared_pool(3.0).with_seed(11);
    std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

    let loaded = PrivacyConfig::from_file(&path).unwrap();
    assert_eq!(loaded, config);

    let engine = PrivacyEngine::builder().config(loaded).build().unwrap();
    assert_eq!(engine.pool().map(|p| p.ceiling()), Some(3.0));

    std::fs::remove_file(&path).ok();
}

#[test]
fn test_missing_file_is_io_error() {
    let result = PrivacyConfig::from_file("/nonexistent/trueno_privacy.json");
    assert!(matches!(result, Err(Error::Io(_))));
}
