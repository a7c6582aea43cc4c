//! Unit tests for `ScanConfig` validation and its outbound wire line.

use inferno_bridge::models::scan::ScanConfig;
use inferno_bridge::AppError;

#[test]
fn target_only_config_omits_optional_keys() {
    let config = ScanConfig::for_target("example.com").expect("valid config");
    let line = config.to_wire_line().expect("serializes");

    assert_eq!(line, "{\"target\":\"example.com\"}\n");
    assert!(!line.contains("objective"));
}

#[test]
fn wire_line_ends_with_exactly_one_newline() {
    let config = ScanConfig::for_target("example.com").expect("valid config");
    let line = config.to_wire_line().expect("serializes");
    assert!(line.ends_with('\n'));
    assert!(!line.trim_end_matches('\n').contains('\n'));
}

#[test]
fn all_fields_are_serialized_when_set() {
    let config = ScanConfig::new(
        "https://app.test",
        Some("auth bypass"),
        Some("anthropic"),
        Some("claude-sonnet"),
    )
    .expect("valid config");
    let value: serde_json::Value =
        serde_json::from_str(config.to_wire_line().expect("serializes").trim()).expect("json");

    assert_eq!(value["target"], "https://app.test");
    assert_eq!(value["objective"], "auth bypass");
    assert_eq!(value["provider"], "anthropic");
    assert_eq!(value["model"], "claude-sonnet");
}

#[test]
fn blank_optional_values_are_treated_as_unset() {
    let config = ScanConfig::new("example.com", Some("   "), Some(""), None).expect("valid");
    assert!(config.objective().is_none());
    assert!(config.provider().is_none());
    let line = config.to_wire_line().expect("serializes");
    assert!(!line.contains("objective"));
    assert!(!line.contains("provider"));
}

#[test]
fn empty_target_is_rejected() {
    let result = ScanConfig::for_target("");
    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[test]
fn whitespace_target_is_rejected() {
    let result = ScanConfig::new("  \t ", Some("x"), None, None);
    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[test]
fn target_is_trimmed() {
    let config = ScanConfig::for_target("  example.com \n").expect("valid");
    assert_eq!(config.target(), "example.com");
}
