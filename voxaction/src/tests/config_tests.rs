use crate::config::{AliasConfig, EngineConfig, PrefixConfig};
use crate::selector::ElementKind;
use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

#[test]
fn test_defaults() {
    let config = EngineConfig::default();
    assert_eq!(config.timing.stabilization, Duration::from_millis(200));
    assert_eq!(config.timing.menu_open_delay, Duration::from_millis(100));
    assert_eq!(config.timing.idempotency_ttl, Duration::from_secs(5));
    assert_eq!(config.max_retries, 1);
    assert_eq!(config.prefixes.prefix_for(ElementKind::Tab), Some("tab-"));
    assert_eq!(config.prefixes.prefix_for(ElementKind::Modal), None);
    assert!(config.aliases.tab.is_empty());
}

#[test]
fn test_zero_delays_keeps_idempotency_window() {
    let config = EngineConfig::default().zero_delays();
    assert!(config.timing.stabilization.is_zero());
    assert!(config.timing.navigation_settle.is_zero());
    assert_eq!(config.timing.idempotency_ttl, Duration::from_secs(5));
}

#[test]
fn test_json_config_with_human_durations() {
    let config = EngineConfig::from_json_str(
        r#"{
            "timing": {"stabilization": "350ms", "idempotencyTtl": 2000},
            "maxRetries": 2,
            "aliases": {"tab": {"  Roll Call ": "tab-attendance"}}
        }"#,
    )
    .expect("valid json config");

    assert_eq!(config.timing.stabilization, Duration::from_millis(350));
    assert_eq!(config.timing.idempotency_ttl, Duration::from_secs(2));
    assert_eq!(
        config.timing.step_settle,
        Duration::from_millis(300),
        "unspecified fields keep defaults"
    );
    assert_eq!(config.max_retries, 2);
    assert_eq!(
        config.aliases.tab.get("roll call").map(String::as_str),
        Some("tab-attendance"),
        "alias keys are normalized on load"
    );
}

#[test]
fn test_yaml_config_file() {
    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .unwrap();
    writeln!(
        file,
        "timing:\n  menuOpenDelay: 0.25s\nprefixes:\n  button: button-\naliases:\n  button:\n    go live: go-live"
    )
    .unwrap();

    let config = EngineConfig::from_file(file.path()).expect("valid yaml config");
    assert_eq!(config.timing.menu_open_delay, Duration::from_millis(250));
    assert_eq!(config.prefixes.prefix_for(ElementKind::Button), Some("button-"));
    assert_eq!(config.prefixes.prefix_for(ElementKind::Tab), Some("tab-"));
    assert_eq!(
        config.aliases.button.get("go live").map(String::as_str),
        Some("go-live")
    );
}

#[test]
fn test_bad_config_reports_path() {
    let mut file = tempfile::Builder::new()
        .suffix(".json")
        .tempfile()
        .unwrap();
    write!(file, r#"{{"timing": {{"stabilization": "soon"}}}}"#).unwrap();

    let error = EngineConfig::from_file(file.path()).expect_err("bad duration");
    assert!(format!("{error:#}").contains(&file.path().display().to_string()));

    assert!(EngineConfig::from_file("/definitely/not/here.json").is_err());
}

#[test]
fn test_env_overrides() {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("VOXACTION_STABILIZATION", "50ms"),
        ("VOXACTION_MAX_RETRIES", "3"),
        ("VOXACTION_SCROLL_AMOUNT", "120"),
    ]);
    let mut config = EngineConfig::default();
    config
        .apply_overrides_from(|key| vars.get(key).map(|v| v.to_string()))
        .unwrap();

    assert_eq!(config.timing.stabilization, Duration::from_millis(50));
    assert_eq!(config.max_retries, 3);
    assert_eq!(config.default_scroll_amount, 120);
    assert_eq!(config.timing.step_settle, Duration::from_millis(300));
}

#[test]
fn test_env_override_rejects_garbage() {
    let mut config = EngineConfig::default();
    let error = config
        .apply_overrides_from(|key| (key == "VOXACTION_MAX_RETRIES").then(|| "many".to_string()))
        .expect_err("not a number");
    assert!(error.to_string().contains("VOXACTION_MAX_RETRIES"));
}

#[test]
fn test_alias_registration() {
    let mut aliases = AliasConfig::default();
    aliases
        .insert(ElementKind::Dropdown, " Course ", "dropdown-course")
        .unwrap();
    assert_eq!(
        aliases
            .table_for(ElementKind::Dropdown)
            .and_then(|t| t.get("course"))
            .map(String::as_str),
        Some("dropdown-course")
    );
    assert!(
        aliases.insert(ElementKind::Modal, "x", "y").is_err(),
        "modals have no alias table"
    );
}

#[test]
fn test_empty_prefix_disables_convention() {
    let prefixes = PrefixConfig {
        input: String::new(),
        ..Default::default()
    };
    assert_eq!(prefixes.prefix_for(ElementKind::Input), None);
}

#[test]
fn test_config_serializes_durations_as_text() {
    let value = serde_json::to_value(EngineConfig::default()).unwrap();
    assert_eq!(value["timing"]["stabilization"], "200ms");
    assert_eq!(value["timing"]["idempotencyTtl"], "5s");
}
