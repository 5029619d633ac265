//! Integration tests for configuration file loading and validation

use edge_cache_policy::{PolicyConfig, RuleSet, ONE_YEAR_SECS};
use std::fs;
use std::path::PathBuf;

fn write_temp(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "edge-cache-policy-{}-{}",
        std::process::id(),
        name
    ));
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_load_full_config_file() {
    let path = write_temp(
        "full.yaml",
        r#"
listen_address: "127.0.0.1:8088"
origin_base_url: "http://origin:8081"
tag_namespace: edge
report_interval_secs: 60
report_endpoint:
  enabled: true
  address: "127.0.0.1:9191"
rules:
  - name: video
    pattern: '(?i)\.(mp4|webm)$'
    use_query_in_cache_key: false
    ttl_by_status_class:
      ok: 31556952
      redirects: 3600
    cache_tag_override: media
  - name: image
    pattern: '(?i)\.(png|jpe?g)$'
    transform:
      polish_lossy: true
      mirage: true
"#,
    );

    let config = PolicyConfig::from_file(&path).unwrap();
    let _ = fs::remove_file(&path);

    assert_eq!(config.listen_address, "127.0.0.1:8088");
    assert_eq!(config.origin_base_url.as_deref(), Some("http://origin:8081"));
    assert_eq!(config.tag_namespace, "edge");
    assert_eq!(config.report_interval_secs, 60);
    let endpoint = config.report_endpoint.unwrap();
    assert!(endpoint.enabled);
    assert_eq!(endpoint.address, "127.0.0.1:9191");

    assert_eq!(config.rules.len(), 2);
    assert!(!config.rules[0].use_query_in_cache_key);
    assert_eq!(config.rules[0].ttl_by_status_class.ok, ONE_YEAR_SECS);
    assert_eq!(config.rules[0].cache_tag_override.as_deref(), Some("media"));
    assert!(config.rules[1].transform.polish_lossy);
    assert!(config.rules[1].transform.mirage);
    assert!(!config.rules[1].transform.minify_js);
}

#[test]
fn test_empty_file_yields_defaults() {
    let path = write_temp("empty.yaml", "{}");
    let config = PolicyConfig::from_file(&path).unwrap();
    let _ = fs::remove_file(&path);

    assert_eq!(config.listen_address, "0.0.0.0:8080");
    assert_eq!(config.tag_namespace, "cf");
    assert_eq!(config.report_interval_secs, 300);
    assert!(config.origin_base_url.is_none());
    assert_eq!(config.rules.len(), 4);
}

#[test]
fn test_invalid_pattern_rejected_at_load_time() {
    let path = write_temp(
        "bad_pattern.yaml",
        r#"
rules:
  - name: broken
    pattern: '\.(mp4$'
"#,
    );
    let err = PolicyConfig::from_file(&path).unwrap_err();
    let _ = fs::remove_file(&path);

    assert!(err.is_load_time());
    assert!(err.to_string().contains("broken"));
}

#[test]
fn test_duplicate_rule_names_rejected() {
    let path = write_temp(
        "dup_names.yaml",
        r#"
rules:
  - name: video
    pattern: '\.mp4$'
  - name: video
    pattern: '\.webm$'
"#,
    );
    let err = PolicyConfig::from_file(&path).unwrap_err();
    let _ = fs::remove_file(&path);
    assert!(err.to_string().contains("duplicate"));
}

#[test]
fn test_missing_file_is_config_error() {
    let err =
        PolicyConfig::from_file("/nonexistent/edge-cache-policy.yaml").unwrap_err();
    assert!(err.is_load_time());
}

#[test]
fn test_malformed_yaml_is_config_error() {
    let path = write_temp("malformed.yaml", "rules: [unterminated");
    let err = PolicyConfig::from_file(&path).unwrap_err();
    let _ = fs::remove_file(&path);
    assert!(err.is_load_time());
}

#[test]
fn test_loaded_rules_compile_into_a_set() {
    let path = write_temp(
        "compiles.yaml",
        r#"
rules:
  - name: api
    pattern: '^/api/'
    ttl_by_status_class:
      ok: 30
"#,
    );
    let config = PolicyConfig::from_file(&path).unwrap();
    let _ = fs::remove_file(&path);

    let rules = RuleSet::compile(&config.rules).unwrap();
    assert_eq!(rules.len(), 1);
}
