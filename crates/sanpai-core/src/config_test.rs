use std::collections::HashMap;
use std::env::VarError;

use super::*;

fn lookup_from_map<'a>(
    map: &'a HashMap<&'a str, &'a str>,
) -> impl Fn(&str) -> Result<String, VarError> + 'a {
    move |key| {
        map.get(key)
            .map(|v| (*v).to_string())
            .ok_or(VarError::NotPresent)
    }
}

#[test]
fn build_app_config_uses_defaults_for_empty_env() {
    let map: HashMap<&str, &str> = HashMap::new();
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.target_url, DEFAULT_TARGET_URL);
    assert_eq!(cfg.keyword, "06");
    assert_eq!(cfg.batch_size, 5);
    assert!(cfg.gemini_api_key.is_none());
    assert_eq!(cfg.gemini_model, "gemini-2.5-flash");
    assert_eq!(
        cfg.gemini_base_url,
        "https://generativelanguage.googleapis.com"
    );
    assert_eq!(cfg.request_timeout_secs, 15);
    assert_eq!(cfg.user_agent, DEFAULT_USER_AGENT);
    assert_eq!(cfg.inter_batch_delay_ms, 1000);
    assert_eq!(cfg.poll.max_attempts, 30);
    assert_eq!(cfg.poll.initial_delay_ms, 1000);
    assert_eq!(cfg.poll.max_delay_ms, 8000);
    assert_eq!(cfg.sheet_text_max_chars, 30_000);
    assert_eq!(cfg.session_path.to_str(), Some(".sanpai/session.json"));
    assert_eq!(cfg.log_level, "info");
}

#[test]
fn build_app_config_reads_overrides() {
    let mut map = HashMap::new();
    map.insert("SANPAI_TARGET_URL", "https://ex.test/list.html");
    map.insert("SANPAI_KEYWORD", "");
    map.insert("SANPAI_BATCH_SIZE", "2");
    map.insert("SANPAI_GEMINI_BASE_URL", "http://127.0.0.1:9999/");
    map.insert("SANPAI_POLL_MAX_ATTEMPTS", "3");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.target_url, "https://ex.test/list.html");
    assert_eq!(cfg.keyword, "");
    assert_eq!(cfg.batch_size, 2);
    assert_eq!(cfg.gemini_base_url, "http://127.0.0.1:9999");
    assert_eq!(cfg.poll.max_attempts, 3);
}

#[test]
fn build_app_config_rejects_zero_batch_size() {
    let mut map = HashMap::new();
    map.insert("SANPAI_BATCH_SIZE", "0");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "SANPAI_BATCH_SIZE"),
        "expected InvalidEnvVar(SANPAI_BATCH_SIZE), got: {result:?}"
    );
}

#[test]
fn build_app_config_rejects_non_numeric_batch_size() {
    let mut map = HashMap::new();
    map.insert("SANPAI_BATCH_SIZE", "many");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "SANPAI_BATCH_SIZE"),
        "expected InvalidEnvVar(SANPAI_BATCH_SIZE), got: {result:?}"
    );
}

#[test]
fn build_app_config_rejects_invalid_timeout() {
    let mut map = HashMap::new();
    map.insert("SANPAI_REQUEST_TIMEOUT_SECS", "soon");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "SANPAI_REQUEST_TIMEOUT_SECS"),
        "expected InvalidEnvVar(SANPAI_REQUEST_TIMEOUT_SECS), got: {result:?}"
    );
}

#[test]
fn blank_api_key_is_treated_as_absent() {
    let mut map = HashMap::new();
    map.insert("GEMINI_API_KEY", "   ");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert!(cfg.gemini_api_key.is_none());
}

#[test]
fn configured_secret_takes_precedence_over_cli_key() {
    let mut map = HashMap::new();
    map.insert("GEMINI_API_KEY", "from-secret");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(
        cfg.resolve_api_key(Some("typed")).as_deref(),
        Some("from-secret")
    );
}

#[test]
fn cli_key_used_when_no_secret_configured() {
    let map: HashMap<&str, &str> = HashMap::new();
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.resolve_api_key(Some(" typed ")).as_deref(), Some("typed"));
    assert!(cfg.resolve_api_key(Some("")).is_none());
    assert!(cfg.resolve_api_key(None).is_none());
}

#[test]
fn debug_output_redacts_api_key() {
    let mut map = HashMap::new();
    map.insert("GEMINI_API_KEY", "super-secret-key");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    let rendered = format!("{cfg:?}");
    assert!(!rendered.contains("super-secret-key"));
    assert!(rendered.contains("[redacted]"));
}
