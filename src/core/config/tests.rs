use super::parsing::{
    default_cors_origins, parse_bool, parse_cors_origins, parse_environment,
    parse_storage_backend,
};
use super::types::{ConfigError, Environment, ServerPort, Settings, StorageBackend};
use crate::test_support::{env_lock, set_test_env};

#[test]
fn parse_cors_origins_json() {
    let raw = "[\"http://a\",\"http://b\"]".to_string();
    let parsed = parse_cors_origins(Some(raw)).expect("cors json");
    assert_eq!(parsed, vec!["http://a".to_string(), "http://b".to_string()]);
}

#[test]
fn parse_cors_origins_csv() {
    let raw = "http://a, http://b".to_string();
    let parsed = parse_cors_origins(Some(raw)).expect("cors csv");
    assert_eq!(parsed, vec!["http://a".to_string(), "http://b".to_string()]);
}

#[test]
fn parse_cors_origins_defaults_on_empty() {
    let parsed = parse_cors_origins(Some(" ".to_string())).expect("cors empty");
    assert_eq!(parsed, default_cors_origins());
}

#[test]
fn parse_bool_variants() {
    assert!(parse_bool("1"));
    assert!(parse_bool("true"));
    assert!(parse_bool("yes"));
    assert!(parse_bool("on"));
    assert!(!parse_bool("false"));
    assert!(!parse_bool("0"));
}

#[test]
fn parse_environment_variants() {
    assert_eq!(parse_environment(Some("prod".to_string())), Environment::Production);
    assert_eq!(parse_environment(Some("staging".to_string())), Environment::Staging);
    assert_eq!(parse_environment(Some("testing".to_string())), Environment::Test);
    assert_eq!(parse_environment(None), Environment::Development);
}

#[test]
fn parse_storage_backend_variants() {
    assert_eq!(parse_storage_backend(None).unwrap(), StorageBackend::Postgres);
    assert_eq!(
        parse_storage_backend(Some("In-Memory".to_string())).unwrap(),
        StorageBackend::InMemory
    );
    assert_eq!(parse_storage_backend(Some("pg".to_string())).unwrap(), StorageBackend::Postgres);

    let err = parse_storage_backend(Some("sqlite".to_string())).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { field: "EXAM_DB_TYPE", .. }));
}

#[test]
fn server_port_rejects_zero() {
    assert!(ServerPort::parse("0".to_string()).is_err());
    assert!(ServerPort::parse("http".to_string()).is_err());
    assert!(ServerPort::parse("8000".to_string()).is_ok());
}

#[tokio::test]
async fn answer_payload_limit_must_fit_stored_column() {
    let _guard = env_lock().await;
    set_test_env();

    std::env::set_var("ANSWER_PAYLOAD_MAX_CHARS", "8193");
    let err = Settings::load().unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { field: "ANSWER_PAYLOAD_MAX_CHARS", .. }));

    std::env::set_var("ANSWER_PAYLOAD_MAX_CHARS", "0");
    assert!(Settings::load().is_err());

    std::env::set_var("ANSWER_PAYLOAD_MAX_CHARS", "8192");
    let settings = Settings::load().expect("settings");
    assert_eq!(settings.engine().answer_payload_max_chars, 8192);

    std::env::remove_var("ANSWER_PAYLOAD_MAX_CHARS");
}
