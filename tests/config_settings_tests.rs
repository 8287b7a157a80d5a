//! Integration tests for `load_config`: file handling, path-traversal and
//! size safeguards, and error reporting.

use gatewright::config::GatewayConfig;
use gatewright::models::api::{ApiConfig, ProxyConfig};
use once_cell::sync::Lazy;
use std::env;
use std::io::Write;
use std::sync::Mutex;
use tempfile::{NamedTempFile, TempDir};

static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

fn test_api(path: &str) -> ApiConfig {
    ApiConfig {
        path: path.to_string(),
        proxy: ProxyConfig {
            path: path.to_string(),
            target: "https://backend.internal:8443".to_string(),
        },
        group: Vec::new(),
        authentication: Vec::new(),
        circuit_breaker: Vec::new(),
        rate_limit: None,
        request_log: false,
        stats: false,
    }
}

fn write_config_file(config: &GatewayConfig) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new_in(".").unwrap();
    let json = serde_json::to_string_pretty(config).unwrap();
    temp_file.write_all(json.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

#[test]
fn loads_from_environment_variable() {
    let _lock = ENV_MUTEX.lock().unwrap();
    let config = GatewayConfig {
        apis: vec![test_api("/orders")],
        authentication: Default::default(),
    };
    let temp_file = write_config_file(&config);

    env::set_var("GATEWAY_CONFIG_PATH", temp_file.path());
    let result = gatewright::config::load_config();
    env::remove_var("GATEWAY_CONFIG_PATH");

    let loaded = result.unwrap();
    assert_eq!(loaded.apis.len(), 1);
    assert_eq!(loaded.apis[0].path, "/orders");
}

#[test]
fn file_not_found_is_an_error() {
    let _lock = ENV_MUTEX.lock().unwrap();
    env::set_var("GATEWAY_CONFIG_PATH", "./does-not-exist.json");
    let result = gatewright::config::load_config();
    env::remove_var("GATEWAY_CONFIG_PATH");

    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("cannot resolve config path"));
}

#[test]
fn invalid_json_is_an_error() {
    let _lock = ENV_MUTEX.lock().unwrap();
    let mut temp_file = NamedTempFile::new_in(".").unwrap();
    temp_file.write_all(b"{ not json").unwrap();
    temp_file.flush().unwrap();

    env::set_var("GATEWAY_CONFIG_PATH", temp_file.path());
    let result = gatewright::config::load_config();
    env::remove_var("GATEWAY_CONFIG_PATH");

    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("invalid JSON"));
}

#[test]
fn path_traversal_outside_working_directory_is_rejected() {
    let _lock = ENV_MUTEX.lock().unwrap();
    let temp_dir = TempDir::new().unwrap();
    let outside_path = format!("{}/../../../etc/passwd", temp_dir.path().display());

    env::set_var("GATEWAY_CONFIG_PATH", &outside_path);
    let result = gatewright::config::load_config();
    env::remove_var("GATEWAY_CONFIG_PATH");

    assert!(result.is_err());
    let message = result.unwrap_err().to_string();
    assert!(
        message.contains("cannot resolve config path") || message.contains("config path outside working directory"),
        "unexpected error message: {message}"
    );
}

#[test]
fn oversized_file_is_rejected() {
    let _lock = ENV_MUTEX.lock().unwrap();
    let mut temp_file = NamedTempFile::new_in(".").unwrap();
    let oversized = "x".repeat(11 * 1024 * 1024);
    temp_file.write_all(oversized.as_bytes()).unwrap();
    temp_file.flush().unwrap();

    env::set_var("GATEWAY_CONFIG_PATH", temp_file.path());
    let result = gatewright::config::load_config();
    env::remove_var("GATEWAY_CONFIG_PATH");

    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("config file too large"));
}

#[test]
fn empty_apis_list_loads_successfully() {
    let _lock = ENV_MUTEX.lock().unwrap();
    let config = GatewayConfig::default();
    let temp_file = write_config_file(&config);

    env::set_var("GATEWAY_CONFIG_PATH", temp_file.path());
    let result = gatewright::config::load_config();
    env::remove_var("GATEWAY_CONFIG_PATH");

    let loaded = result.unwrap();
    assert!(loaded.apis.is_empty());
}

#[test]
fn multiple_apis_round_trip_through_json() {
    let _lock = ENV_MUTEX.lock().unwrap();
    let config = GatewayConfig {
        apis: vec![test_api("/orders"), test_api("/accounts")],
        authentication: Default::default(),
    };
    let temp_file = write_config_file(&config);

    env::set_var("GATEWAY_CONFIG_PATH", temp_file.path());
    let result = gatewright::config::load_config();
    env::remove_var("GATEWAY_CONFIG_PATH");

    let loaded = result.unwrap();
    assert_eq!(loaded.apis.len(), 2);
    assert_eq!(loaded.apis[1].path, "/accounts");
}

#[test]
fn loading_preserves_current_directory() {
    let _lock = ENV_MUTEX.lock().unwrap();
    let original_dir = env::current_dir().unwrap();

    let config = GatewayConfig {
        apis: vec![test_api("/orders")],
        authentication: Default::default(),
    };
    let temp_file = write_config_file(&config);
    env::set_var("GATEWAY_CONFIG_PATH", temp_file.path());
    let _ = gatewright::config::load_config();
    env::remove_var("GATEWAY_CONFIG_PATH");

    assert_eq!(original_dir, env::current_dir().unwrap());
}
