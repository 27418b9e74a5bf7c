use std::time::Duration;

use swap_coordinator::config::{validate_nonzero, validate_rpc_url, CoordinatorConfig};
use swap_coordinator::{RetryConfig, SwapError};

#[test]
fn rpc_url_requires_http() {
    assert!(validate_rpc_url("rpc", "http://127.0.0.1:8545").is_ok());
    assert!(validate_rpc_url("rpc", "https://provider.test").is_ok());
    assert!(validate_rpc_url("rpc", "ws://localhost").is_err());
    assert!(validate_rpc_url("rpc", "localhost:9000").is_err());
}

#[test]
fn nonzero_validation() {
    assert!(validate_nonzero("lock duration", 1).is_ok());
    assert!(matches!(
        validate_nonzero("lock duration", 0),
        Err(SwapError::Config(message)) if message.contains("lock duration")
    ));
}

#[test]
fn default_config_is_valid() {
    let config = CoordinatorConfig::default();
    config.validate().expect("defaults validate");
    assert!(config.lock_duration > config.expected_round_trip);
}

#[test]
fn lock_must_outlast_the_round_trip() {
    let config = CoordinatorConfig {
        lock_duration: Duration::from_secs(900),
        expected_round_trip: Duration::from_secs(900),
        ..CoordinatorConfig::default()
    };
    assert!(matches!(config.validate(), Err(SwapError::Config(_))));
}

#[test]
fn confirmation_wait_must_end_before_the_lock() {
    let config = CoordinatorConfig {
        confirmation_timeout: Duration::from_secs(3_600),
        ..CoordinatorConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn zero_durations_are_rejected() {
    let config = CoordinatorConfig {
        confirmation_timeout: Duration::ZERO,
        ..CoordinatorConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn environment_overrides_defaults() {
    std::env::set_var("SWAP_LOCK_DURATION_SECS", "7200");
    std::env::set_var("SWAP_CONFIRMATION_TIMEOUT_SECS", "not-a-number");
    std::env::set_var("SWAP_PROVIDER_RPC_MAX_RETRIES", "7");

    let config = CoordinatorConfig::from_env();
    assert_eq!(config.lock_duration, Duration::from_secs(7_200));
    assert_eq!(
        config.confirmation_timeout,
        CoordinatorConfig::default().confirmation_timeout
    );
    assert_eq!(config.retry.max_retries, 7);
    assert_eq!(config.retry.timeout, RetryConfig::default().timeout);

    std::env::remove_var("SWAP_LOCK_DURATION_SECS");
    std::env::remove_var("SWAP_CONFIRMATION_TIMEOUT_SECS");
    std::env::remove_var("SWAP_PROVIDER_RPC_MAX_RETRIES");
}
