//! Unit tests for configuration parsing
//!
//! Note: These tests modify global environment variables and must run serially.

use std::time::Duration;

use opsnotify::config::{Config, DispatchConfig, SmtpConfig, TelegramConfig};
use serial_test::serial;

fn clear(vars: &[&str]) {
    for var in vars {
        std::env::remove_var(var);
    }
}

// =============================================================================
// Dispatch Config Tests
// =============================================================================

#[test]
#[serial]
fn test_dispatch_config_defaults() {
    clear(&["DISPATCH_SEND_TIMEOUT_SECS"]);

    let config = DispatchConfig::from_env();

    assert_eq!(config.send_timeout, Duration::from_secs(10));
}

#[test]
#[serial]
fn test_dispatch_config_custom_and_invalid_values() {
    std::env::set_var("DISPATCH_SEND_TIMEOUT_SECS", "3");
    assert_eq!(DispatchConfig::from_env().send_timeout, Duration::from_secs(3));

    std::env::set_var("DISPATCH_SEND_TIMEOUT_SECS", "soon");
    assert_eq!(DispatchConfig::from_env().send_timeout, Duration::from_secs(10));

    clear(&["DISPATCH_SEND_TIMEOUT_SECS"]);
}

// =============================================================================
// Channel Config Tests
// =============================================================================

#[test]
#[serial]
fn test_smtp_config_defaults() {
    clear(&["SMTP_HOST", "SMTP_PORT", "SMTP_USERNAME", "SMTP_PASSWORD", "SMTP_FROM"]);

    let config = SmtpConfig::from_env();

    assert!(config.host.is_none());
    assert_eq!(config.port, 587);
    assert_eq!(config.from_address, "notifications@localhost");
}

#[test]
#[serial]
fn test_smtp_blank_host_is_unset() {
    std::env::set_var("SMTP_HOST", "");
    std::env::set_var("SMTP_PORT", "465");

    let config = SmtpConfig::from_env();

    assert!(config.host.is_none());
    assert_eq!(config.port, 465);

    clear(&["SMTP_HOST", "SMTP_PORT"]);
}

#[test]
#[serial]
fn test_telegram_config_trims_trailing_slash() {
    std::env::set_var("TELEGRAM_BOT_TOKEN", "123:abc");
    std::env::set_var("TELEGRAM_API_URL", "http://localhost:8081/");

    let config = TelegramConfig::from_env();

    assert_eq!(config.bot_token.as_deref(), Some("123:abc"));
    assert_eq!(config.api_url, "http://localhost:8081");

    clear(&["TELEGRAM_BOT_TOKEN", "TELEGRAM_API_URL"]);
}

#[test]
#[serial]
fn test_telegram_config_defaults() {
    clear(&["TELEGRAM_BOT_TOKEN", "TELEGRAM_API_URL"]);

    let config = TelegramConfig::from_env();

    assert!(config.bot_token.is_none());
    assert_eq!(config.api_url, "https://api.telegram.org");
}

// =============================================================================
// Server Config Tests
// =============================================================================

#[test]
#[serial]
fn test_config_requires_database_url() {
    clear(&["DATABASE_URL", "PORT"]);

    let err = Config::from_env().unwrap_err();

    assert_eq!(err.to_string(), "DATABASE_URL environment variable is required");
}

#[test]
#[serial]
fn test_config_rejects_invalid_port() {
    std::env::set_var("DATABASE_URL", "postgres://localhost/opsnotify");
    std::env::set_var("PORT", "eighty");

    let err = Config::from_env().unwrap_err();
    assert_eq!(err.to_string(), "PORT must be a valid number");

    clear(&["DATABASE_URL", "PORT"]);
}

#[test]
#[serial]
fn test_config_from_env() {
    std::env::set_var("DATABASE_URL", "postgres://localhost/opsnotify");
    std::env::set_var("PORT", "9090");
    std::env::set_var("CORS_ALLOWED_ORIGIN", "https://crm.example.com");

    let config = Config::from_env().unwrap();

    assert_eq!(config.port, 9090);
    assert_eq!(config.database.url, "postgres://localhost/opsnotify");
    assert_eq!(config.database.max_connections, 10);
    assert_eq!(
        config.cors_allowed_origin.as_deref(),
        Some("https://crm.example.com")
    );

    clear(&["DATABASE_URL", "PORT", "CORS_ALLOWED_ORIGIN"]);
}
