//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the breaker service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for the breaker service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Failure window and trip settings.
    pub circuit: CircuitConfig,

    /// Durable state location.
    pub storage: StorageConfig,

    /// Management-plane client settings.
    pub controller: ControllerConfig,

    /// Retry policy for controller calls.
    pub retries: RetryConfig,

    /// Admin API settings.
    pub admin: AdminConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Failure window and trip configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct CircuitConfig {
    /// Failures older than `latest - window_size_secs` are dropped from the window.
    pub window_size_secs: u64,

    /// Number of failures in the window that trips the circuit.
    pub failure_threshold: usize,

    /// Cooldown before the resource is started again.
    pub backoff_duration_secs: u64,

    /// Close the circuit once the workflow has restarted the resource.
    pub close_on_recovery: bool,
}

impl CircuitConfig {
    pub fn window_size(&self) -> Duration {
        Duration::from_secs(self.window_size_secs)
    }

    pub fn backoff_duration(&self) -> Duration {
        Duration::from_secs(self.backoff_duration_secs)
    }
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            window_size_secs: 30,
            failure_threshold: 5,
            backoff_duration_secs: 300,
            close_on_recovery: true,
        }
    }
}

/// Durable storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the state files. `None` keeps everything in memory.
    pub data_dir: Option<PathBuf>,

    /// File name for circuit actor state.
    pub circuits_file: String,

    /// File name for workflow instance records.
    pub workflows_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            circuits_file: "circuits.json".to_string(),
            workflows_file: "workflows.json".to_string(),
        }
    }
}

/// Management-plane client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Base URL the resource id is appended to.
    pub base_url: String,

    /// `api-version` query parameter sent with every call.
    pub api_version: String,

    /// Optional static bearer token.
    pub bearer_token: Option<String>,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://management.azure.com".to_string(),
            api_version: "2016-08-01".to_string(),
            bearer_token: None,
            request_timeout_secs: 30,
        }
    }
}

/// Retry configuration for Stop/Start calls.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per call, including the first. 1 disables retries.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Serve the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.circuit.window_size(), Duration::from_secs(30));
        assert_eq!(config.circuit.failure_threshold, 5);
        assert_eq!(config.circuit.backoff_duration(), Duration::from_secs(300));
        assert!(config.storage.data_dir.is_none());
    }

    #[test]
    fn test_partial_toml() {
        let config: AppConfig = toml::from_str(
            r#"
            [circuit]
            failure_threshold = 3

            [retries]
            max_attempts = 1
            "#,
        )
        .unwrap();

        assert_eq!(config.circuit.failure_threshold, 3);
        assert_eq!(config.circuit.window_size_secs, 30);
        assert_eq!(config.retries.max_attempts, 1);
        assert_eq!(config.retries.base_delay_ms, 500);
    }
}
