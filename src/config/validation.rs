//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (window > 0, threshold >= 1, attempts >= 1)
//! - Validate addresses and URLs before anything binds or connects
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::AppConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check every semantic constraint and collect the failures.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.circuit.window_size_secs == 0 {
        errors.push(ValidationError::new(
            "circuit.window_size_secs",
            "must be greater than zero",
        ));
    }
    if config.circuit.failure_threshold == 0 {
        errors.push(ValidationError::new(
            "circuit.failure_threshold",
            "must be at least 1",
        ));
    }

    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be at least 1"));
    }
    if config.retries.base_delay_ms > config.retries.max_delay_ms {
        errors.push(ValidationError::new(
            "retries.base_delay_ms",
            "must not exceed retries.max_delay_ms",
        ));
    }

    if let Err(e) = url::Url::parse(&config.controller.base_url) {
        errors.push(ValidationError::new(
            "controller.base_url",
            format!("invalid URL: {}", e),
        ));
    }
    if config.controller.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "controller.request_timeout_secs",
            "must be greater than zero",
        ));
    }

    if config.admin.enabled {
        if config.admin.api_key.trim().is_empty() {
            errors.push(ValidationError::new("admin.api_key", "must not be empty"));
        }
        if config.admin.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "admin.bind_address",
                "must be a socket address",
            ));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "must be a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = AppConfig::default();
        config.circuit.window_size_secs = 0;
        config.circuit.failure_threshold = 0;
        config.retries.max_attempts = 0;
        config.controller.base_url = "not a url".to_string();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "circuit.window_size_secs",
                "circuit.failure_threshold",
                "retries.max_attempts",
                "controller.base_url",
            ]
        );
    }

    #[test]
    fn test_admin_checks_skipped_when_disabled() {
        let mut config = AppConfig::default();
        config.admin.enabled = false;
        config.admin.api_key = String::new();
        config.admin.bind_address = "nowhere".to_string();
        assert!(validate_config(&config).is_ok());
    }
}
