//! Configuration validation
//!
//! Validates icinga2rt configuration for correctness:
//! - Required connection settings are present
//! - URLs use http or https
//! - The retry budget and permitted states are not empty
//!
//! All problems are collected so an operator can fix them in one pass.

use super::app_config::Icinga2RtConfig;
use crate::Icinga2RtError;

/// Validation error details
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validation result
pub type ValidationResult = std::result::Result<(), Vec<ValidationError>>;

/// Validate an icinga2rt configuration
pub fn validate_config(config: &Icinga2RtConfig) -> ValidationResult {
    let mut errors = Vec::new();

    if config.icinga.url.is_empty() {
        errors.push(ValidationError::new("icinga.url", "must be set"));
    } else if !is_http_url(&config.icinga.url) {
        errors.push(ValidationError::new(
            "icinga.url",
            format!("Invalid URL: {}", config.icinga.url),
        ));
    }

    if config.icinga.user.is_empty() {
        errors.push(ValidationError::new("icinga.user", "must be set"));
    }

    if config.icinga.retries == 0 {
        errors.push(ValidationError::new(
            "icinga.retries",
            "must be greater than 0",
        ));
    }

    if config.icinga.queue.is_empty() {
        errors.push(ValidationError::new("icinga.queue", "must be set"));
    }

    if let Some(ref rt) = config.rt {
        if !is_http_url(&rt.url) {
            errors.push(ValidationError::new(
                "rt.url",
                format!("Invalid URL: {}", rt.url),
            ));
        }

        if rt.user.is_empty() {
            errors.push(ValidationError::new("rt.user", "must be set"));
        }
    }

    if config.ticket.queue.is_empty() {
        errors.push(ValidationError::new("ticket.queue", "must be set"));
    }

    if config.ticket.nobody.is_empty() {
        errors.push(ValidationError::new("ticket.nobody", "must be set"));
    }

    if config.ticket.permit.is_empty() {
        errors.push(ValidationError::new(
            "ticket.permit",
            "At least one state must be permitted",
        ));
    }

    if config.cache.path.as_os_str().is_empty() {
        errors.push(ValidationError::new("cache.path", "must be set"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("http://")
}

/// Validate configuration and return a Result
pub fn validate_config_result(config: &Icinga2RtConfig) -> crate::Result<()> {
    validate_config(config).map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        Icinga2RtError::Config(format!(
            "Configuration validation failed:\n  - {}",
            messages.join("\n  - ")
        ))
    })
}
