//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, in-flight bound > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: KernelConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::KernelConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("unknown log level '{0}'")]
    UnknownLogLevel(String),
}

pub fn validate_config(config: &KernelConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.transport.max_in_flight == 0 {
        errors.push(ValidationError::NotPositive("transport.max_in_flight"));
    }
    if config.transport.connect_timeout_ms == 0 {
        errors.push(ValidationError::NotPositive("transport.connect_timeout_ms"));
    }
    if config.transport.user_agent.trim().is_empty() {
        errors.push(ValidationError::Empty("transport.user_agent"));
    }
    if config.batch.default_timeout_ms == Some(0) {
        errors.push(ValidationError::NotPositive("batch.default_timeout_ms"));
    }
    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::UnknownLogLevel(config.observability.log_level.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
