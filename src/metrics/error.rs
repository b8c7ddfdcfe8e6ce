//! Error types for the metrics system

use thiserror::Error;

/// Errors raised by metrics operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricsError {
    /// Invalid metric name (empty, invalid characters, wrong format)
    #[error("Invalid metric name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// Metric registration failed (duplicate registration, label mismatch)
    #[error("Failed to register metric '{name}': {reason}")]
    RegistrationFailed { name: String, reason: String },

    /// Metric export failed
    #[error("Failed to export metrics: {reason}")]
    ExportFailed { reason: String },
}

impl MetricsError {
    pub fn invalid_name<N: Into<String>, R: Into<String>>(name: N, reason: R) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn registration_failed<N: Into<String>, R: Into<String>>(name: N, reason: R) -> Self {
        Self::RegistrationFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn export_failed<R: Into<String>>(reason: R) -> Self {
        Self::ExportFailed {
            reason: reason.into(),
        }
    }
}

/// Validate a metric or label name against the Prometheus naming rules:
/// `[a-zA-Z_:][a-zA-Z0-9_:]*`
pub fn validate_metric_name(name: &str) -> Result<(), MetricsError> {
    let mut chars = name.chars();
    match chars.next() {
        None => return Err(MetricsError::invalid_name(name, "name is empty")),
        Some(c) if !(c.is_ascii_alphabetic() || c == '_' || c == ':') => {
            return Err(MetricsError::invalid_name(
                name,
                "must start with a letter, underscore or colon",
            ))
        }
        _ => {}
    }
    if chars.any(|c| !(c.is_ascii_alphanumeric() || c == '_' || c == ':')) {
        return Err(MetricsError::invalid_name(
            name,
            "only letters, digits, underscores and colons are allowed",
        ));
    }
    Ok(())
}
