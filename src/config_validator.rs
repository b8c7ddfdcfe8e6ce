// Configuration validation module for Emotion API
//
// This module validates every configuration parameter read from the environment
// at startup, with clear, actionable error messages.
//
// The validation system is schema-driven: a central parameter registry defines
// the type, default and constraints of each option. Typed configuration is only
// built once the registry validates cleanly.

use std::env;
use std::net::IpAddr;
use std::path::Path;
use std::str::FromStr;

use log::{error, info, warn};

use crate::config::AppConfig;

/// Configuration parameter types
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigType {
    String,
    UnsignedInteger,
    IpAddress,
    Port,
    Url,
    DirectoryPath,
    OriginList,
    Enum(&'static [&'static str]),
}

/// Validation severity levels
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValidationLevel {
    Critical, // Must be valid for application to start
    Standard, // Important but application can start with defaults
    Warning,  // Optional, generates warnings only
}

/// Configuration parameter definition
#[derive(Debug, Clone)]
pub struct ConfigParam {
    pub name: &'static str,
    pub description: &'static str,
    pub param_type: ConfigType,
    pub default_value: Option<&'static str>,
    pub validation_level: ValidationLevel,
    pub min_value: Option<u64>,
    pub max_value: Option<u64>,
}

/// Centralized configuration parameter registry
pub const CONFIG_PARAMS: &[ConfigParam] = &[
    // Server Configuration
    ConfigParam {
        name: "HOST",
        description: "IP address the API server listens on",
        param_type: ConfigType::IpAddress,
        default_value: Some("0.0.0.0"),
        validation_level: ValidationLevel::Critical,
        min_value: None,
        max_value: None,
    },
    ConfigParam {
        name: "PORT",
        description: "Port for the API server",
        param_type: ConfigType::Port,
        default_value: Some("8000"),
        validation_level: ValidationLevel::Critical,
        min_value: None,
        max_value: None,
    },
    ConfigParam {
        name: "HTTP_WORKER_NUMBER",
        description: "Number of HTTP workers (0 = use CPU cores)",
        param_type: ConfigType::UnsignedInteger,
        default_value: Some("0"),
        validation_level: ValidationLevel::Standard,
        min_value: Some(0),
        max_value: Some(64),
    },
    ConfigParam {
        name: "EMOTION_API_TIMEOUT",
        description: "Client disconnect timeout in seconds",
        param_type: ConfigType::UnsignedInteger,
        default_value: Some("60"),
        validation_level: ValidationLevel::Standard,
        min_value: Some(1),
        max_value: Some(3600),
    },
    ConfigParam {
        name: "EMOTION_API_KEEPALIVE",
        description: "Keep-alive timeout in seconds",
        param_type: ConfigType::UnsignedInteger,
        default_value: Some("75"),
        validation_level: ValidationLevel::Standard,
        min_value: Some(1),
        max_value: Some(3600),
    },
    ConfigParam {
        name: "CORS_ALLOWED_ORIGINS",
        description: "Extra comma-separated CORS origins, '*' allowed in the host",
        param_type: ConfigType::OriginList,
        default_value: None,
        validation_level: ValidationLevel::Warning,
        min_value: None,
        max_value: None,
    },
    // Request Limits
    ConfigParam {
        name: "EMOTION_TMP_DIR",
        description: "Directory for temporary uploads",
        param_type: ConfigType::String,
        default_value: None,
        validation_level: ValidationLevel::Standard,
        min_value: None,
        max_value: None,
    },
    ConfigParam {
        name: "MAX_FILE_SIZE",
        description: "Maximum audio upload size in bytes",
        param_type: ConfigType::UnsignedInteger,
        default_value: Some("26214400"),
        validation_level: ValidationLevel::Standard,
        min_value: Some(1),
        max_value: Some(1_073_741_824),
    },
    ConfigParam {
        name: "MAX_TEXT_LENGTH",
        description: "Maximum text length in characters",
        param_type: ConfigType::UnsignedInteger,
        default_value: Some("512"),
        validation_level: ValidationLevel::Standard,
        min_value: Some(1),
        max_value: Some(100_000),
    },
    // Model Configuration
    ConfigParam {
        name: "EMOTION_MODEL_DIR",
        description: "Local directory with tokenizer.json and the ONNX model (skips the hub)",
        param_type: ConfigType::DirectoryPath,
        default_value: None,
        validation_level: ValidationLevel::Critical,
        min_value: None,
        max_value: None,
    },
    ConfigParam {
        name: "EMOTION_MODEL_REPO",
        description: "Model hub repository of the classifier",
        param_type: ConfigType::String,
        default_value: Some("CAMeL-Lab/bert-base-arabic-camelbert-mix"),
        validation_level: ValidationLevel::Standard,
        min_value: None,
        max_value: None,
    },
    ConfigParam {
        name: "EMOTION_MODEL_FILE",
        description: "ONNX file inside the model directory or repository",
        param_type: ConfigType::String,
        default_value: Some("onnx/model.onnx"),
        validation_level: ValidationLevel::Standard,
        min_value: None,
        max_value: None,
    },
    ConfigParam {
        name: "TRANSFORMERS_CACHE",
        description: "Cache directory for downloaded models",
        param_type: ConfigType::String,
        default_value: None,
        validation_level: ValidationLevel::Warning,
        min_value: None,
        max_value: None,
    },
    ConfigParam {
        name: "EMOTION_MAX_SEQUENCE_LENGTH",
        description: "Tokenizer truncation length",
        param_type: ConfigType::UnsignedInteger,
        default_value: Some("512"),
        validation_level: ValidationLevel::Standard,
        min_value: Some(8),
        max_value: Some(8192),
    },
    ConfigParam {
        name: "EMOTION_MODEL_RESIDENCY",
        description: "Keep the model loaded (resident) or load it per request (on_demand)",
        param_type: ConfigType::Enum(&["resident", "on_demand", "on-demand", "lazy"]),
        default_value: Some("resident"),
        validation_level: ValidationLevel::Standard,
        min_value: None,
        max_value: None,
    },
    ConfigParam {
        name: "EMOTION_MODEL_LOAD_ATTEMPTS",
        description: "Attempts to load the model before giving up",
        param_type: ConfigType::UnsignedInteger,
        default_value: Some("3"),
        validation_level: ValidationLevel::Standard,
        min_value: Some(1),
        max_value: Some(20),
    },
    ConfigParam {
        name: "EMOTION_MODEL_LOAD_DELAY_SECONDS",
        description: "Delay between model load attempts in seconds",
        param_type: ConfigType::UnsignedInteger,
        default_value: Some("5"),
        validation_level: ValidationLevel::Standard,
        min_value: Some(0),
        max_value: Some(600),
    },
    ConfigParam {
        name: "EMOTION_INTRA_THREADS",
        description: "Threads used by one ONNX forward pass",
        param_type: ConfigType::UnsignedInteger,
        default_value: Some("1"),
        validation_level: ValidationLevel::Standard,
        min_value: Some(1),
        max_value: Some(256),
    },
    ConfigParam {
        name: "EMOTION_LABEL_LOCALE",
        description: "Language of emotion labels in responses",
        param_type: ConfigType::Enum(&["ar", "en"]),
        default_value: Some("ar"),
        validation_level: ValidationLevel::Standard,
        min_value: None,
        max_value: None,
    },
    // Speech Recognition
    ConfigParam {
        name: "SPEECH_BACKEND",
        description: "Speech recognition backend",
        param_type: ConfigType::Enum(&["google", "openai"]),
        default_value: Some("google"),
        validation_level: ValidationLevel::Critical,
        min_value: None,
        max_value: None,
    },
    ConfigParam {
        name: "SPEECH_ENDPOINT",
        description: "Base URL of the speech recognition API",
        param_type: ConfigType::Url,
        default_value: None,
        validation_level: ValidationLevel::Standard,
        min_value: None,
        max_value: None,
    },
    ConfigParam {
        name: "SPEECH_API_KEY",
        description: "API key for the speech recognition backend",
        param_type: ConfigType::String,
        default_value: None,
        validation_level: ValidationLevel::Warning,
        min_value: None,
        max_value: None,
    },
    ConfigParam {
        name: "SPEECH_MODEL",
        description: "Model name for OpenAI-compatible backends",
        param_type: ConfigType::String,
        default_value: Some("whisper-1"),
        validation_level: ValidationLevel::Warning,
        min_value: None,
        max_value: None,
    },
    ConfigParam {
        name: "SPEECH_LANGUAGE",
        description: "Recognition locale",
        param_type: ConfigType::String,
        default_value: Some("ar-AR"),
        validation_level: ValidationLevel::Standard,
        min_value: None,
        max_value: None,
    },
    ConfigParam {
        name: "SPEECH_TIMEOUT_SECONDS",
        description: "Timeout of one speech recognition request in seconds",
        param_type: ConfigType::UnsignedInteger,
        default_value: Some("30"),
        validation_level: ValidationLevel::Standard,
        min_value: Some(1),
        max_value: Some(600),
    },
    // Metrics Configuration
    ConfigParam {
        name: "METRICS_BACKEND",
        description: "Metrics backend type",
        param_type: ConfigType::Enum(&["prometheus", "none", "null", "disabled"]),
        default_value: Some("none"),
        validation_level: ValidationLevel::Standard,
        min_value: None,
        max_value: None,
    },
];

/// Configuration validation errors with detailed context
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub value: String,
    pub error_type: ConfigErrorType,
    pub message: String,
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigErrorType {
    InvalidValue,
    InvalidFormat,
    InvalidRange,
    DirectoryNotFound,
    Missing,
}

impl ConfigValidationError {
    fn new(
        field: &str,
        value: &str,
        error_type: ConfigErrorType,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            field: field.to_string(),
            value: value.to_string(),
            error_type,
            message: message.into(),
            suggestion: Some(suggestion.into()),
        }
    }
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Configuration error in '{}' ({:?}): {} (value: '{}')",
            self.field, self.error_type, self.message, self.value
        )?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " - Suggestion: {}", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for ConfigValidationError {}

/// Result type for configuration validation
pub type ValidationResult<T> = Result<T, ConfigValidationError>;

/// Collected validation outcome
#[derive(Debug, Default)]
pub struct ValidationResults {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ConfigValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ConfigValidationError) {
        self.warnings.push(warning);
    }

    /// File an issue according to the parameter's severity
    fn add(&mut self, level: ValidationLevel, issue: ConfigValidationError) {
        match level {
            ValidationLevel::Critical | ValidationLevel::Standard => self.add_error(issue),
            ValidationLevel::Warning => self.add_warning(issue),
        }
    }

    pub fn print_summary(&self) {
        if !self.errors.is_empty() {
            error!(
                "Configuration validation found {} error(s):",
                self.errors.len()
            );
            for (i, err) in self.errors.iter().enumerate() {
                error!("  {}. {}", i + 1, err);
            }
        }

        if !self.warnings.is_empty() {
            warn!(
                "Configuration validation found {} warning(s):",
                self.warnings.len()
            );
            for (i, warning) in self.warnings.iter().enumerate() {
                warn!("  {}. {}", i + 1, warning);
            }
        }

        if self.is_valid() && self.warnings.is_empty() {
            info!("Configuration validation passed successfully");
        } else if self.is_valid() {
            info!(
                "Configuration validation passed with {} warning(s)",
                self.warnings.len()
            );
        }
    }
}

/// Helper functions for common validation patterns
pub mod validators {
    use super::*;

    /// Validate unsigned integer values with optional range
    pub fn validate_unsigned(
        field: &str,
        value: &str,
        min: Option<u64>,
        max: Option<u64>,
    ) -> ValidationResult<u64> {
        let parsed = value.trim().parse::<u64>().map_err(|_| {
            ConfigValidationError::new(
                field,
                value,
                ConfigErrorType::InvalidFormat,
                "Invalid unsigned integer format",
                "Use a valid positive integer number",
            )
        })?;

        if let Some(min) = min {
            if parsed < min {
                return Err(ConfigValidationError::new(
                    field,
                    value,
                    ConfigErrorType::InvalidRange,
                    format!("Value {} is below minimum {}", parsed, min),
                    format!("Use a value >= {}", min),
                ));
            }
        }

        if let Some(max) = max {
            if parsed > max {
                return Err(ConfigValidationError::new(
                    field,
                    value,
                    ConfigErrorType::InvalidRange,
                    format!("Value {} is above maximum {}", parsed, max),
                    format!("Use a value <= {}", max),
                ));
            }
        }

        Ok(parsed)
    }

    /// Validate enumerated values, ignoring case
    pub fn validate_enum(field: &str, value: &str, valid_values: &[&str]) -> ValidationResult<String> {
        let lowered = value.trim().to_lowercase();
        if valid_values.iter().any(|v| v.eq_ignore_ascii_case(&lowered)) {
            Ok(lowered)
        } else {
            Err(ConfigValidationError::new(
                field,
                value,
                ConfigErrorType::InvalidValue,
                format!("Invalid value, must be one of: {}", valid_values.join(", ")),
                format!("Use one of: {}", valid_values.join(", ")),
            ))
        }
    }

    /// Validate IP address
    pub fn validate_ip_address(field: &str, value: &str) -> ValidationResult<IpAddr> {
        IpAddr::from_str(value.trim()).map_err(|_| {
            ConfigValidationError::new(
                field,
                value,
                ConfigErrorType::InvalidFormat,
                "Invalid IP address format",
                "Use a valid IPv4 or IPv6 address (e.g., 0.0.0.0 or ::1)",
            )
        })
    }

    /// Validate port number
    pub fn validate_port(field: &str, value: &str) -> ValidationResult<u16> {
        let port = value.trim().parse::<u16>().map_err(|_| {
            ConfigValidationError::new(
                field,
                value,
                ConfigErrorType::InvalidFormat,
                "Invalid port number format",
                "Use a number between 1 and 65535",
            )
        })?;

        if port == 0 {
            return Err(ConfigValidationError::new(
                field,
                value,
                ConfigErrorType::InvalidRange,
                "Port number cannot be 0",
                "Use a port between 1 and 65535",
            ));
        }

        Ok(port)
    }

    /// Validate an http(s) URL with a host
    pub fn validate_url(field: &str, value: &str) -> ValidationResult<String> {
        let value = value.trim();
        let rest = value
            .strip_prefix("https://")
            .or_else(|| value.strip_prefix("http://"));

        match rest {
            Some(host) if !host.is_empty() && !host.starts_with('/') => Ok(value.to_string()),
            _ => Err(ConfigValidationError::new(
                field,
                value,
                ConfigErrorType::InvalidFormat,
                "Invalid URL",
                "Use an absolute http:// or https:// URL",
            )),
        }
    }

    /// Validate a comma-separated list of origins
    pub fn validate_origin_list(field: &str, value: &str) -> ValidationResult<Vec<String>> {
        let mut origins = Vec::new();
        for origin in value.split(',').map(str::trim).filter(|o| !o.is_empty()) {
            if origin == "*" {
                origins.push(origin.to_string());
                continue;
            }
            if origin.matches('*').count() > 1 {
                return Err(ConfigValidationError::new(
                    field,
                    origin,
                    ConfigErrorType::InvalidFormat,
                    "Origin pattern has more than one wildcard",
                    "Use a single '*' in the host, e.g. https://*.example.com",
                ));
            }
            validate_url(field, origin)?;
            origins.push(origin.to_string());
        }
        Ok(origins)
    }

    /// Validate directory path exists
    pub fn validate_directory_exists(field: &str, value: &str) -> ValidationResult<String> {
        let path = Path::new(value);
        if !path.is_dir() {
            return Err(ConfigValidationError::new(
                field,
                value,
                ConfigErrorType::DirectoryNotFound,
                "Directory does not exist",
                "Ensure the directory exists or unset the variable",
            ));
        }
        Ok(value.to_string())
    }
}

/// Validate a single value against its parameter definition
pub fn validate_param(param: &ConfigParam, value: &str) -> ValidationResult<()> {
    match param.param_type {
        ConfigType::String => Ok(()),
        ConfigType::UnsignedInteger => {
            validators::validate_unsigned(param.name, value, param.min_value, param.max_value)
                .map(|_| ())
        }
        ConfigType::IpAddress => validators::validate_ip_address(param.name, value).map(|_| ()),
        ConfigType::Port => validators::validate_port(param.name, value).map(|_| ()),
        ConfigType::Url => validators::validate_url(param.name, value).map(|_| ()),
        ConfigType::DirectoryPath => {
            validators::validate_directory_exists(param.name, value).map(|_| ())
        }
        ConfigType::OriginList => validators::validate_origin_list(param.name, value).map(|_| ()),
        ConfigType::Enum(valid_values) => {
            validators::validate_enum(param.name, value, valid_values).map(|_| ())
        }
    }
}

pub struct EmotionConfigValidator;

impl EmotionConfigValidator {
    /// Validate all parameters from the environment and build the typed configuration
    pub fn validate_and_load() -> Result<AppConfig, ValidationResults> {
        info!("Starting configuration validation...");

        let results = Self::validate_with(|name| env::var(name).ok());
        results.print_summary();

        if results.is_valid() {
            Ok(AppConfig::default())
        } else {
            Err(results)
        }
    }

    /// Validate all parameters using `lookup` to read their values
    pub fn validate_with<F>(lookup: F) -> ValidationResults
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut results = ValidationResults::new();

        for param in CONFIG_PARAMS {
            // Unset or empty values fall back to defaults, which are always valid
            let value = match lookup(param.name) {
                Some(v) if !v.trim().is_empty() => v,
                _ => continue,
            };

            if let Err(issue) = validate_param(param, &value) {
                results.add(param.validation_level, issue);
            }
        }

        Self::validate_cross_dependencies(&mut results, &lookup);
        results
    }

    /// Validate cross-parameter dependencies
    fn validate_cross_dependencies<F>(results: &mut ValidationResults, lookup: &F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = lookup("SPEECH_BACKEND")
            .unwrap_or_else(|| "google".to_string())
            .to_lowercase();
        let has_key = lookup("SPEECH_API_KEY")
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false);

        if !has_key {
            results.add_warning(ConfigValidationError::new(
                "SPEECH_API_KEY",
                "",
                ConfigErrorType::Missing,
                format!("No API key set for the {} speech backend", backend),
                "Set SPEECH_API_KEY or audio requests will likely be rejected upstream",
            ));
        }

        let has_model_dir = lookup("EMOTION_MODEL_DIR")
            .map(|d| !d.trim().is_empty())
            .unwrap_or(false);
        if has_model_dir && lookup("EMOTION_MODEL_REPO").is_some() {
            results.add_warning(ConfigValidationError::new(
                "EMOTION_MODEL_REPO",
                &lookup("EMOTION_MODEL_REPO").unwrap_or_default(),
                ConfigErrorType::InvalidValue,
                "Ignored because EMOTION_MODEL_DIR is set",
                "Unset one of EMOTION_MODEL_DIR or EMOTION_MODEL_REPO",
            ));
        }
    }

    /// Generate a sample configuration file with all parameters and descriptions
    pub fn generate_sample_config() -> String {
        let mut output = String::new();
        output.push_str("# Emotion API Configuration File\n");
        output.push_str("# Environment variables take precedence over values in this file\n");

        let mut current_category = "";
        for param in CONFIG_PARAMS {
            let category = if param.name.starts_with("EMOTION_MODEL")
                || param.name.starts_with("EMOTION_MAX_SEQUENCE")
                || param.name.starts_with("EMOTION_INTRA")
                || param.name.starts_with("EMOTION_LABEL")
                || param.name == "TRANSFORMERS_CACHE"
            {
                "Model Configuration"
            } else if param.name.starts_with("SPEECH_") {
                "Speech Recognition"
            } else if param.name.starts_with("METRICS_") {
                "Metrics Configuration"
            } else if param.name.starts_with("MAX_") || param.name == "EMOTION_TMP_DIR" {
                "Request Limits"
            } else {
                "Server Configuration"
            };

            if category != current_category {
                output.push_str(&format!("\n# ======== {} ========\n", category));
                current_category = category;
            }

            output.push_str(&format!("# {}\n", param.description));
            match param.default_value {
                Some(default) => output.push_str(&format!(
                    "{} = {}\n\n",
                    param.name,
                    toml_literal(param, default)
                )),
                None => output.push_str(&format!("# {} = \"\"\n\n", param.name)),
            }
        }
        output
    }
}

/// Render a default as a TOML value
fn toml_literal(param: &ConfigParam, value: &str) -> String {
    match param.param_type {
        ConfigType::UnsignedInteger | ConfigType::Port => value.to_string(),
        _ => format!("\"{}\"", value),
    }
}
