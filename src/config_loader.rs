// Configuration loader for Emotion API
//
// This module handles loading configuration from the TOML configuration file
// and environment variables with appropriate precedence.

use std::env;
use std::fs;
use std::path::Path;

use log::{debug, info, warn};
use toml::Value;

const CONFIG_FILE_PATH: &str = "emotion_api.conf";

/// Path of the configuration file, overridable with `EMOTION_API_CONFIG`
pub fn config_file_path() -> String {
    env::var("EMOTION_API_CONFIG").unwrap_or_else(|_| CONFIG_FILE_PATH.to_string())
}

/// Parse a flat TOML document into key-value pairs
///
/// Nested tables and arrays are skipped with a warning.
pub fn parse_config(content: &str) -> Result<Vec<(String, String)>, toml::de::Error> {
    let values: Value = content.parse()?;

    let mut pairs = Vec::new();
    if let Value::Table(table) = values {
        for (key, value) in table {
            let value = match value {
                Value::String(s) => s,
                Value::Integer(i) => i.to_string(),
                Value::Float(f) => f.to_string(),
                Value::Boolean(b) => b.to_string(),
                _ => {
                    warn!("Skipping unsupported TOML value type for key: {}", key);
                    continue;
                }
            };
            pairs.push((key, value));
        }
    }
    Ok(pairs)
}

/// Loads configuration from TOML file and environment variables
///
/// Configuration precedence (highest to lowest):
/// 1. Environment variables
/// 2. Configuration file values
/// 3. Default values (not handled here - application defaults)
///
/// # Returns
///
/// Returns true if the config file was successfully loaded, false otherwise
pub fn load_config() -> bool {
    let path = config_file_path();
    let config_path = Path::new(&path);

    if !config_path.exists() {
        debug!("Configuration file not found at: {}", path);
        return false;
    }

    let config_content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Failed to read configuration file: {}", e);
            return false;
        }
    };

    let pairs = match parse_config(&config_content) {
        Ok(pairs) => pairs,
        Err(e) => {
            warn!("Failed to parse configuration file: {}", e);
            return false;
        }
    };

    // Set environment variables from config file if they don't already exist
    for (key, value) in pairs {
        if env::var(&key).is_err() {
            debug!("Setting env var from config file: {}", key);
            env::set_var(key, value);
        } else {
            debug!("Env var already exists, skipping: {}", key);
        }
    }

    info!("Configuration loaded from {}", path);
    true
}
