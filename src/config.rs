// Emotion API configuration
//
// This module contains configuration structures and constants for the Emotion API.
// It centralizes all configuration parameters and provides defaults from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use log::warn;

use crate::retry::{Backoff, RetryPolicy};

/// Default values for configuration
pub mod defaults {
    // Listen address and port
    pub const HOST: &str = "0.0.0.0";
    pub const PORT: u16 = 8000;

    // HTTP timeouts in seconds
    pub const TIMEOUT: u64 = 60;
    pub const KEEPALIVE: u64 = 75;

    // Sub-directory of the system temp dir used for uploads
    pub const TEMP_SUBDIR: &str = "emotion_api";

    // 25MB upload limit
    pub const MAX_FILE_SIZE: usize = 26_214_400;

    // Maximum accepted text length, in characters
    pub const MAX_TEXT_LENGTH: usize = 512;

    // Model hub repository and ONNX file inside it
    pub const MODEL_REPO: &str = "CAMeL-Lab/bert-base-arabic-camelbert-mix";
    pub const MODEL_FILE: &str = "onnx/model.onnx";
    pub const TOKENIZER_FILE: &str = "tokenizer.json";

    // Tokenizer truncation budget
    pub const MAX_SEQUENCE_LENGTH: usize = 512;

    // Model loading retries
    pub const MODEL_LOAD_ATTEMPTS: u32 = 3;
    pub const MODEL_LOAD_DELAY_SECONDS: u64 = 5;

    pub const INTRA_THREADS: usize = 1;

    // Speech recognition
    pub const SPEECH_BACKEND: &str = "google";
    pub const SPEECH_LANGUAGE: &str = "ar-AR";
    pub const SPEECH_TIMEOUT_SECONDS: u64 = 30;
    pub const GOOGLE_SPEECH_ENDPOINT: &str = "https://speech.googleapis.com";
    pub const OPENAI_SPEECH_ENDPOINT: &str = "https://api.openai.com/v1";
    pub const OPENAI_SPEECH_MODEL: &str = "whisper-1";

    // Origins always allowed by CORS
    pub const CORS_ORIGINS: [&str; 3] = [
        "http://localhost:3000",
        "https://emotion-detection-frontend.vercel.app",
        "https://*.vercel.app",
    ];

    // Service metadata returned by the info endpoint
    pub const SERVICE_STATUS: &str = "Emotion Detection API is running";
    pub const DESIGNER: &str = "Abdullah Alawiss";
}

/// Read an environment variable and parse it, falling back to a default
fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// HTTP server settings
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Number of HTTP workers, 0 means one per CPU core
    pub workers: usize,
    pub timeout: Duration,
    pub keep_alive: Duration,
    /// Extra CORS origins on top of the built-in allow-list
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let cors_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            host: env::var("HOST").unwrap_or_else(|_| String::from(defaults::HOST)),
            port: env_parse("PORT", defaults::PORT),
            workers: env_parse("HTTP_WORKER_NUMBER", 0),
            timeout: Duration::from_secs(env_parse("EMOTION_API_TIMEOUT", defaults::TIMEOUT)),
            keep_alive: Duration::from_secs(env_parse(
                "EMOTION_API_KEEPALIVE",
                defaults::KEEPALIVE,
            )),
            cors_origins,
        }
    }
}

impl ServerConfig {
    /// Effective worker count
    pub fn worker_count(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get()
        } else {
            self.workers
        }
    }

    /// Built-in origins followed by the configured ones
    pub fn allowed_origins(&self) -> Vec<String> {
        defaults::CORS_ORIGINS
            .iter()
            .map(|o| o.to_string())
            .chain(self.cors_origins.iter().cloned())
            .collect()
    }
}

/// Configuration for the Emotion API handlers
#[derive(Clone, Debug)]
pub struct HandlerConfig {
    /// Directory to store temporary uploads
    pub temp_dir: PathBuf,
    /// Maximum upload size in bytes
    pub max_file_size: usize,
    /// Maximum accepted text length in characters
    pub max_text_length: usize,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            temp_dir: env::var("EMOTION_TMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| env::temp_dir().join(defaults::TEMP_SUBDIR)),
            max_file_size: env_parse("MAX_FILE_SIZE", defaults::MAX_FILE_SIZE),
            max_text_length: env_parse("MAX_TEXT_LENGTH", defaults::MAX_TEXT_LENGTH),
        }
    }
}

impl HandlerConfig {
    /// Ensures the temporary directory exists
    pub fn ensure_temp_dir(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.temp_dir)
    }
}

/// Whether the model stays loaded between requests
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelResidency {
    /// Loaded once at startup and kept in memory
    Resident,
    /// Loaded for every inference and released afterwards
    OnDemand,
}

impl FromStr for ModelResidency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "resident" => Ok(Self::Resident),
            "on_demand" | "on-demand" | "lazy" => Ok(Self::OnDemand),
            other => Err(format!("unknown model residency: {}", other)),
        }
    }
}

/// Language used for emotion keys in responses
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LabelLocale {
    Arabic,
    English,
}

impl FromStr for LabelLocale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ar" => Ok(Self::Arabic),
            "en" => Ok(Self::English),
            other => Err(format!("unknown label locale: {}", other)),
        }
    }
}

/// Where the classifier and its tokenizer come from
#[derive(Clone, Debug)]
pub enum ModelSource {
    /// Local directory holding `tokenizer.json` and the ONNX file
    Directory(PathBuf),
    /// Model hub repository, downloaded into the cache directory
    Hub {
        repo: String,
        cache_dir: Option<PathBuf>,
    },
}

/// Configuration for the emotion classifier
#[derive(Clone, Debug)]
pub struct ModelConfig {
    pub source: ModelSource,
    /// ONNX file, relative to the model directory or repository root
    pub model_file: String,
    pub tokenizer_file: String,
    pub max_sequence_length: usize,
    pub intra_threads: usize,
    pub residency: ModelResidency,
    pub label_locale: LabelLocale,
    pub load_retry: RetryPolicy,
}

impl Default for ModelConfig {
    fn default() -> Self {
        let source = match env::var("EMOTION_MODEL_DIR") {
            Ok(dir) if !dir.trim().is_empty() => ModelSource::Directory(PathBuf::from(dir)),
            _ => ModelSource::Hub {
                repo: env::var("EMOTION_MODEL_REPO")
                    .unwrap_or_else(|_| String::from(defaults::MODEL_REPO)),
                cache_dir: env::var("TRANSFORMERS_CACHE").ok().map(PathBuf::from),
            },
        };

        let residency = env::var("EMOTION_MODEL_RESIDENCY")
            .ok()
            .and_then(|s| match s.parse() {
                Ok(r) => Some(r),
                Err(e) => {
                    warn!("{}. Using resident model", e);
                    None
                }
            })
            .unwrap_or(ModelResidency::Resident);

        let label_locale = env::var("EMOTION_LABEL_LOCALE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(LabelLocale::Arabic);

        Self {
            source,
            model_file: env::var("EMOTION_MODEL_FILE")
                .unwrap_or_else(|_| String::from(defaults::MODEL_FILE)),
            tokenizer_file: String::from(defaults::TOKENIZER_FILE),
            max_sequence_length: env_parse(
                "EMOTION_MAX_SEQUENCE_LENGTH",
                defaults::MAX_SEQUENCE_LENGTH,
            ),
            intra_threads: env_parse("EMOTION_INTRA_THREADS", defaults::INTRA_THREADS),
            residency,
            label_locale,
            load_retry: RetryPolicy {
                max_attempts: env_parse(
                    "EMOTION_MODEL_LOAD_ATTEMPTS",
                    defaults::MODEL_LOAD_ATTEMPTS,
                ),
                delay: Duration::from_secs(env_parse(
                    "EMOTION_MODEL_LOAD_DELAY_SECONDS",
                    defaults::MODEL_LOAD_DELAY_SECONDS,
                )),
                backoff: Backoff::Fixed,
                max_delay: Duration::from_secs(60),
            },
        }
    }
}

/// Speech recognition backends
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpeechBackend {
    Google,
    OpenAi,
}

impl FromStr for SpeechBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "openai" => Ok(Self::OpenAi),
            other => Err(format!("unknown speech backend: {}", other)),
        }
    }
}

/// Configuration for the speech recognition client
#[derive(Clone, Debug)]
pub struct SpeechConfig {
    pub backend: SpeechBackend,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    /// BCP-47 locale sent to the backend
    pub language: String,
    pub timeout: Duration,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        let backend = env::var("SPEECH_BACKEND")
            .unwrap_or_else(|_| String::from(defaults::SPEECH_BACKEND))
            .parse()
            .unwrap_or_else(|e| {
                warn!("{}. Using {}", e, defaults::SPEECH_BACKEND);
                SpeechBackend::Google
            });

        let default_endpoint = match backend {
            SpeechBackend::Google => defaults::GOOGLE_SPEECH_ENDPOINT,
            SpeechBackend::OpenAi => defaults::OPENAI_SPEECH_ENDPOINT,
        };

        Self {
            backend,
            endpoint: env::var("SPEECH_ENDPOINT")
                .unwrap_or_else(|_| String::from(default_endpoint)),
            api_key: env::var("SPEECH_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            model: env::var("SPEECH_MODEL")
                .unwrap_or_else(|_| String::from(defaults::OPENAI_SPEECH_MODEL)),
            language: env::var("SPEECH_LANGUAGE")
                .unwrap_or_else(|_| String::from(defaults::SPEECH_LANGUAGE)),
            timeout: Duration::from_secs(env_parse(
                "SPEECH_TIMEOUT_SECONDS",
                defaults::SPEECH_TIMEOUT_SECONDS,
            )),
        }
    }
}

/// Configuration for metrics collection and export
#[derive(Clone, Debug)]
pub struct MetricsConfig {
    /// Type of metrics exporter ("prometheus", "none")
    pub exporter_type: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            exporter_type: env::var("METRICS_BACKEND").unwrap_or_else(|_| "none".to_string()),
        }
    }
}

/// All configuration sections, read from the environment
#[derive(Clone, Debug, Default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub handler: HandlerConfig,
    pub model: ModelConfig,
    pub speech: SpeechConfig,
    pub metrics: MetricsConfig,
}
