//! Extraction configuration.
//!
//! Loaded once at startup from an optional TOML file, then overlaid with
//! environment variables. After that it is read-only and shared.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Name `prefer` searches under when discovering a config file.
pub const APP_NAME: &str = "timingboard";

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "TIMINGBOARD_CONFIG";

/// Characters tesseract may emit: ASCII letters and digits, board punctuation,
/// and the Tamil vowels, consonants, vowel signs and virama.
pub const DEFAULT_CHAR_WHITELIST: &str = concat!(
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789:.-!() /\n",
    "அஆஇஈஉஊஎஏஐஒஓஔகஙசஞடணதநபமயரலவழளறனஜஷஸஹக்ஷ்ாிீுூெேைொோௌ்ௐ",
);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config {}: {source}", .path.display())]
    ParseJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub remote: RemoteConfig,
    pub gemini: GeminiConfig,
    pub ocr_service: OcrServiceConfig,
    pub tesseract: TesseractConfig,
    pub preprocess: PreprocessConfig,
    pub parser: ParserConfig,
}

/// Ordered chain of remote capabilities tried before local OCR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Backend names, tried in order (`gemini`, `ocr-service`).
    pub backends: Vec<String>,
    /// Per-call timeout; a timeout counts as a remote failure.
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            backends: vec!["gemini".to_string()],
            timeout_secs: 60,
        }
    }
}

/// Gemini vision model settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    /// Retries on HTTP 429 before giving up.
    pub max_retries: u32,
    /// Fixed pause before each request.
    pub delay_ms: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            model: "gemini-1.5-flash".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            max_retries: 3,
            delay_ms: 0,
        }
    }
}

/// Remote OCR microservice settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrServiceConfig {
    pub enabled: bool,
    pub url: String,
}

impl Default for OcrServiceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: "http://localhost:8081".to_string(),
        }
    }
}

/// Local tesseract settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TesseractConfig {
    pub enabled: bool,
    pub tessdata_dir: PathBuf,
    /// Language packs, `+`-joined.
    pub languages: String,
    pub char_whitelist: String,
    pub page_seg_mode: u8,
    pub engine_mode: u8,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tessdata_dir: default_tessdata_dir(),
            languages: "eng+tam".to_string(),
            char_whitelist: DEFAULT_CHAR_WHITELIST.to_string(),
            page_seg_mode: 6,
            engine_mode: 1,
        }
    }
}

fn default_tessdata_dir() -> PathBuf {
    if cfg!(target_os = "macos") {
        PathBuf::from("/opt/homebrew/share/tessdata")
    } else {
        PathBuf::from("/usr/share/tesseract-ocr/4.00/tessdata")
    }
}

/// Image preprocessing bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    pub max_dimension: u32,
    pub min_dimension: u32,
    pub upscale_factor: u32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            max_dimension: 3000,
            min_dimension: 1000,
            upscale_factor: 2,
        }
    }
}

/// Raw-text parser settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Leading lines searched for the board's origin.
    pub header_scan_lines: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            header_scan_lines: crate::timing::board_parser::DEFAULT_HEADER_SCAN_LINES,
        }
    }
}

impl ExtractionConfig {
    /// Load configuration.
    ///
    /// Resolution order for the file: `explicit`, then `$TIMINGBOARD_CONFIG`,
    /// then whatever `prefer` discovers for `timingboard` in the standard
    /// config locations. Finding no file is not an error; a missing explicit
    /// one is.
    pub async fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let from_env = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
        let config = match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::from_path(&path)?,
            None => match Self::discover().await {
                Some(path) => Self::from_path(&path)?,
                None => {
                    debug!("no config file found, using defaults");
                    Self::default()
                }
            },
        };
        Ok(config.with_env_overrides())
    }

    /// Config file discovered by `prefer`, if any.
    pub async fn discover() -> Option<PathBuf> {
        match prefer::load(APP_NAME).await {
            Ok(found) => found.source_path().map(|p| p.to_path_buf()),
            Err(e) => {
                debug!("config discovery: {}", e);
                None
            }
        }
    }

    /// Parse a config file without env overrides.
    ///
    /// `.json` files are read as JSON, anything else as TOML.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => {
                serde_json::from_str(&contents).map_err(|source| ConfigError::ParseJson {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            _ => toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?,
        };
        debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `TIMINGBOARD_REMOTE_BACKENDS`: comma-separated remote chain
    /// - `TIMINGBOARD_REMOTE_TIMEOUT_SECS`: remote call timeout
    /// - `GEMINI_ENABLED`, `GEMINI_API_KEY`, `GEMINI_MODEL`, `GEMINI_ENDPOINT`, `GEMINI_DELAY_MS`
    /// - `OCR_SERVICE_ENABLED`, `OCR_SERVICE_URL`
    /// - `TESSDATA_PREFIX`: tesseract language data directory
    /// - `TESSERACT_LANGUAGES`: e.g. `eng+tam`
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(backends) = env_string("TIMINGBOARD_REMOTE_BACKENDS") {
            self.remote.backends = backends
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(secs) = env_parse("TIMINGBOARD_REMOTE_TIMEOUT_SECS") {
            self.remote.timeout_secs = secs;
        }

        if let Some(enabled) = env_bool("GEMINI_ENABLED") {
            self.gemini.enabled = enabled;
        }
        if let Some(key) = env_string("GEMINI_API_KEY") {
            self.gemini.api_key = Some(key);
        }
        if let Some(model) = env_string("GEMINI_MODEL") {
            self.gemini.model = model;
        }
        if let Some(endpoint) = env_string("GEMINI_ENDPOINT") {
            self.gemini.endpoint = endpoint;
        }
        if let Some(delay) = env_parse("GEMINI_DELAY_MS") {
            self.gemini.delay_ms = delay;
        }

        if let Some(enabled) = env_bool("OCR_SERVICE_ENABLED") {
            self.ocr_service.enabled = enabled;
        }
        if let Some(url) = env_string("OCR_SERVICE_URL") {
            self.ocr_service.url = url;
        }

        if let Some(dir) = env_string("TESSDATA_PREFIX") {
            self.tesseract.tessdata_dir = PathBuf::from(dir);
        }
        if let Some(languages) = env_string("TESSERACT_LANGUAGES") {
            self.tesseract.languages = languages;
        }

        self
    }

    /// Copy safe to print: secrets masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.gemini.api_key.is_some() {
            copy.gemini.api_key = Some("***".to_string());
        }
        copy
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_string(name).and_then(|v| v.parse().ok())
}

fn env_bool(name: &str) -> Option<bool> {
    env_string(name).and_then(|v| parse_bool(&v))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
