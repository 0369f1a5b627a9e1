//! Configuration loading, validation, and management for Mentora.
//!
//! Loads configuration from `~/.mentora/config.toml` (or an explicit
//! path) with environment variable overrides for secrets and
//! deployment-specific settings. Validates all settings at startup.

use mentora_core::backend::BackendMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.mentora/config.toml`.
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Inference endpoint settings
    #[serde(default)]
    pub llm: LlmConfig,

    /// Chat engine settings (windows, welcome messages, sessions)
    #[serde(default)]
    pub chat: ChatConfig,

    /// Authentication settings
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("server", &self.server)
            .field("database", &self.database)
            .field("llm", &self.llm)
            .field("chat", &self.chat)
            .field("auth", &self.auth)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origin for browser clients.
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8000
}
fn default_cors_origin() -> String {
    "http://localhost:8080".into()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path. Pass `:memory:` for an ephemeral database.
    #[serde(default = "default_database_path")]
    pub path: String,
}

fn default_database_path() -> String {
    AppConfig::workspace_dir()
        .join("mentora.db")
        .to_string_lossy()
        .into_owned()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of the OpenAI-compatible inference API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// API key sent as a bearer header. Usually supplied via
    /// `MENTORA_API_KEY` rather than the config file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Bounded timeout for one completion request; expiry is treated
    /// as a transport failure.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Which upstream API shape to use: "completion" or "chat".
    #[serde(default)]
    pub mode: BackendMode,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "llama-3.3-70b-instruct".into()
}
fn default_max_tokens() -> u32 {
    5000
}
fn default_temperature() -> f32 {
    0.5
}
fn default_timeout_secs() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
            mode: BackendMode::default(),
        }
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .field("mode", &self.mode)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Recency window for the general QA path.
    #[serde(default = "default_qa_window")]
    pub qa_window: usize,

    /// Recency window for the lesson-grounded path.
    #[serde(default = "default_guide_window")]
    pub guide_window: usize,

    /// Maximum live sessions per registry; the least recently created
    /// session is evicted when the cap is reached.
    #[serde(default = "default_session_capacity")]
    pub session_capacity: usize,

    /// Assistant message a fresh QA session is seeded with.
    #[serde(default = "default_qa_welcome")]
    pub qa_welcome: String,

    /// Assistant message a fresh lesson-guide session is seeded with.
    #[serde(default = "default_guide_welcome")]
    pub guide_welcome: String,

    /// Directory of named prompt template JSON documents.
    #[serde(default = "default_templates_dir")]
    pub templates_dir: PathBuf,
}

fn default_qa_window() -> usize {
    8
}
fn default_guide_window() -> usize {
    12
}
fn default_session_capacity() -> usize {
    1_000
}
fn default_qa_welcome() -> String {
    "Learning to code isn't hard! I'm your AI tutor — here to make \
     programming easy to understand and to walk with you every step \
     of the way."
        .into()
}
fn default_guide_welcome() -> String {
    "Welcome to your AI tutor! Ask me anything about this lesson.".into()
}
fn default_templates_dir() -> PathBuf {
    AppConfig::workspace_dir().join("prompts")
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            qa_window: default_qa_window(),
            guide_window: default_guide_window(),
            session_capacity: default_session_capacity(),
            qa_welcome: default_qa_welcome(),
            guide_welcome: default_guide_welcome(),
            templates_dir: default_templates_dir(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Secret used to sign access tokens. Usually supplied via
    /// `MENTORA_TOKEN_SECRET`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_secret: Option<String>,

    /// Access token lifetime in minutes.
    #[serde(default = "default_token_ttl_minutes")]
    pub token_ttl_minutes: i64,
}

fn default_token_ttl_minutes() -> i64 {
    60 * 24
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: None,
            token_ttl_minutes: default_token_ttl_minutes(),
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token_secret", &redact(&self.token_secret))
            .field("token_ttl_minutes", &self.token_ttl_minutes)
            .finish()
    }
}

/// Errors from configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl AppConfig {
    /// Default workspace directory: `~/.mentora`.
    pub fn workspace_dir() -> PathBuf {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".mentora")
    }

    /// Default config file path: `~/.mentora/config.toml`.
    pub fn default_path() -> PathBuf {
        Self::workspace_dir().join("config.toml")
    }

    /// Load configuration from the given path (or the default path),
    /// apply environment overrides, and validate.
    ///
    /// A missing file is not an error: defaults plus environment
    /// overrides are used.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(PathBuf::from).unwrap_or_else(Self::default_path);

        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
            toml::from_str(&raw)?
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            AppConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Environment variables override file settings.
    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("MENTORA_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Ok(url) = std::env::var("MENTORA_API_URL") {
            self.llm.api_url = url;
        }
        if let Ok(model) = std::env::var("MENTORA_MODEL") {
            self.llm.model = model;
        }
        if let Ok(path) = std::env::var("MENTORA_DATABASE_PATH") {
            self.database.path = path;
        }
        if let Ok(secret) = std::env::var("MENTORA_TOKEN_SECRET") {
            self.auth.token_secret = Some(secret);
        }
        if let Ok(port) = std::env::var("MENTORA_PORT")
            && let Ok(port) = port.parse()
        {
            self.server.port = port;
        }
    }

    /// Validate settings that would otherwise fail at an awkward time.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.api_url.trim().is_empty() {
            return Err(ConfigError::Invalid("llm.api_url must not be empty".into()));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::Invalid(format!(
                "llm.temperature must be in 0.0..=2.0, got {}",
                self.llm.temperature
            )));
        }
        if self.llm.max_tokens == 0 {
            return Err(ConfigError::Invalid("llm.max_tokens must be > 0".into()));
        }
        if self.chat.session_capacity == 0 {
            return Err(ConfigError::Invalid(
                "chat.session_capacity must be > 0".into(),
            ));
        }
        if self.auth.token_ttl_minutes <= 0 {
            return Err(ConfigError::Invalid(
                "auth.token_ttl_minutes must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chat.qa_window, 8);
        assert_eq!(config.chat.guide_window, 12);
        assert_eq!(config.llm.mode, BackendMode::Completion);
    }

    #[test]
    fn parses_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            [server]
            port = 9000

            [llm]
            api_url = "http://localhost:11434/v1"
            mode = "chat"

            [chat]
            qa_window = 4
            "#,
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.llm.api_url, "http://localhost:11434/v1");
        assert_eq!(config.llm.mode, BackendMode::Chat);
        assert_eq!(config.chat.qa_window, 4);
        // Untouched sections keep defaults
        assert_eq!(config.chat.guide_window, 12);
    }

    #[test]
    fn rejects_bad_temperature() {
        let mut config = AppConfig::default();
        config.llm.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut config = AppConfig::default();
        config.llm.api_key = Some("sk-very-secret".into());
        config.auth.token_secret = Some("hmac-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-very-secret"));
        assert!(!debug.contains("hmac-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
