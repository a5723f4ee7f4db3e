//! Settings service
//!
//! Manages application settings persistence using JSON file storage.
//! Secrets are never written here; the completion API key is read from the
//! environment variable the `llm` section names.

use crate::config::{
    DEFAULT_LLM_API_KEY_ENV, DEFAULT_LLM_API_URL, DEFAULT_LLM_MAX_TOKENS, DEFAULT_LLM_MODEL,
    DEFAULT_LLM_TEMPERATURE, DEFAULT_LLM_TIMEOUT_SECS,
};
use crate::database::PoolConfig;
use crate::error::{AppError, Result};
use crate::search::LlmConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Database location and pool size
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Relative paths resolve against the data directory
    #[serde(default = "default_database_file")]
    pub file: PathBuf,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_busy_timeout_secs")]
    pub busy_timeout_secs: u64,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

fn default_database_file() -> PathBuf {
    PathBuf::from("labnotes.db")
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout_secs() -> u64 {
    5
}

fn default_acquire_timeout_secs() -> u64 {
    10
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            file: default_database_file(),
            max_connections: default_max_connections(),
            busy_timeout_secs: default_busy_timeout_secs(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
        }
    }
}

impl DatabaseSettings {
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            max_connections: self.max_connections,
            busy_timeout: Duration::from_secs(self.busy_timeout_secs),
            acquire_timeout: Duration::from_secs(self.acquire_timeout_secs),
        }
    }
}

/// Remote completion service used for free-text search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmSettings {
    /// When false only the keyword extractor runs
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_llm_api_url")]
    pub api_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_llm_temperature")]
    pub temperature: f32,
    /// Name of the environment variable holding the API key
    #[serde(default = "default_llm_api_key_env")]
    pub api_key_env: String,
}

fn default_true() -> bool {
    true
}

fn default_llm_api_url() -> String {
    DEFAULT_LLM_API_URL.to_string()
}

fn default_llm_model() -> String {
    DEFAULT_LLM_MODEL.to_string()
}

fn default_llm_timeout() -> u64 {
    DEFAULT_LLM_TIMEOUT_SECS
}

fn default_llm_max_tokens() -> u32 {
    DEFAULT_LLM_MAX_TOKENS
}

fn default_llm_temperature() -> f32 {
    DEFAULT_LLM_TEMPERATURE
}

fn default_llm_api_key_env() -> String {
    DEFAULT_LLM_API_KEY_ENV.to_string()
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            api_url: default_llm_api_url(),
            model: default_llm_model(),
            timeout_secs: default_llm_timeout(),
            max_tokens: default_llm_max_tokens(),
            temperature: default_llm_temperature(),
            api_key_env: default_llm_api_key_env(),
        }
    }
}

impl LlmSettings {
    /// Extractor configuration with the key taken from the environment.
    pub fn to_config(&self) -> LlmConfig {
        let api_key = std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());

        if api_key.is_none() {
            tracing::info!("{} is not set; free-text search uses keywords only", self.api_key_env);
        }

        LlmConfig {
            api_url: self.api_url.clone(),
            api_key,
            model: self.model.clone(),
            timeout_secs: self.timeout_secs,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

/// Condition taxonomy files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionSettings {
    /// Folder of `<method>.json` taxonomies, relative to the data directory
    #[serde(default = "default_taxonomy_dir")]
    pub taxonomy_dir: PathBuf,
    #[serde(default = "default_method")]
    pub default_method: String,
}

fn default_taxonomy_dir() -> PathBuf {
    PathBuf::from("conditions")
}

fn default_method() -> String {
    "default".to_string()
}

impl Default for ConditionSettings {
    fn default() -> Self {
        Self {
            taxonomy_dir: default_taxonomy_dir(),
            default_method: default_method(),
        }
    }
}

/// Log output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSettings {
    /// Filter directive; `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Also write a daily rolling file
    #[serde(default)]
    pub file_enabled: bool,
    /// Relative paths resolve against the data directory
    #[serde(default = "default_log_dir")]
    pub directory: PathBuf,
}

fn default_log_level() -> String {
    "labnotes=info,warn".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_enabled: false,
            directory: default_log_dir(),
        }
    }
}

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AppSettings {
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub conditions: ConditionSettings,
    #[serde(default)]
    pub logging: LogSettings,
}

impl AppSettings {
    /// Make every relative path absolute under `data_dir`.
    pub fn resolve_paths(&mut self, data_dir: &Path) {
        for path in [
            &mut self.database.file,
            &mut self.conditions.taxonomy_dir,
            &mut self.logging.directory,
        ] {
            if path.is_relative() {
                *path = data_dir.join(&*path);
            }
        }
    }
}

/// Service for managing application settings
#[derive(Clone)]
pub struct SettingsService {
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new(app_data_dir: PathBuf) -> Self {
        Self {
            settings_path: app_data_dir.join("settings.json"),
        }
    }

    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    /// Load settings from disk or create default if not exists
    pub async fn load(&self) -> Result<AppSettings> {
        if !self.settings_path.exists() {
            tracing::info!("Settings file not found, creating default settings");
            let default = AppSettings::default();
            self.save(&default).await?;
            return Ok(default);
        }

        let content = fs::read_to_string(&self.settings_path).await?;
        let settings: AppSettings = serde_json::from_str(&content)
            .map_err(|e| AppError::Generic(format!("Failed to parse settings: {}", e)))?;

        Ok(settings)
    }

    /// Save settings to disk
    pub async fn save(&self, settings: &AppSettings) -> Result<()> {
        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(settings)
            .map_err(|e| AppError::Generic(format!("Failed to serialize settings: {}", e)))?;

        fs::write(&self.settings_path, content).await?;
        tracing::info!("Settings saved to {:?}", self.settings_path);

        Ok(())
    }

    /// Update the completion service section
    pub async fn update_llm(&self, llm: LlmSettings) -> Result<()> {
        let mut settings = self.load().await?;
        settings.llm = llm;
        self.save(&settings).await
    }

    /// Update the log section
    pub async fn update_logging(&self, logging: LogSettings) -> Result<()> {
        let mut settings = self.load().await?;
        settings.logging = logging;
        self.save(&settings).await
    }
}
