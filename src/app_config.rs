use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use url::Url;

use crate::errors::AppError;
use crate::language_utils::{LanguageCode, TargetSelection};
use crate::spreadsheet::default_columns;
use crate::translation::detection::DetectionMethod;
use crate::translation::orchestrator::{MAX_WORKERS, MIN_WORKERS, OrchestratorOptions};
use crate::translation::prompts::PromptTemplate;

/// Environment variable holding the API key
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Config {
    /// Completion API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Translation run settings
    #[serde(default)]
    pub translation: TranslationSettings,

    /// Output settings
    #[serde(default)]
    pub output: OutputConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Completion API configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ApiConfig {
    /// API key for the service
    #[serde(default = "String::new")]
    pub api_key: String,

    /// Service endpoint URL (for compatible self-hosted or proxied APIs)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model name (e.g., "gpt-4.1-mini")
    #[serde(default = "default_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: default_endpoint(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Translation run settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TranslationSettings {
    /// Columns to translate: header names or spreadsheet letters
    #[serde(default = "default_columns")]
    pub columns: Vec<String>,

    /// Maximum number of concurrent row tasks (clamped to 1..=30)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Temperature parameter for translation requests
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Temperature parameter for language classification requests
    #[serde(default = "default_detection_temperature")]
    pub detection_temperature: f32,

    /// Output cap of translation requests
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Total attempts per text, including the first one
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Backoff base for retries (in milliseconds)
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// System prompt template for translation
    /// Placeholders: {source_language}, {target_language}
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Language classifier back-end
    #[serde(default)]
    pub detection: DetectionMethod,

    /// Language assumed when detection finds nothing
    #[serde(default = "default_source_language")]
    pub default_source_language: LanguageCode,

    /// Fixed list of target languages; all other languages when absent
    #[serde(default)]
    pub target_languages: Option<Vec<LanguageCode>>,

    /// Whether identical cells are translated once per run
    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    /// Whether a run where every cell failed is an error
    #[serde(default = "default_true")]
    pub fail_on_total_failure: bool,
}

impl Default for TranslationSettings {
    fn default() -> Self {
        Self {
            columns: default_columns(),
            workers: default_workers(),
            temperature: default_temperature(),
            detection_temperature: default_detection_temperature(),
            max_tokens: default_max_tokens(),
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
            system_prompt: default_system_prompt(),
            detection: DetectionMethod::default(),
            default_source_language: default_source_language(),
            target_languages: None,
            cache_enabled: true,
            fail_on_total_failure: true,
        }
    }
}

impl TranslationSettings {
    /// Worker count clamped to the accepted range
    pub fn effective_workers(&self) -> usize {
        self.workers.clamp(MIN_WORKERS, MAX_WORKERS)
    }

    /// Target language strategy
    pub fn target_selection(&self) -> TargetSelection {
        match &self.target_languages {
            Some(list) => TargetSelection::Fixed(list.clone()),
            None => TargetSelection::AllExceptSource,
        }
    }

    /// System prompt as a template
    pub fn prompt_template(&self) -> PromptTemplate {
        PromptTemplate::new(&self.system_prompt)
    }

    /// Orchestrator options derived from these settings
    pub fn orchestrator_options(&self) -> OrchestratorOptions {
        OrchestratorOptions {
            workers: self.effective_workers(),
            target_selection: self.target_selection(),
            fail_on_total_failure: self.fail_on_total_failure,
        }
    }
}

/// How translated tables are laid out in the output
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputLayout {
    /// One sheet (or file) per language
    #[default]
    Sheets,
    /// One sheet with a `{column}_{CODE}` column per translation
    Wide,
}

/// Output configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct OutputConfig {
    /// Default output path
    #[serde(default = "default_output_path")]
    pub path: PathBuf,

    /// Output layout
    #[serde(default)]
    pub layout: OutputLayout,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            layout: OutputLayout::default(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Matching `log` filter
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4.1-mini".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_workers() -> usize {
    15
}

fn default_temperature() -> f32 {
    0.3
}

fn default_detection_temperature() -> f32 {
    0.0
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_retry_count() -> u32 {
    3 // attempts in total
}

fn default_retry_backoff_ms() -> u64 {
    1000 // doubled on each retry, plus up to the same amount of jitter
}

fn default_system_prompt() -> String {
    PromptTemplate::CELL_TRANSLATOR.to_string()
}

fn default_source_language() -> LanguageCode {
    LanguageCode::Fr
}

fn default_output_path() -> PathBuf {
    PathBuf::from("traductions.xlsx")
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load a JSON configuration file, or the defaults when it does not exist
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let file = File::open(path).with_context(|| format!("Failed to open config file: {:?}", path))?;
        let config = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(config)
    }

    /// Take the API key from the environment, which wins over the file
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                self.api.api_key = key;
            }
        }
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<(), AppError> {
        if self.api.api_key.trim().is_empty() {
            return Err(AppError::Config(format!(
                "An API key is required: pass --api-key or set {}",
                API_KEY_ENV
            )));
        }

        Url::parse(&self.api.endpoint)
            .map_err(|e| AppError::Config(format!("Invalid API endpoint {}: {}", self.api.endpoint, e)))?;

        if self.api.model.trim().is_empty() {
            return Err(AppError::Config("Model name cannot be empty".to_string()));
        }

        if self.translation.columns.iter().all(|c| c.trim().is_empty()) {
            return Err(AppError::Config("At least one column must be selected".to_string()));
        }

        let temperatures = [self.translation.temperature, self.translation.detection_temperature];
        if temperatures.iter().any(|t| !(0.0..=2.0).contains(t)) {
            return Err(AppError::Config("Temperatures must be between 0.0 and 2.0".to_string()));
        }

        if !self.translation.system_prompt.contains("{target_language}") {
            return Err(AppError::Config(
                "The system prompt must contain the {target_language} placeholder".to_string(),
            ));
        }

        Ok(())
    }
}

/// Split a comma separated column list, dropping empty entries
pub fn parse_column_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .map(|c| c.to_string())
        .collect()
}
