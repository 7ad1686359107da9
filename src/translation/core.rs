/*!
 * Core translation client implementation.
 *
 * This module contains the `TranslationClient`, which turns one
 * (text, source, target) triple into one completion call, with caching,
 * classified retries and token accounting. The client is cheap to clone and
 * is shared by every concurrent row task of a run.
 */

use log::{debug, warn};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::cache::TranslationCache;
use super::prompts::{PromptTemplate, detection_prompt};
use super::retry::RetryPolicy;
use crate::errors::{ProviderError, TranslationError};
use crate::language_utils::LanguageCode;
use crate::providers::{CompletionRequest, CompletionResponse, Provider};
use crate::spreadsheet::is_blank;

/// Prefix of the value stored in a cell whose translation failed
pub const ERROR_PLACEHOLDER_PREFIX: &str = "[ERROR: ";

static LANGUAGE_CODE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(FR|EN|DE|ES|IT|NL|PT)\b").expect("language code regex is valid")
});

/// Build the placeholder stored in a cell whose translation failed
pub fn error_placeholder(text: &str) -> String {
    format!("{}{}]", ERROR_PLACEHOLDER_PREFIX, text)
}

/// Check whether a cell value is a failure placeholder
pub fn is_error_placeholder(value: &str) -> bool {
    value.starts_with(ERROR_PLACEHOLDER_PREFIX) && value.ends_with(']')
}

/// Token usage statistics for tracking API consumption
#[derive(Debug, Clone)]
pub struct TokenUsageStats {
    /// Number of completion requests sent
    pub api_calls: u64,

    /// Number of requests that were retries of a failed attempt
    pub retries: u64,

    /// Number of requests that failed
    pub failed_calls: u64,

    /// Number of prompt tokens
    pub prompt_tokens: u64,

    /// Number of completion tokens
    pub completion_tokens: u64,

    /// Total number of tokens
    pub total_tokens: u64,

    /// Start time of token tracking
    pub start_time: Instant,

    /// Total time spent on API requests
    pub api_duration: Duration,

    /// Provider name
    pub provider: String,

    /// Model name
    pub model: String,
}

impl Default for TokenUsageStats {
    fn default() -> Self {
        Self::with_provider_info(String::new(), String::new())
    }
}

impl TokenUsageStats {
    /// Create new token usage stats with provider info
    pub fn with_provider_info(provider: String, model: String) -> Self {
        Self {
            api_calls: 0,
            retries: 0,
            failed_calls: 0,
            prompt_tokens: 0,
            completion_tokens: 0,
            total_tokens: 0,
            start_time: Instant::now(),
            api_duration: Duration::from_secs(0),
            provider,
            model,
        }
    }

    /// Add token usage numbers
    pub fn add_token_usage(&mut self, prompt_tokens: Option<u64>, completion_tokens: Option<u64>) {
        if let Some(pt) = prompt_tokens {
            self.prompt_tokens += pt;
            self.total_tokens += pt;
        }

        if let Some(ct) = completion_tokens {
            self.completion_tokens += ct;
            self.total_tokens += ct;
        }
    }

    /// Calculate tokens per minute rate
    pub fn tokens_per_minute(&self) -> f64 {
        // API time first, wall-clock time as fallback
        let duration_minutes = if self.api_duration.as_secs_f64() > 0.0 {
            self.api_duration.as_secs_f64() / 60.0
        } else {
            self.start_time.elapsed().as_secs_f64() / 60.0
        };

        if duration_minutes > 0.0 {
            self.total_tokens as f64 / duration_minutes
        } else {
            0.0
        }
    }

    /// Generate a summary of token usage
    pub fn summary(&self) -> String {
        format!(
            "Token Usage Summary:\n\
             Provider: {}\n\
             Model: {}\n\
             API calls: {} ({} retries, {} failed)\n\
             Prompt tokens: {}\n\
             Completion tokens: {}\n\
             Total tokens: {}\n\
             Elapsed time: {:.2} minutes\n\
             Cumulative API time: {:.2} minutes\n\
             Tokens per minute: {:.2}",
            self.provider,
            self.model,
            self.api_calls,
            self.retries,
            self.failed_calls,
            self.prompt_tokens,
            self.completion_tokens,
            self.total_tokens,
            self.start_time.elapsed().as_secs_f64() / 60.0,
            self.api_duration.as_secs_f64() / 60.0,
            self.tokens_per_minute()
        )
    }
}

/// Settings of the completion requests sent by the client
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    /// Model identifier
    pub model: String,
    /// Temperature for translation requests
    pub temperature: f32,
    /// Temperature for classification requests
    pub detection_temperature: f32,
    /// Output cap for translation requests
    pub max_tokens: Option<u32>,
    /// System prompt for translation requests
    pub prompt: PromptTemplate,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4.1-mini".to_string(),
            temperature: 0.3,
            detection_temperature: 0.0,
            max_tokens: Some(1000),
            prompt: PromptTemplate::default(),
        }
    }
}

/// Outcome of translating one cell
#[derive(Debug, Clone, PartialEq)]
pub enum CellTranslation {
    /// Returned as-is: blank text or same source and target
    Unchanged(String),
    /// Translated by the provider or the cache
    Translated(String),
    /// Every attempt failed; `placeholder` is what goes in the cell
    Failed {
        /// Tagged placeholder embedding the original text
        placeholder: String,
        /// Description of the last error
        error: String,
    },
}

impl CellTranslation {
    /// The value to store in the result cell
    pub fn text(&self) -> &str {
        match self {
            Self::Unchanged(text) | Self::Translated(text) => text,
            Self::Failed { placeholder, .. } => placeholder,
        }
    }

    /// Consume into the value to store in the result cell
    pub fn into_text(self) -> String {
        match self {
            Self::Unchanged(text) | Self::Translated(text) => text,
            Self::Failed { placeholder, .. } => placeholder,
        }
    }

    /// Whether this cell ended up as a failure placeholder
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Translation client shared by every task of a run
#[derive(Debug, Clone)]
pub struct TranslationClient {
    /// Completion provider
    provider: Arc<dyn Provider>,

    /// Request settings
    settings: Arc<ClientSettings>,

    /// Retry policy for each text
    retry: RetryPolicy,

    /// Translation cache for storing and retrieving translations
    cache: TranslationCache,

    /// Usage accounting, shared between clones
    stats: Arc<Mutex<TokenUsageStats>>,
}

impl TranslationClient {
    /// Create a new client over a provider
    pub fn new(provider: Arc<dyn Provider>, settings: ClientSettings) -> Self {
        let stats = TokenUsageStats::with_provider_info(provider.name().to_string(), settings.model.clone());
        Self {
            provider,
            settings: Arc::new(settings),
            retry: RetryPolicy::default(),
            cache: TranslationCache::default(),
            stats: Arc::new(Mutex::new(stats)),
        }
    }

    /// Replace the retry policy
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the cache
    pub fn with_cache(mut self, cache: TranslationCache) -> Self {
        self.cache = cache;
        self
    }

    /// Request settings
    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Retry policy in use
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// The cache in use
    pub fn cache(&self) -> &TranslationCache {
        &self.cache
    }

    /// Snapshot of usage statistics
    pub fn usage(&self) -> TokenUsageStats {
        self.stats.lock().clone()
    }

    /// Test the connection to the provider
    pub async fn test_connection(&self) -> Result<(), ProviderError> {
        self.provider.test_connection().await
    }

    /// Translate one text, never failing.
    ///
    /// Blank text and identical source/target languages short-circuit without
    /// a call. When every attempt fails the result is a `Failed` carrying the
    /// `[ERROR: <text>]` placeholder.
    pub async fn translate(&self, text: &str, source: LanguageCode, target: LanguageCode) -> CellTranslation {
        if is_blank(Some(text)) || source == target {
            return CellTranslation::Unchanged(text.to_string());
        }

        match self.translate_text(text, source, target).await {
            Ok(translated) => CellTranslation::Translated(translated),
            Err(e) => {
                warn!("Translation {} -> {} failed, keeping placeholder: {}", source, target, e);
                CellTranslation::Failed {
                    placeholder: error_placeholder(text),
                    error: e.to_string(),
                }
            }
        }
    }

    /// Translate one text, failing only after exhausting retries
    pub async fn translate_text(
        &self,
        text: &str,
        source: LanguageCode,
        target: LanguageCode,
    ) -> Result<String, TranslationError> {
        if is_blank(Some(text)) || source == target {
            return Ok(text.to_string());
        }

        if let Some(cached) = self.cache.get(text, source, target) {
            return Ok(cached);
        }

        let mut request = CompletionRequest::new(self.settings.model.clone(), text)
            .system(self.settings.prompt.render_for(source, target))
            .temperature(self.settings.temperature);
        if let Some(max_tokens) = self.settings.max_tokens {
            request = request.max_tokens(max_tokens);
        }

        let response = self.complete_with_retry(request).await?;
        self.cache.store(text, source, target, &response.text);
        Ok(response.text)
    }

    /// Classify the language of one snippet.
    ///
    /// Returns `Ok(None)` when the reply names no supported language.
    pub async fn classify(&self, text: &str) -> Result<Option<LanguageCode>, TranslationError> {
        let request = CompletionRequest::new(self.settings.model.clone(), text)
            .system(detection_prompt())
            .temperature(self.settings.detection_temperature)
            .max_tokens(10);

        let response = self.complete_with_retry(request).await?;
        Ok(parse_language_reply(&response.text))
    }

    async fn complete_with_retry(&self, request: CompletionRequest) -> Result<CompletionResponse, TranslationError> {
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let started = Instant::now();
            let result = self.provider.complete(request.clone()).await;
            self.record_call(attempt, started.elapsed(), result.as_ref().ok());

            let error = match result {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };

            if !error.is_retryable() {
                warn!("Non-retryable provider error on attempt {}: {}", attempt, error);
                return Err(TranslationError::Provider(error));
            }

            if !self.retry.should_retry(attempt) {
                return Err(TranslationError::RetriesExhausted {
                    attempts: attempt,
                    last_error: error,
                });
            }

            let delay = self.retry.delay_for(attempt);
            debug!(
                "Attempt {}/{} failed ({}), retrying in {:?}",
                attempt, self.retry.max_attempts, error, delay
            );
            tokio::time::sleep(delay).await;
        }
    }

    fn record_call(&self, attempt: u32, elapsed: Duration, response: Option<&CompletionResponse>) {
        let mut stats = self.stats.lock();
        stats.api_calls += 1;
        stats.api_duration += elapsed;
        if attempt > 1 {
            stats.retries += 1;
        }
        match response {
            Some(response) => stats.add_token_usage(response.prompt_tokens, response.completion_tokens),
            None => stats.failed_calls += 1,
        }
    }
}

/// Extract a supported language from a classification reply
pub fn parse_language_reply(reply: &str) -> Option<LanguageCode> {
    let trimmed = reply.trim();
    if let Some(lang) = LanguageCode::parse(trimmed) {
        return Some(lang);
    }

    // Inside a sentence only upper-case codes count, so the word "it" is not Italian
    LANGUAGE_CODE_REGEX
        .find_iter(trimmed)
        .last()
        .and_then(|code| LanguageCode::parse(code.as_str()))
}
