/*!
 * Provider implementations for chat-completion services.
 *
 * This module contains the completion abstraction used by the translation
 * engine and its implementations:
 * - OpenAI: OpenAI API (and compatible endpoints)
 * - Mock: scripted provider for tests and dry runs
 */

use async_trait::async_trait;
use std::fmt::Debug;

use crate::errors::ProviderError;

/// A single chat-completion request.
///
/// The system message carries the instructions; the user message carries
/// only the text to work on.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Model identifier
    pub model: String,
    /// Optional system message
    pub system: Option<String>,
    /// User message
    pub prompt: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Upper bound on generated tokens
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    /// Create a new request with default sampling
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: None,
            prompt: prompt.into(),
            temperature: 0.3,
            max_tokens: None,
        }
    }

    /// Set the system message
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the maximum number of generated tokens
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// The text and token accounting of a completion
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompletionResponse {
    /// Generated text
    pub text: String,
    /// Prompt tokens reported by the provider
    pub prompt_tokens: Option<u64>,
    /// Completion tokens reported by the provider
    pub completion_tokens: Option<u64>,
}

/// Common trait for all completion providers
///
/// Implementations are shared between concurrent tasks behind an `Arc`, so
/// they must be usable from many tasks at once.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// Complete a request using this provider
    ///
    /// # Arguments
    /// * `request` - The request to complete
    ///
    /// # Returns
    /// * `Result<CompletionResponse, ProviderError>` - The response from the provider or an error
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError>;

    /// Test the connection to the provider
    ///
    /// # Returns
    /// * `Result<(), ProviderError>` - Ok if the connection is successful, or an error
    async fn test_connection(&self) -> Result<(), ProviderError>;

    /// Short name used in logs and usage summaries
    fn name(&self) -> &str;
}

pub mod mock;
pub mod openai;
