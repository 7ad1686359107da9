use async_trait::async_trait;
use log::{debug, error};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::errors::ProviderError;
use crate::providers::{CompletionRequest, CompletionResponse, Provider};

/// Public OpenAI API endpoint
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";

/// OpenAI client for interacting with the chat completions API
#[derive(Debug, Clone)]
pub struct OpenAI {
    /// HTTP client for API requests
    client: Client,
    /// API key for authentication
    api_key: String,
    /// Base URL of the API, e.g. `https://api.openai.com/v1`
    endpoint: String,
    /// Model used for connection tests
    model: String,
}

/// OpenAI chat completion request
#[derive(Debug, Serialize)]
pub struct OpenAIRequest {
    /// The model to use
    model: String,

    /// The messages for the conversation
    messages: Vec<OpenAIMessage>,

    /// Temperature for generation
    temperature: f32,

    /// Maximum number of tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

/// OpenAI message format
#[derive(Debug, Serialize, Deserialize)]
pub struct OpenAIMessage {
    /// Role of the message sender (system, user, assistant)
    pub role: String,

    /// Content of the message
    #[serde(default)]
    pub content: Option<String>,
}

/// Token usage information
#[derive(Debug, Deserialize)]
pub struct TokenUsage {
    /// Number of prompt tokens
    pub prompt_tokens: u64,
    /// Number of completion tokens
    pub completion_tokens: u64,
}

/// OpenAI chat completion response
#[derive(Debug, Deserialize)]
pub struct OpenAIResponse {
    /// Generated choices
    pub choices: Vec<OpenAIChoice>,
    /// Token usage information
    #[serde(default)]
    pub usage: Option<TokenUsage>,
}

/// Individual choice in an OpenAI response
#[derive(Debug, Deserialize)]
pub struct OpenAIChoice {
    /// The generated message
    pub message: OpenAIMessage,
}

/// Error body returned by the API
#[derive(Debug, Deserialize)]
struct OpenAIErrorBody {
    error: OpenAIErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorDetail {
    message: String,
}

impl From<&CompletionRequest> for OpenAIRequest {
    fn from(request: &CompletionRequest) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(OpenAIMessage {
                role: "system".to_string(),
                content: Some(system.clone()),
            });
        }
        messages.push(OpenAIMessage {
            role: "user".to_string(),
            content: Some(request.prompt.clone()),
        });

        Self {
            model: request.model.clone(),
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }
}

impl OpenAI {
    /// Create a new OpenAI client
    pub fn new(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        model: impl Into<String>,
        timeout_secs: u64,
    ) -> Self {
        let endpoint = endpoint.into();
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            endpoint: if endpoint.trim().is_empty() {
                DEFAULT_ENDPOINT.to_string()
            } else {
                endpoint
            },
            model: model.into(),
        }
    }

    /// Full URL of the chat completions resource
    pub fn completions_url(&self) -> Result<Url, ProviderError> {
        let base = format!("{}/", self.endpoint.trim_end_matches('/'));
        Url::parse(&base)
            .and_then(|url| url.join("chat/completions"))
            .map_err(|e| ProviderError::RequestFailed(format!("Invalid endpoint {}: {}", self.endpoint, e)))
    }

    /// Send a chat completion request
    pub async fn chat(&self, request: &OpenAIRequest) -> Result<OpenAIResponse, ProviderError> {
        let url = self.completions_url()?;

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            let message = serde_json::from_str::<OpenAIErrorBody>(&error_text)
                .map(|body| body.error.message)
                .unwrap_or(error_text);
            error!("OpenAI API error ({}): {}", status, message);
            return Err(map_status_error(status, message));
        }

        response
            .json::<OpenAIResponse>()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))
    }

    /// Extract text from an OpenAI response
    pub fn extract_text_from_response(response: &OpenAIResponse) -> Option<String> {
        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.as_ref())
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
    }
}

fn map_transport_error(error: reqwest::Error) -> ProviderError {
    if error.is_timeout() || error.is_connect() {
        ProviderError::ConnectionError(error.to_string())
    } else {
        ProviderError::RequestFailed(error.to_string())
    }
}

fn map_status_error(status: StatusCode, message: String) -> ProviderError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::AuthenticationError(message),
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimitExceeded(message),
        _ => ProviderError::ApiError {
            status_code: status.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl Provider for OpenAI {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let body = OpenAIRequest::from(&request);
        let response = self.chat(&body).await?;

        let text = Self::extract_text_from_response(&response).ok_or(ProviderError::EmptyResponse)?;
        let (prompt_tokens, completion_tokens) = response
            .usage
            .as_ref()
            .map(|usage| (Some(usage.prompt_tokens), Some(usage.completion_tokens)))
            .unwrap_or((None, None));

        debug!("OpenAI completion: {} char(s), {:?} completion token(s)", text.len(), completion_tokens);

        Ok(CompletionResponse {
            text,
            prompt_tokens,
            completion_tokens,
        })
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        let request = CompletionRequest::new(self.model.clone(), "Hello")
            .temperature(0.0)
            .max_tokens(5);
        self.complete(request).await.map(|_| ())
    }

    fn name(&self) -> &str {
        "openai"
    }
}
