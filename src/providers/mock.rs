/*!
 * Mock provider implementations for testing.
 *
 * This module provides a mock provider that simulates different behaviors:
 * - `MockProvider::working()` - Always succeeds with `[TRANSLATED] <text>`
 * - `MockProvider::fail_times(n)` - Fails the first `n` requests, then succeeds
 * - `MockProvider::intermittent(n)` - Fails every `n`-th request
 * - `MockProvider::failing()` - Always fails with a server error
 * - `MockProvider::auth_failure()` - Always fails with an authentication error
 * - `MockProvider::slow(ms)` - Succeeds after a delay
 *
 * Every request is recorded so tests can count calls and inspect prompts.
 * Calls that ran to the end are counted separately from calls that started.
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::errors::ProviderError;
use crate::providers::{CompletionRequest, CompletionResponse, Provider};

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds
    Working,
    /// Fails the first `times` requests with a 503, then succeeds
    FailTimes { times: usize },
    /// Fails intermittently (every Nth request)
    Intermittent { fail_every: usize },
    /// Always fails with a 500
    Failing,
    /// Always fails with a 401
    AuthFailure,
    /// Returns an empty completion
    Empty,
    /// Simulates slow response (for timing and cancellation tests)
    Slow { delay_ms: u64 },
}

/// Mock provider for testing translation behavior
#[derive(Debug, Clone)]
pub struct MockProvider {
    /// Behavior mode
    behavior: MockBehavior,
    /// Request counter shared between clones
    request_count: Arc<AtomicUsize>,
    /// Calls that returned, shared between clones
    completed_count: Arc<AtomicUsize>,
    /// Every request received, in arrival order
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
    /// Custom response generator (optional)
    custom_response: Option<fn(&CompletionRequest) -> String>,
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            completed_count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
            custom_response: None,
        }
    }

    /// Create a working mock provider that always succeeds
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Create a mock provider that fails a fixed number of times first
    pub fn fail_times(times: usize) -> Self {
        Self::new(MockBehavior::FailTimes { times })
    }

    /// Create an intermittently failing mock provider
    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent {
            fail_every: fail_every.max(1),
        })
    }

    /// Create a failing mock provider that always errors
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Create a mock provider that rejects its credentials
    pub fn auth_failure() -> Self {
        Self::new(MockBehavior::AuthFailure)
    }

    /// Create a mock that returns empty responses
    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    /// Create a mock that answers after a delay
    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Set a custom response generator
    pub fn with_custom_response(mut self, generator: fn(&CompletionRequest) -> String) -> Self {
        self.custom_response = Some(generator);
        self
    }

    /// Number of requests received so far
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Number of calls that returned a result, successful or not
    pub fn completed_count(&self) -> usize {
        self.completed_count.load(Ordering::SeqCst)
    }

    /// Snapshot of every request received so far
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    fn success(&self, request: &CompletionRequest) -> CompletionResponse {
        let text = match self.custom_response {
            Some(generator) => generator(request),
            None => format!("[TRANSLATED] {}", request.prompt),
        };

        CompletionResponse {
            prompt_tokens: Some(request.prompt.len() as u64),
            completion_tokens: Some(text.len() as u64 / 2),
            text,
        }
    }

    async fn respond(&self, count: usize, request: &CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        match self.behavior {
            MockBehavior::Working => Ok(self.success(request)),

            MockBehavior::FailTimes { times } => {
                if count < times {
                    Err(ProviderError::ApiError {
                        status_code: 503,
                        message: format!("Simulated failure (request #{})", count + 1),
                    })
                } else {
                    Ok(self.success(request))
                }
            }

            MockBehavior::Intermittent { fail_every } => {
                if count % fail_every == fail_every - 1 {
                    Err(ProviderError::ApiError {
                        status_code: 503,
                        message: format!("Simulated intermittent failure (request #{})", count + 1),
                    })
                } else {
                    Ok(self.success(request))
                }
            }

            MockBehavior::Failing => Err(ProviderError::ApiError {
                status_code: 500,
                message: "Simulated provider failure".to_string(),
            }),

            MockBehavior::AuthFailure => Err(ProviderError::AuthenticationError(
                "Simulated invalid API key".to_string(),
            )),

            MockBehavior::Empty => Err(ProviderError::EmptyResponse),

            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
                Ok(self.success(request))
            }
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        let result = self.respond(count, &request).await;
        self.completed_count.fetch_add(1, Ordering::SeqCst);
        result
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        match self.behavior {
            MockBehavior::Failing => Err(ProviderError::ConnectionError("Simulated outage".to_string())),
            MockBehavior::AuthFailure => Err(ProviderError::AuthenticationError(
                "Simulated invalid API key".to_string(),
            )),
            _ => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
