use crate::config::Config;
use crate::conversation::{translation_functions, Message};
use crate::retry::{with_retry_if, RetryConfig};
use crate::validator::{validate, ChatResponse, FormatError};
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Result of one translation request after retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    Translated(String),
    /// The endpoint answered without the structured call; not retried
    FormatMismatch(String),
    /// Every attempt hit a retryable failure
    Transient(String),
    /// Transport or decoding failure; not retried
    Fatal(String),
}

impl CompletionOutcome {
    pub fn translated_text(&self) -> Option<&str> {
        match self {
            CompletionOutcome::Translated(text) => Some(text),
            _ => None,
        }
    }
}

/// Failure of a single attempt
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("OpenAI API error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("malformed function call: {0}")]
    MalformedCall(FormatError),

    #[error("format mismatch: {0}")]
    FormatMismatch(FormatError),

    #[error("request failed: {0}")]
    Request(String),
}

impl CompletionError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CompletionError::Status { .. } | CompletionError::MalformedCall(_)
        )
    }
}

impl From<CompletionError> for CompletionOutcome {
    fn from(err: CompletionError) -> Self {
        match err {
            CompletionError::Status { .. } | CompletionError::MalformedCall(_) => {
                CompletionOutcome::Transient(err.to_string())
            }
            CompletionError::FormatMismatch(_) => {
                CompletionOutcome::FormatMismatch(err.to_string())
            }
            CompletionError::Request(_) => CompletionOutcome::Fatal(err.to_string()),
        }
    }
}

/// Seam between the orchestrator and the remote endpoint.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn translate(&self, messages: &[Message], model: &str) -> CompletionOutcome;
}

#[derive(Debug, Serialize)]
struct TranslationRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    functions: serde_json::Value,
}

/// Chat completion client for OpenAI-compatible endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    retry: RetryConfig,
}

impl OpenAiClient {
    pub fn new(http: reqwest::Client, config: &Config) -> Self {
        Self {
            http,
            api_url: config.openai_api_url.clone(),
            api_key: config.openai_api_key.clone(),
            retry: RetryConfig::completion(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn request_once(
        &self,
        request: &TranslationRequest<'_>,
    ) -> Result<String, CompletionError> {
        let response = self
            .http
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| CompletionError::Request(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CompletionError::Request(format!("failed to read body: {}", e)))?;

        if !status.is_success() {
            warn!("Response body: {}", body);
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let chat_response: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            error!("Unparseable response body: {}", body);
            CompletionError::Request(format!("failed to parse response: {}", e))
        })?;

        match validate(&chat_response) {
            Ok(text) => {
                debug!("Response: {}", body);
                Ok(text)
            }
            Err(e) if e.is_retryable() => {
                warn!("Response body: {}", body);
                Err(CompletionError::MalformedCall(e))
            }
            Err(e) => {
                warn!("Response body: {}", body);
                Err(CompletionError::FormatMismatch(e))
            }
        }
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn translate(&self, messages: &[Message], model: &str) -> CompletionOutcome {
        let request = TranslationRequest {
            model,
            messages,
            functions: translation_functions(),
        };

        match with_retry_if(
            &self.retry,
            "Chat completion",
            || self.request_once(&request),
            CompletionError::is_transient,
        )
        .await
        {
            Ok(text) => CompletionOutcome::Translated(text),
            Err(e) => {
                error!("Unable to generate ChatCompletion response: {}", e);
                e.into()
            }
        }
    }
}
