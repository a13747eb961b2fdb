use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use veracity_common::VerificationFailure;
use veracity_http::HttpError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    pub model: Option<String>,
    pub tokens_used: Option<u32>,
}

/// Encoded media sent next to a prompt (vision input).
#[derive(Debug, Clone)]
pub struct MediaAttachment {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl MediaAttachment {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }
}

/// Collaborator failures, classified so callers can pick a retry policy.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("rate limit exceeded")]
    RateLimited { retry_after: Option<u64> },

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("unsupported by this provider: {0}")]
    Unsupported(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<HttpError> for LlmError {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::Timeout(d) => LlmError::Timeout(format!("{d:?}")),
            HttpError::Network(m) => LlmError::Network(m),
            HttpError::Url(m) | HttpError::Build(m) => LlmError::Config(m),
            HttpError::Decode(m, _) => LlmError::MalformedRequest(format!("undecodable body: {m}")),
            HttpError::Api {
                status,
                message,
                retry_after,
                ..
            } => match status.as_u16() {
                401 | 403 => LlmError::Authentication(message),
                429 => LlmError::RateLimited { retry_after },
                400 | 404 | 422 => LlmError::MalformedRequest(message),
                _ => LlmError::Network(format!("{status}: {message}")),
            },
        }
    }
}

impl From<LlmError> for VerificationFailure {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::Authentication(m) => VerificationFailure::Authentication(m),
            LlmError::RateLimited { retry_after } => VerificationFailure::RateLimited(match retry_after {
                Some(secs) => format!("retry after {secs}s"),
                None => "rate limit exceeded".to_string(),
            }),
            LlmError::Timeout(m) => VerificationFailure::Timeout(m),
            LlmError::Network(m) => VerificationFailure::TransientNetwork(m),
            // The request itself is wrong; repeating it cannot help.
            LlmError::MalformedRequest(m) | LlmError::Unsupported(m) | LlmError::Config(m) => {
                VerificationFailure::MalformedResponse(m)
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, LlmError>;

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a response to the given prompt with optional system prompt
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<LlmResponse>;

    /// Same as [`LlmClient::generate`] with media attached to the prompt.
    async fn generate_with_attachments(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        attachments: &[MediaAttachment],
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<LlmResponse> {
        if attachments.is_empty() {
            return self
                .generate(prompt, system_prompt, max_tokens, temperature)
                .await;
        }
        Err(LlmError::Unsupported(format!(
            "{} does not accept attachments",
            self.model_name()
        )))
    }

    /// Check if the LLM service is available
    async fn health_check(&self) -> Result<bool>;

    /// Get the model name being used
    fn model_name(&self) -> &str;
}
