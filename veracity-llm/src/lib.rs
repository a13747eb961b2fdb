//! Provider‑agnostic LLM integration for Veracity.
//!
//! This crate exposes a common [`traits::LlmClient`] interface with OpenAI
//! and Ollama implementations, the token-bucket [`rate::RateLimiter`], and
//! the claim verifier that prompts the model and defensively parses its
//! verdicts.
//!
//! # Examples
//! ```no_run
//! use veracity_config::LlmConfig;
//! use veracity_llm::ensure_llm_ready;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), veracity_llm::traits::LlmError> {
//! let cfg = LlmConfig::Ollama {
//!     model: "llama3.2:3b".into(),
//!     endpoint: "http://localhost:11434".into(),
//!     temperature: None,
//!     max_tokens: None,
//!     timeout_secs: 60,
//! };
//! let client = ensure_llm_ready(&cfg).await?;
//! assert!(!client.model_name().is_empty());
//! # Ok(())
//! # }
//! ```
pub mod ollama;
pub mod openai;
pub mod rate;
pub mod traits;
pub mod verdict;
pub mod verifier;

use ollama::OllamaClient;
use openai::OpenAiClient;
use std::sync::Arc;
use std::time::Duration;
use traits::{LlmClient, LlmError};
use veracity_config::LlmConfig;

pub use traits::{LlmResponse, MediaAttachment};
pub use verifier::{verify_or_degrade, ClaimVerifier, LlmClaimVerifier, RetryPolicy};

/// Default model recommendations for fact-check tasks
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2:3b";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Build the configured client, making sure it can serve requests
/// (for Ollama this probes the server and pulls the model if needed).
pub async fn ensure_llm_ready(config: &LlmConfig) -> traits::Result<Arc<dyn LlmClient>> {
    match config {
        LlmConfig::Ollama {
            endpoint,
            model,
            timeout_secs,
            ..
        } => {
            let client = OllamaClient::new(
                endpoint.clone(),
                model.clone(),
                Duration::from_secs(*timeout_secs),
            )
            .await?;
            Ok(Arc::new(client))
        }
        LlmConfig::Openai {
            auth_token,
            model,
            endpoint,
            timeout_secs,
            ..
        } => {
            if auth_token.trim().is_empty() {
                return Err(LlmError::Config("OpenAI auth_token is empty".to_string()));
            }
            let client = OpenAiClient::with_endpoint(
                auth_token.clone(),
                model.clone(),
                endpoint,
                Duration::from_secs(*timeout_secs),
            )?;
            Ok(Arc::new(client))
        }
        LlmConfig::None => Err(LlmError::Config("No LLM configured".to_string())),
    }
}

/// Output-token cap configured for the provider, if any.
pub fn configured_max_tokens(config: &LlmConfig) -> Option<u32> {
    match config {
        LlmConfig::Openai { max_tokens, .. } | LlmConfig::Ollama { max_tokens, .. } => *max_tokens,
        LlmConfig::None => None,
    }
}
