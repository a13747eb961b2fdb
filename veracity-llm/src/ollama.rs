use crate::traits::{LlmClient, LlmError, LlmResponse, MediaAttachment, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value as JsonValue, json};
use std::time::Duration;
use veracity_http::{HttpClient, RequestOpts};

const OLLAMA_CONNECTION_ERROR: &str = "No running Ollama server detected. Start it with: `ollama serve` (after installing). Install instructions: https://github.com/ollama/ollama";
const PULL_TIMEOUT: Duration = Duration::from_secs(600);

/// Ollama client for local model inference.
///
/// Expects a running Ollama server (see https://github.com/ollama/ollama).
pub struct OllamaClient {
    client: HttpClient,
    model: String,
}

impl OllamaClient {
    /// Create a new client and verify server/model availability.
    pub async fn new(base_url: String, model: String, timeout: Duration) -> Result<Self> {
        let client = Self::unchecked(&base_url, model, timeout)?;

        client.probe_server().await?;
        client.ensure_model_available().await?;

        Ok(client)
    }

    /// Build without touching the network.
    pub fn unchecked(base_url: &str, model: String, timeout: Duration) -> Result<Self> {
        let client = HttpClient::new(base_url.trim_end_matches('/'))
            .map_err(|e| LlmError::Config(format!("Failed to create HTTP client: {e}")))?
            .with_timeout(timeout)
            .with_retries(0);
        Ok(Self { client, model })
    }

    async fn probe_server(&self) -> Result<()> {
        self.client
            .get_json::<JsonValue>("/api/tags", RequestOpts::default())
            .await
            .map(|_| ())
            .map_err(|_| LlmError::Network(OLLAMA_CONNECTION_ERROR.to_string()))
    }

    async fn ensure_model_available(&self) -> Result<()> {
        let models = self.fetch_available_models().await?;

        if !models.contains(&self.model) {
            tracing::info!(model = %self.model, "llm.ollama.pulling_model");
            self.pull_model(&self.model).await?;
        }

        Ok(())
    }

    async fn fetch_available_models(&self) -> Result<Vec<String>> {
        let val: JsonValue = self
            .client
            .get_json("/api/tags", RequestOpts::default())
            .await?;

        let models = val
            .get("models")
            .and_then(|m| m.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.get("name").and_then(|n| n.as_str()))
                    .map(|s| s.to_string())
                    .collect()
            })
            .unwrap_or_default();

        Ok(models)
    }

    async fn pull_model(&self, model: &str) -> Result<()> {
        let payload = json!({
            "model": model,
            "stream": false
        });
        let opts = RequestOpts {
            timeout: Some(PULL_TIMEOUT),
            ..Default::default()
        };
        let _: JsonValue = self
            .client
            .post_json_opts("/api/pull", &payload, opts)
            .await?;
        tracing::info!(model, "llm.ollama.model_pulled");
        Ok(())
    }

    async fn generate_inner(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        images: Vec<String>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<LlmResponse> {
        let mut options = serde_json::Map::new();
        if let Some(temp) = temperature {
            options.insert("temperature".to_string(), json!(temp));
        }
        if let Some(max_tok) = max_tokens {
            options.insert("num_predict".to_string(), json!(max_tok));
        }

        let mut payload = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": options
        });
        if let Some(sys) = system_prompt {
            payload["system"] = json!(sys);
        }
        if !images.is_empty() {
            payload["images"] = json!(images);
        }

        let val: JsonValue = self
            .client
            .post_json_opts("/api/generate", &payload, RequestOpts::default())
            .await?;

        let text = val
            .get("response")
            .and_then(|r| r.as_str())
            .unwrap_or("")
            .to_string();

        let tokens_used = val
            .get("eval_count")
            .and_then(|c| c.as_u64())
            .map(|c| c as u32);

        Ok(LlmResponse {
            text,
            model: Some(self.model.clone()),
            tokens_used,
        })
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<LlmResponse> {
        self.generate_inner(prompt, system_prompt, Vec::new(), max_tokens, temperature)
            .await
    }

    /// Multimodal models (llava and friends) take base64 images inline.
    async fn generate_with_attachments(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        attachments: &[MediaAttachment],
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<LlmResponse> {
        let images = attachments
            .iter()
            .map(|a| {
                if a.mime_type.starts_with("image/") {
                    Ok(STANDARD.encode(&a.bytes))
                } else {
                    Err(LlmError::Unsupported(format!("attachment type {}", a.mime_type)))
                }
            })
            .collect::<Result<Vec<_>>>()?;
        self.generate_inner(prompt, system_prompt, images, max_tokens, temperature)
            .await
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.probe_server().await.is_ok())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
