use crate::traits::{LlmClient, LlmError, LlmResponse, MediaAttachment, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use veracity_http::HttpClient;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1/";
const DEFAULT_INSTRUCTIONS: &str = "You are an objective, unbiased fact-checker.";

pub struct OpenAiClient {
    client: HttpClient,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
pub struct ResponsesApiRequest {
    model: String,
    input: ResponsesInput,
    instructions: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

/// Plain prompt, or one user message mixing text and images.
#[derive(Serialize)]
#[serde(untagged)]
enum ResponsesInput {
    Text(String),
    Messages(Vec<InputMessage>),
}

#[derive(Serialize)]
struct InputMessage {
    role: &'static str,
    content: Vec<InputContent>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InputContent {
    InputText { text: String },
    InputImage { image_url: String },
}

#[derive(Debug, Deserialize)]
pub struct ResponsesApiResponse {
    pub id: String,
    pub status: Option<String>,
    pub model: String,
    #[serde(default)]
    pub output: Vec<ResponseMessage>,
    #[serde(default)]
    pub usage: Option<ResponseUsage>,
}

/// One element in the `output` array
#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub content: Vec<ResponseContent>,
}

/// One part of the message `content`
#[derive(Debug, Deserialize)]
pub struct ResponseContent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct ResponseUsage {
    pub total_tokens: Option<u32>,
}

impl OpenAiClient {
    /// Create a new client for the given API key and model.
    pub fn new(api_key: String, model: String) -> Result<Self> {
        Self::with_endpoint(api_key, model, OPENAI_API_BASE, Duration::from_secs(60))
    }

    /// Client for an OpenAI-compatible gateway.
    ///
    /// Retries are left to the claim verifier, which knows which failures
    /// are worth repeating.
    pub fn with_endpoint(
        api_key: String,
        model: String,
        endpoint: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let base = if endpoint.ends_with('/') {
            endpoint.to_string()
        } else {
            format!("{endpoint}/")
        };
        let client = HttpClient::new(&base)
            .map_err(|e| LlmError::Config(format!("HttpClient init failed: {e}")))?
            .with_timeout(timeout)
            .with_retries(0);

        Ok(Self {
            client,
            api_key,
            model,
        })
    }

    async fn send(
        &self,
        input: ResponsesInput,
        system_prompt: Option<&str>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<LlmResponse> {
        let req = ResponsesApiRequest {
            model: self.model.clone(),
            input,
            instructions: system_prompt.unwrap_or(DEFAULT_INSTRUCTIONS).to_string(),
            temperature,
            max_output_tokens: max_tokens,
        };

        let resp: ResponsesApiResponse = self
            .client
            .post_json("responses", Some(&self.api_key), &req)
            .await?;

        tracing::debug!(
            response_id = %resp.id,
            status = resp.status.as_deref().unwrap_or("-"),
            model = %resp.model,
            "llm.openai.response"
        );

        let text = resp
            .output
            .iter()
            .filter(|msg| msg.kind == "message")
            .flat_map(|msg| &msg.content)
            .find(|c| c.kind == "output_text")
            .map(|c| c.text.clone())
            .unwrap_or_default();

        Ok(LlmResponse {
            text,
            model: Some(resp.model),
            tokens_used: resp.usage.and_then(|u| u.total_tokens),
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<LlmResponse> {
        self.send(
            ResponsesInput::Text(prompt.to_string()),
            system_prompt,
            max_tokens,
            temperature,
        )
        .await
    }

    async fn generate_with_attachments(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        attachments: &[MediaAttachment],
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<LlmResponse> {
        let mut content = vec![InputContent::InputText {
            text: prompt.to_string(),
        }];
        for att in attachments {
            if !att.mime_type.starts_with("image/") {
                return Err(LlmError::Unsupported(format!(
                    "attachment type {}",
                    att.mime_type
                )));
            }
            content.push(InputContent::InputImage {
                image_url: format!("data:{};base64,{}", att.mime_type, STANDARD.encode(&att.bytes)),
            });
        }
        let input = ResponsesInput::Messages(vec![InputMessage {
            role: "user",
            content,
        }]);
        self.send(input, system_prompt, max_tokens, temperature).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> Result<bool> {
        match self.generate("Respond with just 'OK'", None, Some(16), Some(0.0)).await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!(error = %e, "llm.openai.health_check_failed");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_input_serializes_as_message_parts() {
        let input = ResponsesInput::Messages(vec![InputMessage {
            role: "user",
            content: vec![
                InputContent::InputText { text: "Přečti text".into() },
                InputContent::InputImage {
                    image_url: "data:image/png;base64,AAAA".into(),
                },
            ],
        }]);
        let v = serde_json::to_value(&input).unwrap();
        assert_eq!(v[0]["role"], "user");
        assert_eq!(v[0]["content"][0]["type"], "input_text");
        assert_eq!(v[0]["content"][1]["type"], "input_image");
        assert_eq!(v[0]["content"][1]["image_url"], "data:image/png;base64,AAAA");
    }

    #[test]
    fn plain_input_is_a_string() {
        let v = serde_json::to_value(ResponsesInput::Text("hi".into())).unwrap();
        assert_eq!(v, serde_json::json!("hi"));
    }
}
