//! OCR and speech recognition boundaries.
//!
//! Recognition quality is somebody else's problem: the normaliser only needs
//! text back. [`NoRecognizer`] returns nothing, [`PresetText`] replays text
//! the caller already has, and [`LlmVisionRecognizer`] asks a vision-capable
//! model to transcribe an encoded image.

use crate::ImageInput;
use crate::MediaError;
use crate::audio::AudioClip;
use async_trait::async_trait;
use std::sync::Arc;
use veracity_llm::MediaAttachment;
use veracity_llm::traits::LlmClient;

#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize_text(&self, image: &ImageInput, language: &str)
    -> Result<String, MediaError>;
}

#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    async fn transcribe(&self, clip: &AudioClip, language: &str) -> Result<String, MediaError>;
}

/// Recognises nothing. Signal analysis still runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRecognizer;

#[async_trait]
impl TextRecognizer for NoRecognizer {
    async fn recognize_text(&self, _: &ImageInput, _: &str) -> Result<String, MediaError> {
        Ok(String::new())
    }
}

#[async_trait]
impl SpeechRecognizer for NoRecognizer {
    async fn transcribe(&self, _: &AudioClip, _: &str) -> Result<String, MediaError> {
        Ok(String::new())
    }
}

/// Text produced elsewhere (a sidecar transcript, an external OCR run).
#[derive(Debug, Clone, Default)]
pub struct PresetText(pub String);

#[async_trait]
impl TextRecognizer for PresetText {
    async fn recognize_text(&self, _: &ImageInput, _: &str) -> Result<String, MediaError> {
        Ok(self.0.clone())
    }
}

#[async_trait]
impl SpeechRecognizer for PresetText {
    async fn transcribe(&self, _: &AudioClip, _: &str) -> Result<String, MediaError> {
        Ok(self.0.clone())
    }
}

const OCR_SYSTEM_PROMPT: &str = "Jsi OCR nástroj. Přepiš veškerý čitelný text z obrázku přesně tak, \
jak je napsán. Nic nepřidávej a nekomentuj. Pokud obrázek žádný text neobsahuje, odpověz prázdně.";

/// OCR through a vision-capable language model.
pub struct LlmVisionRecognizer {
    client: Arc<dyn LlmClient>,
    max_tokens: Option<u32>,
}

impl LlmVisionRecognizer {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            max_tokens: Some(1000),
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl TextRecognizer for LlmVisionRecognizer {
    async fn recognize_text(
        &self,
        image: &ImageInput,
        language: &str,
    ) -> Result<String, MediaError> {
        let Some(encoded) = image.encoded() else {
            return Err(MediaError::Unsupported(
                "vision recognition needs the encoded image".to_string(),
            ));
        };
        let attachment = MediaAttachment::new(encoded.mime_type.clone(), encoded.bytes.clone());
        let prompt = format!("Přepiš text z přiloženého obrázku (jazyk: {language}).");

        let resp = self
            .client
            .generate_with_attachments(
                &prompt,
                Some(OCR_SYSTEM_PROMPT),
                std::slice::from_ref(&attachment),
                self.max_tokens,
                Some(0.0),
            )
            .await
            .map_err(|e| MediaError::Recognizer(e.to_string()))?;

        tracing::debug!(
            model = self.client.model_name(),
            chars = resp.text.len(),
            "media.ocr.done"
        );
        Ok(resp.text.trim().to_string())
    }
}
