//! Media normalisation for the fact-check pipeline.
//!
//! Turns images, audio clips and decoded video into text plus signal
//! metadata. Failures never escape as errors: every modality returns an
//! analysis value with empty content and `error` set, and the caller treats
//! that as "nothing to extract here".
pub mod audio;
pub mod image;
pub mod recognize;
pub mod video;

use audio::{AudioAnalysis, AudioClip};
use image::{GrayImage, ImageAnalysis, VisualElementKind};
use recognize::{NoRecognizer, SpeechRecognizer, TextRecognizer};
use std::sync::Arc;
use veracity_common::{AnalysisLength, Claim};
use video::{VideoAnalysis, VideoInput};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("decode failed: {0}")]
    Decode(String),

    #[error("unsupported media: {0}")]
    Unsupported(String),

    #[error("recognizer failed: {0}")]
    Recognizer(String),
}

/// Original file bytes, kept for recognizers that take encoded media.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedMedia {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// An image as handed to the normaliser: a decoded raster, the encoded
/// bytes, or both.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageInput {
    raster: Option<GrayImage>,
    encoded: Option<EncodedMedia>,
}

impl ImageInput {
    pub fn from_raster(raster: GrayImage) -> Self {
        Self {
            raster: Some(raster),
            encoded: None,
        }
    }

    /// Keep the encoded bytes and decode a raster when the format is PGM.
    pub fn from_encoded(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        let mime_type = mime_type.into();
        let raster = if is_pgm(&mime_type, &bytes) {
            match GrayImage::from_pgm(&bytes) {
                Ok(img) => Some(img),
                Err(e) => {
                    tracing::debug!(error = %e, "media.image.pgm_decode_failed");
                    None
                }
            }
        } else {
            None
        };
        Self {
            raster,
            encoded: Some(EncodedMedia { mime_type, bytes }),
        }
    }

    pub fn raster(&self) -> Option<&GrayImage> {
        self.raster.as_ref()
    }

    pub fn encoded(&self) -> Option<&EncodedMedia> {
        self.encoded.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.raster.is_none() && self.encoded.is_none()
    }
}

fn is_pgm(mime_type: &str, bytes: &[u8]) -> bool {
    mime_type == "image/x-portable-graymap" || bytes.starts_with(b"P5") || bytes.starts_with(b"P2")
}

/// Routes each modality through signal analysis and the OCR/ASR boundaries.
#[derive(Clone)]
pub struct MediaNormalizer {
    text: Arc<dyn TextRecognizer>,
    speech: Arc<dyn SpeechRecognizer>,
}

impl MediaNormalizer {
    pub fn new(text: Arc<dyn TextRecognizer>, speech: Arc<dyn SpeechRecognizer>) -> Self {
        Self { text, speech }
    }

    /// Signal analysis only; recognisers return nothing.
    pub fn offline() -> Self {
        Self::new(Arc::new(NoRecognizer), Arc::new(NoRecognizer))
    }

    pub async fn normalize_image(&self, input: &ImageInput, language: &str) -> ImageAnalysis {
        if input.is_empty() {
            return ImageAnalysis::failed(MediaError::Decode("no image data".into()).to_string());
        }

        let text = match self.text.recognize_text(input, language).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "media.image.ocr_failed");
                return ImageAnalysis::failed(e.to_string());
            }
        };

        let Some(raster) = input.raster() else {
            if text.trim().is_empty() {
                let mime = input.encoded().map(|e| e.mime_type.as_str()).unwrap_or("?");
                return ImageAnalysis::failed(
                    MediaError::Unsupported(format!("cannot decode {mime}")).to_string(),
                );
            }
            let summary = image::summarize(&text, &[], &[]);
            return ImageAnalysis {
                extracted_text: text,
                summary,
                ..ImageAnalysis::default()
            };
        };

        let visual_elements = image::detect_elements(raster);
        let chart_signals = image::detect_charts(raster);
        let summary = image::summarize(&text, &visual_elements, &chart_signals);
        tracing::debug!(
            width = raster.width(),
            height = raster.height(),
            elements = visual_elements.len(),
            charts = chart_signals.len(),
            text_chars = text.chars().count(),
            "media.image.done"
        );
        ImageAnalysis {
            extracted_text: text,
            visual_elements,
            chart_signals,
            summary,
            error: None,
        }
    }

    pub async fn normalize_audio(&self, clip: &AudioClip, language: &str) -> AudioAnalysis {
        if clip.is_empty() {
            return AudioAnalysis::failed(MediaError::Decode("audio clip is empty".into()).to_string());
        }

        let transcript = match self.speech.transcribe(clip, language).await {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(error = %e, "media.audio.asr_failed");
                return AudioAnalysis::failed(e.to_string());
            }
        };

        let features = audio::extract_features(clip);
        let speaker_segments = audio::speaker_segments(clip);
        let (dominant_emotion, emotion_scores) = audio::neutral_emotions();
        let summary = audio::summarize(&transcript, &features, &speaker_segments, &dominant_emotion);
        tracing::debug!(
            duration_secs = clip.duration_secs(),
            content_type = ?features.content_type,
            segments = speaker_segments.len(),
            "media.audio.done"
        );
        AudioAnalysis {
            transcript,
            features: Some(features),
            speaker_segments,
            dominant_emotion,
            emotion_scores,
            summary,
            error: None,
        }
    }

    pub async fn normalize_video(
        &self,
        input: &VideoInput,
        language: &str,
        length: AnalysisLength,
    ) -> VideoAnalysis {
        if let Err(e) = input.validate() {
            tracing::warn!(error = %e, "media.video.invalid");
            return VideoAnalysis::failed(e.to_string());
        }

        let mut key_frames = Vec::new();
        for (frame_index, timestamp) in video::key_frame_indices(input, length) {
            let frame = ImageInput::from_raster(input.frames[frame_index].clone());
            let analysis = self.normalize_image(&frame, language).await;
            key_frames.push(video::KeyFrame {
                timestamp,
                frame_index,
                analysis,
            });
        }

        let audio_analysis = match &input.audio {
            Some(clip) => Some(self.normalize_audio(clip, language).await),
            None => None,
        };
        let scenes = video::detect_scenes(input);
        let text_detections = video::text_detections(&key_frames);
        let summary = video::summarize(input, audio_analysis.as_ref(), &scenes, &text_detections);

        tracing::debug!(
            frames = input.frames.len(),
            key_frames = key_frames.len(),
            scenes = scenes.len(),
            text_detections = text_detections.len(),
            "media.video.done"
        );
        VideoAnalysis {
            duration_secs: input.duration_secs(),
            width: input.frames[0].width(),
            height: input.frames[0].height(),
            key_frames,
            audio_analysis,
            scenes,
            text_detections,
            summary,
            error: None,
        }
    }
}

/// One claim per detected visual element, e.g. "Obrázek obsahuje graf.".
pub fn element_claims(analysis: &ImageAnalysis) -> Vec<Claim> {
    analysis
        .visual_elements
        .iter()
        .filter(|e| e.kind != VisualElementKind::Unknown)
        .map(|e| Claim::non_textual(format!("Obrázek obsahuje {}.", e.kind.label()), e.confidence))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pgm_bytes_are_decoded_on_input() {
        let mut bytes = b"P5\n2 2\n255\n".to_vec();
        bytes.extend_from_slice(&[0, 255, 255, 0]);
        let input = ImageInput::from_encoded("application/octet-stream", bytes);
        assert_eq!(input.raster().map(|r| r.width()), Some(2));
        assert!(input.encoded().is_some());

        let png = ImageInput::from_encoded("image/png", vec![0x89, b'P']);
        assert!(png.raster().is_none());
        assert!(!png.is_empty());
    }

    #[tokio::test]
    async fn undecodable_image_without_text_is_an_empty_result() {
        let input = ImageInput::from_encoded("image/png", vec![0x89, b'P']);
        let analysis = MediaNormalizer::offline().normalize_image(&input, "cs").await;
        assert!(analysis.error.is_some());
        assert!(analysis.extracted_text.is_empty());
        assert!(analysis.visual_elements.is_empty());
    }

    #[tokio::test]
    async fn disc_image_yields_graph_claim() {
        let input = ImageInput::from_raster(image::tests::disc(100, 30.0));
        let analysis = MediaNormalizer::offline().normalize_image(&input, "cs").await;
        assert!(analysis.error.is_none());
        assert!(analysis.chart_signals.contains(&image::ChartKind::PieChart));

        let claims = element_claims(&analysis);
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].text, "Obrázek obsahuje graf.");
        assert_eq!(claims[0].position, -1);
        assert!((claims[0].relevance_score - 0.7).abs() < 1e-9);
    }

    #[tokio::test]
    async fn empty_audio_is_an_empty_result() {
        let clip = AudioClip::new(16_000, Vec::new()).unwrap();
        let analysis = MediaNormalizer::offline().normalize_audio(&clip, "cs").await;
        assert!(analysis.error.is_some());
        assert!(analysis.features.is_none());
    }
}
