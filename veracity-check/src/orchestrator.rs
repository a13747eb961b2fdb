//! End-to-end fact-check runs.
//!
//! A run normalises media, extracts claims, verifies them concurrently,
//! aggregates a verdict, scores the cited sources and assembles an
//! [`AnalysisReport`]. Only request validation and persistence can fail a
//! run; everything in between degrades into the report itself.

use crate::aggregate::TruthAggregator;
use crate::extractor::ClaimExtractor;
use crate::narrative::{self, Presentation};
use crate::report::{AnalysisReport, MediaSummary};
use crate::store::Datastore;
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use veracity_common::{
    AnalysisSettings, Claim, ContentType, InputError, RatingScale, SpecialSignal, VeracityError,
    VerifiedClaim,
};
use veracity_config::PipelineConfig;
use veracity_llm::{verify_or_degrade, ClaimVerifier};
use veracity_media::audio::AudioClip;
use veracity_media::video::{TextDetection, VideoInput};
use veracity_media::{element_claims, ImageInput, MediaNormalizer};
use veracity_sources::{SourceReliabilityScorer, SourceType};

/// User id recorded when the caller does not name one.
pub const ANONYMOUS_USER: &str = "anonymous";

/// The content to check.
#[derive(Debug, Clone)]
pub enum AnalysisInput {
    Text(String),
    Image(ImageInput),
    Audio(AudioClip),
    /// Decoded frames; decoding containers is the caller's job.
    Video(VideoInput),
}

impl AnalysisInput {
    pub fn content_type(&self) -> ContentType {
        match self {
            AnalysisInput::Text(_) => ContentType::Text,
            AnalysisInput::Image(_) => ContentType::Image,
            AnalysisInput::Audio(_) => ContentType::Audio,
            AnalysisInput::Video(_) => ContentType::Video,
        }
    }

    /// Approximate size of the payload in bytes.
    pub fn payload_size(&self) -> usize {
        match self {
            AnalysisInput::Text(text) => text.len(),
            AnalysisInput::Image(image) => match (image.encoded(), image.raster()) {
                (Some(encoded), _) => encoded.bytes.len(),
                (None, Some(raster)) => raster.width() as usize * raster.height() as usize,
                (None, None) => 0,
            },
            AnalysisInput::Audio(clip) => clip.samples().len() * std::mem::size_of::<f32>(),
            AnalysisInput::Video(video) => {
                let frames: usize = video
                    .frames
                    .iter()
                    .map(|f| f.width() as usize * f.height() as usize)
                    .sum();
                let audio = video
                    .audio
                    .as_ref()
                    .map_or(0, |clip| clip.samples().len() * std::mem::size_of::<f32>());
                frames + audio
            }
        }
    }

    /// No payload at all. Blank text is still content: it yields a report
    /// without claims.
    fn is_missing(&self) -> bool {
        match self {
            AnalysisInput::Text(_) => false,
            AnalysisInput::Image(image) => image.is_empty() || self.payload_size() == 0,
            AnalysisInput::Audio(clip) => clip.is_empty(),
            AnalysisInput::Video(video) => video.frames.is_empty(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub input: AnalysisInput,
    pub settings: AnalysisSettings,
    /// Upstream marker selecting a special category for the verdict.
    pub signal: Option<SpecialSignal>,
    pub user_id: Option<String>,
}

impl AnalysisRequest {
    pub fn new(input: AnalysisInput) -> Self {
        Self {
            input,
            settings: AnalysisSettings::default(),
            signal: None,
            user_id: None,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(AnalysisInput::Text(text.into()))
    }

    pub fn with_settings(mut self, settings: AnalysisSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_signal(mut self, signal: SpecialSignal) -> Self {
        self.signal = Some(signal);
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Reject the request before any work starts.
    pub fn validate(&self, max_payload_bytes: usize) -> Result<(), InputError> {
        if self.input.is_missing() {
            return Err(InputError::MissingContent);
        }
        if let AnalysisInput::Image(image) = &self.input {
            if let Some(encoded) = image.encoded() {
                if !encoded.mime_type.starts_with("image/")
                    && encoded.mime_type != "application/octet-stream"
                {
                    return Err(InputError::UnsupportedMediaType(encoded.mime_type.clone()));
                }
            }
        }
        let size = self.input.payload_size();
        if size > max_payload_bytes {
            return Err(InputError::PayloadTooLarge {
                size,
                limit: max_payload_bytes,
            });
        }
        if self.settings.language.trim().is_empty() {
            return Err(InputError::InvalidSetting("language must not be empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorOptions {
    pub concurrency: usize,
    pub max_payload_bytes: usize,
    pub run_timeout: Option<Duration>,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for OrchestratorOptions {
    fn from(cfg: &PipelineConfig) -> Self {
        Self {
            concurrency: cfg.concurrency(),
            max_payload_bytes: cfg.max_payload_bytes,
            run_timeout: cfg.run_timeout_secs.map(Duration::from_secs),
        }
    }
}

/// Output of the media pass, ready for extraction.
#[derive(Default)]
struct Normalized {
    text: String,
    extra_claims: Vec<Claim>,
    media: Option<MediaSummary>,
    /// Set when the only modality failed.
    error: Option<String>,
}

pub struct FactCheckOrchestrator {
    extractor: ClaimExtractor,
    media: MediaNormalizer,
    verifier: Arc<dyn ClaimVerifier>,
    aggregator: TruthAggregator,
    scorer: SourceReliabilityScorer,
    store: Option<Arc<dyn Datastore>>,
    scale: Arc<RatingScale>,
    options: OrchestratorOptions,
    model: Option<String>,
}

impl FactCheckOrchestrator {
    pub fn new(
        verifier: Arc<dyn ClaimVerifier>,
        scale: Arc<RatingScale>,
        scorer: SourceReliabilityScorer,
    ) -> Self {
        Self {
            extractor: ClaimExtractor::new(),
            media: MediaNormalizer::offline(),
            verifier,
            aggregator: TruthAggregator::new(scale.clone()),
            scorer,
            store: None,
            scale,
            options: OrchestratorOptions::default(),
            model: None,
        }
    }

    pub fn with_media(mut self, media: MediaNormalizer) -> Self {
        self.media = media;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn Datastore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_options(mut self, options: OrchestratorOptions) -> Self {
        self.options = options;
        self
    }

    /// Model name recorded in report metadata.
    pub fn with_model_name(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn store(&self) -> Option<&Arc<dyn Datastore>> {
        self.store.as_ref()
    }

    /// Validate, analyse and persist one request.
    pub async fn run(&self, request: AnalysisRequest) -> veracity_common::Result<AnalysisReport> {
        request.validate(self.options.max_payload_bytes)?;
        let report = self.analyze_bounded(&request).await;
        self.persist(&report, &request).await?;
        Ok(report)
    }

    /// Like [`run`](Self::run), but gives up when `token` fires.
    ///
    /// A cancelled run drops every in-flight verification and returns
    /// `None`; nothing is persisted.
    pub async fn run_until_cancelled(
        &self,
        request: AnalysisRequest,
        token: &CancellationToken,
    ) -> veracity_common::Result<Option<AnalysisReport>> {
        request.validate(self.options.max_payload_bytes)?;
        let report = tokio::select! {
            biased;
            _ = token.cancelled() => {
                tracing::info!(content_type = %request.input.content_type(), "orchestrator.run.cancelled");
                return Ok(None);
            }
            report = self.analyze_bounded(&request) => report,
        };
        self.persist(&report, &request).await?;
        Ok(Some(report))
    }

    async fn persist(&self, report: &AnalysisReport, request: &AnalysisRequest) -> veracity_common::Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let user_id = request.user_id.as_deref().unwrap_or(ANONYMOUS_USER);
        store
            .save(report, user_id)
            .await
            .map_err(|e| VeracityError::Persistence(e.to_string()))?;
        Ok(())
    }

    async fn analyze_bounded(&self, request: &AnalysisRequest) -> AnalysisReport {
        let started = Instant::now();
        let Some(limit) = self.options.run_timeout else {
            return self.analyze(request, started).await;
        };
        match tokio::time::timeout(limit, self.analyze(request, started)).await {
            Ok(report) => report,
            Err(_) => {
                tracing::warn!(timeout_secs = limit.as_secs(), "orchestrator.run.timeout");
                self.error_report(
                    request,
                    started,
                    format!(
                        "Chyba při fact-checkingu: analýza překročila časový limit {} s",
                        limit.as_secs()
                    ),
                )
            }
        }
    }

    async fn analyze(&self, request: &AnalysisRequest, started: Instant) -> AnalysisReport {
        let settings = &request.settings;
        let content_type = request.input.content_type();
        let normalized = self.normalize(&request.input, settings).await;
        if let Some(error) = normalized.error {
            let mut report = self.error_report(request, started, error);
            report.media = normalized.media;
            return report;
        }

        let extraction = self
            .extractor
            .extract_for(&normalized.text, settings.analysis_length);
        let mut claims = extraction.claims;
        claims.extend(normalized.extra_claims);
        claims.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        claims.truncate(settings.analysis_length.claim_limit());

        let mut verified = self.verify_all(claims, request).await;
        for claim in verified.iter_mut().filter(|c| !c.is_degraded()) {
            if claim.explanation.trim().is_empty() {
                claim.explanation = narrative::claim_explanation(claim.rating_key).to_string();
            }
            if let Some(suffix) = narrative::explanation_suffix(settings.expertise_level) {
                claim.explanation = format!("{} {suffix}", claim.explanation);
            }
        }

        let urls = distinct_source_urls(&verified);
        let source_summary = self
            .scorer
            .evaluate_many(&urls, settings.expertise_level.source_detail())
            .await;
        let labels: HashMap<&str, &str> = source_summary
            .evaluations
            .iter()
            .filter(|e| e.is_valid())
            .map(|e| (e.url.as_str(), e.reliability_level.label()))
            .collect();
        for source in verified.iter_mut().flat_map(|c| c.sources.iter_mut()) {
            if let Some(label) = labels.get(source.url.as_str()) {
                source.reliability_hint = (*label).to_string();
            }
        }

        let source_types: Vec<SourceType> = source_summary
            .evaluations
            .iter()
            .filter(|e| e.is_valid())
            .map(|e| e.source_type)
            .collect();
        let signal = derive_signal(request.signal, &verified, &source_types);
        let rated: Vec<VerifiedClaim> = verified.iter().filter(|c| !c.is_degraded()).cloned().collect();
        let verdict = self.aggregator.aggregate_with(&rated, signal);

        let content_summary = match content_type {
            ContentType::Text => extraction.summary,
            other => {
                let prefix = normalized
                    .media
                    .as_ref()
                    .map(|m| m.summary.as_str())
                    .unwrap_or_default();
                media_summary_line(prefix, other, verified.len())
            }
        };

        let mut report = AnalysisReport::new(content_type, settings.clone(), &verdict);
        report.content_summary = content_summary;
        report.no_claims = verified.is_empty();
        report.presentation = Presentation::build(
            &verdict,
            &verified,
            settings.expertise_level,
            settings.analysis_length,
        );
        report.claims = verified;
        report.sources = source_summary.evaluations.clone();
        report.source_summary = source_summary;
        report.media = normalized.media;
        report.metadata.model = self.model.clone();
        report.metadata.processing_ms = elapsed_ms(started);

        tracing::info!(
            id = %report.id,
            content_type = %content_type,
            claims = report.claims.len(),
            degraded = report.claims.len() - rated.len(),
            sources = report.sources.len(),
            rating = %report.truth_rating,
            score = report.truth_score,
            processing_ms = report.metadata.processing_ms,
            "orchestrator.run.done"
        );
        report
    }

    /// Verify every claim with at most `concurrency` calls in flight.
    ///
    /// Results come back in completion order and are put back in claim order
    /// by index.
    async fn verify_all(&self, claims: Vec<Claim>, request: &AnalysisRequest) -> Vec<VerifiedClaim> {
        let depth = request.settings.analysis_length.verification_depth();
        let verifier = self.verifier.as_ref();
        let scale = self.scale.as_ref();
        let total = claims.len();

        let mut slots: Vec<Option<VerifiedClaim>> = vec![None; total];
        let mut results = stream::iter(claims.into_iter().enumerate())
            .map(move |(idx, claim)| async move {
                (idx, verify_or_degrade(verifier, claim, depth, scale).await)
            })
            .buffer_unordered(self.options.concurrency.max(1));
        while let Some((idx, verified)) = results.next().await {
            slots[idx] = Some(verified);
        }
        tracing::debug!(claims = total, concurrency = self.options.concurrency, "orchestrator.verify.done");
        slots.into_iter().flatten().collect()
    }

    async fn normalize(&self, input: &AnalysisInput, settings: &AnalysisSettings) -> Normalized {
        let language = settings.language.as_str();
        match input {
            AnalysisInput::Text(text) => Normalized {
                text: text.clone(),
                ..Normalized::default()
            },
            AnalysisInput::Image(image) => {
                let analysis = self.media.normalize_image(image, language).await;
                let media = MediaSummary {
                    summary: analysis.summary.clone(),
                    visual_elements: analysis.visual_elements.len(),
                    error: analysis.error.clone(),
                    ..MediaSummary::default()
                };
                let extra_claims = element_claims(&analysis);
                let failed = analysis.extracted_text.trim().is_empty() && extra_claims.is_empty();
                Normalized {
                    error: failed.then(|| media_error(analysis.error.as_deref())).flatten(),
                    text: analysis.extracted_text,
                    extra_claims,
                    media: Some(media),
                }
            }
            AnalysisInput::Audio(clip) => {
                let analysis = self.media.normalize_audio(clip, language).await;
                let media = MediaSummary {
                    summary: analysis.summary.clone(),
                    duration_secs: Some(clip.duration_secs()),
                    error: analysis.error.clone(),
                    ..MediaSummary::default()
                };
                Normalized {
                    error: media_error(analysis.error.as_deref()),
                    text: analysis.transcript,
                    extra_claims: Vec::new(),
                    media: Some(media),
                }
            }
            AnalysisInput::Video(video) => {
                let analysis = self
                    .media
                    .normalize_video(video, language, settings.analysis_length)
                    .await;
                let media = MediaSummary {
                    summary: analysis.summary.clone(),
                    duration_secs: Some(analysis.duration_secs),
                    visual_elements: analysis
                        .key_frames
                        .iter()
                        .map(|k| k.analysis.visual_elements.len())
                        .sum(),
                    scenes: analysis.scenes.len(),
                    text_detections: analysis.text_detections.len(),
                    error: analysis.error.clone(),
                };
                let transcript = analysis
                    .audio_analysis
                    .map(|a| a.transcript)
                    .unwrap_or_default();
                Normalized {
                    error: media_error(analysis.error.as_deref()),
                    text: transcript,
                    extra_claims: self.detection_claims(&analysis.text_detections, settings),
                    media: Some(media),
                }
            }
        }
    }

    /// Claims found in on-screen text, stamped with the frame time. Text
    /// repeated across key frames counts once, at its first appearance.
    fn detection_claims(&self, detections: &[TextDetection], settings: &AnalysisSettings) -> Vec<Claim> {
        let mut seen = HashSet::new();
        detections
            .iter()
            .flat_map(|detection| {
                self.extractor
                    .extract_for(&detection.text, settings.analysis_length)
                    .claims
                    .into_iter()
                    .map(move |claim| {
                        Claim::non_textual(claim.text, claim.relevance_score)
                            .with_timestamp(detection.timestamp)
                    })
            })
            .filter(|claim| seen.insert(claim.text.clone()))
            .collect()
    }

    fn error_report(&self, request: &AnalysisRequest, started: Instant, error: String) -> AnalysisReport {
        let verdict = self.aggregator.aggregate(&[]);
        let mut report = AnalysisReport::new(
            request.input.content_type(),
            request.settings.clone(),
            &verdict,
        );
        report.content_summary = error.clone();
        report.presentation = Presentation::build(
            &verdict,
            &[],
            request.settings.expertise_level,
            request.settings.analysis_length,
        );
        report.metadata.model = self.model.clone();
        report.metadata.processing_ms = elapsed_ms(started);
        tracing::warn!(id = %report.id, error = %error, "orchestrator.run.failed");
        report.error = Some(error);
        report
    }
}

fn media_error(error: Option<&str>) -> Option<String> {
    error.map(|e| format!("Chyba při zpracování média: {e}"))
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Distinct non-empty source URLs in first-seen order.
pub fn distinct_source_urls(claims: &[VerifiedClaim]) -> Vec<String> {
    let mut seen = HashSet::new();
    claims
        .iter()
        .flat_map(|c| c.sources.iter())
        .map(|s| s.url.trim())
        .filter(|url| !url.is_empty() && seen.insert(*url))
        .map(str::to_string)
        .collect()
}

/// Pick the special category, if any, for the overall verdict.
///
/// An explicit signal wins. Otherwise a satirical source marks the whole
/// report as satire, and a special category shared by every rated claim is
/// carried over.
pub fn derive_signal(
    explicit: Option<SpecialSignal>,
    claims: &[VerifiedClaim],
    source_types: &[SourceType],
) -> Option<SpecialSignal> {
    if explicit.is_some() {
        return explicit;
    }
    if source_types.contains(&SourceType::Satire) {
        return Some(SpecialSignal::Satire);
    }

    let mut rated = claims.iter().filter(|c| !c.is_degraded());
    let first = rated.next()?.rating_key;
    if first.is_primary() || !rated.all(|c| c.rating_key == first) {
        return None;
    }
    SpecialSignal::from_key(first)
}

/// "{modality summary} Analýza obrazového obsahu s N ověřitelnými tvrzeními."
pub fn media_summary_line(prefix: &str, content_type: ContentType, claims: usize) -> String {
    let modality = match content_type {
        ContentType::Image => "obrazového",
        ContentType::Audio => "audio",
        ContentType::Video => "video",
        ContentType::Text => "textového",
    };
    let line = format!("Analýza {modality} obsahu s {claims} ověřitelnými tvrzeními.");
    if prefix.trim().is_empty() {
        line
    } else {
        format!("{} {line}", prefix.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veracity_common::{RatingKey, SourceRef};

    fn claim_rated(key: RatingKey, url: &str) -> VerifiedClaim {
        let scale = RatingScale::standard();
        VerifiedClaim::rated(Claim::new("Tvrzení o něčem.", 0, 1.0), &scale, key, 0.8, "")
            .with_sources(vec![SourceRef {
                name: "Zdroj".into(),
                url: url.into(),
                reliability_hint: String::new(),
            }])
    }

    #[test]
    fn explicit_signal_wins() {
        let claims = [claim_rated(RatingKey::Unverifiable, "")];
        assert_eq!(
            derive_signal(Some(SpecialSignal::Misleading), &claims, &[SourceType::Satire]),
            Some(SpecialSignal::Misleading)
        );
    }

    #[test]
    fn satirical_source_marks_satire() {
        let claims = [claim_rated(RatingKey::True, "")];
        assert_eq!(
            derive_signal(None, &claims, &[SourceType::News, SourceType::Satire]),
            Some(SpecialSignal::Satire)
        );
    }

    #[test]
    fn shared_special_category_is_carried_over() {
        let claims = [
            claim_rated(RatingKey::Unverifiable, ""),
            claim_rated(RatingKey::Unverifiable, ""),
        ];
        assert_eq!(derive_signal(None, &claims, &[]), Some(SpecialSignal::Unverifiable));

        let mixed = [
            claim_rated(RatingKey::Unverifiable, ""),
            claim_rated(RatingKey::True, ""),
        ];
        assert_eq!(derive_signal(None, &mixed, &[]), None);
        assert_eq!(derive_signal(None, &[], &[]), None);
    }

    #[test]
    fn degraded_claims_do_not_vote() {
        let scale = RatingScale::standard();
        let degraded = VerifiedClaim::degraded(
            Claim::new("Tvrzení.", 1, 1.0),
            &scale,
            veracity_common::VerificationFailure::Timeout("60s".into()),
        );
        let claims = [degraded, claim_rated(RatingKey::True, "")];
        assert_eq!(derive_signal(None, &claims, &[]), None);
    }

    #[test]
    fn source_urls_are_deduplicated_in_order() {
        let claims = [
            claim_rated(RatingKey::True, "https://www.czso.cz/a"),
            claim_rated(RatingKey::True, " "),
            claim_rated(RatingKey::True, "https://www.ctk.cz/"),
            claim_rated(RatingKey::True, "https://www.czso.cz/a"),
        ];
        assert_eq!(
            distinct_source_urls(&claims),
            vec!["https://www.czso.cz/a".to_string(), "https://www.ctk.cz/".to_string()]
        );
    }

    #[test]
    fn media_summary_mentions_modality_and_count() {
        assert_eq!(
            media_summary_line("Obrázek obsahuje 1 graf.", ContentType::Image, 2),
            "Obrázek obsahuje 1 graf. Analýza obrazového obsahu s 2 ověřitelnými tvrzeními."
        );
        assert_eq!(
            media_summary_line("", ContentType::Audio, 0),
            "Analýza audio obsahu s 0 ověřitelnými tvrzeními."
        );
    }

    #[test]
    fn validation_rejects_bad_requests() {
        assert_eq!(AnalysisRequest::text("  ").validate(100), Ok(()));
        assert_eq!(
            AnalysisRequest::new(AnalysisInput::Image(ImageInput::from_encoded("image/png", Vec::new())))
                .validate(100),
            Err(InputError::MissingContent)
        );
        assert_eq!(
            AnalysisRequest::text("x".repeat(101)).validate(100),
            Err(InputError::PayloadTooLarge { size: 101, limit: 100 })
        );
        let pdf = AnalysisRequest::new(AnalysisInput::Image(ImageInput::from_encoded(
            "application/pdf",
            vec![1, 2, 3],
        )));
        assert_eq!(
            pdf.validate(100),
            Err(InputError::UnsupportedMediaType("application/pdf".into()))
        );
        assert!(AnalysisRequest::text("Praha je hlavní město.").validate(100).is_ok());
    }
}
