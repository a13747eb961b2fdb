use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use veracity_check::{
    AnalysisInput, AnalysisRequest, Datastore, FactCheckOrchestrator, OrchestratorOptions,
    SqliteStore,
};
use veracity_common::{
    AnalysisLength, AnalysisSettings, Claim, ExpertiseLevel, InputError, RatingKey, RatingScale,
    SpecialSignal, VerificationDepth, VerificationFailure, VerifiedClaim,
};
use veracity_config::{LlmConfig, VeracityConfig};
use veracity_llm::traits::LlmClient;
use veracity_llm::{ClaimVerifier, LlmClaimVerifier, configured_max_tokens, ensure_llm_ready};
use veracity_media::audio::AudioClip;
use veracity_media::recognize::{
    LlmVisionRecognizer, NoRecognizer, PresetText, SpeechRecognizer, TextRecognizer,
};
use veracity_media::{ImageInput, MediaNormalizer};
use veracity_sources::{HttpMetadataFetcher, SourceRegistry, SourceReliabilityScorer};

use crate::cli::CheckArgs;

/// Stands in for the model when none is configured; every claim degrades.
struct UnconfiguredVerifier;

#[async_trait]
impl ClaimVerifier for UnconfiguredVerifier {
    async fn verify(
        &self,
        _claim: &Claim,
        _depth: VerificationDepth,
    ) -> Result<VerifiedClaim, VerificationFailure> {
        Err(VerificationFailure::Authentication(
            "no language model configured".to_string(),
        ))
    }
}

/// Report database used by the CLI when the config names none, so that
/// `history` and `show` see earlier runs.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://veracity.db";

pub fn database_url(cfg: &VeracityConfig) -> &str {
    cfg.store
        .database_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .unwrap_or(DEFAULT_DATABASE_URL)
}

pub async fn open_store(cfg: &VeracityConfig) -> Result<Arc<dyn Datastore>> {
    let url = database_url(cfg);
    let store = SqliteStore::connect(url)
        .await
        .with_context(|| format!("opening report database {url}"))?;
    Ok(Arc::new(store))
}

pub fn build_scorer(cfg: &VeracityConfig) -> Result<SourceReliabilityScorer> {
    let registry = SourceRegistry::load(cfg.sources.registry_path.as_deref())?;
    let scorer = SourceReliabilityScorer::new(Arc::new(registry));
    if !cfg.sources.fetch_metadata {
        return Ok(scorer);
    }
    let fetcher = HttpMetadataFetcher::new(Duration::from_secs(cfg.sources.fetch_timeout_secs))?;
    Ok(scorer.with_metadata_source(Arc::new(fetcher)))
}

async fn llm_client(cfg: &VeracityConfig) -> Result<Option<Arc<dyn LlmClient>>> {
    if matches!(cfg.llm, LlmConfig::None) {
        tracing::warn!("app.llm.unconfigured");
        return Ok(None);
    }
    let client = ensure_llm_ready(&cfg.llm).await?;
    tracing::info!(model = client.model_name(), "app.llm.ready");
    Ok(Some(client))
}

/// Wire the pipeline from config. Preset OCR/ASR text replaces recognition.
pub async fn build_orchestrator(
    cfg: &VeracityConfig,
    store: Arc<dyn Datastore>,
    ocr_text: Option<String>,
    transcript: Option<String>,
) -> Result<FactCheckOrchestrator> {
    let scale = Arc::new(RatingScale::standard());
    let client = llm_client(cfg).await?;

    let verifier: Arc<dyn ClaimVerifier> = match &client {
        Some(client) => Arc::new(
            LlmClaimVerifier::from_config(client.clone(), scale.clone(), &cfg.pipeline)
                .with_max_tokens(configured_max_tokens(&cfg.llm)),
        ),
        None => Arc::new(UnconfiguredVerifier),
    };

    let text: Arc<dyn TextRecognizer> = match (ocr_text, &client) {
        (Some(text), _) => Arc::new(PresetText(text)),
        (None, Some(client)) => Arc::new(LlmVisionRecognizer::new(client.clone())),
        (None, None) => Arc::new(NoRecognizer),
    };
    let speech: Arc<dyn SpeechRecognizer> = match transcript {
        Some(text) => Arc::new(PresetText(text)),
        None => Arc::new(NoRecognizer),
    };

    let mut orchestrator = FactCheckOrchestrator::new(verifier, scale, build_scorer(cfg)?)
        .with_media(MediaNormalizer::new(text, speech))
        .with_store(store)
        .with_options(OrchestratorOptions::from(&cfg.pipeline));
    if let Some(client) = &client {
        orchestrator = orchestrator.with_model_name(client.model_name());
    }
    Ok(orchestrator)
}

pub fn settings_from(args: &CheckArgs) -> Result<AnalysisSettings, InputError> {
    Ok(AnalysisSettings {
        expertise_level: ExpertiseLevel::from_str(&args.expertise)?,
        analysis_length: AnalysisLength::from_str(&args.length)?,
        language: args.language.trim().to_string(),
    })
}

pub fn parse_signal(raw: &str) -> Result<SpecialSignal, InputError> {
    let key = RatingKey::from_str(raw)?;
    SpecialSignal::from_key(key)
        .ok_or_else(|| InputError::InvalidSetting(format!("`{raw}` is not a special category")))
}

/// MIME type for an image path, judged by extension.
pub fn image_mime(path: &Path) -> Result<&'static str, InputError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Ok("image/png"),
        "jpg" | "jpeg" => Ok("image/jpeg"),
        "gif" => Ok("image/gif"),
        "webp" => Ok("image/webp"),
        "bmp" => Ok("image/bmp"),
        "pgm" => Ok("image/x-portable-graymap"),
        _ => Err(InputError::UnsupportedMediaType(format!(
            "image file `{}`",
            path.display()
        ))),
    }
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("reading {}", path.display()))
}

pub fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

/// Turn `check` arguments into a request. Input problems come back as
/// [`InputError`] so the caller can report them as such.
pub fn request_from(args: &CheckArgs) -> Result<AnalysisRequest> {
    let input = if let Some(text) = &args.text {
        AnalysisInput::Text(text.clone())
    } else if let Some(path) = &args.image {
        let mime = image_mime(path)?;
        AnalysisInput::Image(ImageInput::from_encoded(mime, read_bytes(path)?))
    } else if let Some(path) = &args.audio {
        let is_wav = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
        if !is_wav {
            return Err(InputError::UnsupportedMediaType(format!(
                "audio file `{}`; only WAV is supported",
                path.display()
            ))
            .into());
        }
        let clip = AudioClip::from_wav_bytes(&read_bytes(path)?)
            .map_err(|e| InputError::UnsupportedMediaType(e.to_string()))?;
        AnalysisInput::Audio(clip)
    } else if let Some(path) = &args.video {
        return Err(InputError::UnsupportedMediaType(format!(
            "video file `{}`; video frames must be supplied through the library",
            path.display()
        ))
        .into());
    } else {
        return Err(InputError::MissingContent.into());
    };

    let mut request = AnalysisRequest::new(input)
        .with_settings(settings_from(args)?)
        .with_user(args.user.clone());
    if let Some(raw) = &args.signal {
        request = request.with_signal(parse_signal(raw)?);
    }
    Ok(request)
}
