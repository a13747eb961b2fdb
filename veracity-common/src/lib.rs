//! Common types and utilities shared across Veracity crates.
//!
//! This crate defines the fact-check domain model, the truth rating scale,
//! observability helpers, and shared error types used throughout the
//! workspace. It stays dependency-light so every crate can depend on it.
//!
//! # Overview
//!
//! - [`Claim`], [`VerifiedClaim`], [`SourceRef`]: the claim pipeline data model
//! - [`RatingKey`] and [`RatingScale`]: the nine-category truth scale
//! - [`ExpertiseLevel`], [`AnalysisLength`], [`ContentType`]: request settings
//! - [`observability`]: centralised tracing/logging initialisation
//! - [`VeracityError`], [`InputError`], [`VerificationFailure`] and [`Result`]
//!
//! # Examples
//!
//! ```rust
//! use veracity_common::{AnalysisLength, RatingKey, RatingScale};
//!
//! let scale = RatingScale::standard();
//! assert_eq!(scale.classify_primary(0.95), Some(RatingKey::True));
//! assert_eq!(AnalysisLength::Standard.claim_limit(), 5);
//! ```
use serde::{Deserialize, Serialize};

pub mod claim;
pub mod observability;
pub mod rating;
pub mod settings;

pub use claim::{Claim, ClaimAnalysis, SourceRef, VerifiedClaim};
pub use rating::{RatingBand, RatingKey, RatingScale, SpecialSignal};
pub use settings::{
    AnalysisLength, AnalysisSettings, ContentType, ExpertiseLevel, SourceDetail,
    VerificationDepth,
};

/// Problems with the request itself. Never retried.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("no content provided")]
    MissingContent,

    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("payload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("invalid setting: {0}")]
    InvalidSetting(String),
}

/// Why a single claim could not be verified.
///
/// The orchestrator turns any of these into a degraded
/// `insufficient_evidence` claim; only the retry policy tells them apart.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum VerificationFailure {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("malformed model response: {0}")]
    MalformedResponse(String),

    #[error("transient network error: {0}")]
    TransientNetwork(String),
}

impl VerificationFailure {
    /// Rate limits, timeouts and network hiccups are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited(_) | Self::Timeout(_) | Self::TransientNetwork(_)
        )
    }

    pub fn reason(&self) -> &str {
        match self {
            Self::Authentication(r)
            | Self::RateLimited(r)
            | Self::Timeout(r)
            | Self::MalformedResponse(r)
            | Self::TransientNetwork(r) => r,
        }
    }
}

/// Error types used across the Veracity system.
#[derive(thiserror::Error, Debug)]
pub enum VeracityError {
    /// The request was rejected before any work started.
    #[error("Input error: {0}")]
    Input(#[from] InputError),

    /// Decoding or recognising media failed.
    #[error("Media processing error: {0}")]
    Media(String),

    /// A remote collaborator (LLM, page fetcher) failed.
    #[error("Collaborator error: {0}")]
    Collaborator(String),

    /// The datastore could not persist or load a report.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Operation cancelled")]
    Cancelled,

    /// Operation exceeded the configured timeout.
    #[error("Timeout occurred")]
    Timeout,
}

/// Convenient alias for results that use [`VeracityError`].
pub type Result<T> = std::result::Result<T, VeracityError>;
