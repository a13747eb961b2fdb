use crate::rating::{RatingKey, RatingScale};
use crate::VerificationFailure;
use serde::{Deserialize, Serialize};

/// A checkable statement lifted from the input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub text: String,
    /// Sentence index in the analysed text, `-1` for non-textual claims.
    pub position: i64,
    pub relevance_score: f64,
    /// Byte offset of the sentence in the normalised text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
    /// Media timestamp in seconds (video frame text).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

impl Claim {
    pub fn new(text: impl Into<String>, position: i64, relevance_score: f64) -> Self {
        Self {
            text: text.into(),
            position,
            relevance_score,
            offset: None,
            timestamp: None,
        }
    }

    /// Claim derived from media rather than a sentence of text.
    pub fn non_textual(text: impl Into<String>, relevance_score: f64) -> Self {
        Self::new(text, -1, relevance_score)
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_timestamp(mut self, seconds: f64) -> Self {
        self.timestamp = Some(seconds);
        self
    }
}

/// A source cited for a claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub reliability_hint: String,
}

/// Extra reasoning the model returned next to its verdict.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimAnalysis {
    #[serde(default)]
    pub evidence: Vec<String>,
    #[serde(default)]
    pub logical_fallacies: Vec<String>,
    #[serde(default)]
    pub manipulation_techniques: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedClaim {
    #[serde(flatten)]
    pub claim: Claim,
    pub rating_key: RatingKey,
    pub rating_name: String,
    pub score: f64,
    /// Model confidence in `[0, 1]`.
    pub confidence: f64,
    pub color_hint: String,
    pub explanation: String,
    #[serde(default)]
    pub sources: Vec<SourceRef>,
    #[serde(default)]
    pub analysis: ClaimAnalysis,
    /// Set when verification failed and the claim was degraded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<VerificationFailure>,
}

impl VerifiedClaim {
    /// Rate `claim` as `key`, taking display data from `scale`.
    pub fn rated(
        claim: Claim,
        scale: &RatingScale,
        key: RatingKey,
        confidence: f64,
        explanation: impl Into<String>,
    ) -> Self {
        let band = scale.band(key);
        Self {
            score: scale.score_for(key, confidence),
            rating_key: key,
            rating_name: band.name.clone(),
            color_hint: band.color.clone(),
            confidence: confidence.clamp(0.0, 1.0),
            explanation: explanation.into(),
            sources: Vec::new(),
            analysis: ClaimAnalysis::default(),
            failure: None,
            claim,
        }
    }

    /// The conservative result for a claim whose verification failed.
    pub fn degraded(claim: Claim, scale: &RatingScale, failure: VerificationFailure) -> Self {
        let band = scale.band(RatingKey::InsufficientEvidence);
        Self {
            rating_key: RatingKey::InsufficientEvidence,
            rating_name: band.name.clone(),
            color_hint: band.color.clone(),
            score: 0.0,
            confidence: 0.0,
            explanation: format!("Tvrzení se nepodařilo ověřit: {}", failure.reason()),
            sources: Vec::new(),
            analysis: ClaimAnalysis::default(),
            failure: Some(failure),
            claim,
        }
    }

    pub fn with_sources(mut self, sources: Vec<SourceRef>) -> Self {
        self.sources = sources;
        self
    }

    pub fn is_degraded(&self) -> bool {
        self.failure.is_some()
    }
}
