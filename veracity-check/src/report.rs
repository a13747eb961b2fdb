//! The assembled analysis report.

use crate::aggregate::OverallVerdict;
use crate::narrative::Presentation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use veracity_common::{AnalysisSettings, ContentType, RatingKey, VerifiedClaim};
use veracity_sources::{SourceEvaluation, SourceSummary};

pub const REPORT_VERSION: &str = "1.0";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub version: String,
    pub processing_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// What the media pass produced, kept short for the report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaSummary {
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    #[serde(default)]
    pub visual_elements: usize,
    #[serde(default)]
    pub scenes: usize,
    #[serde(default)]
    pub text_detections: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub content_type: ContentType,
    pub truth_rating: RatingKey,
    pub truth_rating_name: String,
    pub truth_score: f64,
    pub truth_color: String,
    pub truth_description: String,
    pub content_summary: String,
    pub no_claims: bool,
    pub claims: Vec<VerifiedClaim>,
    pub sources: Vec<SourceEvaluation>,
    pub source_summary: SourceSummary,
    /// Templated narrative, not verified content.
    pub presentation: Presentation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaSummary>,
    pub settings: AnalysisSettings,
    pub metadata: ReportMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisReport {
    /// Report with the verdict filled in and everything else empty.
    pub fn new(content_type: ContentType, settings: AnalysisSettings, verdict: &OverallVerdict) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            content_type,
            truth_rating: verdict.rating_key,
            truth_rating_name: verdict.name.clone(),
            truth_score: verdict.score,
            truth_color: verdict.color_hint.clone(),
            truth_description: verdict.description.clone(),
            content_summary: String::new(),
            no_claims: true,
            claims: Vec::new(),
            sources: Vec::new(),
            source_summary: SourceSummary::default(),
            presentation: Presentation::default(),
            media: None,
            settings,
            metadata: ReportMetadata {
                version: REPORT_VERSION.to_string(),
                ..ReportMetadata::default()
            },
            error: None,
        }
    }

    pub fn verdict(&self) -> OverallVerdict {
        OverallVerdict {
            rating_key: self.truth_rating,
            name: self.truth_rating_name.clone(),
            description: self.truth_description.clone(),
            color_hint: self.truth_color.clone(),
            score: self.truth_score,
        }
    }

    pub fn summary(&self, user_id: &str) -> AnalysisReportSummary {
        AnalysisReportSummary {
            id: self.id,
            user_id: user_id.to_string(),
            timestamp: self.timestamp,
            content_type: self.content_type,
            truth_rating: self.truth_rating,
            truth_score: self.truth_score,
            content_summary: self.content_summary.clone(),
            claim_count: self.claims.len(),
            error: self.error.clone(),
        }
    }
}

/// One row of a user's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReportSummary {
    pub id: Uuid,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub content_type: ContentType,
    pub truth_rating: RatingKey,
    pub truth_score: f64,
    pub content_summary: String,
    pub claim_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
