//! Source reliability scoring.
//!
//! A URL is scored on seven weighted factors. Registry entries supply
//! expertise, transparency, past accuracy, editorial process and
//! independence directly; otherwise each factor is derived from the domain
//! and whatever page metadata is available. Factors with no basis at all are
//! left out and the remaining weights are renormalised.

use crate::metadata::{PageMetadata, PageMetadataSource};
use crate::registry::{ProblematicEntry, SourceRegistry, SourceType, TrustedEntry, normalize_domain};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use url::Url;
use veracity_common::SourceDetail;

pub const INVALID_URL: &str = "Neplatná URL adresa";

const METHODOLOGY: &str = "Hodnocení bylo provedeno na základě analýzy domény, metadat stránky \
a porovnání s databází důvěryhodných a problematických zdrojů.";
const LIMITATIONS: &str =
    "Hodnocení je založeno na dostupných informacích a může se v čase měnit.";
const EXPERT_CONFIDENCE: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Factor {
    Expertise,
    Transparency,
    PastAccuracy,
    EditorialProcess,
    Independence,
    Recency,
    CitationQuality,
}

impl Factor {
    pub const ALL: [Factor; 7] = [
        Factor::Expertise,
        Factor::Transparency,
        Factor::PastAccuracy,
        Factor::EditorialProcess,
        Factor::Independence,
        Factor::Recency,
        Factor::CitationQuality,
    ];

    pub fn weight(self) -> f64 {
        match self {
            Factor::Expertise => 0.20,
            Factor::Transparency => 0.15,
            Factor::PastAccuracy => 0.20,
            Factor::EditorialProcess => 0.15,
            Factor::Independence => 0.15,
            Factor::Recency => 0.10,
            Factor::CitationQuality => 0.05,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Factor::Expertise => "expertise",
            Factor::Transparency => "transparency",
            Factor::PastAccuracy => "past_accuracy",
            Factor::EditorialProcess => "editorial_process",
            Factor::Independence => "independence",
            Factor::Recency => "recency",
            Factor::CitationQuality => "citation_quality",
        }
    }

    /// Czech sentence for `score`, one of six buckets.
    pub fn describe(self, score: f64) -> &'static str {
        let bucket = if score >= 0.9 {
            0
        } else if score >= 0.75 {
            1
        } else if score >= 0.6 {
            2
        } else if score >= 0.4 {
            3
        } else if score >= 0.2 {
            4
        } else {
            5
        };
        self.descriptions()[bucket]
    }

    fn descriptions(self) -> [&'static str; 6] {
        match self {
            Factor::Expertise => [
                "Zdroj má vynikající odbornost a kvalifikaci v dané oblasti.",
                "Zdroj má dobrou odbornost a kvalifikaci v dané oblasti.",
                "Zdroj má přiměřenou odbornost a kvalifikaci v dané oblasti.",
                "Zdroj má omezenou odbornost a kvalifikaci v dané oblasti.",
                "Zdroj má nízkou odbornost a kvalifikaci v dané oblasti.",
                "Zdroj nemá prokazatelnou odbornost a kvalifikaci v dané oblasti.",
            ],
            Factor::Transparency => [
                "Zdroj je vysoce transparentní ohledně své metodologie, financování a potenciálních konfliktů zájmů.",
                "Zdroj je transparentní ohledně své metodologie, financování a potenciálních konfliktů zájmů.",
                "Zdroj je částečně transparentní ohledně své metodologie, financování a potenciálních konfliktů zájmů.",
                "Zdroj má omezenou transparentnost ohledně své metodologie, financování a potenciálních konfliktů zájmů.",
                "Zdroj má nízkou transparentnost ohledně své metodologie, financování a potenciálních konfliktů zájmů.",
                "Zdroj není transparentní ohledně své metodologie, financování a potenciálních konfliktů zájmů.",
            ],
            Factor::PastAccuracy => [
                "Zdroj má vynikající historii přesnosti a spolehlivosti publikovaných informací.",
                "Zdroj má dobrou historii přesnosti a spolehlivosti publikovaných informací.",
                "Zdroj má přiměřenou historii přesnosti a spolehlivosti publikovaných informací.",
                "Zdroj má smíšenou historii přesnosti a spolehlivosti publikovaných informací.",
                "Zdroj má problematickou historii přesnosti a spolehlivosti publikovaných informací.",
                "Zdroj má velmi špatnou historii přesnosti a spolehlivosti publikovaných informací.",
            ],
            Factor::EditorialProcess => [
                "Zdroj má vynikající redakční proces a kontrolní mechanismy.",
                "Zdroj má dobrý redakční proces a kontrolní mechanismy.",
                "Zdroj má přiměřený redakční proces a kontrolní mechanismy.",
                "Zdroj má omezený redakční proces a kontrolní mechanismy.",
                "Zdroj má minimální redakční proces a kontrolní mechanismy.",
                "Zdroj nemá prokazatelný redakční proces a kontrolní mechanismy.",
            ],
            Factor::Independence => [
                "Zdroj je vysoce nezávislý bez významných politických, komerčních nebo jiných zájmů.",
                "Zdroj je nezávislý s minimálními politickými, komerčními nebo jinými zájmy.",
                "Zdroj je částečně nezávislý s některými politickými, komerčními nebo jinými zájmy.",
                "Zdroj má omezenou nezávislost s významnými politickými, komerčními nebo jinými zájmy.",
                "Zdroj má nízkou nezávislost s výraznými politickými, komerčními nebo jinými zájmy.",
                "Zdroj není nezávislý a je silně ovlivněn politickými, komerčními nebo jinými zájmy.",
            ],
            Factor::Recency => [
                "Informace jsou velmi aktuální (méně než měsíc staré).",
                "Informace jsou aktuální (méně než čtvrt roku staré).",
                "Informace jsou relativně aktuální (méně než rok staré).",
                "Informace jsou starší (1-2 roky).",
                "Informace jsou zastaralé (2-5 let).",
                "Informace jsou velmi zastaralé (více než 5 let).",
            ],
            Factor::CitationQuality => [
                "Zdroj má vynikající kvalitu citací a odkazů na další zdroje.",
                "Zdroj má dobrou kvalitu citací a odkazů na další zdroje.",
                "Zdroj má přiměřenou kvalitu citací a odkazů na další zdroje.",
                "Zdroj má omezenou kvalitu citací a odkazů na další zdroje.",
                "Zdroj má nízkou kvalitu citací a odkazů na další zdroje.",
                "Zdroj nemá žádné citace nebo odkazy na další zdroje.",
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReliabilityLevel {
    VeryHigh,
    High,
    Medium,
    Low,
    VeryLow,
    Untrustworthy,
}

impl ReliabilityLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            Self::VeryHigh
        } else if score >= 0.75 {
            Self::High
        } else if score >= 0.6 {
            Self::Medium
        } else if score >= 0.4 {
            Self::Low
        } else if score >= 0.2 {
            Self::VeryLow
        } else {
            Self::Untrustworthy
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::VeryHigh => "Velmi vysoká důvěryhodnost",
            Self::High => "Vysoká důvěryhodnost",
            Self::Medium => "Střední důvěryhodnost",
            Self::Low => "Nízká důvěryhodnost",
            Self::VeryLow => "Velmi nízká důvěryhodnost",
            Self::Untrustworthy => "Nedůvěryhodný zdroj",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorScore {
    pub score: f64,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub is_trusted: bool,
    pub is_problematic: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedEvaluation {
    pub methodology: String,
    pub factor_weights: BTreeMap<Factor, f64>,
    pub confidence: f64,
    pub limitations: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceEvaluation {
    pub url: String,
    pub domain: String,
    pub reliability_score: f64,
    pub reliability_level: ReliabilityLevel,
    pub reliability_label: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub evaluation_factors: BTreeMap<Factor, FactorScore>,
    pub source_type: SourceType,
    pub source_type_description: String,
    pub source_info: SourceInfo,
    pub detail: SourceDetail,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detailed_evaluation: Option<DetailedEvaluation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceEvaluation {
    fn invalid(url: &str, detail: SourceDetail) -> Self {
        let level = ReliabilityLevel::Untrustworthy;
        Self {
            url: url.to_string(),
            domain: String::new(),
            reliability_score: 0.0,
            reliability_level: level,
            reliability_label: level.label().to_string(),
            evaluation_factors: BTreeMap::new(),
            source_type: SourceType::Other,
            source_type_description: SourceType::Other.description().to_string(),
            source_info: SourceInfo::default(),
            detail,
            detailed_evaluation: None,
            error: Some(INVALID_URL.to_string()),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate over several evaluated URLs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceSummary {
    pub evaluations: Vec<SourceEvaluation>,
    pub overall_reliability_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_reliability_level: Option<ReliabilityLevel>,
    pub source_count: usize,
    pub valid_source_count: usize,
    pub level_distribution: BTreeMap<ReliabilityLevel, usize>,
    pub type_distribution: BTreeMap<SourceType, usize>,
}

impl SourceSummary {
    pub fn from_evaluations(evaluations: Vec<SourceEvaluation>) -> Self {
        let valid: Vec<&SourceEvaluation> = evaluations.iter().filter(|e| e.is_valid()).collect();
        let mean = if valid.is_empty() {
            0.0
        } else {
            valid.iter().map(|e| e.reliability_score).sum::<f64>() / valid.len() as f64
        };
        let mut level_distribution = BTreeMap::new();
        let mut type_distribution = BTreeMap::new();
        for e in &valid {
            *level_distribution.entry(e.reliability_level).or_insert(0) += 1;
            *type_distribution.entry(e.source_type).or_insert(0) += 1;
        }
        Self {
            overall_reliability_score: mean,
            overall_reliability_level: (!valid.is_empty()).then(|| ReliabilityLevel::from_score(mean)),
            source_count: evaluations.len(),
            valid_source_count: valid.len(),
            level_distribution,
            type_distribution,
            evaluations,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedSource {
    pub domain: String,
    pub url: String,
    pub name: String,
    pub source_type: SourceType,
    pub reliability_score: f64,
    pub reliability_level: ReliabilityLevel,
}

/// Scores URLs against an injected registry.
#[derive(Clone)]
pub struct SourceReliabilityScorer {
    registry: Arc<SourceRegistry>,
    metadata: Option<Arc<dyn PageMetadataSource>>,
    today: Option<NaiveDate>,
}

impl SourceReliabilityScorer {
    pub fn new(registry: Arc<SourceRegistry>) -> Self {
        Self {
            registry,
            metadata: None,
            today: None,
        }
    }

    /// Fetch page metadata for URLs missing from the registry.
    pub fn with_metadata_source(mut self, source: Arc<dyn PageMetadataSource>) -> Self {
        self.metadata = Some(source);
        self
    }

    /// Pin the date used for recency buckets.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Score `url` from registry data and the domain alone.
    pub fn evaluate(&self, url: &str, detail: SourceDetail) -> SourceEvaluation {
        self.evaluate_with_metadata(url, None, detail)
    }

    /// Score `url`, fetching page metadata first when a source is configured.
    /// A failed fetch falls back to [`Self::evaluate`].
    pub async fn evaluate_online(&self, url: &str, detail: SourceDetail) -> SourceEvaluation {
        let Some(source) = &self.metadata else {
            return self.evaluate(url, detail);
        };
        if parse_domain(url).is_none() {
            return SourceEvaluation::invalid(url, detail);
        }
        match source.fetch(url).await {
            Ok(meta) => self.evaluate_with_metadata(url, Some(&meta), detail),
            Err(e) => {
                tracing::warn!(url, error = %e, "sources.metadata.fetch_failed");
                self.evaluate(url, detail)
            }
        }
    }

    pub fn evaluate_with_metadata(
        &self,
        url: &str,
        meta: Option<&PageMetadata>,
        detail: SourceDetail,
    ) -> SourceEvaluation {
        let Some(domain) = parse_domain(url) else {
            tracing::debug!(url, "sources.evaluate.invalid_url");
            return SourceEvaluation::invalid(url, detail);
        };

        let trusted = self.registry.trusted(&domain).map(|(_, e)| e);
        let problematic = self.registry.problematic(&domain).map(|(_, e)| e);
        let scores = self.factor_scores(&domain, trusted, problematic, meta);
        let reliability_score = composite(&scores);
        let level = ReliabilityLevel::from_score(reliability_score);

        let source_type = trusted
            .map(|t| t.source_type)
            .or(problematic.map(|p| p.source_type))
            .unwrap_or_else(|| SourceType::from_domain(&domain));

        let name = trusted
            .map(|t| t.name.clone())
            .or_else(|| problematic.map(|p| p.name.clone()))
            .or_else(|| meta.and_then(|m| m.site_name.clone()))
            .unwrap_or_else(|| domain.clone());
        let description = trusted
            .map(|t| t.description.clone())
            .or_else(|| problematic.map(|p| p.description.clone()))
            .or_else(|| meta.and_then(|m| m.description.clone()))
            .unwrap_or_default();

        tracing::debug!(
            domain = %domain,
            score = reliability_score,
            level = ?level,
            trusted = trusted.is_some(),
            problematic = problematic.is_some(),
            "sources.evaluate"
        );

        let mut evaluation = SourceEvaluation {
            url: url.to_string(),
            domain,
            reliability_score,
            reliability_level: level,
            reliability_label: level.label().to_string(),
            evaluation_factors: scores
                .into_iter()
                .map(|(f, score)| {
                    (
                        f,
                        FactorScore {
                            score,
                            description: f.describe(score).to_string(),
                        },
                    )
                })
                .collect(),
            source_type,
            source_type_description: source_type.description().to_string(),
            source_info: SourceInfo {
                name,
                description,
                is_trusted: trusted.is_some(),
                is_problematic: problematic.is_some(),
                issues: problematic.map(|p| p.issues.clone()).unwrap_or_default(),
            },
            detail,
            detailed_evaluation: None,
            error: None,
        };
        adapt_to_detail(&mut evaluation);
        evaluation
    }

    /// Evaluate every URL in order and summarise.
    pub async fn evaluate_many(&self, urls: &[String], detail: SourceDetail) -> SourceSummary {
        let mut evaluations = Vec::with_capacity(urls.len());
        for url in urls {
            evaluations.push(self.evaluate_online(url, detail).await);
        }
        let summary = SourceSummary::from_evaluations(evaluations);
        tracing::info!(
            sources = summary.source_count,
            valid = summary.valid_source_count,
            mean = summary.overall_reliability_score,
            "sources.evaluate_many"
        );
        summary
    }

    /// Trusted registry sources scoring at least `min_reliability`, best first.
    pub fn suggest_sources(&self, min_reliability: f64, max: usize) -> Vec<SuggestedSource> {
        let mut out: Vec<SuggestedSource> = self
            .registry
            .trusted_entries()
            .filter(|(domain, _)| self.registry.problematic(domain).is_none())
            .map(|(domain, entry)| {
                let score = composite(&self.factor_scores(domain, Some(entry), None, None));
                SuggestedSource {
                    domain: domain.to_string(),
                    url: format!("https://{domain}"),
                    name: entry.name.clone(),
                    source_type: entry.source_type,
                    reliability_score: score,
                    reliability_level: ReliabilityLevel::from_score(score),
                }
            })
            .filter(|s| s.reliability_score >= min_reliability)
            .collect();
        out.sort_by(|a, b| {
            b.reliability_score
                .total_cmp(&a.reliability_score)
                .then_with(|| a.domain.cmp(&b.domain))
        });
        out.truncate(max);
        out
    }

    fn factor_scores(
        &self,
        domain: &str,
        trusted: Option<&TrustedEntry>,
        problematic: Option<&ProblematicEntry>,
        meta: Option<&PageMetadata>,
    ) -> BTreeMap<Factor, f64> {
        let tld_institutional =
            domain.ends_with(".edu") || domain.ends_with(".gov") || domain.ends_with(".ac.uk");
        let author = meta.is_some_and(|m| m.has_author_info);
        let funding = meta.is_some_and(|m| m.has_funding_info);
        let bonus = |cond: bool, v: f64| if cond { v } else { 0.0 };

        let mut scores = BTreeMap::new();

        let expertise = match trusted {
            Some(t) => t.expertise,
            None => {
                let tld = if tld_institutional {
                    0.2
                } else {
                    bonus(domain.ends_with(".org"), 0.1)
                };
                0.5 + bonus(author, 0.1) + tld
            }
        };
        scores.insert(Factor::Expertise, expertise);

        let transparency = match (trusted, meta) {
            (Some(t), _) => Some(t.transparency),
            (None, Some(m)) => Some(
                0.5 + bonus(m.has_about_page, 0.1)
                    + bonus(m.has_contact_info, 0.1)
                    + bonus(m.has_funding_info, 0.2)
                    + bonus(m.has_privacy_policy && m.has_terms_of_service, 0.1),
            ),
            (None, None) => None,
        };
        if let Some(v) = transparency {
            scores.insert(Factor::Transparency, v);
        }

        let past_accuracy = match (trusted, problematic) {
            (Some(t), Some(p)) => t.reliability.min(p.reliability),
            (None, Some(p)) => p.reliability,
            (Some(t), None) => t.reliability,
            (None, None) => 0.5,
        };
        scores.insert(Factor::PastAccuracy, past_accuracy);

        let editorial = match trusted {
            Some(t) => t.editorial_process,
            None => 0.5 + bonus(tld_institutional, 0.2) + bonus(author, 0.1),
        };
        scores.insert(Factor::EditorialProcess, editorial);

        let independence = match (trusted, problematic) {
            (_, Some(_)) => 0.2,
            (Some(t), None) => t.independence,
            (None, None) => 0.5 + bonus(funding, 0.2) - bonus(domain.ends_with(".gov"), 0.1),
        };
        scores.insert(Factor::Independence, independence);

        if let Some(m) = meta {
            let today = self
                .today
                .unwrap_or_else(|| chrono::Local::now().date_naive());
            scores.insert(Factor::Recency, recency_score(m.latest_date(), today));
            scores.insert(
                Factor::CitationQuality,
                if m.has_citations { 0.8 } else { 0.4 },
            );
        }

        for v in scores.values_mut() {
            *v = v.clamp(0.0, 1.0);
        }
        scores
    }
}

/// Adjust an evaluation to the requested level of detail.
fn adapt_to_detail(evaluation: &mut SourceEvaluation) {
    match evaluation.detail {
        SourceDetail::Minimal => {
            evaluation.evaluation_factors.clear();
            evaluation.source_info.description.clear();
            evaluation.source_info.issues.clear();
        }
        SourceDetail::Standard => {}
        SourceDetail::Expert => {
            evaluation.detailed_evaluation = Some(DetailedEvaluation {
                methodology: METHODOLOGY.to_string(),
                factor_weights: Factor::ALL.iter().map(|f| (*f, f.weight())).collect(),
                confidence: EXPERT_CONFIDENCE,
                limitations: LIMITATIONS.to_string(),
            });
        }
    }
}

/// Weighted mean over the factors present, in `[0, 1]`.
pub fn composite(scores: &BTreeMap<Factor, f64>) -> f64 {
    let (weighted, weights) = scores
        .iter()
        .fold((0.0, 0.0), |(s, w), (f, v)| (s + v * f.weight(), w + f.weight()));
    if weights == 0.0 {
        return 0.5;
    }
    (weighted / weights).clamp(0.0, 1.0)
}

pub fn recency_score(date: Option<NaiveDate>, today: NaiveDate) -> f64 {
    let Some(date) = date else {
        return 0.5;
    };
    match (today - date).num_days() {
        d if d <= 7 => 1.0,
        d if d <= 30 => 0.9,
        d if d <= 90 => 0.8,
        d if d <= 365 => 0.7,
        d if d <= 730 => 0.5,
        d if d <= 1825 => 0.3,
        _ => 0.1,
    }
}

/// Registrable domain of `url`, or `None` without a scheme and host.
pub fn parse_domain(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    let host = parsed.host_str().filter(|h| !h.is_empty())?;
    Some(normalize_domain(host))
}
