//! Defensive parsing of model output and the verdict lexicon.
//!
//! Models are asked for strict JSON but routinely wrap it in prose or code
//! fences, or drop it altogether. Parsing tries, in order: the whole text as
//! JSON, a fenced ```json block, the outermost brace slice, and finally a
//! `key: value` line scan.

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::LazyLock;
use veracity_common::{RatingKey, SourceRef, VerificationFailure};

/// Version tag of [`VERDICT_LEXICON`].
pub const VERDICT_LEXICON_VERSION: u32 = 2;

/// Ordered verdict phrases: the first entry with a matching label wins, so
/// compound and negated labels come before the words they contain.
pub const VERDICT_LEXICON: &[(RatingKey, &[&str])] = &[
    (RatingKey::MostlyTrue, &["převážně pravdivé", "převážně pravda", "mostly true"]),
    (
        RatingKey::PartlyTrue,
        &["částečně pravdivé", "částečně pravda", "partly true", "half true", "partially true"],
    ),
    (
        RatingKey::MostlyFalse,
        &["převážně nepravdivé", "převážně nepravda", "mostly false"],
    ),
    (RatingKey::Misleading, &["zavádějící", "misleading"]),
    (RatingKey::InsufficientEvidence, &["nedostatečné", "insufficient"]),
    (
        RatingKey::Unverifiable,
        &["nelze ověřit", "neověřitelné", "unverifiable", "cannot be verified"],
    ),
    (RatingKey::Satire, &["satira", "satire"]),
    (RatingKey::True, &["not false", "není nepravdivé", "není nepravda"]),
    (
        RatingKey::False,
        &[
            "nepravdivé",
            "nepravda",
            "není pravda",
            "není pravdivé",
            "nesprávné",
            "nesprávně",
            "incorrect",
            "not correct",
            "not true",
            "untrue",
            "false",
        ],
    ),
    (RatingKey::True, &["pravdivé", "pravda", "true", "correct"]),
];

/// Map a free-text verdict onto the closed rating set.
pub fn map_verdict(verdict: &str) -> Option<RatingKey> {
    let lowered = verdict.trim().to_lowercase();
    if lowered.is_empty() {
        return None;
    }
    VERDICT_LEXICON
        .iter()
        .find(|(_, labels)| labels.iter().any(|l| lowered.contains(l)))
        .map(|(key, _)| *key)
}

/// What the model said about one claim, before rating.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelVerdict {
    pub verdict: String,
    /// In `[0, 1]`.
    pub confidence: f64,
    pub explanation: String,
    pub evidence: Vec<String>,
    pub sources: Vec<SourceRef>,
    pub logical_fallacies: Vec<String>,
    pub manipulation_techniques: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct VerdictWire {
    #[serde(default, alias = "verdikt")]
    verdict: Option<String>,
    #[serde(default, alias = "jistota")]
    confidence: Option<Value>,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default, alias = "evidences")]
    evidence: Option<Value>,
    #[serde(default)]
    sources: Vec<Value>,
    #[serde(default)]
    logical_fallacies: Option<Value>,
    #[serde(default)]
    manipulation_techniques: Option<Value>,
}

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("valid regex"));
static VERDICT_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?im)^[\s\-*"']*(?:verdict|verdikt)["']?\s*[:=]\s*["']?([^"'\r\n,]+)"#)
        .expect("valid regex")
});
static CONFIDENCE_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?im)^[\s\-*"']*(?:confidence|jistota)["']?\s*[:=]\s*["']?(\d+(?:[.,]\d+)?)\s*%?"#)
        .expect("valid regex")
});
static EXPLANATION_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?im)^[\s\-*"']*(?:explanation|vysvětlení)["']?\s*[:=]\s*["']?([^\r\n]+?)["',]*\s*$"#)
        .expect("valid regex")
});

/// Parse raw model text into a [`ModelVerdict`].
///
/// Fails with `MalformedResponse` only when no verdict can be found at all.
pub fn parse_model_output(text: &str) -> Result<ModelVerdict, VerificationFailure> {
    let text = text.trim();
    if text.is_empty() {
        return Err(VerificationFailure::MalformedResponse(
            "empty model response".to_string(),
        ));
    }

    if let Some(wire) = json_candidates(text).find_map(|c| serde_json::from_str::<VerdictWire>(c).ok()) {
        if let Some(verdict) = wire.verdict.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            return Ok(from_wire(verdict.to_string(), wire));
        }
    }

    line_scan(text).ok_or_else(|| {
        VerificationFailure::MalformedResponse(format!(
            "no verdict in model response: {}",
            snippet(text)
        ))
    })
}

fn json_candidates(text: &str) -> impl Iterator<Item = &str> {
    let fenced = FENCE_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str());
    let braced = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => Some(&text[start..=end]),
        _ => None,
    };
    std::iter::once(text).chain(fenced).chain(braced)
}

fn from_wire(verdict: String, wire: VerdictWire) -> ModelVerdict {
    ModelVerdict {
        verdict,
        confidence: wire
            .confidence
            .as_ref()
            .and_then(confidence_value)
            .unwrap_or(0.5),
        explanation: wire.explanation.unwrap_or_default().trim().to_string(),
        evidence: string_list(wire.evidence),
        sources: wire.sources.iter().filter_map(source_ref).collect(),
        logical_fallacies: string_list(wire.logical_fallacies),
        manipulation_techniques: string_list(wire.manipulation_techniques),
    }
}

fn line_scan(text: &str) -> Option<ModelVerdict> {
    let verdict = VERDICT_LINE_RE
        .captures(text)?
        .get(1)?
        .as_str()
        .trim()
        .to_string();
    if verdict.is_empty() {
        return None;
    }
    let confidence = CONFIDENCE_LINE_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().replace(',', ".").parse::<f64>().ok())
        .map(normalize_confidence)
        .unwrap_or(0.5);
    let explanation = EXPLANATION_LINE_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();

    Some(ModelVerdict {
        verdict,
        confidence,
        explanation,
        evidence: Vec::new(),
        sources: Vec::new(),
        logical_fallacies: Vec::new(),
        manipulation_techniques: Vec::new(),
    })
}

fn confidence_value(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s
            .trim()
            .trim_end_matches('%')
            .trim()
            .replace(',', ".")
            .parse()
            .ok(),
        _ => None,
    }
    .map(normalize_confidence)
}

/// Values above 1 are read as percentages.
fn normalize_confidence(raw: f64) -> f64 {
    if !raw.is_finite() {
        return 0.5;
    }
    let scaled = if raw > 1.0 { raw / 100.0 } else { raw };
    scaled.clamp(0.0, 1.0)
}

fn string_list(v: Option<Value>) -> Vec<String> {
    match v {
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                Value::Object(map) => map
                    .get("description")
                    .or_else(|| map.get("text"))
                    .or_else(|| map.get("name"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
                _ => None,
            })
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

fn source_ref(v: &Value) -> Option<SourceRef> {
    match v {
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            let is_url = s.starts_with("http://") || s.starts_with("https://");
            Some(SourceRef {
                name: s.to_string(),
                url: if is_url { s.to_string() } else { String::new() },
                reliability_hint: String::new(),
            })
        }
        Value::Object(map) => {
            let field = |k: &str| {
                map.get(k)
                    .and_then(Value::as_str)
                    .map(|s| s.trim().to_string())
                    .unwrap_or_default()
            };
            let url = field("url");
            let name = match field("name") {
                n if n.is_empty() => field("title"),
                n => n,
            };
            if name.is_empty() && url.is_empty() {
                return None;
            }
            Some(SourceRef {
                name: if name.is_empty() { url.clone() } else { name },
                url,
                reliability_hint: String::new(),
            })
        }
        _ => None,
    }
}

fn snippet(text: &str) -> String {
    let mut s: String = text.chars().take(120).collect();
    if text.chars().count() > 120 {
        s.push_str("...");
    }
    s
}
