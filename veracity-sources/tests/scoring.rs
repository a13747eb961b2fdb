mod common;

use chrono::NaiveDate;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use veracity_common::SourceDetail;
use veracity_sources::{
    Factor, HttpMetadataFetcher, ReliabilityLevel, SourceReliabilityScorer, SourceRegistry,
    SourceType,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn builtin_scorer() -> SourceReliabilityScorer {
    SourceReliabilityScorer::new(Arc::new(SourceRegistry::builtin().unwrap()))
        .with_today(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
}

#[test]
fn statistics_office_scores_very_high() {
    common::init_test_tracing();
    let e = builtin_scorer().evaluate("https://www.czso.cz/report", SourceDetail::Standard);

    assert_eq!(e.domain, "czso.cz");
    assert_eq!(e.reliability_level, ReliabilityLevel::VeryHigh);
    assert!(e.reliability_score >= 0.9, "score {}", e.reliability_score);
    assert!((e.reliability_score - 0.7775 / 0.85).abs() < 1e-9);
    assert_eq!(e.source_type, SourceType::Government);
    assert!(e.source_info.is_trusted);
    assert_eq!(e.evaluation_factors[&Factor::Expertise].score, 0.95);
}

#[test]
fn conspiracy_source_is_flagged() {
    common::init_test_tracing();
    let e = builtin_scorer().evaluate(
        "http://conspiracy-theories.org/moon",
        SourceDetail::Standard,
    );
    assert!(e.source_info.is_problematic);
    assert!(!e.source_info.is_trusted);
    assert_eq!(e.source_type, SourceType::Conspiracy);
    assert!(matches!(
        e.reliability_level,
        ReliabilityLevel::VeryLow | ReliabilityLevel::Low
    ));
    assert!(e.reliability_score < 0.45);
}

#[test]
fn evaluation_serializes_with_snake_case_keys() {
    let e = builtin_scorer().evaluate("https://demagog.cz/vyrok/1", SourceDetail::Standard);
    let json = serde_json::to_value(&e).unwrap();
    assert_eq!(json["reliability_level"], "high");
    assert_eq!(json["source_type"], "fact_checking");
    assert!(json["evaluation_factors"]["past_accuracy"]["score"].is_number());
    assert!(json.get("error").is_none());
}

#[tokio::test]
async fn evaluate_many_summarises_valid_sources() {
    common::init_test_tracing();
    let urls = vec![
        "https://czso.cz/inflace".to_string(),
        "https://example-fake-news.com/a".to_string(),
        "nonsense".to_string(),
    ];
    let summary = builtin_scorer()
        .evaluate_many(&urls, SourceDetail::Minimal)
        .await;

    assert_eq!(summary.source_count, 3);
    assert_eq!(summary.valid_source_count, 2);
    assert!(summary.evaluations[2].error.is_some());
    assert!(summary.evaluations[0].evaluation_factors.is_empty());
    let mean = (summary.evaluations[0].reliability_score
        + summary.evaluations[1].reliability_score)
        / 2.0;
    assert!((summary.overall_reliability_score - mean).abs() < 1e-9);
    assert_eq!(
        summary.overall_reliability_level,
        Some(ReliabilityLevel::from_score(mean))
    );
}

#[tokio::test]
async fn fetched_metadata_enables_page_factors() -> anyhow::Result<()> {
    common::init_test_tracing();
    let server = MockServer::start().await;
    let html = r#"<html><head><title>Studie</title>
<meta name="author" content="Petr Dvořák">
<meta property="article:published_time" content="2024-05-29">
</head><body><a href="/about">O nás</a><cite>Nature</cite></body></html>"#;
    Mock::given(method("GET"))
        .and(path("/clanek"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .mount(&server)
        .await;

    let fetcher = HttpMetadataFetcher::new(Duration::from_secs(5))?;
    let scorer = builtin_scorer().with_metadata_source(Arc::new(fetcher));
    let url = format!("{}/clanek", server.uri());
    let e = scorer.evaluate_online(&url, SourceDetail::Standard).await;

    assert!(e.is_valid());
    assert_eq!(e.evaluation_factors.len(), 7);
    assert_eq!(e.evaluation_factors[&Factor::Recency].score, 1.0);
    assert_eq!(e.evaluation_factors[&Factor::CitationQuality].score, 0.8);
    assert!((e.evaluation_factors[&Factor::Transparency].score - 0.6).abs() < 1e-9);
    assert!((e.evaluation_factors[&Factor::Expertise].score - 0.6).abs() < 1e-9);
    Ok(())
}

#[tokio::test]
async fn failed_fetch_falls_back_to_domain_only() -> anyhow::Result<()> {
    common::init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let fetcher = HttpMetadataFetcher::new(Duration::from_secs(5))?;
    let scorer = builtin_scorer().with_metadata_source(Arc::new(fetcher));
    let e = scorer
        .evaluate_online(&format!("{}/missing", server.uri()), SourceDetail::Standard)
        .await;

    assert!(e.is_valid());
    assert!(!e.evaluation_factors.contains_key(&Factor::Recency));
    assert!((e.reliability_score - 0.5).abs() < 1e-9);
    Ok(())
}

#[test]
fn registry_override_file_replaces_builtin() -> anyhow::Result<()> {
    common::init_test_tracing();
    let mut file = tempfile::NamedTempFile::new()?;
    writeln!(
        file,
        "trusted:\n  mujzdroj.cz:\n    name: Můj zdroj\n    type: organization\n    reliability: 1.0\n    expertise: 1.0\n    transparency: 1.0\n    independence: 1.0\n    editorial_process: 1.0"
    )?;
    let registry = SourceRegistry::load(Some(file.path()))?;
    assert_eq!(registry.counts(), (1, 0));

    let scorer = SourceReliabilityScorer::new(Arc::new(registry));
    let e = scorer.evaluate("https://mujzdroj.cz", SourceDetail::Standard);
    assert_eq!(e.reliability_score, 1.0);
    assert!(!scorer.evaluate("https://czso.cz", SourceDetail::Standard).source_info.is_trusted);

    let picks = scorer.suggest_sources(0.5, 10);
    assert_eq!(picks.len(), 1);
    assert_eq!(picks[0].url, "https://mujzdroj.cz");
    Ok(())
}
