mod common;

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use veracity_common::{Claim, RatingKey, RatingScale, VerificationDepth, VerificationFailure};
use veracity_llm::traits::{LlmClient, LlmError, LlmResponse, Result};
use veracity_llm::{verify_or_degrade, ClaimVerifier, LlmClaimVerifier, RetryPolicy};

/// Replays canned outcomes in order and records every prompt it saw.
struct ScriptedClient {
    script: Mutex<VecDeque<Result<String>>>,
    prompts: Mutex<Vec<(String, String)>>,
}

impl ScriptedClient {
    fn new(script: Vec<Result<String>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        _max_tokens: Option<u32>,
        _temperature: Option<f32>,
    ) -> Result<LlmResponse> {
        self.prompts
            .lock()
            .unwrap()
            .push((system_prompt.unwrap_or_default().to_string(), prompt.to_string()));
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Network("script exhausted".into())));
        next.map(|text| LlmResponse {
            text,
            model: Some("scripted".into()),
            tokens_used: None,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(4),
    }
}

fn verifier(client: Arc<ScriptedClient>, attempts: u32) -> LlmClaimVerifier {
    LlmClaimVerifier::new(client, Arc::new(RatingScale::standard())).with_retry(fast_retry(attempts))
}

fn claim() -> Claim {
    Claim::new("Nezaměstnanost v roce 2023 vzrostla o 15 %.", 0, 4.0)
}

#[tokio::test]
async fn json_verdict_becomes_rated_claim() {
    common::init_test_tracing();
    let client = ScriptedClient::new(vec![Ok(r#"{"verdict":"převážně pravdivé","confidence":80,
        "explanation":"Data ČSÚ ukazují nárůst.","evidence":["ČSÚ"],
        "sources":[{"name":"ČSÚ","url":"https://www.czso.cz/report"}],
        "logical_fallacies":[],"manipulation_techniques":[]}"#
        .to_string())]);
    let v = verifier(client.clone(), 3);

    let rated = v.verify(&claim(), VerificationDepth::Detailed).await.unwrap();
    assert_eq!(rated.rating_key, RatingKey::MostlyTrue);
    assert_eq!(rated.rating_name, "Převážně pravdivé");
    assert!(rated.score >= 0.75 && rated.score < 0.9);
    assert!((rated.confidence - 0.8).abs() < 1e-9);
    assert_eq!(rated.sources[0].url, "https://www.czso.cz/report");
    assert_eq!(rated.analysis.evidence, vec!["ČSÚ"]);
    assert_eq!(rated.claim, claim());

    let prompts = client.prompts.lock().unwrap();
    assert!(prompts[0].0.contains("detailní analýzu"));
    assert!(prompts[0].1.contains("vzrostla o 15 %"));
}

#[tokio::test]
async fn rate_limits_are_retried_then_succeed() {
    common::init_test_tracing();
    let client = ScriptedClient::new(vec![
        Err(LlmError::RateLimited { retry_after: None }),
        Err(LlmError::Timeout("60s".into())),
        Ok(r#"{"verdict":"nepravdivé","confidence":90}"#.to_string()),
    ]);
    let v = verifier(client.clone(), 3);

    let rated = v.verify(&claim(), VerificationDepth::Standard).await.unwrap();
    assert_eq!(rated.rating_key, RatingKey::False);
    assert!(rated.score < 0.25);
    assert_eq!(client.calls(), 3);
}

#[tokio::test]
async fn retries_are_bounded() {
    let client = ScriptedClient::new(vec![
        Err(LlmError::Network("reset".into())),
        Err(LlmError::Network("reset".into())),
        Err(LlmError::Network("reset".into())),
    ]);
    let v = verifier(client.clone(), 2);

    let err = v.verify(&claim(), VerificationDepth::Quick).await.unwrap_err();
    assert!(matches!(err, VerificationFailure::TransientNetwork(_)));
    assert_eq!(client.calls(), 2);
}

#[tokio::test]
async fn authentication_failures_are_not_retried() {
    let client = ScriptedClient::new(vec![Err(LlmError::Authentication("bad key".into()))]);
    let v = verifier(client.clone(), 5);

    let err = v.verify(&claim(), VerificationDepth::Standard).await.unwrap_err();
    assert_eq!(err, VerificationFailure::Authentication("bad key".into()));
    assert_eq!(client.calls(), 1);
}

#[tokio::test]
async fn unparseable_response_degrades_to_insufficient_evidence() {
    common::init_test_tracing();
    let client = ScriptedClient::new(vec![Ok("Sorry, I cannot help with that.".to_string())]);
    let v = verifier(client.clone(), 3);
    let scale = RatingScale::standard();

    let degraded = verify_or_degrade(&v, claim(), VerificationDepth::Standard, &scale).await;
    assert_eq!(degraded.rating_key, RatingKey::InsufficientEvidence);
    assert_eq!(degraded.score, 0.0);
    assert!(matches!(
        degraded.failure,
        Some(VerificationFailure::MalformedResponse(_))
    ));
    assert!(degraded.explanation.starts_with("Tvrzení se nepodařilo ověřit"));
    assert_eq!(client.calls(), 1);
}

#[tokio::test]
async fn unknown_verdict_maps_to_insufficient_evidence() {
    let client = ScriptedClient::new(vec![Ok(r#"{"verdict":"hmm","confidence":50}"#.to_string())]);
    let v = verifier(client, 1);

    let rated = v.verify(&claim(), VerificationDepth::Standard).await.unwrap();
    assert_eq!(rated.rating_key, RatingKey::InsufficientEvidence);
    assert!(rated.failure.is_none());
}
