//! Per-claim verification against the language model.
//!
//! [`LlmClaimVerifier`] builds the prompt for the requested depth, gates the
//! call through the shared [`RateLimiter`], retries rate limits, timeouts and
//! network failures with capped exponential backoff, and parses whatever the
//! model returned. Failures come back as a closed [`VerificationFailure`];
//! [`verify_or_degrade`] turns them into a conservative rating.

use crate::rate::RateLimiter;
use crate::traits::{LlmClient, LlmError};
use crate::verdict::{map_verdict, parse_model_output};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use veracity_common::{
    Claim, ClaimAnalysis, RatingKey, RatingScale, VerificationDepth, VerificationFailure,
    VerifiedClaim,
};
use veracity_config::PipelineConfig;

const VERIFY_TEMPERATURE: f32 = 0.2;

const SYSTEM_PROMPT: &str = "Jsi expertní fact-checker, který analyzuje tvrzení a určuje jejich pravdivost. \
Tvým úkolem je: \
1. Analyzovat předložené tvrzení \
2. Určit jeho pravdivost na škále (pravdivé, částečně pravdivé, nepravdivé, zavádějící, nelze ověřit) \
3. Poskytnout důkazy a zdroje podporující tvé hodnocení \
4. Identifikovat případné logické chyby nebo manipulativní techniky. \
Odpověz ve strukturovaném formátu JSON s následujícími klíči: \
verdict, confidence (0-100), explanation, evidence, sources, logical_fallacies, manipulation_techniques";

const DETAILED_ADDON: &str = "Proveď detailní analýzu s důkladným rozborem všech aspektů tvrzení. \
Zahrň historický kontext, související fakta a alternativní interpretace. \
Vysvětlení by mělo mít alespoň pět vět.";

const QUICK_ADDON: &str = "Proveď rychlou analýzu zaměřenou na klíčové aspekty tvrzení. \
Zaměř se na nejdůležitější fakta a zdroje.";

/// System prompt for a verification at `depth`.
pub fn system_prompt(depth: VerificationDepth) -> String {
    match depth {
        VerificationDepth::Quick => format!("{SYSTEM_PROMPT}\n\n{QUICK_ADDON}"),
        VerificationDepth::Standard => SYSTEM_PROMPT.to_string(),
        VerificationDepth::Detailed => format!("{SYSTEM_PROMPT}\n\n{DETAILED_ADDON}"),
    }
}

pub fn user_prompt(claim: &Claim) -> String {
    format!("Analyzuj následující tvrzení: \"{}\"", claim.text)
}

#[async_trait]
pub trait ClaimVerifier: Send + Sync {
    async fn verify(
        &self,
        claim: &Claim,
        depth: VerificationDepth,
    ) -> Result<VerifiedClaim, VerificationFailure>;
}

/// Verify `claim`, folding any failure into an `insufficient_evidence`
/// result with score 0 that records why.
pub async fn verify_or_degrade(
    verifier: &dyn ClaimVerifier,
    claim: Claim,
    depth: VerificationDepth,
    scale: &RatingScale,
) -> VerifiedClaim {
    match verifier.verify(&claim, depth).await {
        Ok(verified) => verified,
        Err(failure) => {
            tracing::warn!(
                position = claim.position,
                kind = failure_kind(&failure),
                reason = failure.reason(),
                "verifier.claim.degraded"
            );
            VerifiedClaim::degraded(claim, scale, failure)
        }
    }
}

fn failure_kind(f: &VerificationFailure) -> &'static str {
    match f {
        VerificationFailure::Authentication(_) => "authentication",
        VerificationFailure::RateLimited(_) => "rate_limited",
        VerificationFailure::Timeout(_) => "timeout",
        VerificationFailure::MalformedResponse(_) => "malformed_response",
        VerificationFailure::TransientNetwork(_) => "transient_network",
    }
}

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for RetryPolicy {
    fn from(cfg: &PipelineConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            initial_backoff: Duration::from_millis(cfg.initial_backoff_ms),
            max_backoff: Duration::from_millis(cfg.max_backoff_ms.max(cfg.initial_backoff_ms)),
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `attempt + 1`, where `attempt` starts at 1.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1).min(16));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

pub struct LlmClaimVerifier {
    client: Arc<dyn LlmClient>,
    scale: Arc<RatingScale>,
    limiter: Option<Arc<RateLimiter>>,
    retry: RetryPolicy,
    max_tokens: Option<u32>,
}

impl LlmClaimVerifier {
    pub fn new(client: Arc<dyn LlmClient>, scale: Arc<RatingScale>) -> Self {
        Self {
            client,
            scale,
            limiter: None,
            retry: RetryPolicy::default(),
            max_tokens: None,
        }
    }

    /// Wire retry policy and rate limiting from the pipeline section.
    pub fn from_config(
        client: Arc<dyn LlmClient>,
        scale: Arc<RatingScale>,
        cfg: &PipelineConfig,
    ) -> Self {
        Self::new(client, scale)
            .with_retry(RetryPolicy::from(cfg))
            .with_rate_limiter(Arc::new(RateLimiter::new(cfg.requests_per_second, cfg.burst)))
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn model_name(&self) -> &str {
        self.client.model_name()
    }

    async fn ask(&self, claim: &Claim, depth: VerificationDepth) -> Result<String, VerificationFailure> {
        let system = system_prompt(depth);
        let prompt = user_prompt(claim);
        let mut attempt = 1u32;

        loop {
            if let Some(limiter) = &self.limiter {
                limiter.acquire().await;
            }

            let err = match self
                .client
                .generate(&prompt, Some(&system), self.max_tokens, Some(VERIFY_TEMPERATURE))
                .await
            {
                Ok(resp) => return Ok(resp.text),
                Err(err) => err,
            };

            let retry_after = match &err {
                LlmError::RateLimited { retry_after } => retry_after.map(Duration::from_secs),
                _ => None,
            };
            let failure = VerificationFailure::from(err);
            if !failure.is_retryable() || attempt >= self.retry.max_attempts {
                return Err(failure);
            }

            let delay = match retry_after {
                Some(floor) => self.retry.backoff(attempt).max(floor),
                None => self.retry.backoff(attempt),
            };
            tracing::warn!(
                position = claim.position,
                attempt,
                max_attempts = self.retry.max_attempts,
                backoff_ms = delay.as_millis() as u64,
                reason = failure.reason(),
                "verifier.retrying"
            );
            sleep(delay).await;
            attempt += 1;
        }
    }
}

#[async_trait]
impl ClaimVerifier for LlmClaimVerifier {
    async fn verify(
        &self,
        claim: &Claim,
        depth: VerificationDepth,
    ) -> Result<VerifiedClaim, VerificationFailure> {
        let raw = self.ask(claim, depth).await?;
        let parsed = parse_model_output(&raw)?;

        let key = map_verdict(&parsed.verdict).unwrap_or_else(|| {
            tracing::debug!(verdict = %parsed.verdict, "verifier.verdict.unmapped");
            RatingKey::InsufficientEvidence
        });

        tracing::debug!(
            position = claim.position,
            rating = %key,
            confidence = parsed.confidence,
            sources = parsed.sources.len(),
            "verifier.claim.rated"
        );

        let mut verified = VerifiedClaim::rated(
            claim.clone(),
            &self.scale,
            key,
            parsed.confidence,
            parsed.explanation,
        )
        .with_sources(parsed.sources);
        verified.analysis = ClaimAnalysis {
            evidence: parsed.evidence,
            logical_fallacies: parsed.logical_fallacies,
            manipulation_techniques: parsed.manipulation_techniques,
        };
        Ok(verified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_varies_by_depth() {
        assert!(system_prompt(VerificationDepth::Quick).contains("rychlou analýzu"));
        assert!(system_prompt(VerificationDepth::Detailed).contains("detailní analýzu"));
        let standard = system_prompt(VerificationDepth::Standard);
        assert!(standard.contains("manipulation_techniques"));
        assert!(!standard.contains("rychlou"));
    }

    #[test]
    fn user_prompt_quotes_claim() {
        let claim = Claim::new("Praha je hlavní město.", 0, 2.0);
        assert_eq!(
            user_prompt(&claim),
            "Analyzuj následující tvrzení: \"Praha je hlavní město.\""
        );
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_millis(1500),
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff(3), Duration::from_millis(1500));
        assert_eq!(policy.backoff(30), Duration::from_millis(1500));
    }
}
