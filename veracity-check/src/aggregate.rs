//! Overall verdict from a set of rated claims.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use veracity_common::{RatingKey, RatingScale, SpecialSignal, VerifiedClaim};

/// Score reported when there is nothing to aggregate.
pub const NO_BASIS_SCORE: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallVerdict {
    pub rating_key: RatingKey,
    pub name: String,
    pub description: String,
    pub color_hint: String,
    pub score: f64,
}

/// Relevance-weighted mean mapped onto the primary scale.
///
/// Special categories are chosen only through an explicit [`SpecialSignal`];
/// the numeric score is reported unchanged either way.
#[derive(Debug, Clone)]
pub struct TruthAggregator {
    scale: Arc<RatingScale>,
}

impl TruthAggregator {
    pub fn new(scale: Arc<RatingScale>) -> Self {
        Self { scale }
    }

    pub fn scale(&self) -> &RatingScale {
        &self.scale
    }

    pub fn aggregate(&self, claims: &[VerifiedClaim]) -> OverallVerdict {
        self.aggregate_with(claims, None)
    }

    pub fn aggregate_with(
        &self,
        claims: &[VerifiedClaim],
        signal: Option<SpecialSignal>,
    ) -> OverallVerdict {
        if claims.is_empty() {
            return self.verdict(RatingKey::InsufficientEvidence, NO_BASIS_SCORE);
        }

        let score = weighted_score(claims);
        let key = match signal {
            Some(signal) => signal.key(),
            None => self.scale.classify_primary(score).unwrap_or(if score >= 0.5 {
                RatingKey::PartlyTrue
            } else {
                RatingKey::MostlyFalse
            }),
        };
        tracing::debug!(claims = claims.len(), score, rating = %key, ?signal, "aggregate.done");
        self.verdict(key, score)
    }

    fn verdict(&self, key: RatingKey, score: f64) -> OverallVerdict {
        let band = self.scale.band(key);
        OverallVerdict {
            rating_key: key,
            name: band.name.clone(),
            description: band.description.clone(),
            color_hint: band.color.clone(),
            score,
        }
    }
}

/// `Σ score·relevance / Σ relevance`, or the plain mean when every weight is 0.
///
/// Claims are summed in a canonical order so the result does not depend on
/// input order down to the last bit.
pub fn weighted_score(claims: &[VerifiedClaim]) -> f64 {
    let mut pairs: Vec<(f64, f64)> = claims
        .iter()
        .map(|c| (c.score, c.claim.relevance_score.max(0.0)))
        .collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));

    let total_weight: f64 = pairs.iter().map(|(_, w)| w).sum();
    if total_weight > 0.0 {
        pairs.iter().map(|(s, w)| s * w).sum::<f64>() / total_weight
    } else {
        pairs.iter().map(|(s, _)| s).sum::<f64>() / pairs.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veracity_common::Claim;

    fn aggregator() -> TruthAggregator {
        TruthAggregator::new(Arc::new(RatingScale::standard()))
    }

    fn scored(score: f64, relevance: f64) -> VerifiedClaim {
        let scale = RatingScale::standard();
        let mut v = VerifiedClaim::rated(
            Claim::new("Tvrzení o něčem důležitém.", 0, relevance),
            &scale,
            RatingKey::PartlyTrue,
            0.5,
            "",
        );
        v.score = score;
        v
    }

    #[test]
    fn empty_set_is_insufficient_at_midpoint() {
        let a = aggregator();
        for _ in 0..3 {
            let v = a.aggregate(&[]);
            assert_eq!(v.rating_key, RatingKey::InsufficientEvidence);
            assert_eq!(v.score, 0.5);
            assert_eq!(v.name, "Nedostatečné údaje");
        }
    }

    #[test]
    fn mixed_claims_average_to_partly_true() {
        let v = aggregator().aggregate(&[scored(0.95, 1.0), scored(0.95, 1.0), scored(0.10, 1.0)]);
        assert!((v.score - 0.6667).abs() < 1e-4);
        assert_eq!(v.rating_key, RatingKey::PartlyTrue);
        assert_eq!(v.color_hint, "#FBBC05");
    }

    #[test]
    fn relevance_weights_the_mean() {
        let v = aggregator().aggregate(&[scored(1.0, 3.0), scored(0.0, 1.0)]);
        assert!((v.score - 0.75).abs() < 1e-12);
        assert_eq!(v.rating_key, RatingKey::MostlyTrue);
    }

    #[test]
    fn zero_weights_fall_back_to_plain_mean() {
        let v = aggregator().aggregate(&[scored(0.2, 0.0), scored(0.4, 0.0)]);
        assert!((v.score - 0.3).abs() < 1e-12);
        assert_eq!(v.rating_key, RatingKey::MostlyFalse);
    }

    #[test]
    fn order_does_not_matter() {
        let claims = vec![
            scored(0.91, 4.0),
            scored(0.13, 1.0),
            scored(0.58, 2.0),
            scored(0.33, 3.0),
        ];
        let forward = aggregator().aggregate(&claims);
        let mut reversed = claims.clone();
        reversed.reverse();
        assert_eq!(aggregator().aggregate(&reversed), forward);
        let rotated: Vec<_> = claims[2..].iter().chain(&claims[..2]).cloned().collect();
        assert_eq!(aggregator().aggregate(&rotated), forward);
    }

    #[test]
    fn special_signal_overrides_category_not_score() {
        let claims = [scored(0.95, 1.0)];
        let v = aggregator().aggregate_with(&claims, Some(SpecialSignal::Satire));
        assert_eq!(v.rating_key, RatingKey::Satire);
        assert_eq!(v.name, "Satira");
        assert!((v.score - 0.95).abs() < 1e-12);
    }

    #[test]
    fn boundaries_map_to_upper_band() {
        assert_eq!(aggregator().aggregate(&[scored(1.0, 1.0)]).rating_key, RatingKey::True);
        assert_eq!(aggregator().aggregate(&[scored(0.5, 1.0)]).rating_key, RatingKey::PartlyTrue);
        assert_eq!(aggregator().aggregate(&[scored(0.25, 1.0)]).rating_key, RatingKey::MostlyFalse);
    }
}
