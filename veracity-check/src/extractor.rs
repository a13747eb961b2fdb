//! Claim extraction from plain text.
//!
//! Sentences are scored with the cue tables in [`crate::lexicon`]: +2 for a
//! claim cue, +1 for digits, +1 for a capitalised word. Anything scoring at
//! least 1 is a candidate; candidates are ranked by score (ties keep text
//! order) and cut to the requested limit.

use crate::lexicon;
use serde::{Deserialize, Serialize};
use veracity_common::{AnalysisLength, Claim};

const MIN_TOKENS: usize = 3;
const MIN_SCORE: f64 = 1.0;

pub const EMPTY_TEXT_SUMMARY: &str = "Nebyl poskytnut žádný text k analýze.";

/// Claims picked from one text plus bookkeeping about the pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    pub claims: Vec<Claim>,
    pub summary: String,
    pub total_sentences: usize,
    pub total_candidates: usize,
}

impl Extraction {
    /// Nothing checkable was found.
    pub fn no_claims(&self) -> bool {
        self.claims.is_empty()
    }
}

/// A sentence with its byte offset in the preprocessed text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sentence<'a> {
    pub text: &'a str,
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ClaimExtractor;

impl ClaimExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract_for(&self, text: &str, length: AnalysisLength) -> Extraction {
        self.extract(text, length.claim_limit())
    }

    /// Up to `max_claims` claims from `text`, most relevant first.
    pub fn extract(&self, text: &str, max_claims: usize) -> Extraction {
        let cleaned = preprocess(text);
        if cleaned.is_empty() {
            return Extraction {
                summary: EMPTY_TEXT_SUMMARY.to_string(),
                ..Extraction::default()
            };
        }

        let sentences = split_sentences(&cleaned);
        let mut candidates: Vec<Claim> = sentences
            .iter()
            .enumerate()
            .filter_map(|(i, s)| {
                let score = score_sentence(s.text);
                (score >= MIN_SCORE)
                    .then(|| Claim::new(s.text, i as i64, score).with_offset(s.offset))
            })
            .collect();
        let total_candidates = candidates.len();

        // stable: equal scores keep their sentence order
        candidates.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        candidates.truncate(max_claims);

        tracing::debug!(
            sentences = sentences.len(),
            candidates = total_candidates,
            kept = candidates.len(),
            max_claims,
            "extractor.done"
        );

        Extraction {
            claims: candidates,
            summary: summarize(&cleaned),
            total_sentences: sentences.len(),
            total_candidates,
        }
    }
}

/// Relevance of one sentence; 0 when it is too short to hold a claim.
pub fn score_sentence(sentence: &str) -> f64 {
    if sentence.split_whitespace().count() < MIN_TOKENS {
        return 0.0;
    }
    let mut score = 0.0;
    if lexicon::has_claim_cue(sentence) {
        score += 2.0;
    }
    if lexicon::has_number(sentence) {
        score += 1.0;
    }
    if lexicon::has_proper_noun(sentence) {
        score += 1.0;
    }
    score
}

/// Collapse whitespace and straighten typographic quotes.
pub fn preprocess(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .map(|c| match c {
            '„' | '“' | '”' => '"',
            '‚' | '‘' | '’' => '\'',
            other => other,
        })
        .collect()
}

/// Split preprocessed text into sentences.
///
/// A boundary is a run of `.`, `!`, `?` or `…` (plus any closing quotes)
/// followed by a space and then an uppercase letter, a digit or an opening
/// quote. Periods ending a known abbreviation are not boundaries.
pub fn split_sentences(text: &str) -> Vec<Sentence<'_>> {
    let mut out = Vec::new();
    let mut start = 0usize;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !is_terminator(c) {
            continue;
        }
        let mut end = i + c.len_utf8();
        while let Some(&(j, next)) = chars.peek() {
            if is_terminator(next) || next == '"' || next == '\'' {
                end = j + next.len_utf8();
                chars.next();
            } else {
                break;
            }
        }

        let rest = &text[end..];
        let Some(after_space) = rest.strip_prefix(' ') else {
            continue;
        };
        let opens_sentence = after_space
            .chars()
            .next()
            .is_some_and(|n| n.is_uppercase() || n.is_ascii_digit() || n == '"' || n == '\'');
        if !opens_sentence {
            continue;
        }
        if c == '.' && lexicon::ends_with_abbreviation(&text[start..end]) {
            continue;
        }

        push_sentence(&mut out, text, start, end);
        start = end + 1;
    }
    push_sentence(&mut out, text, start, text.len());
    out
}

fn push_sentence<'a>(out: &mut Vec<Sentence<'a>>, text: &'a str, start: usize, end: usize) {
    let raw = &text[start..end];
    let trimmed = raw.trim_start();
    let offset = start + (raw.len() - trimmed.len());
    let trimmed = trimmed.trim_end();
    if !trimmed.is_empty() {
        out.push(Sentence {
            text: trimmed,
            offset,
        });
    }
}

fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '…')
}

/// One-line description of the text by word count.
pub fn summarize(text: &str) -> String {
    let words = text.split_whitespace().count();
    match words {
        0 => EMPTY_TEXT_SUMMARY.to_string(),
        1..=50 => format!("Krátký text o délce {words} slov."),
        51..=200 => format!("Text střední délky obsahující {words} slov."),
        _ => format!("Dlouhý text obsahující {words} slov."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unemployment_sentence_scores_high() {
        let text = "Nezaměstnanost v roce 2023 vzrostla o 15 %.";
        assert!(score_sentence(text) >= 3.0);

        let extraction = ClaimExtractor::new().extract_for(
            &format!("Dobrý den. {text} Děkujeme za pozornost a přejeme hezký den."),
            AnalysisLength::Standard,
        );
        assert_eq!(extraction.claims[0].text, text);
        assert_eq!(extraction.claims[0].position, 1);
    }

    #[test]
    fn blank_input_has_no_claims() {
        for text in ["", "   \n\t  "] {
            let extraction = ClaimExtractor::new().extract(text, 5);
            assert!(extraction.no_claims());
            assert_eq!(extraction.summary, EMPTY_TEXT_SUMMARY);
            assert_eq!(extraction.total_sentences, 0);
        }
    }

    #[test]
    fn results_are_ranked_bounded_and_anchored() {
        let text = "Praha je hlavní město. malé věty nic. Podle studie z roku 2020 vzrostl export o 5 %. \
                    Ahoj. Brno leží na Moravě. 12 lidí přišlo včas. Výzkum ukázal zajímavé výsledky.";
        let extraction = ClaimExtractor::new().extract(text, 3);
        let claims = &extraction.claims;
        let cleaned = preprocess(text);

        assert_eq!(claims.len(), 3);
        assert!(claims
            .windows(2)
            .all(|w| w[0].relevance_score >= w[1].relevance_score));
        let mut positions: Vec<i64> = claims.iter().map(|c| c.position).collect();
        positions.sort_unstable();
        positions.dedup();
        assert_eq!(positions, vec![0, 1, 5]);
        for c in claims {
            let offset = c.offset.unwrap();
            assert!(cleaned[offset..].starts_with(&c.text));
        }
        assert_eq!(claims[0].position, 1);
    }

    #[test]
    fn ties_keep_text_order() {
        let text = "Karel je doma. Eva je venku. Petr je v práci.";
        let claims = ClaimExtractor::new().extract(text, 5).claims;
        let positions: Vec<i64> = claims.iter().map(|c| c.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn splitting_respects_abbreviations_and_quotes() {
        let text = preprocess("Jde např. o Prahu. Řekl: „Ano.“ Pak odešel! 3 dny čekal… Konec");
        let sentences: Vec<&str> = split_sentences(&text).iter().map(|s| s.text).collect();
        assert_eq!(
            sentences,
            vec![
                "Jde např. o Prahu.",
                "Řekl: \"Ano.\"",
                "Pak odešel!",
                "3 dny čekal…",
                "Konec"
            ]
        );
    }

    #[test]
    fn lowercase_continuation_is_not_a_boundary() {
        let text = "Bylo 5 p.m. a pršelo. Pak přestalo.";
        let sentences = split_sentences(text);
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0].text, "Bylo 5 p.m. a pršelo.");
    }

    #[test]
    fn summary_buckets_by_word_count() {
        assert_eq!(summarize("jedno dvě tři"), "Krátký text o délce 3 slov.");
        let medium = vec!["slovo"; 120].join(" ");
        assert_eq!(summarize(&medium), "Text střední délky obsahující 120 slov.");
        let long = vec!["slovo"; 201].join(" ");
        assert_eq!(summarize(&long), "Dlouhý text obsahující 201 slov.");
    }
}
