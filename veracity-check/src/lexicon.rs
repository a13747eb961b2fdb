//! Claim-indicator lexicon.
//!
//! Cue patterns live here as data so wording changes never touch the
//! extractor's control flow. Bump [`LEXICON_VERSION`] when a table changes.

use regex::Regex;
use std::sync::LazyLock;

pub const LEXICON_VERSION: &str = "1";

/// Czech claim cues. Matched case-insensitively on whole words.
pub const CZECH_CUES: &[&str] = &[
    r"\b(je|jsou|byl|byla|bylo|byly)\b",
    r"\b(má|mají|měl|měla|mělo|měly)\b",
    r"\b(podle|dle)\b",
    r"\b(studie|výzkum|analýza|zpráva)\b",
    r"\b(prokázal|prokázala|prokázalo|prokázaly)\b",
    r"\b(zjistil|zjistila|zjistilo|zjistily)\b",
    r"\b(tvrdí|uvedl|uvedla|uvedlo|uvedly)\b",
    r"\b(fakt|faktem|fakta|faktů)\b",
    r"\bprocent|%",
    r"\b(tisíc|milion|miliard)",
    r"\bv (roce|letech)\b",
    r"\b(vzrostl|vzrostla|vzrostlo|vzrostly|klesl|klesla|kleslo|klesly)\b",
];

pub const ENGLISH_CUES: &[&str] = &[
    r"\b(is|are|was|were)\b",
    r"\b(has|have|had)\b",
    r"\baccording to\b",
    r"\b(study|research|analysis|report)\b",
    r"\b(proved|showed|found)\b",
    r"\b(claims|stated|said)\b",
    r"\bfacts?\b",
    r"\bpercent\b",
    r"\b(thousand|million|billion)s?\b",
    r"\bin \d{4}\b",
    r"\b(increased|decreased|rose|fell)\b",
];

pub const NUMERIC_CUE: &str = r"\d+";
pub const PROPER_NOUN_CUE: &str = r"\p{Lu}\p{Ll}+";

/// Abbreviations whose trailing period never ends a sentence.
pub const ABBREVIATIONS: &[&str] = &[
    "např.", "tj.", "tzv.", "mj.", "resp.", "atd.", "Dr.", "Mr.", "Mrs.", "e.g.", "i.e.",
];

static CUE_SET: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    CZECH_CUES
        .iter()
        .chain(ENGLISH_CUES)
        .map(|p| Regex::new(&format!("(?i){p}")).expect("valid regex"))
        .collect()
});
static NUMERIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(NUMERIC_CUE).expect("valid regex"));
static PROPER_NOUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(PROPER_NOUN_CUE).expect("valid regex"));

pub fn has_claim_cue(sentence: &str) -> bool {
    CUE_SET.iter().any(|re| re.is_match(sentence))
}

pub fn has_number(sentence: &str) -> bool {
    NUMERIC.is_match(sentence)
}

pub fn has_proper_noun(sentence: &str) -> bool {
    PROPER_NOUN.is_match(sentence)
}

pub fn ends_with_abbreviation(text_before_boundary: &str) -> bool {
    let lower = text_before_boundary.to_lowercase();
    ABBREVIATIONS.iter().any(|abbr| {
        let abbr = abbr.to_lowercase();
        lower.ends_with(&abbr)
            && lower[..lower.len() - abbr.len()]
                .chars()
                .next_back()
                .is_none_or(|c| !c.is_alphanumeric())
    })
}
