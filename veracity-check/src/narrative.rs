//! Presentation text derived from a verdict.
//!
//! Everything here is templated from the rating category and the requested
//! expertise and length. None of it is verified content, which is why it
//! lives in its own [`Presentation`] section of the report.

use crate::aggregate::OverallVerdict;
use serde::{Deserialize, Serialize};
use veracity_common::{AnalysisLength, ExpertiseLevel, RatingKey, VerifiedClaim};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerspectiveKind {
    Economic,
    Social,
    Environmental,
    Historical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Perspective {
    #[serde(rename = "type")]
    pub kind: PerspectiveKind,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    Informative,
    Educational,
    Humorous,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedResponse {
    #[serde(rename = "type")]
    pub kind: ResponseKind,
    pub text: String,
    pub icon: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Presentation {
    pub detailed_explanation: String,
    pub key_points: Vec<String>,
    pub alternative_perspectives: Vec<Perspective>,
    pub suggested_responses: Vec<SuggestedResponse>,
}

impl Presentation {
    pub fn build(
        verdict: &OverallVerdict,
        claims: &[VerifiedClaim],
        expertise: ExpertiseLevel,
        length: AnalysisLength,
    ) -> Self {
        Self {
            detailed_explanation: detailed_explanation(verdict, claims, expertise, length),
            key_points: key_points(claims, expertise, length),
            alternative_perspectives: perspectives(length),
            suggested_responses: suggested_responses(verdict),
        }
    }
}

const PERSPECTIVES: [(PerspectiveKind, &str, &str); 4] = [
    (
        PerspectiveKind::Economic,
        "Ekonomická perspektiva",
        "Z ekonomického hlediska je třeba zvážit dlouhodobé dopady na trh práce a hospodářský růst.",
    ),
    (
        PerspectiveKind::Social,
        "Sociální perspektiva",
        "Ze sociálního hlediska je důležité zohlednit dopady na různé skupiny obyvatel a sociální soudržnost.",
    ),
    (
        PerspectiveKind::Environmental,
        "Environmentální perspektiva",
        "Z environmentálního hlediska je třeba zvážit dopady na životní prostředí a udržitelnost.",
    ),
    (
        PerspectiveKind::Historical,
        "Historická perspektiva",
        "Z historického hlediska lze podobné situace najít v minulosti a poučit se z jejich vývoje.",
    ),
];

pub fn perspectives(length: AnalysisLength) -> Vec<Perspective> {
    PERSPECTIVES
        .iter()
        .take(length.perspective_count())
        .map(|(kind, title, description)| Perspective {
            kind: *kind,
            title: title.to_string(),
            description: description.to_string(),
        })
        .collect()
}

pub fn suggested_responses(verdict: &OverallVerdict) -> Vec<SuggestedResponse> {
    use RatingKey::*;
    let key = verdict.rating_key;

    let mut informative = format!(
        "Podle dostupných informací je toto tvrzení {}. ",
        verdict.name.to_lowercase()
    );
    informative.push_str(match key {
        True | MostlyTrue => "Fakta potvrzují správnost tohoto tvrzení.",
        PartlyTrue => {
            "Tvrzení obsahuje některé pravdivé prvky, ale také nepřesnosti nebo zavádějící informace."
        }
        MostlyFalse | False => "Fakta nepotvrzují správnost tohoto tvrzení.",
        Misleading => {
            "Ačkoliv některé části mohou být technicky pravdivé, celkové vyznění je zavádějící."
        }
        InsufficientEvidence | Unverifiable | Satire => "",
    });

    let mut educational = String::from("Je důležité si uvědomit, že ");
    educational.push_str(match key {
        True | MostlyTrue => {
            "ověřování informací z důvěryhodných zdrojů je klíčové pro formování informovaných názorů."
        }
        PartlyTrue | Misleading => {
            "i částečně pravdivé informace mohou být zavádějící, pokud jsou vytrženy z kontextu."
        }
        MostlyFalse | False => {
            "dezinformace se často šíří rychleji než pravdivé informace, proto je důležité být kritický k obsahu, který sdílíme."
        }
        InsufficientEvidence | Unverifiable | Satire => {
            "ne každé tvrzení lze spolehlivě ověřit a je dobré s takovými informacemi zacházet opatrně."
        }
    });

    let mut responses = vec![
        SuggestedResponse {
            kind: ResponseKind::Informative,
            text: informative.trim_end().to_string(),
            icon: "info".into(),
        },
        SuggestedResponse {
            kind: ResponseKind::Educational,
            text: educational,
            icon: "school".into(),
        },
    ];

    let humorous = match key {
        True | MostlyTrue => {
            Some("Tohle je tak pravdivé, že by to mohlo kandidovat na prezidenta Pravdivosti.")
        }
        PartlyTrue => Some(
            "Tohle tvrzení je jako napůl upečený koláč - některé části jsou hotové, jiné ještě potřebují trochu času v troubě faktů.",
        ),
        MostlyFalse | False => Some(
            "Toto tvrzení má s pravdou společného asi tolik jako ananas na pizze s italskou kuchyní.",
        ),
        Misleading => Some(
            "Toto tvrzení je jako GPS, která vás zavede na správnou ulici, ale do špatného města.",
        ),
        Satire => Some("Tohle je satira. Smát se můžete, sdílet jako fakt raději ne."),
        InsufficientEvidence | Unverifiable => None,
    };
    if let Some(text) = humorous {
        responses.push(SuggestedResponse {
            kind: ResponseKind::Humorous,
            text: text.into(),
            icon: "mood".into(),
        });
    }
    responses
}

pub fn detailed_explanation(
    verdict: &OverallVerdict,
    claims: &[VerifiedClaim],
    expertise: ExpertiseLevel,
    length: AnalysisLength,
) -> String {
    let mut out = format!(
        "Analyzovaný obsah byl ohodnocen jako {}. {} ",
        verdict.name.to_uppercase(),
        verdict.description
    );

    if !claims.is_empty() {
        let true_count = claims
            .iter()
            .filter(|c| matches!(c.rating_key, RatingKey::True | RatingKey::MostlyTrue))
            .count();
        let false_count = claims
            .iter()
            .filter(|c| matches!(c.rating_key, RatingKey::False | RatingKey::MostlyFalse))
            .count();
        let mixed_count = claims.len() - true_count - false_count;
        out.push_str(&format!(
            "Z celkového počtu {} ověřených tvrzení bylo {true_count} hodnoceno jako pravdivé nebo převážně pravdivé, \
             {false_count} jako nepravdivé nebo převážně nepravdivé \
             a {mixed_count} jako částečně pravdivé nebo jinak klasifikované. ",
            claims.len()
        ));
    }

    if length.is_long() {
        out.push_str(
            "\n\nPři hodnocení byla zohledněna důvěryhodnost zdrojů, kontext informací a aktuální stav poznání v dané oblasti. ",
        );
        if matches!(verdict.rating_key, RatingKey::PartlyTrue | RatingKey::Misleading) {
            out.push_str(
                "Zvláštní pozornost byla věnována kontextu, ve kterém byly informace prezentovány, \
                 a způsobu, jakým mohou být interpretovány různými skupinami příjemců. ",
            );
        }
        out.push_str(
            "\n\nPro komplexní pochopení tématu doporučujeme prostudovat detailní analýzu jednotlivých tvrzení \
             a seznámit se s alternativními perspektivami uvedenými níže.",
        );
    }

    if expertise == ExpertiseLevel::Expert {
        out.push_str(
            "\n\nMetodologie hodnocení zahrnovala triangulaci informací z různých zdrojů, \
             analýzu primárních dat a konzultaci s odbornými zdroji v dané oblasti. \
             Při interpretaci výsledků je třeba zohlednit inherentní nejistotu spojenou s procesem fact-checkingu \
             a možné limity dostupných zdrojů.",
        );
    }
    out.trim_end().to_string()
}

/// The most relevant claims as one-line points, `text - rating`.
pub fn key_points(
    claims: &[VerifiedClaim],
    expertise: ExpertiseLevel,
    length: AnalysisLength,
) -> Vec<String> {
    let mut ranked: Vec<&VerifiedClaim> = claims.iter().collect();
    ranked.sort_by(|a, b| b.claim.relevance_score.total_cmp(&a.claim.relevance_score));
    let with_explanation = matches!(expertise, ExpertiseLevel::Advanced | ExpertiseLevel::Expert);

    ranked
        .into_iter()
        .take(length.claim_limit())
        .map(|c| {
            let mut point = format!("{} - {}", c.claim.text, c.rating_name);
            if with_explanation && !c.explanation.is_empty() {
                point.push_str(": ");
                point.push_str(&c.explanation);
            }
            point
        })
        .collect()
}

/// Stock explanation for a rating, used when the model gave none.
pub fn claim_explanation(key: RatingKey) -> &'static str {
    match key {
        RatingKey::True => "Toto tvrzení je podloženo důvěryhodnými zdroji a odpovídá současnému stavu poznání.",
        RatingKey::MostlyTrue => "Toto tvrzení je z větší části přesné, ale obsahuje drobné nepřesnosti, které nemění celkové vyznění.",
        RatingKey::PartlyTrue => "Toto tvrzení obsahuje některé pravdivé prvky, ale také významné nepřesnosti nebo vynechává důležitý kontext.",
        RatingKey::MostlyFalse => "Toto tvrzení obsahuje některé pravdivé prvky, ale je převážně nepřesné nebo zavádějící.",
        RatingKey::False => "Toto tvrzení je nepodložené důvěryhodnými zdroji nebo odporuje současnému stavu poznání.",
        RatingKey::Misleading => "Toto tvrzení může být technicky pravdivé, ale je prezentováno způsobem, který je zavádějící nebo manipulativní.",
        RatingKey::InsufficientEvidence => "Pro toto tvrzení není dostatek dostupných důvěryhodných zdrojů k jednoznačnému určení pravdivosti.",
        RatingKey::Unverifiable => "Toto tvrzení nelze ověřit pomocí dostupných faktů nebo důkazů.",
        RatingKey::Satire => "Toto tvrzení je součástí satirického obsahu a není zamýšleno jako faktické sdělení.",
    }
}

/// Sentence appended to claim explanations for the upper expertise levels.
pub fn explanation_suffix(expertise: ExpertiseLevel) -> Option<&'static str> {
    match expertise {
        ExpertiseLevel::Expert => Some(
            "Při hodnocení byla zohledněna metodologická triangulace a epistemologické limity dostupných zdrojů.",
        ),
        ExpertiseLevel::Advanced => {
            Some("Hodnocení zohledňuje širší kontext a metodologické aspekty ověřování.")
        }
        ExpertiseLevel::Basic | ExpertiseLevel::Medium => None,
    }
}
