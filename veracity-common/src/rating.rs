//! The nine-category truth rating scale.
//!
//! The five primary categories partition `[0, 1]`; the four special ones
//! overlap them and are only ever selected through a [`SpecialSignal`].

use crate::{InputError, VeracityError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Gap kept below an open upper bound when interpolating inside a band.
const OPEN_EDGE: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingKey {
    True,
    MostlyTrue,
    PartlyTrue,
    MostlyFalse,
    False,
    Misleading,
    InsufficientEvidence,
    Unverifiable,
    Satire,
}

impl RatingKey {
    pub const ALL: [RatingKey; 9] = [
        RatingKey::True,
        RatingKey::MostlyTrue,
        RatingKey::PartlyTrue,
        RatingKey::MostlyFalse,
        RatingKey::False,
        RatingKey::Misleading,
        RatingKey::InsufficientEvidence,
        RatingKey::Unverifiable,
        RatingKey::Satire,
    ];

    pub const PRIMARY: [RatingKey; 5] = [
        RatingKey::True,
        RatingKey::MostlyTrue,
        RatingKey::PartlyTrue,
        RatingKey::MostlyFalse,
        RatingKey::False,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RatingKey::True => "true",
            RatingKey::MostlyTrue => "mostly_true",
            RatingKey::PartlyTrue => "partly_true",
            RatingKey::MostlyFalse => "mostly_false",
            RatingKey::False => "false",
            RatingKey::Misleading => "misleading",
            RatingKey::InsufficientEvidence => "insufficient_evidence",
            RatingKey::Unverifiable => "unverifiable",
            RatingKey::Satire => "satire",
        }
    }

    pub fn is_primary(self) -> bool {
        Self::PRIMARY.contains(&self)
    }

    fn index(self) -> usize {
        self as usize
    }

    /// Whether higher confidence should push the score up inside the band.
    fn leans_true(self) -> bool {
        matches!(
            self,
            RatingKey::True | RatingKey::MostlyTrue | RatingKey::PartlyTrue
        )
    }
}

impl fmt::Display for RatingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RatingKey {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RatingKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s.trim())
            .ok_or_else(|| InputError::InvalidSetting(format!("unknown rating key `{s}`")))
    }
}

/// Contextual marker that selects one of the special categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialSignal {
    Misleading,
    InsufficientEvidence,
    Unverifiable,
    Satire,
}

impl SpecialSignal {
    pub fn key(self) -> RatingKey {
        match self {
            SpecialSignal::Misleading => RatingKey::Misleading,
            SpecialSignal::InsufficientEvidence => RatingKey::InsufficientEvidence,
            SpecialSignal::Unverifiable => RatingKey::Unverifiable,
            SpecialSignal::Satire => RatingKey::Satire,
        }
    }

    pub fn from_key(key: RatingKey) -> Option<Self> {
        match key {
            RatingKey::Misleading => Some(SpecialSignal::Misleading),
            RatingKey::InsufficientEvidence => Some(SpecialSignal::InsufficientEvidence),
            RatingKey::Unverifiable => Some(SpecialSignal::Unverifiable),
            RatingKey::Satire => Some(SpecialSignal::Satire),
            _ => None,
        }
    }
}

/// One row of the scale: display data plus its score range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingBand {
    pub key: RatingKey,
    pub name: String,
    pub description: String,
    pub color: String,
    pub min: f64,
    pub max: f64,
    /// `max` itself belongs to the band (only the top band has this).
    #[serde(default)]
    pub closed_upper: bool,
}

impl RatingBand {
    pub fn contains(&self, score: f64) -> bool {
        score >= self.min && (score < self.max || (self.closed_upper && score <= self.max))
    }

    fn upper(&self) -> f64 {
        if self.closed_upper {
            self.max
        } else {
            self.max - OPEN_EDGE
        }
    }

    fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }
}

/// Immutable rating table, built once and shared by reference.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingScale {
    bands: Vec<RatingBand>,
}

impl RatingScale {
    /// Build a scale from custom bands.
    ///
    /// Every key must appear exactly once and the primary bands must cover
    /// `[0, 1]` without gaps or overlaps.
    pub fn new(mut bands: Vec<RatingBand>) -> Result<Self, VeracityError> {
        bands.sort_by_key(|b| b.key);
        let keys: Vec<RatingKey> = bands.iter().map(|b| b.key).collect();
        if keys != RatingKey::ALL {
            return Err(VeracityError::Config(
                "rating scale must define each rating key exactly once".into(),
            ));
        }

        let mut primary: Vec<&RatingBand> = bands.iter().filter(|b| b.key.is_primary()).collect();
        primary.sort_by(|a, b| a.min.total_cmp(&b.min));
        let mut cursor = 0.0_f64;
        for band in &primary {
            if (band.min - cursor).abs() > f64::EPSILON || band.max <= band.min {
                return Err(VeracityError::Config(format!(
                    "primary rating band `{}` does not continue the scale at {cursor}",
                    band.key
                )));
            }
            cursor = band.max;
        }
        let top_closed = primary.last().is_some_and(|b| b.closed_upper);
        if (cursor - 1.0).abs() > f64::EPSILON || !top_closed {
            return Err(VeracityError::Config(
                "primary rating bands must end at a closed 1.0".into(),
            ));
        }

        Ok(Self { bands })
    }

    /// The standard Czech scale.
    pub fn standard() -> Self {
        let band = |key, name: &str, description: &str, color: &str, min, max| RatingBand {
            key,
            name: name.to_string(),
            description: description.to_string(),
            color: color.to_string(),
            min,
            max,
            closed_upper: key == RatingKey::True,
        };
        Self {
            bands: vec![
                band(
                    RatingKey::True,
                    "Pravdivé",
                    "Informace je zcela přesná, podložená důvěryhodnými zdroji a odpovídá současnému stavu poznání.",
                    "#34A853",
                    0.9,
                    1.0,
                ),
                band(
                    RatingKey::MostlyTrue,
                    "Převážně pravdivé",
                    "Informace je z větší části přesná, ale obsahuje drobné nepřesnosti, které nemění celkové vyznění.",
                    "#4CAF50",
                    0.75,
                    0.9,
                ),
                band(
                    RatingKey::PartlyTrue,
                    "Částečně pravdivé",
                    "Informace obsahuje některé pravdivé prvky, ale také významné nepřesnosti nebo vynechává důležitý kontext.",
                    "#FBBC05",
                    0.5,
                    0.75,
                ),
                band(
                    RatingKey::MostlyFalse,
                    "Převážně nepravdivé",
                    "Informace obsahuje některé pravdivé prvky, ale je převážně nepřesná nebo zavádějící.",
                    "#F57C00",
                    0.25,
                    0.5,
                ),
                band(
                    RatingKey::False,
                    "Nepravdivé",
                    "Informace je zcela nepřesná, nepodložená důvěryhodnými zdroji nebo odporuje současnému stavu poznání.",
                    "#EA4335",
                    0.0,
                    0.25,
                ),
                band(
                    RatingKey::Misleading,
                    "Zavádějící",
                    "Informace může být technicky pravdivá, ale je prezentována způsobem, který je zavádějící nebo manipulativní.",
                    "#9C27B0",
                    0.3,
                    0.6,
                ),
                band(
                    RatingKey::InsufficientEvidence,
                    "Nedostatečné údaje",
                    "Nelze jednoznačně určit pravdivost informace kvůli nedostatku dostupných důvěryhodných zdrojů.",
                    "#9AA0A6",
                    0.4,
                    0.6,
                ),
                band(
                    RatingKey::Unverifiable,
                    "Neověřitelné",
                    "Tvrzení nelze ověřit pomocí dostupných faktů nebo důkazů, často se jedná o spekulace o budoucnosti.",
                    "#607D8B",
                    0.4,
                    0.6,
                ),
                band(
                    RatingKey::Satire,
                    "Satira",
                    "Obsah je záměrně nepravdivý nebo přehnaný za účelem humoru, parodie nebo společenské kritiky.",
                    "#8D6E63",
                    0.3,
                    0.7,
                ),
            ],
        }
    }

    pub fn band(&self, key: RatingKey) -> &RatingBand {
        &self.bands[key.index()]
    }

    pub fn bands(&self) -> &[RatingBand] {
        &self.bands
    }

    /// Primary category whose range contains `score`, if any.
    pub fn classify_primary(&self, score: f64) -> Option<RatingKey> {
        RatingKey::PRIMARY
            .into_iter()
            .find(|k| self.band(*k).contains(score))
    }

    /// Numeric score for a verdict reached with `confidence` in `[0, 1]`.
    ///
    /// Primary ratings stay strictly inside their own band; special ones sit
    /// on the band midpoint.
    pub fn score_for(&self, key: RatingKey, confidence: f64) -> f64 {
        let band = self.band(key);
        if !key.is_primary() {
            return band.midpoint();
        }
        let t = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let span = band.upper() - band.min;
        if key.leans_true() {
            band.min + span * t
        } else {
            band.upper() - span * t
        }
    }
}

impl Default for RatingScale {
    fn default() -> Self {
        Self::standard()
    }
}
