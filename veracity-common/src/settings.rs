//! Per-request analysis settings.

use crate::InputError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! string_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($ty::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = InputError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($ty::$variant),)+
                    other => Err(InputError::InvalidSetting(format!(
                        concat!("unknown ", stringify!($ty), " `{}`"),
                        other
                    ))),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpertiseLevel {
    Basic,
    #[default]
    Medium,
    Advanced,
    Expert,
}

string_enum!(ExpertiseLevel {
    Basic => "basic",
    Medium => "medium",
    Advanced => "advanced",
    Expert => "expert",
});

impl ExpertiseLevel {
    pub fn source_detail(self) -> SourceDetail {
        match self {
            ExpertiseLevel::Basic => SourceDetail::Minimal,
            ExpertiseLevel::Medium | ExpertiseLevel::Advanced => SourceDetail::Standard,
            ExpertiseLevel::Expert => SourceDetail::Expert,
        }
    }
}

/// Requested analysis length; drives every size profile in the pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisLength {
    Brief,
    #[default]
    Standard,
    Detailed,
    Exhaustive,
}

string_enum!(AnalysisLength {
    Brief => "brief",
    Standard => "standard",
    Detailed => "detailed",
    Exhaustive => "exhaustive",
});

impl AnalysisLength {
    /// Maximum claims kept, also the key-frame and key-point count.
    pub fn claim_limit(self) -> usize {
        match self {
            AnalysisLength::Brief => 3,
            AnalysisLength::Standard => 5,
            AnalysisLength::Detailed => 8,
            AnalysisLength::Exhaustive => 12,
        }
    }

    pub fn perspective_count(self) -> usize {
        match self {
            AnalysisLength::Brief => 1,
            AnalysisLength::Standard => 2,
            AnalysisLength::Detailed => 3,
            AnalysisLength::Exhaustive => 4,
        }
    }

    pub fn verification_depth(self) -> VerificationDepth {
        match self {
            AnalysisLength::Brief => VerificationDepth::Quick,
            AnalysisLength::Standard => VerificationDepth::Standard,
            AnalysisLength::Detailed | AnalysisLength::Exhaustive => VerificationDepth::Detailed,
        }
    }

    pub fn is_long(self) -> bool {
        matches!(self, AnalysisLength::Detailed | AnalysisLength::Exhaustive)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    #[default]
    Text,
    Image,
    Audio,
    Video,
}

string_enum!(ContentType {
    Text => "text",
    Image => "image",
    Audio => "audio",
    Video => "video",
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationDepth {
    Quick,
    #[default]
    Standard,
    Detailed,
}

/// How much of a source evaluation is shown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceDetail {
    Minimal,
    #[default]
    Standard,
    Expert,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisSettings {
    pub expertise_level: ExpertiseLevel,
    pub analysis_length: AnalysisLength,
    pub language: String,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            expertise_level: ExpertiseLevel::default(),
            analysis_length: AnalysisLength::default(),
            language: "cs".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!(" Expert ".parse::<ExpertiseLevel>().unwrap(), ExpertiseLevel::Expert);
        assert_eq!("BRIEF".parse::<AnalysisLength>().unwrap(), AnalysisLength::Brief);
        assert!(matches!(
            "hologram".parse::<ContentType>(),
            Err(InputError::InvalidSetting(_))
        ));
    }

    #[test]
    fn profiles_follow_length() {
        let limits: Vec<usize> = [
            AnalysisLength::Brief,
            AnalysisLength::Standard,
            AnalysisLength::Detailed,
            AnalysisLength::Exhaustive,
        ]
        .iter()
        .map(|l| l.claim_limit())
        .collect();
        assert_eq!(limits, vec![3, 5, 8, 12]);
        assert_eq!(AnalysisLength::Exhaustive.verification_depth(), VerificationDepth::Detailed);
        assert_eq!(ExpertiseLevel::Advanced.source_detail(), SourceDetail::Standard);
    }
}
