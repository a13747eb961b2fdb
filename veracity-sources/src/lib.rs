//! Source registry and reliability scoring.
//!
//! [`SourceRegistry`] holds the curated trusted and problematic domains,
//! [`SourceReliabilityScorer`] turns a URL into a weighted factor score, and
//! [`metadata`] extracts the page signals the heuristic factors need.
pub mod metadata;
pub mod registry;
pub mod scorer;

pub use metadata::{HttpMetadataFetcher, MetadataError, PageMetadata, PageMetadataSource};
pub use registry::{RegistryError, SourceRegistry, SourceType, normalize_domain};
pub use scorer::{
    Factor, FactorScore, ReliabilityLevel, SourceEvaluation, SourceReliabilityScorer,
    SourceSummary, SuggestedSource, parse_domain,
};
