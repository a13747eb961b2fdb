//! Fact-check core for Veracity.
//!
//! Claims are pulled out of text (or of normalised media), verified one by
//! one through a [`veracity_llm::ClaimVerifier`], folded into one verdict by
//! [`TruthAggregator`] and written up as an [`AnalysisReport`] by
//! [`FactCheckOrchestrator`].
//!
//! # Examples
//!
//! ```rust
//! use veracity_check::ClaimExtractor;
//! use veracity_common::AnalysisLength;
//!
//! let extraction = ClaimExtractor::new()
//!     .extract_for("Nezaměstnanost v roce 2023 vzrostla o 15 %.", AnalysisLength::Brief);
//! assert_eq!(extraction.claims.len(), 1);
//! ```
pub mod aggregate;
pub mod extractor;
pub mod lexicon;
pub mod narrative;
pub mod orchestrator;
pub mod report;
pub mod store;

pub use aggregate::{OverallVerdict, TruthAggregator};
pub use extractor::{ClaimExtractor, Extraction};
pub use narrative::Presentation;
pub use orchestrator::{
    AnalysisInput, AnalysisRequest, FactCheckOrchestrator, OrchestratorOptions, ANONYMOUS_USER,
};
pub use report::{AnalysisReport, AnalysisReportSummary};
pub use store::{Datastore, MemoryStore, SqliteStore, StoreError};
