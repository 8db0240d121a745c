//! Procure Core Library
//!
//! Groups tabular product data into main groups and sub-groups for
//! bulk-procurement analysis:
//! - CSV dataset loading with column role detection
//! - Product name normalization and core-type classification
//! - Weighted item similarity
//! - Partitioners: chunked sampling, column grouping, greedy clustering
//!   and AI-planned grouping with deterministic fallback
//! - Validation of the row accounting of every result
//! - Saved structured plans, procurement summaries and stored-document adapters

pub mod ai;
pub mod classify;
pub mod config;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod models;
pub mod naming;
pub mod normalize;
pub mod partition;
pub mod plan;
pub mod prompts;
pub mod savings;
pub mod similarity;
pub mod structured_plan;
pub mod summary;
pub mod validate;
pub mod wire;

/// Test utilities including a mock AI server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{AIBackend, AIClient, MockBackend, OllamaBackend, OpenAICompatibleBackend, PlanRequest, RequestOptions};
pub use classify::{Classification, Classifier, Taxonomy};
pub use config::GroupingConfig;
pub use dataset::{ColumnRoles, Dataset, ValueCount};
pub use engine::{GroupingEngine, GroupingRequest, Strategy};
pub use error::{Error, Result};
pub use models::{
    Coverage, GroupingMetadata, GroupingResult, Item, MainGroup, PlanSource, ProcessingMethod, SubGroup,
    SubGroupOrigin, ValidationCounts, ValidationReport,
};
pub use normalize::Normalizer;
pub use plan::{GroupingPlan, SubGroupPlan};
pub use prompts::{Prompt, PromptId, PromptInfo, PromptLibrary};
pub use similarity::SimilarityScorer;
pub use structured_plan::StructuredPlan;
pub use summary::{summarize, ProcurementSummary};
pub use validate::validate_and_count;
pub use wire::LegacyDocument;
