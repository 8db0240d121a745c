//! Grouping Engine - strategy selection and validation around the partitioners
//!
//! The engine is built once per process with its configuration and an
//! optional oracle, then shared by reference. Every strategy result passes
//! through the validator before it is returned.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::ai::{AIClient, RequestOptions};
use crate::classify::{Classification, Classifier};
use crate::config::GroupingConfig;
use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::models::{GroupingResult, Item};
use crate::partition::{column_groups, unique_value_groups, AiPlanPartitioner, ChunkedPartitioner};
use crate::similarity::SimilarityScorer;
use crate::structured_plan::{self, StructuredPlan};
use crate::validate::validate_and_count;

/// Partitioning strategy requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Chunked,
    Columns,
    UniqueValues,
    AiPlan,
    AiSubGroups,
    /// Pick from the supplied columns and whether an oracle is configured
    #[default]
    Auto,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chunked => "chunked",
            Self::Columns => "columns",
            Self::UniqueValues => "unique_values",
            Self::AiPlan => "ai_plan",
            Self::AiSubGroups => "ai_sub_groups",
            Self::Auto => "auto",
        }
    }

    pub fn all() -> &'static [Strategy] {
        &[
            Self::Chunked,
            Self::Columns,
            Self::UniqueValues,
            Self::AiPlan,
            Self::AiSubGroups,
            Self::Auto,
        ]
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "chunked" => Ok(Self::Chunked),
            "columns" | "column" => Ok(Self::Columns),
            "unique_values" | "unique" => Ok(Self::UniqueValues),
            "ai_plan" => Ok(Self::AiPlan),
            "ai_sub_groups" | "ai_subgroups" => Ok(Self::AiSubGroups),
            "auto" => Ok(Self::Auto),
            other => Err(Error::InvalidInput(format!("Unknown strategy: {}", other))),
        }
    }
}

/// What to group and how
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupingRequest {
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default)]
    pub main_column: Option<String>,
    #[serde(default)]
    pub sub_column: Option<String>,
}

impl GroupingRequest {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    pub fn with_main_column(mut self, column: impl Into<String>) -> Self {
        self.main_column = Some(column.into());
        self
    }

    pub fn with_sub_column(mut self, column: impl Into<String>) -> Self {
        self.sub_column = Some(column.into());
        self
    }
}

pub struct GroupingEngine {
    config: GroupingConfig,
    scorer: SimilarityScorer,
    oracle: Option<AIClient>,
}

impl GroupingEngine {
    pub fn new(config: GroupingConfig) -> Result<Self> {
        config.validate()?;
        let classifier = Classifier::new(config.taxonomy.clone())?;
        Ok(Self {
            config,
            scorer: SimilarityScorer::new(classifier),
            oracle: None,
        })
    }

    /// Attach an oracle; requests use the configured timeout and generation settings
    pub fn with_oracle(mut self, oracle: AIClient) -> Self {
        info!(backend = oracle.backend_name(), "Oracle configured");
        self.oracle = Some(oracle.with_options(RequestOptions::from(&self.config.oracle)));
        self
    }

    pub fn config(&self) -> &GroupingConfig {
        &self.config
    }

    pub fn scorer(&self) -> &SimilarityScorer {
        &self.scorer
    }

    pub fn oracle(&self) -> Option<&AIClient> {
        self.oracle.as_ref()
    }

    /// Core product type of a raw name
    pub fn extract_core_product_type(&self, name: &str) -> Classification {
        self.scorer.classifier().classify(name)
    }

    pub fn similarity(&self, a: &Item, b: &Item) -> f64 {
        self.scorer.similarity(a, b)
    }

    /// The concrete strategy `request` runs with
    pub fn resolve_strategy(&self, request: &GroupingRequest) -> Strategy {
        if request.strategy != Strategy::Auto {
            return request.strategy;
        }
        let has_oracle = self.oracle.is_some();
        match (request.main_column.is_some(), request.sub_column.is_some()) {
            (true, true) | (false, true) if has_oracle => Strategy::AiSubGroups,
            (true, true) | (false, true) => Strategy::Columns,
            (true, false) => Strategy::UniqueValues,
            (false, false) => Strategy::Chunked,
        }
    }

    /// Run the resolved strategy and validate its result
    pub async fn generate(&self, dataset: &Dataset, request: &GroupingRequest) -> Result<GroupingResult> {
        dataset.ensure_rows()?;
        let strategy = self.resolve_strategy(request);
        let main = request.main_column.as_deref();
        let sub = request.sub_column.as_deref();
        debug!(requested = %request.strategy, resolved = %strategy, "Resolved grouping strategy");

        let mut result = match strategy {
            // Auto is already resolved to a concrete strategy
            Strategy::Chunked | Strategy::Auto => {
                ChunkedPartitioner::new(&self.scorer, &self.config).partition(dataset)?
            }
            Strategy::Columns => column_groups(dataset, main, sub)?,
            Strategy::UniqueValues => {
                let column = main.ok_or_else(|| {
                    Error::InvalidInput("unique-value grouping needs a main column".into())
                })?;
                unique_value_groups(dataset, column)?
            }
            Strategy::AiPlan => self.partitioner().plan_groups(dataset, main, sub).await?,
            Strategy::AiSubGroups => {
                let sub = sub.ok_or_else(|| {
                    Error::InvalidInput("AI sub-grouping needs a sub-group column".into())
                })?;
                self.partitioner().sub_groups(dataset, main, sub).await?
            }
        };

        let report = validate_and_count(&mut result);
        info!(
            strategy = %strategy,
            rows = dataset.len(),
            groups = result.groups.len(),
            ungrouped = result.ungrouped_items.len(),
            coverage = %result.coverage,
            valid = report.is_valid,
            "Grouping complete"
        );
        Ok(result)
    }

    pub async fn chunked_groups(&self, dataset: &Dataset) -> Result<GroupingResult> {
        self.generate(dataset, &GroupingRequest::new(Strategy::Chunked)).await
    }

    pub async fn column_groups(&self, dataset: &Dataset, main: Option<&str>, sub: Option<&str>) -> Result<GroupingResult> {
        self.generate(dataset, &request(Strategy::Columns, main, sub)).await
    }

    pub async fn unique_value_groups(&self, dataset: &Dataset, column: &str) -> Result<GroupingResult> {
        self.generate(dataset, &request(Strategy::UniqueValues, Some(column), None))
            .await
    }

    /// Oracle-planned main groups; falls back to direct value mapping on any oracle failure
    pub async fn ai_powered_groups(&self, dataset: &Dataset, main: &str, sub: Option<&str>) -> Result<GroupingResult> {
        self.generate(dataset, &request(Strategy::AiPlan, Some(main), sub)).await
    }

    pub async fn ai_sub_groups(&self, dataset: &Dataset, main: Option<&str>, sub: &str) -> Result<GroupingResult> {
        self.generate(dataset, &request(Strategy::AiSubGroups, main, Some(sub)))
            .await
    }

    /// Capture `result` as a reusable plan
    pub fn create_structured_plan(&self, result: &GroupingResult, name: Option<&str>) -> StructuredPlan {
        structured_plan::create_structured_plan(result, name, self.scorer.classifier().normalizer())
    }

    /// Replay a saved plan; the plan must validate first
    pub fn apply_structured_plan(&self, dataset: &Dataset, plan: &StructuredPlan) -> Result<GroupingResult> {
        let problems = structured_plan::validate_structured_plan(plan);
        if !problems.is_empty() {
            return Err(Error::InvalidInput(format!(
                "Structured plan '{}' is invalid: {}",
                plan.name,
                problems.join("; ")
            )));
        }
        let mut result = structured_plan::apply_structured_plan(dataset, plan, &self.scorer)?;
        validate_and_count(&mut result);
        Ok(result)
    }

    fn partitioner(&self) -> AiPlanPartitioner<'_> {
        AiPlanPartitioner::new(self.oracle.as_ref(), &self.scorer, &self.config)
    }
}

fn request(strategy: Strategy, main: Option<&str>, sub: Option<&str>) -> GroupingRequest {
    GroupingRequest {
        strategy,
        main_column: main.map(str::to_string),
        sub_column: sub.map(str::to_string),
    }
}
