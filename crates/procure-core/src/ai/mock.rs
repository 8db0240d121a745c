//! Mock backend for testing
//!
//! Healthy mocks answer with a deterministic plan derived from the request;
//! canned raw responses go through the same parsers as a real backend.
//! Unhealthy mocks fail every request.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::naming::clean_group_name;
use crate::plan::{GroupingPlan, PlanMapping, PlanStrategy, SubGroupPlan, SubGroupPlanEntry};

use super::parsing::{parse_grouping_plan, parse_sub_group_plan};
use super::types::{PlanRequest, ValueCount};
use super::AIBackend;

/// Approach recorded on plans the mock derives itself
pub const MOCK_APPROACH: &str = "mock_head_noun";

#[derive(Clone, Default)]
pub struct MockBackend {
    /// Whether requests and health checks succeed
    pub healthy: bool,
    /// Raw text returned for grouping plan requests
    pub plan_response: Option<String>,
    /// Raw text returned for sub-group plan requests
    pub sub_plan_response: Option<String>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            healthy: true,
            ..Self::default()
        }
    }

    pub fn unhealthy() -> Self {
        Self::default()
    }

    /// Healthy mock that answers grouping plan requests with `raw`
    pub fn with_response(raw: impl Into<String>) -> Self {
        Self {
            healthy: true,
            plan_response: Some(raw.into()),
            sub_plan_response: None,
        }
    }

    /// Healthy mock that answers sub-group plan requests with `raw`
    pub fn with_sub_plan_response(raw: impl Into<String>) -> Self {
        Self {
            healthy: true,
            plan_response: None,
            sub_plan_response: Some(raw.into()),
        }
    }

    /// No-op for the mock
    pub fn with_model(&self, _model: &str) -> Self {
        self.clone()
    }

    fn ensure_healthy(&self) -> Result<()> {
        if self.healthy {
            Ok(())
        } else {
            Err(Error::Oracle("mock backend is unavailable".into()))
        }
    }
}

#[async_trait]
impl AIBackend for MockBackend {
    async fn request_grouping_plan(&self, request: &PlanRequest) -> Result<GroupingPlan> {
        self.ensure_healthy()?;
        if let Some(raw) = &self.plan_response {
            return parse_grouping_plan(raw);
        }

        let main_group_mappings = head_noun_mappings(&request.values_with_counts);
        let sub_group_mappings = head_noun_mappings(&request.sub_values_with_counts);
        Ok(GroupingPlan {
            grouping_strategy: PlanStrategy {
                approach: MOCK_APPROACH.to_string(),
                total_main_groups: main_group_mappings.len(),
                total_sub_groups: sub_group_mappings.len(),
                coverage_percentage: 100.0,
            },
            main_group_mappings,
            sub_group_mappings,
        })
    }

    async fn request_sub_group_plan(&self, request: &PlanRequest) -> Result<SubGroupPlan> {
        self.ensure_healthy()?;
        if let Some(raw) = &self.sub_plan_response {
            return parse_sub_group_plan(raw);
        }

        let sub_groups = head_noun_mappings(&request.values_with_counts)
            .into_iter()
            .map(|(name, mapping)| SubGroupPlanEntry {
                name,
                values: mapping.original_values,
                reasoning: mapping.reasoning,
            })
            .collect();
        Ok(SubGroupPlan { sub_groups })
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}

/// Group values by their last word ("Blue Pen", "Red Pen" -> "Pen")
fn head_noun_mappings(values: &[ValueCount]) -> BTreeMap<String, PlanMapping> {
    let mut mappings: BTreeMap<String, PlanMapping> = BTreeMap::new();
    for value in values {
        let head = value.value.split_whitespace().last().unwrap_or("");
        let name = clean_group_name(head);
        let mapping = mappings.entry(name.clone()).or_insert_with(|| PlanMapping {
            core_type: name.to_lowercase(),
            original_values: Vec::new(),
            total_count: 0,
            reasoning: format!("Values ending in '{}'", name),
        });
        mapping.original_values.push(value.value.clone());
        mapping.total_count += value.count;
    }
    mappings
}
