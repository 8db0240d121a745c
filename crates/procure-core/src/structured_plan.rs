//! Saved grouping plans
//!
//! A structured plan captures the shape of a grouping result as keyword
//! rules, so the same grouping can be replayed on a new dataset.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dataset::Dataset;
use crate::error::Result;
use crate::models::{
    short_id, Coverage, GroupingMetadata, GroupingResult, Item, MainGroup, ProcessingMethod, SubGroupOrigin,
};
use crate::naming::{bump, most_common};
use crate::normalize::Normalizer;
use crate::partition::DEFAULT_SUB_GROUP;
use crate::similarity::{score, SimilarityScorer};

pub const PLAN_VERSION: &str = "1.0";

/// Threshold written on every rule of a new plan
pub const DEFAULT_RULE_THRESHOLD: f64 = 0.6;

/// Keywords taken from the most frequent normalized words of a group
const KEYWORD_COUNT: usize = 5;

/// Fraction of a sub-group's keywords an item must contain to be routed there
const SUB_GROUP_KEYWORD_RATIO: f64 = 0.5;

/// Assigns items to one main group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupingRule {
    pub group_name: String,
    #[serde(default)]
    pub core_keywords: Vec<String>,
    #[serde(default = "default_threshold")]
    pub similarity_threshold: f64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSubGroup {
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanGroup {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub sub_groups: Vec<PlanSubGroup>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredPlan {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub grouping_rules: Vec<GroupingRule>,
    #[serde(default)]
    pub main_groups: Vec<PlanGroup>,
    /// Partitioner that produced the source result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_method: Option<ProcessingMethod>,
    #[serde(default)]
    pub source_rows: usize,
}

fn default_threshold() -> f64 {
    DEFAULT_RULE_THRESHOLD
}

fn default_enabled() -> bool {
    true
}

fn default_version() -> String {
    PLAN_VERSION.to_string()
}

impl StructuredPlan {
    pub fn group(&self, name: &str) -> Option<&PlanGroup> {
        self.main_groups.iter().find(|g| g.name == name)
    }
}

/// Capture `result` as a plan: one rule and one group entry per main group
pub fn create_structured_plan(result: &GroupingResult, name: Option<&str>, normalizer: &Normalizer) -> StructuredPlan {
    let created_at = Utc::now();
    let name = name
        .map(str::to_string)
        .unwrap_or_else(|| format!("Structured Plan {}", created_at.format("%Y-%m-%d %H:%M")));

    let mut grouping_rules = Vec::with_capacity(result.groups.len());
    let mut main_groups = Vec::with_capacity(result.groups.len());
    for group in &result.groups {
        let members = group.items.iter().chain(group.sub_groups.iter().flat_map(|s| s.items.iter()));
        grouping_rules.push(GroupingRule {
            group_name: group.name.clone(),
            core_keywords: extract_keywords(members, normalizer),
            similarity_threshold: DEFAULT_RULE_THRESHOLD,
            enabled: group.enabled,
        });
        main_groups.push(PlanGroup {
            name: group.name.clone(),
            enabled: group.enabled,
            sub_groups: group
                .sub_groups
                .iter()
                .map(|s| PlanSubGroup {
                    name: s.name.clone(),
                    keywords: extract_keywords(s.items.iter(), normalizer),
                })
                .collect(),
        });
    }

    StructuredPlan {
        id: short_id(&["plan", &name, &created_at.to_rfc3339()]),
        name,
        description: String::new(),
        created_at,
        version: PLAN_VERSION.to_string(),
        grouping_rules,
        main_groups,
        source_method: Some(result.metadata.processing_method),
        source_rows: result.total_rows(),
    }
}

/// The five most frequent normalized words, then anything of two characters or fewer dropped
pub fn extract_keywords<'a>(items: impl IntoIterator<Item = &'a Item>, normalizer: &Normalizer) -> Vec<String> {
    let mut counts = Vec::new();
    for item in items {
        for word in normalizer.normalize(&item.name).split_whitespace() {
            bump(&mut counts, word.to_string());
        }
    }
    most_common(counts, KEYWORD_COUNT)
        .into_iter()
        .map(|(word, _)| word)
        .filter(|word| word.chars().count() > 2)
        .collect()
}

/// Problems that make a plan unusable; empty when the plan is fine
pub fn validate_structured_plan(plan: &StructuredPlan) -> Vec<String> {
    let mut problems = Vec::new();
    if plan.name.trim().is_empty() {
        problems.push("Plan name is empty".to_string());
    }

    let mut names = HashSet::new();
    for (i, group) in plan.main_groups.iter().enumerate() {
        if group.name.trim().is_empty() {
            problems.push(format!("Main group {}: empty name", i));
            continue;
        }
        if !names.insert(group.name.as_str()) {
            problems.push(format!("Duplicate main group name '{}'", group.name));
        }
        let mut sub_names = HashSet::new();
        for sub_group in &group.sub_groups {
            if sub_group.name.trim().is_empty() {
                problems.push(format!("Main group '{}': sub-group with empty name", group.name));
            } else if !sub_names.insert(sub_group.name.as_str()) {
                problems.push(format!(
                    "Main group '{}': duplicate sub-group name '{}'",
                    group.name, sub_group.name
                ));
            }
        }
    }

    for (i, rule) in plan.grouping_rules.iter().enumerate() {
        if rule.group_name.trim().is_empty() {
            problems.push(format!("Grouping rule {}: missing group_name", i));
        } else if !names.contains(rule.group_name.as_str()) {
            problems.push(format!(
                "Grouping rule {}: references undefined group '{}'",
                i, rule.group_name
            ));
        }
        if !(0.0..=1.0).contains(&rule.similarity_threshold) {
            problems.push(format!(
                "Grouping rule {}: similarity_threshold {} outside [0, 1]",
                i, rule.similarity_threshold
            ));
        }
    }
    problems
}

/// Replay `plan` on `dataset`.
///
/// Rules run in order and each row is claimed at most once. A row matches a
/// rule when the larger of its keyword-hit ratio and its similarity to the
/// group name reaches the rule's threshold. Disabled groups and rules are
/// skipped; unmatched rows are ungrouped.
pub fn apply_structured_plan(dataset: &Dataset, plan: &StructuredPlan, scorer: &SimilarityScorer) -> Result<GroupingResult> {
    dataset.ensure_rows()?;
    let roles = dataset.item_roles();
    let mut slots: Vec<Option<Item>> = (0..dataset.len()).map(|row| Some(dataset.project_item(row, &roles))).collect();
    let profiles: Vec<_> = slots.iter().flatten().map(|item| scorer.profile(item)).collect();

    let enabled: Vec<&PlanGroup> = plan.main_groups.iter().filter(|g| g.enabled).collect();
    let mut groups: Vec<MainGroup> = enabled
        .iter()
        .enumerate()
        .map(|(ordinal, planned)| {
            let mut group = MainGroup::new(ordinal, planned.name.as_str());
            for sub_group in &planned.sub_groups {
                group.push_sub_group(sub_group.name.as_str(), SubGroupOrigin::Plan, Vec::new());
            }
            group
        })
        .collect();

    for rule in plan.grouping_rules.iter().filter(|r| r.enabled) {
        let Some(index) = enabled.iter().position(|g| g.name == rule.group_name) else {
            continue;
        };
        let group_profile = scorer.profile_of(&rule.group_name, "");
        for (row, slot) in slots.iter_mut().enumerate() {
            if slot.is_none() {
                continue;
            }
            let profile = &profiles[row];
            let keyword_score = hit_ratio(&rule.core_keywords, &profile.normalized);
            let total = keyword_score.max(score(profile, &group_profile));
            if total < rule.similarity_threshold {
                continue;
            }
            let Some(item) = slot.take() else {
                continue;
            };

            let group = &mut groups[index];
            let planned = enabled[index];
            let target = planned
                .sub_groups
                .iter()
                .position(|s| hit_ratio(&s.keywords, &profile.normalized) > SUB_GROUP_KEYWORD_RATIO);
            match target {
                Some(i) => group.sub_groups[i].items.push(item),
                None => match group
                    .sub_groups
                    .iter()
                    .position(|s| s.name == DEFAULT_SUB_GROUP || s.origin == SubGroupOrigin::Default)
                {
                    Some(i) => group.sub_groups[i].items.push(item),
                    None => {
                        group.push_sub_group(DEFAULT_SUB_GROUP, SubGroupOrigin::Default, vec![item]);
                    }
                },
            }
        }
    }

    for group in &mut groups {
        group.sub_groups.retain(|s| !s.items.is_empty());
        group.refresh_totals();
    }
    let ungrouped: Vec<Item> = slots.into_iter().flatten().collect();

    info!(
        plan = %plan.name,
        groups = groups.len(),
        ungrouped = ungrouped.len(),
        "Applied structured plan"
    );
    let metadata = GroupingMetadata::new(ProcessingMethod::StructuredPlan, dataset.len());
    Ok(GroupingResult::new(groups, ungrouped, Coverage::Complete, metadata))
}

/// Share of `keywords` found in `text`; 0 when there are none
fn hit_ratio(keywords: &[String], text: &str) -> f64 {
    if keywords.is_empty() {
        return 0.0;
    }
    let hits = keywords.iter().filter(|k| text.contains(k.as_str())).count();
    hits as f64 / keywords.len() as f64
}
