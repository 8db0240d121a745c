//! AI-plan-driven grouping
//!
//! The oracle gets exactly one attempt per plan. Any failure is logged and
//! replaced by a deterministic plan, so these partitioners never fail because
//! of the backend. Every row is examined, so coverage is always complete.

use std::collections::HashMap;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::ai::{AIBackend, AIClient, PlanRequest, ValueCount};
use crate::config::GroupingConfig;
use crate::dataset::{ColumnRoles, Dataset};
use crate::error::{Error, Result};
use crate::models::{
    Coverage, GroupingMetadata, GroupingResult, Item, MainGroup, PlanSource, ProcessingMethod, SubGroupOrigin,
    ALL_ITEMS_SUB_GROUP, DEFAULT_CATEGORY, UNGROUPED_SUB_GROUP,
};
use crate::naming::clean_group_name;
use crate::plan::{GroupingPlan, PlanIndex, SubGroupPlan};
use crate::similarity::SimilarityScorer;

use super::greedy::cluster_items;
use super::{OrderedBuckets, OTHER_ITEMS_SUB_GROUP};

/// Context name sent to the oracle for dataset-wide requests
pub const DATASET_CONTEXT: &str = "Dataset";

const UNIT_PATTERN: &str = r"\b\d+(\.\d+)?\s*(kg|g|l|ml|lb|oz|inch|cm|mm)\b";
const BRAND_WORDS: &[&str] = &["brand", "co", "ltd", "inc", "corp", "&", "and"];
const COLOR_WORDS: &[&str] = &[
    "red", "blue", "green", "yellow", "black", "white", "brown", "pink", "grey", "gray", "orange", "purple",
];
const SIZE_WORDS: &[&str] = &["small", "medium", "large", "xl", "xxl", "mini", "big", "tiny", "huge"];

/// Words kept from a value when extracting its core type
const CORE_TYPE_WORDS: usize = 2;

pub struct AiPlanPartitioner<'a> {
    oracle: Option<&'a AIClient>,
    scorer: &'a SimilarityScorer,
    config: &'a GroupingConfig,
}

/// A sub-group before it is attached to its main group
#[derive(Debug)]
struct Draft {
    name: String,
    origin: SubGroupOrigin,
    items: Vec<Item>,
    reasoning: Option<String>,
}

impl Draft {
    fn new(name: impl Into<String>, origin: SubGroupOrigin, items: Vec<Item>) -> Self {
        Self {
            name: name.into(),
            origin,
            items,
            reasoning: None,
        }
    }

    fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        let reasoning = reasoning.into();
        if !reasoning.trim().is_empty() {
            self.reasoning = Some(reasoning);
        }
        self
    }
}

/// The rows of one main group being split by the sub-group column
struct Scope<'s> {
    dataset: &'s Dataset,
    roles: &'s ColumnRoles,
    /// Rows with a non-blank sub-group value
    rows: Vec<usize>,
    sub_idx: usize,
    sub_column: &'s str,
    /// Name the oracle sees for this group
    context: &'s str,
    /// Used in the last-resort "All <label> Items" name
    label: &'s str,
    /// Category stamped on every item, when grouped by a main column
    category: Option<&'s str>,
}

impl Scope<'_> {
    /// Item named by its sub-group value
    fn item(&self, row: usize) -> Item {
        let mut item = self.dataset.project_item(row, self.roles);
        if let Some(value) = self.dataset.cell(row, self.sub_idx) {
            item.name = value.to_string();
        }
        if let Some(category) = self.category {
            item.category = category.to_string();
        }
        item
    }

    fn value(&self, row: usize) -> &str {
        self.dataset.cell(row, self.sub_idx).unwrap_or("")
    }

    /// Group the scope's rows by a key derived from their value, in first-appearance order
    fn bucket_by(&self, mut key: impl FnMut(&str) -> String) -> OrderedBuckets<Item> {
        let mut keys: HashMap<&str, String> = HashMap::new();
        let mut buckets = OrderedBuckets::new();
        for &row in &self.rows {
            let value = self.value(row);
            let name = keys.entry(value).or_insert_with(|| key(value));
            buckets.push(name, self.item(row));
        }
        buckets
    }
}

impl<'a> AiPlanPartitioner<'a> {
    pub fn new(oracle: Option<&'a AIClient>, scorer: &'a SimilarityScorer, config: &'a GroupingConfig) -> Self {
        Self { oracle, scorer, config }
    }

    /// Group by a plan over the main column's values (and the sub column's, if given).
    ///
    /// Values the plan does not list are placed by fuzzy match against the
    /// planned values, else under a group named after the cleaned value.
    pub async fn plan_groups(&self, dataset: &Dataset, main_column: Option<&str>, sub_column: Option<&str>) -> Result<GroupingResult> {
        let main_column =
            main_column.ok_or_else(|| Error::InvalidInput("AI plan grouping needs a main group column".into()))?;
        dataset.ensure_rows()?;
        let main_idx = dataset.column_index(main_column)?;
        let sub_idx = sub_column.map(|c| dataset.column_index(c)).transpose()?;
        let roles = dataset.item_roles();

        let main_values = dataset.unique_values(main_idx);
        let sub_values = sub_idx.map(|c| dataset.unique_values(c)).unwrap_or_default();
        let (plan, source) = self.main_plan(main_column, sub_column, &main_values, &sub_values).await;

        let oracle_config = &self.config.oracle;
        let main_index = PlanIndex::new(
            &plan.main_group_mappings,
            oracle_config.match_threshold,
            oracle_config.substring_score,
        );
        let sub_index = PlanIndex::new(
            &plan.sub_group_mappings,
            oracle_config.match_threshold,
            oracle_config.substring_score,
        );

        let mut buckets: OrderedBuckets<usize> = OrderedBuckets::new();
        let mut ungrouped = Vec::new();
        for row in 0..dataset.len() {
            match dataset.cell(row, main_idx) {
                Some(value) => buckets.push(&resolve(&main_index, value), row),
                None => ungrouped.push(dataset.project_item(row, &roles)),
            }
        }

        let mut groups = Vec::with_capacity(buckets.len());
        for (ordinal, bucket) in buckets.into_vec().into_iter().enumerate() {
            let mapping = plan.main_group_mappings.get(&bucket.name);
            let mut group = MainGroup::new(ordinal, bucket.name.clone());
            if let Some(core_type) = mapping.map(|m| m.core_type.as_str()).filter(|c| !c.is_empty()) {
                group = group.with_core_type(core_type);
            }
            let item = |row: usize| plan_item(dataset, row, main_idx, sub_idx, &bucket.name, &roles);

            match sub_idx {
                Some(sub_idx) => {
                    let mut subs: OrderedBuckets<Item> = OrderedBuckets::new();
                    let mut blank = Vec::new();
                    for &row in &bucket.items {
                        match dataset.cell(row, sub_idx) {
                            Some(value) => subs.push(&resolve(&sub_index, value), item(row)),
                            None => blank.push(item(row)),
                        }
                    }
                    for sub in subs.into_vec() {
                        let planned = plan.sub_group_mappings.get(&sub.name);
                        let origin = if planned.is_some() {
                            SubGroupOrigin::Plan
                        } else {
                            SubGroupOrigin::Column
                        };
                        let sub_group = group.push_sub_group(sub.name, origin, sub.items);
                        if let Some(reasoning) = planned.map(|m| &m.reasoning).filter(|r| !r.is_empty()) {
                            sub_group.reasoning = Some(reasoning.clone());
                        }
                    }
                    if !blank.is_empty() {
                        group.push_sub_group(UNGROUPED_SUB_GROUP, SubGroupOrigin::Ungrouped, blank);
                    }
                }
                None => {
                    let items = bucket.items.iter().map(|&row| item(row)).collect();
                    let sub_group = group.push_sub_group(ALL_ITEMS_SUB_GROUP, SubGroupOrigin::Plan, items);
                    if let Some(reasoning) = mapping.map(|m| &m.reasoning).filter(|r| !r.is_empty()) {
                        sub_group.reasoning = Some(reasoning.clone());
                    }
                }
            }
            group.refresh_totals();
            groups.push(group);
        }

        info!(
            main_column,
            sub_column = sub_column.unwrap_or(""),
            source = %source,
            groups = groups.len(),
            ungrouped = ungrouped.len(),
            "AI plan grouping complete"
        );

        let mut metadata = GroupingMetadata::new(ProcessingMethod::AiPlan, dataset.len());
        metadata.main_column = Some(main_column.to_string());
        metadata.sub_column = sub_column.map(str::to_string);
        metadata.plan_source = Some(source);
        metadata.plan = Some(plan);
        Ok(GroupingResult::new(groups, ungrouped, Coverage::Complete, metadata))
    }

    /// Ask the oracle for a main plan, or build the direct-mapping fallback
    async fn main_plan(
        &self,
        main_column: &str,
        sub_column: Option<&str>,
        main_values: &[ValueCount],
        sub_values: &[ValueCount],
    ) -> (GroupingPlan, PlanSource) {
        let Some(oracle) = self.oracle else {
            debug!("No AI backend configured, using direct mapping plan");
            return (GroupingPlan::fallback(main_values, sub_values), PlanSource::Fallback);
        };

        let config = &self.config.oracle;
        let mut request = PlanRequest::new(DATASET_CONTEXT, main_column, capped(main_values, config.max_main_values));
        if let Some(sub_column) = sub_column {
            request = request.with_sub_column(sub_column, capped(sub_values, config.max_sub_values));
        }

        match oracle.request_grouping_plan(&request).await {
            Ok(plan) => {
                info!(
                    backend = oracle.backend_name(),
                    groups = plan.main_group_mappings.len(),
                    "Received grouping plan"
                );
                (plan, PlanSource::Oracle)
            }
            Err(e) => {
                warn!(backend = oracle.backend_name(), error = %e, "Grouping plan request failed, using direct mapping");
                (GroupingPlan::fallback(main_values, sub_values), PlanSource::Fallback)
            }
        }
    }

    /// Split each main group (or the whole dataset) into oracle-planned sub-groups.
    ///
    /// Without a main column the dataset becomes one group named
    /// "All <sub_column> Groups". When the oracle fails or is absent the
    /// deterministic fallback chain is used instead.
    pub async fn sub_groups(&self, dataset: &Dataset, main_column: Option<&str>, sub_column: &str) -> Result<GroupingResult> {
        dataset.ensure_rows()?;
        let sub_idx = dataset.column_index(sub_column)?;
        let main_idx = main_column.map(|c| dataset.column_index(c)).transpose()?;
        let roles = dataset.item_roles();
        let extractor = CoreTypeExtractor::new()?;

        let mut ungrouped = Vec::new();
        let contexts: Vec<(String, Vec<usize>)> = match main_idx {
            Some(main_idx) => {
                let mut buckets: OrderedBuckets<usize> = OrderedBuckets::new();
                for row in 0..dataset.len() {
                    match dataset.cell(row, main_idx) {
                        Some(value) => buckets.push(&clean_group_name(value), row),
                        None => ungrouped.push(dataset.project_item(row, &roles)),
                    }
                }
                buckets.into_by_size().into_iter().map(|b| (b.name, b.items)).collect()
            }
            None => vec![(format!("All {} Groups", sub_column), (0..dataset.len()).collect())],
        };

        let mut oracle_groups = 0;
        let mut fallback_groups = 0;
        let mut groups = Vec::with_capacity(contexts.len());
        for (ordinal, (name, rows)) in contexts.into_iter().enumerate() {
            let (filled, blank): (Vec<usize>, Vec<usize>) =
                rows.into_iter().partition(|row| dataset.cell(*row, sub_idx).is_some());
            let scope = Scope {
                dataset,
                roles: &roles,
                rows: filled,
                sub_idx,
                sub_column,
                context: if main_idx.is_some() { name.as_str() } else { DATASET_CONTEXT },
                label: if main_idx.is_some() { name.as_str() } else { sub_column },
                category: main_idx.map(|_| name.as_str()),
            };

            let (drafts, from_oracle) = self.split(&scope, &extractor).await;
            if from_oracle {
                oracle_groups += 1;
            } else {
                fallback_groups += 1;
            }

            let mut group = MainGroup::new(ordinal, name.as_str());
            for draft in drafts {
                let sub_group = group.push_sub_group(draft.name, draft.origin, draft.items);
                sub_group.reasoning = draft.reasoning;
            }
            if !blank.is_empty() {
                let items = blank.into_iter().map(|row| scope.item(row)).collect();
                group.push_sub_group(UNGROUPED_SUB_GROUP, SubGroupOrigin::Ungrouped, items);
            }
            group.refresh_totals();
            groups.push(group);
        }

        let source = if oracle_groups == 0 {
            PlanSource::Fallback
        } else if fallback_groups == 0 {
            PlanSource::Oracle
        } else {
            PlanSource::Mixed
        };
        info!(
            sub_column,
            source = %source,
            groups = groups.len(),
            sub_groups = groups.iter().map(|g| g.sub_groups.len()).sum::<usize>(),
            "AI sub-grouping complete"
        );

        let mut metadata = GroupingMetadata::new(ProcessingMethod::AiSubGroups, dataset.len());
        metadata.main_column = main_column.map(str::to_string);
        metadata.sub_column = Some(sub_column.to_string());
        metadata.plan_source = Some(source);
        Ok(GroupingResult::new(groups, ungrouped, Coverage::Complete, metadata))
    }

    /// Sub-groups for one scope, and whether the oracle's plan was used
    async fn split(&self, scope: &Scope<'_>, extractor: &CoreTypeExtractor) -> (Vec<Draft>, bool) {
        let values = scope.dataset.values_in_rows(scope.sub_idx, &scope.rows);
        match self.oracle {
            Some(oracle) if values.len() >= 2 => {
                if let Some(drafts) = self.oracle_drafts(oracle, scope, &values).await {
                    return (drafts, true);
                }
            }
            Some(_) => debug!(context = scope.context, "Fewer than two distinct values, skipping AI backend"),
            None => {}
        }
        (self.fallback_drafts(scope, &values, extractor), false)
    }

    async fn oracle_drafts(&self, oracle: &AIClient, scope: &Scope<'_>, values: &[ValueCount]) -> Option<Vec<Draft>> {
        let mut request_values = values.to_vec();
        request_values.sort_by(|a, b| b.count.cmp(&a.count));
        request_values.truncate(self.config.oracle.max_sub_plan_values);
        let request = PlanRequest::new(scope.context, scope.sub_column, request_values);

        match oracle.request_sub_group_plan(&request).await {
            Ok(plan) => {
                let drafts = apply_sub_plan(scope, values, &plan);
                if drafts.iter().any(|d| d.origin == SubGroupOrigin::Plan) {
                    debug!(context = scope.context, sub_groups = drafts.len(), "Applied sub-group plan");
                    Some(drafts)
                } else {
                    warn!(context = scope.context, "Sub-group plan matched no values, using fallback");
                    None
                }
            }
            Err(e) => {
                warn!(
                    context = scope.context,
                    backend = oracle.backend_name(),
                    error = %e,
                    "Sub-group plan request failed, using fallback"
                );
                None
            }
        }
    }

    /// Rule-based, then similarity, then per-value, then a single bucket
    fn fallback_drafts(&self, scope: &Scope<'_>, values: &[ValueCount], extractor: &CoreTypeExtractor) -> Vec<Draft> {
        if scope.rows.is_empty() {
            return Vec::new();
        }

        if values.len() > 1 {
            let rule_based: Vec<Draft> = scope
                .bucket_by(|value| extractor.core_type(value))
                .into_vec()
                .into_iter()
                .map(|b| {
                    let reasoning = format!("Grouped by core product type: {}", b.name);
                    Draft::new(b.name, SubGroupOrigin::RuleBased, b.items).with_reasoning(reasoning)
                })
                .collect();
            if rule_based.len() >= 2 {
                debug!(context = scope.context, sub_groups = rule_based.len(), "Rule-based sub-groups");
                return rule_based;
            }

            let items = scope.rows.iter().map(|&row| scope.item(row)).collect();
            let similar: Vec<Draft> = cluster_items(
                items,
                self.scorer,
                self.config.clustering.fallback_threshold,
                &self.config.clustering,
            )
            .into_iter()
            .map(|c| Draft::new(c.name, SubGroupOrigin::SimilarityBased, c.items))
            .collect();
            if similar.len() >= 2 {
                debug!(context = scope.context, sub_groups = similar.len(), "Similarity-based sub-groups");
                return similar;
            }
        }

        if values.len() <= self.config.oracle.value_based_limit {
            let by_value: Vec<Draft> = scope
                .bucket_by(clean_group_name)
                .into_vec()
                .into_iter()
                .map(|b| Draft::new(b.name, SubGroupOrigin::ValueBased, b.items))
                .collect();
            if by_value.len() > 1 {
                return by_value;
            }
        }

        let items = scope.rows.iter().map(|&row| scope.item(row)).collect();
        vec![Draft::new(
            format!("All {} Items", scope.label),
            SubGroupOrigin::DefaultFallback,
            items,
        )]
    }
}

/// Planned group for a value, else a group named after the cleaned value
fn resolve(index: &PlanIndex<'_>, value: &str) -> String {
    index
        .lookup(value)
        .map(str::to_string)
        .unwrap_or_else(|| clean_group_name(value))
}

fn capped(values: &[ValueCount], cap: usize) -> Vec<ValueCount> {
    values.iter().take(cap).cloned().collect()
}

/// Item for a plan-grouped row: named by its sub value, else its main value
fn plan_item(dataset: &Dataset, row: usize, main_idx: usize, sub_idx: Option<usize>, group: &str, roles: &ColumnRoles) -> Item {
    let name = sub_idx
        .and_then(|c| dataset.cell(row, c))
        .or_else(|| dataset.cell(row, main_idx))
        .map(str::to_string)
        .unwrap_or_else(|| Item::placeholder_name(row));
    let category = if group.is_empty() { DEFAULT_CATEGORY } else { group };
    dataset.build_item(row, name, category, roles)
}

/// Turn a sub-group plan into drafts.
///
/// Each planned value claims the exact actual value, else the first
/// unclaimed actual value that equals, contains or is contained in it
/// (ignoring case). A value is claimed once, so no row lands twice. Values
/// nothing claimed go to "Other Items".
fn apply_sub_plan(scope: &Scope<'_>, values: &[ValueCount], plan: &SubGroupPlan) -> Vec<Draft> {
    let lowered: Vec<String> = values.iter().map(|v| v.value.to_lowercase()).collect();
    let mut owner: Vec<Option<usize>> = vec![None; values.len()];
    let mut entries = Vec::new();

    for entry in &plan.sub_groups {
        let entry_idx = entries.len();
        let mut claimed_any = false;
        for planned in &entry.values {
            let planned = planned.trim();
            if planned.is_empty() {
                continue;
            }
            let planned_lower = planned.to_lowercase();
            let hit = (0..values.len())
                .find(|&i| owner[i].is_none() && values[i].value == planned)
                .or_else(|| {
                    (0..values.len()).find(|&i| {
                        owner[i].is_none()
                            && (lowered[i] == planned_lower
                                || lowered[i].contains(&planned_lower)
                                || planned_lower.contains(&lowered[i]))
                    })
                });
            if let Some(i) = hit {
                owner[i] = Some(entry_idx);
                claimed_any = true;
            }
        }
        if claimed_any {
            let name = match entry.name.trim() {
                "" => clean_group_name(""),
                name => name.to_string(),
            };
            entries.push(Draft::new(name, SubGroupOrigin::Plan, Vec::new()).with_reasoning(entry.reasoning.clone()));
        }
    }

    let position: HashMap<&str, usize> = values.iter().enumerate().map(|(i, v)| (v.value.as_str(), i)).collect();
    let mut other = Vec::new();
    for &row in &scope.rows {
        let slot = position.get(scope.value(row)).and_then(|&i| owner[i]);
        match slot {
            Some(entry_idx) => entries[entry_idx].items.push(scope.item(row)),
            None => other.push(scope.item(row)),
        }
    }
    if !other.is_empty() {
        entries.push(Draft::new(OTHER_ITEMS_SUB_GROUP, SubGroupOrigin::OtherItems, other));
    }
    entries
}

/// Rule-based core product type of a raw value ("Red Widget 2kg" -> "Widget")
pub(crate) struct CoreTypeExtractor {
    units: Regex,
}

impl CoreTypeExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            units: Regex::new(UNIT_PATTERN)?,
        })
    }

    /// Drop units, brand/color/size words, bare numbers and single characters,
    /// then keep the first two remaining words
    pub fn core_type(&self, value: &str) -> String {
        let lower = value.trim().to_lowercase();
        let stripped = self.units.replace_all(&lower, "");
        let words: Vec<&str> = stripped
            .split_whitespace()
            .filter(|w| {
                !BRAND_WORDS.contains(w)
                    && !COLOR_WORDS.contains(w)
                    && !SIZE_WORDS.contains(w)
                    && !w.chars().all(|c| c.is_ascii_digit())
                    && w.chars().count() > 1
            })
            .take(CORE_TYPE_WORDS)
            .collect();
        if words.is_empty() {
            return clean_group_name(value.split_whitespace().next().unwrap_or(value));
        }
        clean_group_name(&words.join(" "))
    }
}
