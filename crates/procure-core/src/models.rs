//! Domain models for Procure grouping results

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};

use crate::plan::GroupingPlan;
use crate::savings;

/// Category used when a row carries none
pub const DEFAULT_CATEGORY: &str = "Unknown";

/// Name of the catch-all sub-group for items without a sub-group value
pub const UNGROUPED_SUB_GROUP: &str = "Ungrouped Items";

/// Name of the single sub-group used when no sub-group column is given
pub const ALL_ITEMS_SUB_GROUP: &str = "All Items";

/// One input row projected into a normalized record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Source row index, as a string
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    /// Original column name -> stringified cell value
    #[serde(default, deserialize_with = "deserialize_row_data")]
    pub row_data: BTreeMap<String, String>,
    #[serde(default)]
    pub original_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub core_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_words: Vec<String>,
}

impl Item {
    /// Create an item for a source row with default price, category and quantity
    pub fn new(index: usize, name: impl Into<String>) -> Self {
        Self {
            id: index.to_string(),
            name: name.into(),
            price: 0.0,
            category: DEFAULT_CATEGORY.to_string(),
            quantity: 1,
            row_data: BTreeMap::new(),
            original_index: index,
            normalized_name: None,
            core_type: None,
            sub_type: None,
            confidence: None,
            key_words: Vec::new(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = price;
        self
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    /// Placeholder name for a row whose name cell is missing
    pub fn placeholder_name(index: usize) -> String {
        format!("Item_{}", index)
    }

    /// Copy of this item without the traceability payload
    pub fn slim(&self) -> Self {
        Self {
            row_data: BTreeMap::new(),
            key_words: Vec::new(),
            ..self.clone()
        }
    }
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

fn default_quantity() -> u32 {
    1
}

fn default_enabled() -> bool {
    true
}

/// Accept any JSON scalar as a row_data value; stored documents are not always strings
fn deserialize_row_data<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: BTreeMap<String, serde_json::Value> = BTreeMap::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(key, value)| {
            let text = match value {
                serde_json::Value::Null => String::new(),
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (key, text)
        })
        .collect())
}

/// How a sub-group came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubGroupOrigin {
    /// Distinct value of a sub-group column
    #[default]
    Column,
    /// Greedy similarity cluster
    Cluster,
    /// Single bucket for a small main group
    Default,
    /// Entry of an applied grouping plan
    Plan,
    /// Unplanned values collected after a plan was applied
    OtherItems,
    /// Core-type extraction fallback
    RuleBased,
    /// Similarity clustering fallback
    SimilarityBased,
    /// One bucket per distinct value fallback
    ValueBased,
    /// Last-resort single bucket
    DefaultFallback,
    /// Catch-all for items with no sub-group value
    Ungrouped,
}

impl SubGroupOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Column => "column",
            Self::Cluster => "cluster",
            Self::Default => "default",
            Self::Plan => "plan",
            Self::OtherItems => "other_items",
            Self::RuleBased => "rule_based",
            Self::SimilarityBased => "similarity_based",
            Self::ValueBased => "value_based",
            Self::DefaultFallback => "default_fallback",
            Self::Ungrouped => "ungrouped",
        }
    }
}

impl std::fmt::Display for SubGroupOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A named bucket of items under one main group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubGroup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub items: Vec<Item>,
    /// Cached `items.len()`, recomputed by the validator
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub is_ungrouped_subgroup: bool,
    #[serde(default)]
    pub origin: SubGroupOrigin,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl SubGroup {
    pub fn new(parent_id: &str, ordinal: usize, name: impl Into<String>, origin: SubGroupOrigin) -> Self {
        let name = name.into();
        Self {
            id: short_id(&[parent_id, &ordinal.to_string(), &name]),
            name,
            items: Vec::new(),
            count: 0,
            is_ungrouped_subgroup: origin == SubGroupOrigin::Ungrouped,
            origin,
            reasoning: None,
        }
    }

    pub fn with_items(mut self, items: Vec<Item>) -> Self {
        self.count = items.len();
        self.items = items;
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }
}

/// Top-level category of a grouping result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainGroup {
    pub id: String,
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub core_type: Option<String>,
    #[serde(default)]
    pub sub_groups: Vec<SubGroup>,
    /// Items attached to the main group itself (legacy documents only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Item>,
    /// Direct items plus every sub-group's count, recomputed by the validator
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub estimated_savings: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_confidence: Option<f64>,
}

impl MainGroup {
    pub fn new(ordinal: usize, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: short_id(&["main", &ordinal.to_string(), &name]),
            name,
            enabled: true,
            core_type: None,
            sub_groups: Vec::new(),
            items: Vec::new(),
            count: 0,
            estimated_savings: savings::estimated_savings(0),
            avg_confidence: None,
        }
    }

    pub fn with_core_type(mut self, core_type: impl Into<String>) -> Self {
        self.core_type = Some(core_type.into());
        self
    }

    /// Append a sub-group built from `items`, assigning it the next ordinal id
    pub fn push_sub_group(&mut self, name: impl Into<String>, origin: SubGroupOrigin, items: Vec<Item>) -> &mut SubGroup {
        let ordinal = self.sub_groups.len();
        let sub_group = SubGroup::new(&self.id, ordinal, name, origin).with_items(items);
        self.sub_groups.push(sub_group);
        let last = self.sub_groups.len() - 1;
        &mut self.sub_groups[last]
    }

    /// Number of items held by this group, direct and nested
    pub fn item_total(&self) -> usize {
        self.items.len() + self.sub_groups.iter().map(|s| s.items.len()).sum::<usize>()
    }

    /// Recompute count and estimated savings from the held items
    pub fn refresh_totals(&mut self) {
        for sub_group in &mut self.sub_groups {
            sub_group.count = sub_group.items.len();
        }
        self.count = self.item_total();
        self.estimated_savings = savings::estimated_savings(self.count);
    }

    pub fn sub_group(&self, name: &str) -> Option<&SubGroup> {
        self.sub_groups.iter().find(|s| s.name == name)
    }
}

/// Whether every source row was examined by the partitioner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Coverage {
    /// Only a sample of rows was classified; unsampled rows are ungrouped
    Sampled,
    /// Every row was placed in a sub-group or the ungrouped bucket on its merits
    Complete,
}

impl Coverage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sampled => "sampled",
            Self::Complete => "complete",
        }
    }
}

impl std::fmt::Display for Coverage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Partitioner that produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMethod {
    ChunkedAnalysis,
    ColumnGrouping,
    UniqueValues,
    AiPlan,
    AiSubGroups,
    StructuredPlan,
}

impl ProcessingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChunkedAnalysis => "chunked_analysis",
            Self::ColumnGrouping => "column_grouping",
            Self::UniqueValues => "unique_values",
            Self::AiPlan => "ai_plan",
            Self::AiSubGroups => "ai_sub_groups",
            Self::StructuredPlan => "structured_plan",
        }
    }
}

impl std::fmt::Display for ProcessingMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where an applied grouping plan came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanSource {
    /// Returned by the AI backend and parsed successfully
    Oracle,
    /// Deterministic plan used because the backend was unavailable or wrong
    Fallback,
    /// Mixed: some sub-group plans came from the backend, others fell back
    Mixed,
}

impl PlanSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Oracle => "oracle",
            Self::Fallback => "fallback",
            Self::Mixed => "mixed",
        }
    }
}

impl std::fmt::Display for PlanSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Counters maintained by the validator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationCounts {
    pub total_rows: usize,
    pub grouped_records: usize,
    pub ungrouped_records: usize,
    pub main_groups: usize,
    pub total_sub_groups: usize,
    #[serde(default)]
    pub ungrouped_subgroups: usize,
}

/// Outcome of validating a grouping result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub counts: ValidationCounts,
}

/// Descriptive metadata attached to a grouping result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupingMetadata {
    pub processing_method: ProcessingMethod,
    pub total_rows: usize,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_column: Option<String>,
    #[serde(default)]
    pub total_chunks: usize,
    #[serde(default)]
    pub sampled_rows: usize,
    /// Frequent words shared across chunks (chunked analysis only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pattern_keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_source: Option<PlanSource>,
    /// The main grouping plan that was applied (AI plan mode only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<GroupingPlan>,
}

impl GroupingMetadata {
    pub fn new(processing_method: ProcessingMethod, total_rows: usize) -> Self {
        Self {
            processing_method,
            total_rows,
            created_at: Utc::now(),
            main_column: None,
            sub_column: None,
            total_chunks: 0,
            sampled_rows: 0,
            pattern_keywords: Vec::new(),
            plan_source: None,
            plan: None,
        }
    }
}

/// Root aggregate returned by every partitioner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupingResult {
    pub groups: Vec<MainGroup>,
    #[serde(default)]
    pub ungrouped_items: Vec<Item>,
    #[serde(default)]
    pub validation: ValidationReport,
    pub coverage: Coverage,
    pub metadata: GroupingMetadata,
}

impl GroupingResult {
    pub fn new(groups: Vec<MainGroup>, ungrouped_items: Vec<Item>, coverage: Coverage, metadata: GroupingMetadata) -> Self {
        Self {
            groups,
            ungrouped_items,
            validation: ValidationReport::default(),
            coverage,
            metadata,
        }
    }

    pub fn total_rows(&self) -> usize {
        self.metadata.total_rows
    }

    /// Items held by groups, direct and nested
    pub fn grouped_count(&self) -> usize {
        self.groups.iter().map(MainGroup::item_total).sum()
    }

    pub fn total_sub_groups(&self) -> usize {
        self.groups.iter().map(|g| g.sub_groups.len()).sum()
    }

    /// True when every source row is accounted for exactly once
    pub fn coverage_holds(&self) -> bool {
        self.grouped_count() + self.ungrouped_items.len() == self.total_rows()
    }

    pub fn group(&self, name: &str) -> Option<&MainGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn enabled_groups(&self) -> impl Iterator<Item = &MainGroup> {
        self.groups.iter().filter(|g| g.enabled)
    }
}

/// Deterministic 8-character identifier derived from `parts`
pub fn short_id(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update([0x1f]);
        }
        hasher.update(part.as_bytes());
    }
    let digest = hex::encode(hasher.finalize());
    digest[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id_deterministic() {
        let a = short_id(&["main", "0", "Electronics"]);
        let b = short_id(&["main", "0", "Electronics"]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
        assert_ne!(a, short_id(&["main", "1", "Electronics"]));
    }

    #[test]
    fn test_sub_group_ids_unique_within_parent() {
        let mut group = MainGroup::new(0, "Office");
        let first = group.push_sub_group("Pens", SubGroupOrigin::Column, vec![]).id.clone();
        let second = group.push_sub_group("Pens", SubGroupOrigin::Column, vec![]).id.clone();
        assert_ne!(first, second);
    }

    #[test]
    fn test_refresh_totals() {
        let mut group = MainGroup::new(0, "Furniture");
        group.push_sub_group("Chairs", SubGroupOrigin::Column, vec![Item::new(0, "Chair"), Item::new(1, "Stool")]);
        group.push_sub_group(UNGROUPED_SUB_GROUP, SubGroupOrigin::Ungrouped, vec![Item::new(2, "Thing")]);
        group.refresh_totals();
        assert_eq!(group.count, 3);
        assert_eq!(group.estimated_savings, "6%");
        assert!(group.sub_groups[1].is_ungrouped_subgroup);
    }

    #[test]
    fn test_item_deserialize_defaults_and_scalar_row_data() {
        let json = r#"{"id": "4", "name": "Desk", "row_data": {"Price": 120.5, "Name": "Desk", "Notes": null}}"#;
        let item: Item = serde_json::from_str(json).unwrap();
        assert_eq!(item.category, DEFAULT_CATEGORY);
        assert_eq!(item.quantity, 1);
        assert_eq!(item.row_data["Price"], "120.5");
        assert_eq!(item.row_data["Notes"], "");
    }

    #[test]
    fn test_enum_serialization() {
        assert_eq!(serde_json::to_string(&Coverage::Sampled).unwrap(), "\"sampled\"");
        assert_eq!(
            serde_json::to_string(&ProcessingMethod::ChunkedAnalysis).unwrap(),
            "\"chunked_analysis\""
        );
        assert_eq!(SubGroupOrigin::OtherItems.to_string(), "other_items");
    }
}
