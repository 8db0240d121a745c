//! Grouping plans
//!
//! A plan says which raw column values belong to which named group. It is
//! produced by the AI backend (or the deterministic fallback below) and then
//! applied to the dataset by the AI partitioners.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::dataset::ValueCount;
use crate::naming::clean_group_name;
use crate::similarity::sequence_ratio;

/// Approach recorded on the deterministic fallback plan
pub const FALLBACK_APPROACH: &str = "fallback_direct_mapping";

const FALLBACK_REASONING: &str = "Direct mapping (fallback)";

/// One named group of a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanMapping {
    #[serde(default)]
    pub core_type: String,
    #[serde(default)]
    pub original_values: Vec<String>,
    #[serde(default)]
    pub total_count: usize,
    #[serde(default)]
    pub reasoning: String,
}

/// Summary the backend gives of its own plan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanStrategy {
    #[serde(default)]
    pub approach: String,
    #[serde(default)]
    pub total_main_groups: usize,
    #[serde(default)]
    pub total_sub_groups: usize,
    #[serde(default)]
    pub coverage_percentage: f64,
}

/// Main and sub-group mappings for a dataset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupingPlan {
    pub main_group_mappings: BTreeMap<String, PlanMapping>,
    #[serde(default)]
    pub sub_group_mappings: BTreeMap<String, PlanMapping>,
    #[serde(default)]
    pub grouping_strategy: PlanStrategy,
}

impl GroupingPlan {
    /// Direct mapping: every distinct value becomes its own group
    pub fn fallback(main_values: &[ValueCount], sub_values: &[ValueCount]) -> Self {
        Self {
            main_group_mappings: direct_mappings(main_values),
            sub_group_mappings: direct_mappings(sub_values),
            grouping_strategy: PlanStrategy {
                approach: FALLBACK_APPROACH.to_string(),
                total_main_groups: main_values.len(),
                total_sub_groups: sub_values.len(),
                coverage_percentage: 100.0,
            },
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.grouping_strategy.approach == FALLBACK_APPROACH
    }
}

fn direct_mappings(values: &[ValueCount]) -> BTreeMap<String, PlanMapping> {
    let mut mappings: BTreeMap<String, PlanMapping> = BTreeMap::new();
    for value in values {
        let name = clean_group_name(&value.value);
        let mapping = mappings.entry(name.clone()).or_insert_with(|| PlanMapping {
            core_type: name.to_lowercase().replace(' ', "_"),
            original_values: Vec::new(),
            total_count: 0,
            reasoning: FALLBACK_REASONING.to_string(),
        });
        mapping.original_values.push(value.value.clone());
        mapping.total_count += value.count;
    }
    mappings
}

/// One entry of a sub-group plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubGroupPlanEntry {
    pub name: String,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub reasoning: String,
}

/// How to split one main group's values into sub-groups
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubGroupPlan {
    pub sub_groups: Vec<SubGroupPlanEntry>,
}

/// Value -> group name lookup over plan mappings, with fuzzy matching
#[derive(Debug, Clone)]
pub struct PlanIndex<'a> {
    mappings: &'a BTreeMap<String, PlanMapping>,
    exact: HashMap<&'a str, &'a str>,
    threshold: f64,
    substring_score: f64,
}

impl<'a> PlanIndex<'a> {
    pub fn new(mappings: &'a BTreeMap<String, PlanMapping>, threshold: f64, substring_score: f64) -> Self {
        let mut exact = HashMap::new();
        for (group, mapping) in mappings {
            for value in mapping.original_values.iter().filter(|v| !v.trim().is_empty()) {
                // Later groups claim a shared value, as a plain reverse lookup would
                exact.insert(value.as_str(), group.as_str());
            }
        }
        Self {
            mappings,
            exact,
            threshold,
            substring_score,
        }
    }

    /// Group for `value`: exact lookup, then fuzzy match
    pub fn lookup(&self, value: &str) -> Option<&'a str> {
        self.exact
            .get(value)
            .copied()
            .or_else(|| self.best_match(value))
    }

    /// Best fuzzy match for an unplanned value.
    ///
    /// Substring containment either way scores `substring_score`; otherwise
    /// the sequence ratio is used. Only a strictly better score above the
    /// threshold replaces the current best. Blank values never match.
    pub fn best_match(&self, value: &str) -> Option<&'a str> {
        if value.trim().is_empty() {
            return None;
        }
        let value_lower = value.to_lowercase();
        let mut best: Option<&'a str> = None;
        let mut best_score = 0.0;
        for (group, mapping) in self.mappings {
            for original in mapping.original_values.iter().filter(|v| !v.trim().is_empty()) {
                let original_lower = original.to_lowercase();
                let score = if value_lower.contains(&original_lower) || original_lower.contains(&value_lower) {
                    self.substring_score
                } else {
                    sequence_ratio(&value_lower, &original_lower)
                };
                if score > best_score && score >= self.threshold {
                    best_score = score;
                    best = Some(group.as_str());
                }
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(values: &[(&str, usize)]) -> Vec<ValueCount> {
        values
            .iter()
            .map(|(v, c)| ValueCount {
                value: v.to_string(),
                count: *c,
            })
            .collect()
    }

    #[test]
    fn test_fallback_plan() {
        let plan = GroupingPlan::fallback(&counts(&[("office chair", 3), ("Desk", 1)]), &counts(&[("pens", 2)]));
        assert!(plan.is_fallback());
        assert_eq!(plan.grouping_strategy.coverage_percentage, 100.0);
        let chair = &plan.main_group_mappings["Office Chair"];
        assert_eq!(chair.core_type, "office_chair");
        assert_eq!(chair.original_values, vec!["office chair"]);
        assert_eq!(chair.total_count, 3);
        assert_eq!(chair.reasoning, "Direct mapping (fallback)");
        assert!(plan.sub_group_mappings.contains_key("Pens"));
    }

    #[test]
    fn test_fallback_merges_values_with_same_clean_name() {
        let plan = GroupingPlan::fallback(&counts(&[("pens", 2), ("PENS", 1)]), &[]);
        assert_eq!(plan.main_group_mappings.len(), 1);
        let pens = &plan.main_group_mappings["Pens"];
        assert_eq!(pens.original_values, vec!["pens", "PENS"]);
        assert_eq!(pens.total_count, 3);
    }

    #[test]
    fn test_plan_index_exact_and_fuzzy() {
        let plan = GroupingPlan::fallback(&counts(&[("Office Chairs", 2), ("Printer Paper", 4)]), &[]);
        let index = PlanIndex::new(&plan.main_group_mappings, 0.6, 0.8);
        assert_eq!(index.lookup("Office Chairs"), Some("Office Chairs"));
        // substring containment
        assert_eq!(index.lookup("chairs"), Some("Office Chairs"));
        // close spelling
        assert_eq!(index.lookup("Printer Papers"), Some("Printer Paper"));
        assert_eq!(index.lookup("Hammer"), None);
    }

    #[test]
    fn test_plan_index_ignores_blank_originals() {
        let json = r#"{"main_group_mappings": {
            "Anything": {"original_values": ["", "   "]},
            "Seating": {"original_values": ["Chair"]}
        }}"#;
        let plan: GroupingPlan = serde_json::from_str(json).unwrap();
        let index = PlanIndex::new(&plan.main_group_mappings, 0.6, 0.8);
        assert_eq!(index.lookup("Hammer"), None);
        assert_eq!(index.lookup(""), None);
        assert_eq!(index.lookup("Office Chair"), Some("Seating"));
    }

    #[test]
    fn test_deserialize_minimal_plan() {
        let json = r#"{"main_group_mappings": {"Seating": {"original_values": ["Chair"]}}}"#;
        let plan: GroupingPlan = serde_json::from_str(json).unwrap();
        assert_eq!(plan.main_group_mappings["Seating"].total_count, 0);
        assert!(plan.sub_group_mappings.is_empty());
    }
}
