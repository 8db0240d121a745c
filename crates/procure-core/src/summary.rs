//! Procurement summary of a grouping result

use serde::{Deserialize, Serialize};

use crate::models::{GroupingResult, SubGroup};
use crate::savings::average_savings;

/// One distinct item name within a sub-group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    /// Rows carrying this name
    pub count: usize,
    pub total_quantity: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubGroupSummary {
    pub name: String,
    pub item_count: usize,
    pub lines: Vec<LineItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub name: String,
    pub item_count: usize,
    pub estimated_savings: String,
    pub sub_groups: Vec<SubGroupSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcurementSummary {
    pub groups: Vec<GroupSummary>,
    pub total_groups: usize,
    pub total_sub_groups: usize,
    pub total_items: usize,
    pub total_quantity: u64,
    pub ungrouped_items: usize,
    pub average_savings: String,
}

/// Summarize the enabled groups of `result`; empty sub-groups are skipped
pub fn summarize(result: &GroupingResult) -> ProcurementSummary {
    let mut groups = Vec::new();
    let mut total_quantity = 0;
    for group in result.enabled_groups() {
        let sub_groups: Vec<SubGroupSummary> = group
            .sub_groups
            .iter()
            .filter(|s| !s.items.is_empty())
            .map(summarize_sub_group)
            .collect();
        total_quantity += sub_groups
            .iter()
            .flat_map(|s| s.lines.iter())
            .map(|l| l.total_quantity)
            .sum::<u64>();
        groups.push(GroupSummary {
            name: group.name.clone(),
            item_count: sub_groups.iter().map(|s| s.item_count).sum(),
            estimated_savings: group.estimated_savings.clone(),
            sub_groups,
        });
    }

    ProcurementSummary {
        total_groups: groups.len(),
        total_sub_groups: groups.iter().map(|g| g.sub_groups.len()).sum(),
        total_items: groups.iter().map(|g| g.item_count).sum(),
        total_quantity,
        ungrouped_items: result.ungrouped_items.len(),
        average_savings: average_savings(groups.iter().map(|g| g.estimated_savings.as_str())),
        groups,
    }
}

fn summarize_sub_group(sub_group: &SubGroup) -> SubGroupSummary {
    let mut lines: Vec<LineItem> = Vec::new();
    for item in &sub_group.items {
        let name = item.name.trim();
        match lines.iter_mut().find(|l| l.name == name) {
            Some(line) => {
                line.count += 1;
                line.total_quantity += u64::from(item.quantity);
            }
            None => lines.push(LineItem {
                name: name.to_string(),
                count: 1,
                total_quantity: u64::from(item.quantity),
            }),
        }
    }
    lines.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    SubGroupSummary {
        name: sub_group.name.clone(),
        item_count: sub_group.items.len(),
        lines,
    }
}
