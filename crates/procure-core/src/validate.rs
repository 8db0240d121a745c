//! Count validation for grouping results
//!
//! Recomputes every cached count from the items actually held, repairs
//! duplicate sub-group names and cross-checks the row accounting. Problems
//! are reported, never corrected silently: the result is always returned.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::models::{Coverage, GroupingResult, MainGroup, ValidationCounts, ValidationReport};

/// Validate `result` in place and store the report on it.
///
/// Running it again on the same result gives the same counts. Duplicate
/// names are reported by the call that renamed them.
pub fn validate_and_count(result: &mut GroupingResult) -> ValidationReport {
    let total_rows = result.total_rows();
    let ungrouped = result.ungrouped_items.len();
    let mut report = validate_groups(&mut result.groups, total_rows, ungrouped);
    if result.coverage == Coverage::Sampled {
        report.warnings.push(format!(
            "Only {} of {} rows were sampled; the rest are ungrouped",
            result.metadata.sampled_rows, total_rows
        ));
    }
    result.validation = report.clone();
    report
}

/// Validate a group tree against `total_rows`, where `ungrouped` rows sit outside it
pub fn validate_groups(groups: &mut [MainGroup], total_rows: usize, ungrouped: usize) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut grouped_records = 0;
    let mut total_sub_groups = 0;
    let mut ungrouped_subgroups = 0;

    for group in groups.iter_mut() {
        errors.extend(dedupe_sub_group_names(group));
        group.refresh_totals();

        for sub_group in &group.sub_groups {
            if sub_group.items.is_empty() {
                warnings.push(format!(
                    "Sub-group '{}' in main group '{}' is empty",
                    sub_group.name, group.name
                ));
            }
            if sub_group.is_ungrouped_subgroup {
                ungrouped_subgroups += 1;
            }
        }
        if group.count == 0 {
            warnings.push(format!("Main group '{}' has no items", group.name));
        }

        total_sub_groups += group.sub_groups.len();
        grouped_records += group.count;
    }

    let ungrouped_records = total_rows.saturating_sub(grouped_records);
    if grouped_records > total_rows {
        errors.push(format!(
            "Grouped records ({}) exceed total rows ({})",
            grouped_records, total_rows
        ));
    }
    if grouped_records + ungrouped != total_rows {
        errors.push(format!(
            "Row count mismatch: {} grouped + {} ungrouped != {} total rows",
            grouped_records, ungrouped, total_rows
        ));
    }

    let counts = ValidationCounts {
        total_rows,
        grouped_records,
        ungrouped_records,
        main_groups: groups.len(),
        total_sub_groups,
        ungrouped_subgroups,
    };
    let is_valid = errors.is_empty();
    if is_valid {
        debug!(grouped = grouped_records, ungrouped = ungrouped_records, "Validation passed");
    } else {
        warn!(errors = errors.len(), "Validation failed");
    }

    ValidationReport {
        is_valid,
        errors,
        warnings,
        counts,
    }
}

/// Rename repeated sub-group names to "<name> (1)", "<name> (2)", ...
///
/// The first occurrence keeps its name. Returns one error per rename.
fn dedupe_sub_group_names(group: &mut MainGroup) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for sub_group in &mut group.sub_groups {
        if seen.insert(sub_group.name.clone()) {
            continue;
        }
        errors.push(format!(
            "Duplicate sub-group name '{}' in main group '{}'",
            sub_group.name, group.name
        ));
        let mut suffix = 1;
        let renamed = loop {
            let candidate = format!("{} ({})", sub_group.name, suffix);
            if !seen.contains(&candidate) {
                break candidate;
            }
            suffix += 1;
        };
        seen.insert(renamed.clone());
        sub_group.name = renamed;
    }
    errors
}
