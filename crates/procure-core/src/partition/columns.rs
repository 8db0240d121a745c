//! Column-driven grouping
//!
//! Every row is examined, so these modes always report complete coverage.
//! Values are grouped by their cleaned name, so "chairs" and "Chairs" share
//! a group. Groups are ordered by row count, ties by first appearance.

use tracing::info;

use crate::dataset::{ColumnRoles, Dataset};
use crate::error::{Error, Result};
use crate::models::{
    Coverage, GroupingMetadata, GroupingResult, Item, MainGroup, ProcessingMethod, SubGroupOrigin, ALL_ITEMS_SUB_GROUP,
    UNGROUPED_SUB_GROUP,
};
use crate::naming::clean_group_name;

use super::OrderedBuckets;

/// One main group per distinct value of `main_column`, optionally split by `sub_column`.
///
/// Without a main column every distinct sub value becomes its own main group.
/// Blank main values are ungrouped; blank sub values go to a flagged
/// "Ungrouped Items" sub-group.
pub fn column_groups(dataset: &Dataset, main_column: Option<&str>, sub_column: Option<&str>) -> Result<GroupingResult> {
    dataset.ensure_rows()?;
    let main_column = match (main_column, sub_column) {
        (Some(main), _) => main,
        (None, Some(sub)) => return single_column_groups(dataset, sub),
        (None, None) => {
            return Err(Error::InvalidInput(
                "column grouping needs a main or sub-group column".into(),
            ))
        }
    };

    let main_idx = dataset.column_index(main_column)?;
    let sub_idx = sub_column.map(|c| dataset.column_index(c)).transpose()?;
    let roles = dataset.item_roles();

    let mut buckets: OrderedBuckets<usize> = OrderedBuckets::new();
    let mut ungrouped = Vec::new();
    for row in 0..dataset.len() {
        match dataset.cell(row, main_idx) {
            Some(value) => buckets.push(&clean_group_name(value), row),
            None => ungrouped.push(column_item(dataset, row, main_idx, sub_idx, &roles)),
        }
    }

    let mut groups = Vec::with_capacity(buckets.len());
    for (ordinal, bucket) in buckets.into_by_size().into_iter().enumerate() {
        let mut group = MainGroup::new(ordinal, bucket.name);
        match sub_idx {
            Some(sub_idx) => {
                let mut subs: OrderedBuckets<Item> = OrderedBuckets::new();
                let mut blank = Vec::new();
                for row in bucket.items {
                    let item = column_item(dataset, row, main_idx, Some(sub_idx), &roles);
                    match dataset.cell(row, sub_idx) {
                        Some(value) => subs.push(&clean_group_name(value), item),
                        None => blank.push(item),
                    }
                }
                for sub in subs.into_by_size() {
                    group.push_sub_group(sub.name, SubGroupOrigin::Column, sub.items);
                }
                if !blank.is_empty() {
                    group.push_sub_group(UNGROUPED_SUB_GROUP, SubGroupOrigin::Ungrouped, blank);
                }
            }
            None => {
                let items = bucket
                    .items
                    .into_iter()
                    .map(|row| column_item(dataset, row, main_idx, None, &roles))
                    .collect();
                group.push_sub_group(ALL_ITEMS_SUB_GROUP, SubGroupOrigin::Column, items);
            }
        }
        group.refresh_totals();
        groups.push(group);
    }

    let mut metadata = GroupingMetadata::new(ProcessingMethod::ColumnGrouping, dataset.len());
    metadata.main_column = Some(main_column.to_string());
    metadata.sub_column = sub_column.map(str::to_string);
    info!(
        main_column,
        sub_column = sub_column.unwrap_or(""),
        groups = groups.len(),
        ungrouped = ungrouped.len(),
        "Column grouping complete"
    );
    Ok(GroupingResult::new(groups, ungrouped, Coverage::Complete, metadata))
}

/// Every distinct value of `column` becomes a main group holding one "All Items" sub-group
pub fn single_column_groups(dataset: &Dataset, column: &str) -> Result<GroupingResult> {
    dataset.ensure_rows()?;
    let idx = dataset.column_index(column)?;
    let roles = dataset.item_roles();

    let mut buckets: OrderedBuckets<Item> = OrderedBuckets::new();
    let mut ungrouped = Vec::new();
    for row in 0..dataset.len() {
        match dataset.cell(row, idx) {
            Some(value) => {
                let item = dataset.build_item(row, value, value, &roles);
                buckets.push(&clean_group_name(value), item);
            }
            None => ungrouped.push(dataset.project_item(row, &roles)),
        }
    }

    let groups: Vec<MainGroup> = buckets
        .into_by_size()
        .into_iter()
        .enumerate()
        .map(|(ordinal, bucket)| {
            let mut group = MainGroup::new(ordinal, bucket.name);
            group.push_sub_group(ALL_ITEMS_SUB_GROUP, SubGroupOrigin::Column, bucket.items);
            group.refresh_totals();
            group
        })
        .collect();

    let mut metadata = GroupingMetadata::new(ProcessingMethod::ColumnGrouping, dataset.len());
    metadata.sub_column = Some(column.to_string());
    info!(column, groups = groups.len(), "Single-column grouping complete");
    Ok(GroupingResult::new(groups, ungrouped, Coverage::Complete, metadata))
}

/// One main group per distinct raw value, each with a single "<value> Items" sub-group
pub fn unique_value_groups(dataset: &Dataset, column: &str) -> Result<GroupingResult> {
    dataset.ensure_rows()?;
    let idx = dataset.column_index(column)?;
    let roles = dataset.item_roles();

    let mut buckets: OrderedBuckets<Item> = OrderedBuckets::new();
    let mut ungrouped = Vec::new();
    for row in 0..dataset.len() {
        let item = dataset.project_item(row, &roles);
        match dataset.cell(row, idx) {
            Some(value) => buckets.push(value, item.with_category(value)),
            None => ungrouped.push(item),
        }
    }

    let groups: Vec<MainGroup> = buckets
        .into_by_size()
        .into_iter()
        .enumerate()
        .map(|(ordinal, bucket)| {
            let sub_name = format!("{} Items", bucket.name);
            let mut group = MainGroup::new(ordinal, bucket.name);
            group.push_sub_group(sub_name, SubGroupOrigin::Column, bucket.items);
            group.refresh_totals();
            group
        })
        .collect();

    let mut metadata = GroupingMetadata::new(ProcessingMethod::UniqueValues, dataset.len());
    metadata.main_column = Some(column.to_string());
    info!(column, groups = groups.len(), ungrouped = ungrouped.len(), "Unique-value grouping complete");
    Ok(GroupingResult::new(groups, ungrouped, Coverage::Complete, metadata))
}

/// Item for a column-grouped row: named by its sub value when there is one,
/// else by the first column; the main value is its category
fn column_item(dataset: &Dataset, row: usize, main_idx: usize, sub_idx: Option<usize>, roles: &ColumnRoles) -> Item {
    let name = sub_idx
        .and_then(|c| dataset.cell(row, c))
        .or_else(|| dataset.cell(row, 0))
        .map(str::to_string)
        .unwrap_or_else(|| Item::placeholder_name(row));
    let category = dataset.cell(row, main_idx).unwrap_or(crate::models::DEFAULT_CATEGORY);
    dataset.build_item(row, name, category, roles)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> Dataset {
        Dataset::from_strings(
            &["Name", "Category", "Brand", "Price"],
            &[
                vec!["Laptop", "Electronics", "Dell", "900"],
                vec!["Phone", "Electronics", "", "500"],
                vec!["Chair", "Furniture", "Ikea", "50"],
                vec!["Desk", "furniture", "Ikea", "120"],
                vec!["Rice", "Food", "", "2"],
                vec!["Mystery", "", "Acme", "1"],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_column_groups_main_only() {
        let result = column_groups(&dataset(), Some("Category"), None).unwrap();
        let names: Vec<&str> = result.groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["Electronics", "Furniture", "Food"]);
        assert_eq!(result.groups[1].item_total(), 2);
        assert_eq!(result.groups[0].sub_groups[0].name, ALL_ITEMS_SUB_GROUP);
        assert_eq!(result.groups[0].sub_groups[0].items[0].name, "Laptop");
        assert_eq!(result.ungrouped_items.len(), 1);
        assert_eq!(result.coverage, Coverage::Complete);
        assert!(result.coverage_holds());
    }

    #[test]
    fn test_column_groups_with_sub_column() {
        let result = column_groups(&dataset(), Some("Category"), Some("Brand")).unwrap();
        let electronics = result.group("Electronics").unwrap();
        assert_eq!(electronics.sub_groups.len(), 2);
        assert_eq!(electronics.sub_groups[0].name, "Dell");
        let blank = &electronics.sub_groups[1];
        assert_eq!(blank.name, UNGROUPED_SUB_GROUP);
        assert!(blank.is_ungrouped_subgroup);
        assert_eq!(blank.items[0].name, "Phone");

        let furniture = result.group("Furniture").unwrap();
        assert_eq!(furniture.sub_groups.len(), 1);
        assert_eq!(furniture.sub_groups[0].items.len(), 2);
        assert_eq!(furniture.sub_groups[0].items[0].name, "Ikea");
        assert_eq!(furniture.sub_groups[0].items[0].category, "Furniture");
        assert!(result.coverage_holds());
    }

    #[test]
    fn test_single_column_mode() {
        let result = column_groups(&dataset(), None, Some("Brand")).unwrap();
        let names: Vec<&str> = result.groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["Ikea", "Dell", "Acme"]);
        assert_eq!(result.groups[0].sub_groups[0].items[0].name, "Ikea");
        assert_eq!(result.ungrouped_items.len(), 2);
        assert!(result.coverage_holds());
    }

    #[test]
    fn test_column_groups_requires_a_column() {
        assert!(matches!(column_groups(&dataset(), None, None), Err(Error::InvalidInput(_))));
        assert!(matches!(
            column_groups(&dataset(), Some("Nope"), None),
            Err(Error::ColumnNotFound(_))
        ));
    }

    #[test]
    fn test_unique_value_groups_scenario_b() {
        let dataset = Dataset::from_strings(
            &["Name", "Category"],
            &[
                vec!["a", "Electronics"],
                vec!["b", "Electronics"],
                vec!["c", "Furniture"],
                vec!["d", "Furniture"],
                vec!["e", "Food"],
            ],
        )
        .unwrap();
        let result = unique_value_groups(&dataset, "Category").unwrap();
        let summary: Vec<(&str, usize)> = result.groups.iter().map(|g| (g.name.as_str(), g.count)).collect();
        assert_eq!(summary, vec![("Electronics", 2), ("Furniture", 2), ("Food", 1)]);
        assert_eq!(result.groups[2].sub_groups[0].name, "Food Items");
        assert!(result.ungrouped_items.is_empty());
        assert_eq!(result.metadata.processing_method, ProcessingMethod::UniqueValues);
    }

    #[test]
    fn test_unique_value_groups_keep_raw_case() {
        let result = unique_value_groups(&dataset(), "Category").unwrap();
        assert!(result.group("furniture").is_some());
        assert!(result.group("Furniture").is_some());
        assert_eq!(result.ungrouped_items.len(), 1);
    }
}
