//! Wire adapters for stored grouping documents
//!
//! Stored documents key main groups and sub-groups by id. The canonical
//! model keeps them in ordered lists; conversion in both directions keeps
//! document order, every group field and every item.

use std::fmt;
use std::marker::PhantomData;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, info};

use crate::error::Result;
use crate::models::{
    Coverage, GroupingMetadata, GroupingResult, Item, MainGroup, ProcessingMethod, SubGroup, SubGroupOrigin,
    ValidationReport,
};
use crate::validate::validate_and_count;

/// Largest document the store accepts, less a margin for the envelope
pub const MAX_DOCUMENT_BYTES: usize = 16 * 1024 * 1024 - 1024;

/// Sub-groups and ungrouped lists above this many items are cut to a preview when compacting
pub const MAX_STORED_ITEMS: usize = 50;

pub const PREVIEW_ITEMS: usize = 10;

/// A sub-group as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacySubGroup {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub is_ungrouped_subgroup: bool,
    #[serde(default)]
    pub origin: SubGroupOrigin,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// Item count before compaction cut `items` to a preview
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_items_count: Option<usize>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_truncated: bool,
}

/// A main group as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyMainGroup {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub core_type: Option<String>,
    #[serde(default, with = "keyed")]
    pub sub_groups: Vec<LegacySubGroup>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Item>,
    #[serde(default)]
    pub total_items: usize,
    #[serde(default)]
    pub estimated_savings: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_confidence: Option<f64>,
}

/// A whole stored grouping document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyDocument {
    #[serde(default, with = "keyed")]
    pub main_groups: Vec<LegacyMainGroup>,
    #[serde(default)]
    pub ungrouped_items: Vec<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<GroupingMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage: Option<Coverage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_results: Option<ValidationReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ungrouped_items_count: Option<usize>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub ungrouped_items_truncated: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub storage_optimized: bool,
    #[serde(default = "enabled")]
    pub full_data_available: bool,
}

fn enabled() -> bool {
    true
}

impl LegacyDocument {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Serialized size in bytes
    pub fn estimated_size(&self) -> Result<usize> {
        Ok(serde_json::to_vec(self)?.len())
    }
}

/// Convert a canonical result into its stored form
pub fn to_legacy(result: &GroupingResult) -> LegacyDocument {
    let main_groups = result
        .groups
        .iter()
        .map(|group| LegacyMainGroup {
            id: group.id.clone(),
            name: group.name.clone(),
            enabled: group.enabled,
            core_type: group.core_type.clone(),
            sub_groups: group.sub_groups.iter().map(legacy_sub_group).collect(),
            items: group.items.clone(),
            total_items: group.count,
            estimated_savings: group.estimated_savings.clone(),
            avg_confidence: group.avg_confidence,
        })
        .collect();

    LegacyDocument {
        main_groups,
        ungrouped_items: result.ungrouped_items.clone(),
        metadata: Some(result.metadata.clone()),
        coverage: Some(result.coverage),
        validation_results: Some(result.validation.clone()),
        ungrouped_items_count: None,
        ungrouped_items_truncated: false,
        storage_optimized: false,
        full_data_available: true,
    }
}

fn legacy_sub_group(sub_group: &SubGroup) -> LegacySubGroup {
    LegacySubGroup {
        id: sub_group.id.clone(),
        name: sub_group.name.clone(),
        items: sub_group.items.clone(),
        count: sub_group.count,
        is_ungrouped_subgroup: sub_group.is_ungrouped_subgroup,
        origin: sub_group.origin,
        reasoning: sub_group.reasoning.clone(),
        total_items_count: None,
        is_truncated: false,
    }
}

/// Convert a stored document back into the canonical model.
///
/// Documents written without metadata get column-grouping metadata whose
/// row total is the number of items present.
pub fn from_legacy(document: LegacyDocument) -> GroupingResult {
    let groups: Vec<MainGroup> = document
        .main_groups
        .into_iter()
        .map(|group| MainGroup {
            id: group.id,
            name: group.name,
            enabled: group.enabled,
            core_type: group.core_type,
            sub_groups: group
                .sub_groups
                .into_iter()
                .map(|s| SubGroup {
                    id: s.id,
                    name: s.name,
                    count: s.total_items_count.unwrap_or(s.count),
                    items: s.items,
                    is_ungrouped_subgroup: s.is_ungrouped_subgroup || s.origin == SubGroupOrigin::Ungrouped,
                    origin: s.origin,
                    reasoning: s.reasoning,
                })
                .collect(),
            items: group.items,
            count: group.total_items,
            estimated_savings: group.estimated_savings,
            avg_confidence: group.avg_confidence,
        })
        .collect();

    let ungrouped_items = document.ungrouped_items;
    let metadata = document.metadata.unwrap_or_else(|| {
        let held = groups.iter().map(MainGroup::item_total).sum::<usize>() + ungrouped_items.len();
        GroupingMetadata::new(ProcessingMethod::ColumnGrouping, held)
    });
    let mut result = GroupingResult::new(
        groups,
        ungrouped_items,
        document.coverage.unwrap_or(Coverage::Complete),
        metadata,
    );
    if let Some(report) = document.validation_results {
        result.validation = report;
    }
    result
}

/// Re-derive the validation report of a stored document in place.
///
/// The row total is taken to be grouped plus ungrouped items, so the
/// recount itself never reports a mismatch.
pub fn recount(document: &mut LegacyDocument) -> ValidationReport {
    let storage_optimized = document.storage_optimized;
    let mut result = from_legacy(document.clone());
    result.metadata.total_rows = result.grouped_count() + result.ungrouped_items.len();
    let report = validate_and_count(&mut result);
    *document = to_legacy(&result);
    document.storage_optimized = storage_optimized;
    debug!(total = report.counts.total_rows, "Recounted stored document");
    report
}

/// Compact a document that would exceed [`MAX_DOCUMENT_BYTES`]; returns whether it was compacted
pub fn compact_for_storage(document: &mut LegacyDocument) -> Result<bool> {
    compact_with_limit(document, MAX_DOCUMENT_BYTES)
}

/// Compact `document` when its serialized size exceeds `limit`.
///
/// Every sub-group records its full item count. Sub-groups and the ungrouped
/// list above [`MAX_STORED_ITEMS`] keep a [`PREVIEW_ITEMS`] preview without
/// row data.
pub fn compact_with_limit(document: &mut LegacyDocument, limit: usize) -> Result<bool> {
    let size = document.estimated_size()?;
    if size <= limit {
        return Ok(false);
    }

    let mut truncated = 0;
    for group in &mut document.main_groups {
        for sub_group in &mut group.sub_groups {
            let total = sub_group.total_items_count.unwrap_or(sub_group.items.len());
            sub_group.total_items_count = Some(total);
            if sub_group.items.len() > MAX_STORED_ITEMS {
                sub_group.items = preview(&sub_group.items);
                sub_group.is_truncated = true;
                truncated += 1;
            }
        }
    }
    if document.ungrouped_items.len() > MAX_STORED_ITEMS {
        document.ungrouped_items_count = Some(document.ungrouped_items.len());
        document.ungrouped_items = preview(&document.ungrouped_items);
        document.ungrouped_items_truncated = true;
    }
    document.storage_optimized = true;
    document.full_data_available = false;

    info!(
        size,
        compacted = document.estimated_size()?,
        truncated_sub_groups = truncated,
        "Compacted grouping document for storage"
    );
    Ok(true)
}

fn preview(items: &[Item]) -> Vec<Item> {
    items.iter().take(PREVIEW_ITEMS).map(Item::slim).collect()
}

/// Entries stored as a JSON object keyed by id
trait Keyed {
    fn key(&self) -> &str;
    fn set_key(&mut self, key: String);
}

impl Keyed for LegacySubGroup {
    fn key(&self) -> &str {
        &self.id
    }

    fn set_key(&mut self, key: String) {
        self.id = key;
    }
}

impl Keyed for LegacyMainGroup {
    fn key(&self) -> &str {
        &self.id
    }

    fn set_key(&mut self, key: String) {
        self.id = key;
    }
}

/// Serde adapter between `Vec<T>` and an id-keyed object that keeps entry order
mod keyed {
    use super::*;

    pub(super) fn serialize<S, T>(values: &[T], serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize + Keyed,
    {
        let mut map = serializer.serialize_map(Some(values.len()))?;
        for value in values {
            map.serialize_entry(value.key(), value)?;
        }
        map.end()
    }

    pub(super) fn deserialize<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + Keyed,
    {
        deserializer.deserialize_map(KeyedVisitor(PhantomData))
    }

    struct KeyedVisitor<T>(PhantomData<T>);

    impl<'de, T> Visitor<'de> for KeyedVisitor<T>
    where
        T: Deserialize<'de> + Keyed,
    {
        type Value = Vec<T>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an object of entries keyed by id")
        }

        fn visit_map<A>(self, mut access: A) -> std::result::Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut values = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((key, mut value)) = access.next_entry::<String, T>()? {
                if value.key().is_empty() {
                    value.set_key(key);
                }
                values.push(value);
            }
            Ok(values)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UNGROUPED_SUB_GROUP;

    fn items(range: std::ops::Range<usize>) -> Vec<Item> {
        range
            .map(|i| {
                let mut item = Item::new(i, format!("item {}", i));
                item.row_data.insert("Name".into(), format!("item {}", i));
                item
            })
            .collect()
    }

    fn result() -> GroupingResult {
        // "Zeta" sorts after "Alpha" by id, so order must come from the document
        let mut zeta = MainGroup::new(0, "Zeta");
        let pens = zeta.push_sub_group("Pens", SubGroupOrigin::Column, items(0..2));
        pens.reasoning = Some("writing".into());
        zeta.push_sub_group(UNGROUPED_SUB_GROUP, SubGroupOrigin::Ungrouped, items(2..3));
        zeta.refresh_totals();
        let mut alpha = MainGroup::new(1, "Alpha").with_core_type("furniture");
        alpha.push_sub_group("Chairs", SubGroupOrigin::Plan, items(3..5));
        alpha.refresh_totals();
        let mut result = GroupingResult::new(
            vec![zeta, alpha],
            items(5..6),
            Coverage::Complete,
            GroupingMetadata::new(ProcessingMethod::AiPlan, 6),
        );
        validate_and_count(&mut result);
        result
    }

    #[test]
    fn test_legacy_round_trip_keeps_order() {
        let original = result();
        let json = to_legacy(&original).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["main_groups"].is_object());
        assert!(value["main_groups"][&original.groups[0].id]["sub_groups"].is_object());

        let restored = from_legacy(LegacyDocument::from_json(&json).unwrap());
        assert_eq!(restored, original);
    }

    #[test]
    fn test_keys_fill_missing_ids() {
        let json = r#"{
            "main_groups": {
                "g1": {"name": "Office", "total_items": 1,
                       "sub_groups": {"default": {"name": "Default", "items": [{"id": "0", "name": "Pen"}]}}}
            },
            "ungrouped_items": []
        }"#;
        let result = from_legacy(LegacyDocument::from_json(json).unwrap());
        assert_eq!(result.groups[0].id, "g1");
        assert!(result.groups[0].enabled);
        assert_eq!(result.groups[0].sub_groups[0].id, "default");
        assert_eq!(result.total_rows(), 1);
        assert_eq!(result.metadata.processing_method, ProcessingMethod::ColumnGrouping);
    }

    #[test]
    fn test_recount_uses_held_items() {
        let mut document = to_legacy(&result());
        document.main_groups[0].total_items = 40;
        document.main_groups[1].sub_groups[0].count = 0;
        document.validation_results = None;

        let report = recount(&mut document);
        assert!(report.is_valid);
        assert_eq!(report.counts.total_rows, 6);
        assert_eq!(report.counts.grouped_records, 5);
        assert_eq!(report.counts.ungrouped_subgroups, 1);
        assert_eq!(document.main_groups[0].total_items, 3);
        assert_eq!(document.main_groups[1].sub_groups[0].count, 2);
        assert_eq!(document.validation_results, Some(report));
    }

    #[test]
    fn test_small_documents_are_not_compacted() {
        let mut document = to_legacy(&result());
        assert!(!compact_for_storage(&mut document).unwrap());
        assert!(!document.storage_optimized);
        assert!(document.full_data_available);
    }

    #[test]
    fn test_compaction_truncates_large_lists() {
        let mut group = MainGroup::new(0, "Bulk");
        group.push_sub_group("Many", SubGroupOrigin::Column, items(0..60));
        group.push_sub_group("Few", SubGroupOrigin::Column, items(60..63));
        group.refresh_totals();
        let result = GroupingResult::new(
            vec![group],
            items(63..143),
            Coverage::Complete,
            GroupingMetadata::new(ProcessingMethod::ColumnGrouping, 143),
        );
        let mut document = to_legacy(&result);

        assert!(compact_with_limit(&mut document, 1024).unwrap());
        assert!(document.storage_optimized);
        assert!(!document.full_data_available);

        let many = &document.main_groups[0].sub_groups[0];
        assert!(many.is_truncated);
        assert_eq!(many.items.len(), PREVIEW_ITEMS);
        assert_eq!(many.total_items_count, Some(60));
        assert!(many.items[0].row_data.is_empty());

        let few = &document.main_groups[0].sub_groups[1];
        assert!(!few.is_truncated);
        assert_eq!(few.items.len(), 3);
        assert_eq!(few.total_items_count, Some(3));
        assert!(!few.items[0].row_data.is_empty());

        assert_eq!(document.ungrouped_items.len(), PREVIEW_ITEMS);
        assert_eq!(document.ungrouped_items_count, Some(80));
        assert!(document.ungrouped_items_truncated);

        // counts survive the preview
        let restored = from_legacy(document);
        assert_eq!(restored.groups[0].sub_groups[0].count, 60);
    }
}
