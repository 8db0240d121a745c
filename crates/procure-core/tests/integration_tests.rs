//! Integration tests for procure-core
//!
//! These tests exercise the full load → group → validate workflow across
//! every strategy, with and without an oracle.

use axum::http::StatusCode;
use procure_core::{
    models::{Coverage, GroupingMetadata, GroupingResult, Item, MainGroup, PlanSource, ProcessingMethod, SubGroupOrigin},
    summarize,
    test_utils::MockAiServer,
    validate_and_count,
    wire::{from_legacy, to_legacy},
    AIClient, Dataset, GroupingConfig, GroupingEngine, GroupingRequest, LegacyDocument, MockBackend, Strategy,
};

/// Mixed office catalog with a blank product cell
fn catalog_csv() -> &'static str {
    "Department,Product,Price,Quantity
Office,Gel Pen,2.50,10
Office,Ballpoint Pen,$1.00,20
Office,Stapler,9.99,1
Furniture,Office Chair,120,2
Furniture,,300,1
"
}

fn catalog() -> Dataset {
    Dataset::from_reader(catalog_csv().as_bytes()).expect("Failed to parse catalog")
}

fn engine() -> GroupingEngine {
    GroupingEngine::new(GroupingConfig::default()).expect("Failed to build engine")
}

fn scenario_a() -> Dataset {
    Dataset::from_strings(
        &["Name", "Price", "Category"],
        &[
            vec!["Apple iPhone 14 128GB Black", "999", "Electronics"],
            vec!["Samsung Phone S23", "899", "Electronics"],
            vec!["Office Chair Blue", "299", "Furniture"],
            vec!["Desk Lamp", "49", "Furniture"],
            vec!["Rice 1kg", "5", "Food"],
        ],
    )
    .unwrap()
}

const SERVER_PLAN: &str = r#"Here is the plan:
```json
{
  "main_group_mappings": {
    "Stationery": {"core_type": "stationery", "original_values": ["Office"], "total_count": 3, "reasoning": "desk supplies"},
    "Seating": {"core_type": "furniture", "original_values": ["Furniture"], "total_count": 2, "reasoning": "chairs and desks"}
  },
  "sub_group_mappings": {},
  "grouping_strategy": {"approach": "mock_server"}
}
```"#;

const SERVER_SUB_PLAN: &str =
    r#"{"sub_groups": [{"name": "Pens", "values": ["Gel Pen", "Ballpoint Pen"], "reasoning": "writing"}]}"#;

// =============================================================================
// Scenario Tests
// =============================================================================

#[tokio::test]
async fn test_scenario_a_chunked_core_types() {
    let result = engine().chunked_groups(&scenario_a()).await.unwrap();

    let electronics = result
        .groups
        .iter()
        .find(|g| g.core_type.as_deref() == Some("electronics"))
        .expect("No electronics group");
    assert_eq!(electronics.count, 2);

    let furniture = result
        .groups
        .iter()
        .find(|g| g.core_type.as_deref() == Some("furniture"))
        .expect("No furniture group");
    assert!(furniture
        .sub_groups
        .iter()
        .flat_map(|s| &s.items)
        .any(|i| i.name == "Office Chair Blue"));

    assert!(result
        .groups
        .iter()
        .any(|g| g.core_type.as_deref() == Some("food_beverages")));
    assert_eq!(result.validation.counts.grouped_records + result.validation.counts.ungrouped_records, 5);
    assert!(result.validation.is_valid);
}

#[tokio::test]
async fn test_scenario_b_unique_values() {
    let dataset = Dataset::from_strings(
        &["Item", "Category"],
        &[
            vec!["a", "Electronics"],
            vec!["b", "Electronics"],
            vec!["c", "Furniture"],
            vec!["d", "Furniture"],
            vec!["e", "Food"],
        ],
    )
    .unwrap();
    let result = engine().unique_value_groups(&dataset, "Category").await.unwrap();

    let counts: Vec<(&str, usize)> = result.groups.iter().map(|g| (g.name.as_str(), g.count)).collect();
    assert_eq!(counts, vec![("Electronics", 2), ("Furniture", 2), ("Food", 1)]);
    assert!(result.ungrouped_items.is_empty());
    assert_eq!(result.validation.counts.main_groups, 3);
}

#[test]
fn test_scenario_c_size_tokens_stripped() {
    let engine = engine();
    let small = engine.extract_core_product_type("Flour 1kg");
    let large = engine.extract_core_product_type("Flour 5kg");
    assert_eq!(small.category, large.category);
    assert_eq!(small.subcategory, large.subcategory);
    assert_eq!(small.confidence, large.confidence);
}

#[test]
fn test_scenario_d_duplicate_names() {
    let mut group = MainGroup::new(0, "Office");
    group.push_sub_group("Pens", SubGroupOrigin::Column, vec![Item::new(0, "Gel Pen")]);
    group.push_sub_group("Pens", SubGroupOrigin::Column, vec![Item::new(1, "Ballpoint Pen")]);
    let mut result = GroupingResult::new(
        vec![group],
        vec![],
        Coverage::Complete,
        GroupingMetadata::new(ProcessingMethod::ColumnGrouping, 2),
    );

    let report = validate_and_count(&mut result);
    assert_eq!(result.groups[0].sub_groups[0].name, "Pens");
    assert_eq!(result.groups[0].sub_groups[1].name, "Pens (1)");
    assert!(!report.is_valid);
    assert!(report.errors.iter().any(|e| e.contains("Duplicate sub-group name 'Pens'")));
}

// =============================================================================
// Invariant Tests
// =============================================================================

#[tokio::test]
async fn test_coverage_holds_for_every_strategy() {
    let engine = engine().with_oracle(AIClient::mock());
    let dataset = catalog();
    let requests = vec![
        GroupingRequest::new(Strategy::Chunked),
        GroupingRequest::new(Strategy::Columns).with_main_column("Department").with_sub_column("Product"),
        GroupingRequest::new(Strategy::Columns).with_sub_column("Product"),
        GroupingRequest::new(Strategy::UniqueValues).with_main_column("Department"),
        GroupingRequest::new(Strategy::AiPlan).with_main_column("Department").with_sub_column("Product"),
        GroupingRequest::new(Strategy::AiSubGroups).with_main_column("Department").with_sub_column("Product"),
        GroupingRequest::new(Strategy::AiSubGroups).with_sub_column("Product"),
        GroupingRequest::default(),
    ];

    for request in requests {
        let result = engine.generate(&dataset, &request).await.unwrap();
        let sub_group_total: usize = result.groups.iter().flat_map(|g| &g.sub_groups).map(|s| s.count).sum();
        assert_eq!(
            sub_group_total + result.ungrouped_items.len(),
            dataset.len(),
            "coverage broken for {:?}",
            request
        );
        assert!(result.validation.is_valid, "{:?}: {:?}", request, result.validation.errors);
    }
}

#[tokio::test]
async fn test_validation_is_idempotent() {
    let mut result = engine()
        .column_groups(&catalog(), Some("Department"), Some("Product"))
        .await
        .unwrap();
    let first = result.validation.clone();
    let second = validate_and_count(&mut result);
    let third = validate_and_count(&mut result);
    assert_eq!(first.counts, second.counts);
    assert_eq!(second, third);
}

#[tokio::test]
async fn test_rows_are_parsed_at_the_boundary() {
    let result = engine()
        .column_groups(&catalog(), Some("Department"), Some("Product"))
        .await
        .unwrap();
    let office = result.group("Office").unwrap();
    let pens = office.sub_group("Ballpoint Pen").unwrap();
    assert_eq!(pens.items[0].price, 1.0);
    assert_eq!(pens.items[0].quantity, 20);
    assert_eq!(pens.items[0].row_data.get("Price").map(String::as_str), Some("$1.00"));

    let furniture = result.group("Furniture").unwrap();
    let blank = furniture.sub_groups.iter().find(|s| s.is_ungrouped_subgroup).unwrap();
    assert_eq!(blank.items[0].price, 300.0);
}

// =============================================================================
// Oracle Fallback Tests
// =============================================================================

#[tokio::test]
async fn test_unhealthy_oracle_still_produces_valid_results() {
    let engine = engine().with_oracle(AIClient::Mock(MockBackend::unhealthy()));
    let dataset = catalog();

    let planned = engine.ai_powered_groups(&dataset, "Department", Some("Product")).await.unwrap();
    assert!(planned.validation.is_valid, "{:?}", planned.validation.errors);
    assert!(planned.coverage_holds());
    assert_eq!(planned.metadata.plan_source, Some(PlanSource::Fallback));
    assert!(planned.groups.iter().any(|g| g.name == "Office"));

    let split = engine.ai_sub_groups(&dataset, None, "Product").await.unwrap();
    assert!(split.validation.is_valid, "{:?}", split.validation.errors);
    assert!(split.coverage_holds());
    assert_eq!(split.metadata.plan_source, Some(PlanSource::Fallback));
}

#[tokio::test]
async fn test_failing_server_falls_back() {
    let server = MockAiServer::start_failing(StatusCode::INTERNAL_SERVER_ERROR).await;
    let dataset = catalog();

    for oracle in [
        AIClient::openai_compatible(&server.url(), "mock-model"),
        AIClient::ollama(&server.url(), "mock-model"),
    ] {
        let engine = engine().with_oracle(oracle);
        let result = engine.ai_powered_groups(&dataset, "Department", None).await.unwrap();
        assert_eq!(result.metadata.plan_source, Some(PlanSource::Fallback));
        assert!(result.validation.is_valid);
        assert!(result.coverage_holds());
    }
}

// =============================================================================
// HTTP Backend Tests
// =============================================================================

#[tokio::test]
async fn test_openai_compatible_plan() {
    let server = MockAiServer::start_with_responses(SERVER_PLAN, SERVER_SUB_PLAN).await;
    let engine = engine().with_oracle(AIClient::openai_compatible(&server.url(), "mock-model"));

    let result = engine.ai_powered_groups(&catalog(), "Department", None).await.unwrap();
    assert_eq!(result.metadata.plan_source, Some(PlanSource::Oracle));
    let names: Vec<&str> = result.groups.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(names, vec!["Stationery", "Seating"]);
    assert_eq!(result.group("Stationery").unwrap().count, 3);
    assert_eq!(result.group("Seating").unwrap().core_type.as_deref(), Some("furniture"));
    assert!(result.validation.is_valid);
}

#[tokio::test]
async fn test_ollama_sub_group_plan() {
    let server = MockAiServer::start_with_responses(SERVER_PLAN, SERVER_SUB_PLAN).await;
    let engine = engine().with_oracle(AIClient::ollama(&server.url(), "mock-model"));

    let result = engine.ai_sub_groups(&catalog(), None, "Product").await.unwrap();
    assert_eq!(result.metadata.plan_source, Some(PlanSource::Oracle));
    let group = &result.groups[0];
    let pens = group.sub_group("Pens").unwrap();
    assert_eq!(pens.items.len(), 2);
    assert_eq!(pens.reasoning.as_deref(), Some("writing"));
    assert!(group.sub_groups.iter().any(|s| s.origin == SubGroupOrigin::OtherItems));
    assert!(result.validation.is_valid);
    assert!(result.coverage_holds());
}

// =============================================================================
// Plan, Summary and Storage Tests
// =============================================================================

#[tokio::test]
async fn test_structured_plan_replay() {
    let engine = engine();
    let dataset = catalog();
    let source = engine.column_groups(&dataset, Some("Department"), None).await.unwrap();
    let plan = engine.create_structured_plan(&source, Some("Departments"));

    let json = serde_json::to_string(&plan).unwrap();
    let restored: procure_core::StructuredPlan = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, plan);

    let replayed = engine.apply_structured_plan(&dataset, &restored).unwrap();
    assert_eq!(replayed.metadata.processing_method, ProcessingMethod::StructuredPlan);
    assert!(replayed.validation.is_valid);
    assert!(replayed.coverage_holds());
}

#[tokio::test]
async fn test_summary_and_legacy_document() {
    let result = engine()
        .column_groups(&catalog(), Some("Department"), Some("Product"))
        .await
        .unwrap();

    let summary = summarize(&result);
    assert_eq!(summary.total_groups, 2);
    assert_eq!(summary.total_items, 5);
    assert_eq!(summary.total_quantity, 34);

    let json = to_legacy(&result).to_json().unwrap();
    let restored = from_legacy(LegacyDocument::from_json(&json).unwrap());
    assert_eq!(restored, result);
}
