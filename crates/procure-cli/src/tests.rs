//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use std::fs;
use std::path::{Path, PathBuf};

use procure_core::prompts::{PromptId, PromptLibrary};
use procure_core::wire::to_legacy;
use procure_core::{
    AIClient, GroupingConfig, GroupingEngine, GroupingResult, LegacyDocument, StructuredPlan, Strategy,
};
use tempfile::TempDir;

use crate::commands::{self, truncate, GroupOptions, PromptSection};

const CATALOG: &str = "\
Department,Product,Price,Quantity
Office,Gel Pen Blue,1.50,10
Office,Gel Pen Black,1.50,12
Office,Stapler,8.00,2
Furniture,Office Chair,120.00,4
Furniture,Standing Desk,350.00,1
";

fn setup_engine() -> GroupingEngine {
    GroupingEngine::new(GroupingConfig::default()).unwrap()
}

fn write_catalog(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("catalog.csv");
    fs::write(&path, CATALOG).unwrap();
    path
}

fn read_json_result(path: &Path) -> GroupingResult {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

fn column_options(output: PathBuf) -> GroupOptions {
    GroupOptions {
        strategy: Strategy::Columns,
        main_column: Some("Department".to_string()),
        sub_column: Some("Product".to_string()),
        output: Some(output),
        ..GroupOptions::default()
    }
}

// ========== Group Command Tests ==========

#[tokio::test]
async fn test_cmd_group_writes_result() {
    let dir = TempDir::new().unwrap();
    let csv = write_catalog(&dir);
    let output = dir.path().join("groups.json");

    commands::cmd_group(&setup_engine(), &csv, &column_options(output.clone()))
        .await
        .unwrap();

    let result = read_json_result(&output);
    assert!(result.group("Office").is_some());
    assert!(result.group("Furniture").is_some());
    assert_eq!(result.grouped_count() + result.ungrouped_items.len(), 5);
}

#[tokio::test]
async fn test_cmd_group_legacy_output() {
    let dir = TempDir::new().unwrap();
    let csv = write_catalog(&dir);
    let output = dir.path().join("legacy.json");
    let options = GroupOptions {
        legacy: true,
        ..column_options(output.clone())
    };

    commands::cmd_group(&setup_engine(), &csv, &options).await.unwrap();

    let document = LegacyDocument::from_json(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(document.main_groups.len(), 2);
    assert!(!document.storage_optimized);
}

#[tokio::test]
async fn test_cmd_group_with_mock_oracle() {
    let dir = TempDir::new().unwrap();
    let csv = write_catalog(&dir);
    let output = dir.path().join("ai.json");
    let engine = setup_engine().with_oracle(AIClient::mock());
    let options = GroupOptions {
        strategy: Strategy::AiPlan,
        ..column_options(output.clone())
    };

    commands::cmd_group(&engine, &csv, &options).await.unwrap();

    let result = read_json_result(&output);
    assert!(result.coverage_holds());
}

#[tokio::test]
async fn test_cmd_group_unique_values_requires_column() {
    let dir = TempDir::new().unwrap();
    let csv = write_catalog(&dir);
    let options = GroupOptions {
        strategy: Strategy::UniqueValues,
        output: Some(dir.path().join("out.json")),
        ..GroupOptions::default()
    };

    let result = commands::cmd_group(&setup_engine(), &csv, &options).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_cmd_group_missing_file() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.csv");
    let result = commands::cmd_group(&setup_engine(), &missing, &GroupOptions::default()).await;
    assert!(result.is_err());
}

// ========== Columns Command Tests ==========

#[test]
fn test_cmd_columns() {
    let dir = TempDir::new().unwrap();
    let csv = write_catalog(&dir);
    assert!(commands::cmd_columns(&csv, 3).is_ok());
}

#[test]
fn test_cmd_columns_header_only_file() {
    let dir = TempDir::new().unwrap();
    let csv = dir.path().join("empty.csv");
    fs::write(&csv, "Department,Product\n").unwrap();
    assert!(commands::cmd_columns(&csv, 3).is_ok());
}

// ========== Plan Command Tests ==========

#[tokio::test]
async fn test_cmd_plan_create_and_apply() {
    let dir = TempDir::new().unwrap();
    let csv = write_catalog(&dir);
    let groups = dir.path().join("groups.json");
    let plan_path = dir.path().join("plan.json");
    let applied = dir.path().join("applied.json");
    let engine = setup_engine();

    commands::cmd_group(&engine, &csv, &column_options(groups.clone()))
        .await
        .unwrap();
    commands::cmd_plan_create(&engine, &groups, &plan_path, Some("Quarterly")).unwrap();

    let plan: StructuredPlan = serde_json::from_str(&fs::read_to_string(&plan_path).unwrap()).unwrap();
    assert_eq!(plan.name, "Quarterly");
    assert_eq!(plan.main_groups.len(), 2);
    assert_eq!(plan.grouping_rules.len(), 2);

    commands::cmd_plan_validate(&plan_path).unwrap();
    commands::cmd_plan_apply(&engine, &csv, &plan_path, Some(&applied)).unwrap();

    let result = read_json_result(&applied);
    assert_eq!(result.total_rows(), 5);
    assert_eq!(result.grouped_count() + result.ungrouped_items.len(), 5);
}

#[tokio::test]
async fn test_cmd_plan_create_from_legacy_document() {
    let dir = TempDir::new().unwrap();
    let csv = write_catalog(&dir);
    let legacy = dir.path().join("legacy.json");
    let plan_path = dir.path().join("plan.json");
    let engine = setup_engine();
    let options = GroupOptions {
        legacy: true,
        ..column_options(legacy.clone())
    };

    commands::cmd_group(&engine, &csv, &options).await.unwrap();
    commands::cmd_plan_create(&engine, &legacy, &plan_path, None).unwrap();

    let plan: StructuredPlan = serde_json::from_str(&fs::read_to_string(&plan_path).unwrap()).unwrap();
    assert!(plan.name.starts_with("Structured Plan "));
    assert!(plan.group("Office").is_some());
}

#[test]
fn test_cmd_plan_validate_reports_problems() {
    let dir = TempDir::new().unwrap();
    let plan_path = dir.path().join("bad.json");
    fs::write(
        &plan_path,
        r#"{
            "id": "p1",
            "name": "Broken",
            "created_at": "2024-01-01T00:00:00Z",
            "grouping_rules": [{"group_name": "Missing", "similarity_threshold": 1.5}],
            "main_groups": [{"name": "Office"}, {"name": "Office"}]
        }"#,
    )
    .unwrap();

    let err = commands::cmd_plan_validate(&plan_path).unwrap_err();
    assert!(err.to_string().contains("Broken"));
}

#[test]
fn test_cmd_plan_apply_rejects_invalid_plan() {
    let dir = TempDir::new().unwrap();
    let csv = write_catalog(&dir);
    let plan_path = dir.path().join("bad.json");
    fs::write(
        &plan_path,
        r#"{"id": "p1", "name": "", "created_at": "2024-01-01T00:00:00Z"}"#,
    )
    .unwrap();

    let result = commands::cmd_plan_apply(&setup_engine(), &csv, &plan_path, None);
    assert!(result.is_err());
}

#[test]
fn test_read_plan_not_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("plan.json");
    fs::write(&path, "not json").unwrap();
    assert!(commands::read_plan(&path).is_err());
}

// ========== Result Loading Tests ==========

#[tokio::test]
async fn test_read_result_accepts_both_forms() {
    let dir = TempDir::new().unwrap();
    let csv = write_catalog(&dir);
    let canonical = dir.path().join("groups.json");
    let engine = setup_engine();

    commands::cmd_group(&engine, &csv, &column_options(canonical.clone()))
        .await
        .unwrap();
    let result = commands::read_result(&canonical).unwrap();

    let legacy = dir.path().join("legacy.json");
    fs::write(&legacy, to_legacy(&result).to_json().unwrap()).unwrap();
    let restored = commands::read_result(&legacy).unwrap();

    assert_eq!(restored.groups.len(), result.groups.len());
    assert_eq!(restored.grouped_count(), result.grouped_count());
}

#[test]
fn test_read_result_rejects_other_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("other.json");
    fs::write(&path, "42").unwrap();
    assert!(commands::read_result(&path).is_err());
}

// ========== Prompts Tests ==========

fn temp_library(dir: &TempDir) -> PromptLibrary {
    PromptLibrary::with_override_dir(dir.path().join("overrides"))
}

#[test]
fn test_cmd_prompts_list() {
    let dir = TempDir::new().unwrap();
    assert!(commands::cmd_prompts_list(&mut temp_library(&dir)).is_ok());
}

#[test]
fn test_cmd_prompts_show_sections() {
    let dir = TempDir::new().unwrap();
    let mut library = temp_library(&dir);
    for section in [PromptSection::All, PromptSection::System, PromptSection::User] {
        assert!(commands::cmd_prompts_show(&mut library, "main_group_plan", section).is_ok());
    }
    assert_eq!("User".parse::<PromptSection>().unwrap(), PromptSection::User);
    assert!("footer".parse::<PromptSection>().is_err());
}

#[test]
fn test_cmd_prompts_show_unknown_id() {
    let dir = TempDir::new().unwrap();
    let err = commands::cmd_prompts_show(&mut temp_library(&dir), "classify_merchant", PromptSection::All).unwrap_err();
    assert!(err.to_string().contains("main_group_plan"));
}

#[test]
fn test_cmd_prompts_customize_writes_override() {
    let dir = TempDir::new().unwrap();
    let mut library = temp_library(&dir);

    let path = commands::cmd_prompts_customize(&mut library, "sub_group_plan", false).unwrap();
    assert_eq!(path, dir.path().join("overrides").join("sub_group_plan.md"));
    assert_eq!(fs::read_to_string(&path).unwrap(), PromptId::SubGroupPlan.default_content());

    let prompt = library.get(PromptId::SubGroupPlan).unwrap();
    assert!(prompt.is_override);
    assert!(library.has_override(PromptId::SubGroupPlan));
    assert!(!library.has_override(PromptId::MainGroupPlan));
}

#[test]
fn test_cmd_prompts_customize_keeps_existing_override() {
    let dir = TempDir::new().unwrap();
    let mut library = temp_library(&dir);
    let path = commands::cmd_prompts_customize(&mut library, "main_group_plan", false).unwrap();
    fs::write(&path, "edited").unwrap();

    assert!(commands::cmd_prompts_customize(&mut library, "main_group_plan", false).is_err());
    assert_eq!(fs::read_to_string(&path).unwrap(), "edited");

    commands::cmd_prompts_customize(&mut library, "main_group_plan", true).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), PromptId::MainGroupPlan.default_content());
}

#[test]
fn test_cmd_prompts_path() {
    let dir = TempDir::new().unwrap();
    let mut library = temp_library(&dir);
    // missing directory is reported, not an error
    assert!(commands::cmd_prompts_path(&library).is_ok());

    commands::cmd_prompts_customize(&mut library, "main_group_plan", false).unwrap();
    fs::write(dir.path().join("overrides").join("stray.md"), "x").unwrap();
    assert!(commands::cmd_prompts_path(&library).is_ok());
}

// ========== Config Tests ==========

#[test]
fn test_cmd_config_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("grouping.toml");
    fs::write(&path, procure_core::config::embedded_config()).unwrap();
    assert!(commands::cmd_config(Some(&path)).is_ok());
}

#[test]
fn test_build_engine_without_oracle() {
    let engine = commands::build_engine(None, false).unwrap();
    assert!(engine.oracle().is_none());
}

// ========== Helper Tests ==========

#[test]
fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("exactly10!", 10), "exactly10!");
    assert_eq!(truncate("this is too long", 10), "this is...");
    assert_eq!(truncate("ééééééé", 5), "éé...");
}

#[test]
fn test_strategy_parse() {
    assert_eq!("ai-plan".parse::<Strategy>().unwrap(), Strategy::AiPlan);
    assert_eq!("column".parse::<Strategy>().unwrap(), Strategy::Columns);
    assert!("fuzzy".parse::<Strategy>().is_err());
}
