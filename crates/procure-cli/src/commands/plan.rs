//! Structured plan command implementations

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use procure_core::structured_plan::validate_structured_plan;
use procure_core::{GroupingEngine, StructuredPlan};

use super::{load_dataset, read_result, write_json};

pub fn read_plan(path: &Path) -> Result<StructuredPlan> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("{} is not a structured plan", path.display()))
}

/// Capture a saved grouping result as a plan
pub fn cmd_plan_create(engine: &GroupingEngine, groups: &Path, output: &Path, name: Option<&str>) -> Result<()> {
    let result = read_result(groups)?;
    let plan = engine.create_structured_plan(&result, name);
    write_json(&plan, Some(output))?;
    println!(
        "Created plan '{}' ({}) with {} rules",
        plan.name,
        plan.id,
        plan.grouping_rules.len()
    );
    Ok(())
}

pub fn cmd_plan_apply(engine: &GroupingEngine, file: &Path, plan: &Path, output: Option<&Path>) -> Result<()> {
    let dataset = load_dataset(file)?;
    let plan = read_plan(plan)?;
    let result = engine
        .apply_structured_plan(&dataset, &plan)
        .with_context(|| format!("Failed to apply plan '{}'", plan.name))?;
    eprintln!(
        "Plan '{}': {} groups, {} ungrouped",
        plan.name,
        result.groups.len(),
        result.ungrouped_items.len()
    );
    write_json(&result, output)
}

pub fn cmd_plan_validate(plan: &Path) -> Result<()> {
    let plan = read_plan(plan)?;
    let problems = validate_structured_plan(&plan);
    if problems.is_empty() {
        println!(
            "Plan '{}' is valid: {} groups, {} rules",
            plan.name,
            plan.main_groups.len(),
            plan.grouping_rules.len()
        );
        return Ok(());
    }
    for problem in &problems {
        println!("  - {}", problem);
    }
    bail!("Plan '{}' has {} problem(s)", plan.name, problems.len())
}
