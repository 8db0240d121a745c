//! Grouping command implementation

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use procure_core::summary::ProcurementSummary;
use procure_core::wire::{compact_for_storage, to_legacy};
use procure_core::{summarize, GroupingEngine, GroupingRequest, GroupingResult, Strategy};

use super::{load_dataset, truncate, write_json};

/// Options for `procure group`
#[derive(Debug, Clone, Default)]
pub struct GroupOptions {
    pub strategy: Strategy,
    pub main_column: Option<String>,
    pub sub_column: Option<String>,
    pub output: Option<PathBuf>,
    pub legacy: bool,
    pub summary: bool,
}

impl GroupOptions {
    fn request(&self) -> GroupingRequest {
        GroupingRequest {
            strategy: self.strategy,
            main_column: self.main_column.clone(),
            sub_column: self.sub_column.clone(),
        }
    }
}

/// Group `file` and write the result.
///
/// JSON goes to `--output` or stdout. With `--summary` and no output file
/// only the summary is printed.
pub async fn cmd_group(engine: &GroupingEngine, file: &Path, options: &GroupOptions) -> Result<()> {
    let dataset = load_dataset(file)?;
    let result = engine
        .generate(&dataset, &options.request())
        .await
        .with_context(|| format!("Failed to group {}", file.display()))?;

    report_validation(&result);

    let output = options.output.as_deref();
    if output.is_some() || !options.summary {
        if options.legacy {
            let mut document = to_legacy(&result);
            if compact_for_storage(&mut document)? {
                eprintln!("Document exceeded the storage limit; large lists were cut to previews");
            }
            write_json(&document, output)?;
        } else {
            write_json(&result, output)?;
        }
    }

    if options.summary {
        print_summary(&summarize(&result));
    }
    Ok(())
}

fn report_validation(result: &GroupingResult) {
    let counts = &result.validation.counts;
    eprintln!(
        "{} rows: {} grouped into {} groups / {} sub-groups, {} ungrouped ({} coverage)",
        counts.total_rows,
        counts.grouped_records,
        counts.main_groups,
        counts.total_sub_groups,
        counts.ungrouped_records,
        result.coverage
    );
    if let Some(source) = result.metadata.plan_source {
        eprintln!("Plan source: {}", source);
    }
    for warning in &result.validation.warnings {
        eprintln!("  warning: {}", warning);
    }
    for error in &result.validation.errors {
        eprintln!("  error: {}", error);
    }
}

pub fn print_summary(summary: &ProcurementSummary) {
    println!("Procurement Summary\n");
    for group in &summary.groups {
        println!(
            "{} ({} items, est. savings {})",
            group.name, group.item_count, group.estimated_savings
        );
        for sub_group in &group.sub_groups {
            println!("  {} ({})", sub_group.name, sub_group.item_count);
            for line in &sub_group.lines {
                println!(
                    "    {:<40} {:>5} rows {:>7} units",
                    truncate(&line.name, 40),
                    line.count,
                    line.total_quantity
                );
            }
        }
    }
    println!();
    println!(
        "Total: {} groups, {} sub-groups, {} items ({} units), {} ungrouped",
        summary.total_groups,
        summary.total_sub_groups,
        summary.total_items,
        summary.total_quantity,
        summary.ungrouped_items
    );
    println!("Average estimated savings: {}", summary.average_savings);
}
