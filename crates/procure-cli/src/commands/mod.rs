//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `group` - Group a CSV file with any strategy
//! - `columns` - Column inspection
//! - `plan` - Structured plan create/apply/validate
//! - `prompts` - Prompt library management commands
//! - `config` - Effective configuration display
//! - `oracle` - AI backend check

pub mod columns;
pub mod config;
pub mod group;
pub mod oracle;
pub mod plan;
pub mod prompts;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use procure_core::{AIClient, Dataset, GroupingConfig, GroupingEngine, GroupingResult, LegacyDocument};
use serde::Serialize;
use tracing::info;

// Re-export command functions for main.rs
pub use columns::*;
pub use config::*;
pub use group::*;
pub use oracle::*;
pub use plan::*;
pub use prompts::*;

/// Load the grouping config from `path`, or the default override/embedded config
pub fn load_config(path: Option<&Path>) -> Result<GroupingConfig> {
    match path {
        Some(path) => GroupingConfig::load_from(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => GroupingConfig::load().context("Failed to load grouping config"),
    }
}

/// Build the engine, attaching the AI backend from the environment when asked
pub fn build_engine(config_path: Option<&Path>, use_oracle: bool) -> Result<GroupingEngine> {
    let engine = GroupingEngine::new(load_config(config_path)?).context("Invalid grouping config")?;
    if !use_oracle {
        return Ok(engine);
    }
    match AIClient::from_env() {
        Some(client) => Ok(engine.with_oracle(client)),
        None => {
            info!("No AI backend configured; AI strategies use deterministic fallbacks");
            Ok(engine)
        }
    }
}

pub fn load_dataset(path: &Path) -> Result<Dataset> {
    Dataset::from_path(path).with_context(|| format!("Failed to read CSV {}", path.display()))
}

/// Read a grouping result written by `procure group`, in either output form
pub fn read_result(path: &Path) -> Result<GroupingResult> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    match serde_json::from_str::<GroupingResult>(&content) {
        Ok(result) => Ok(result),
        Err(_) => {
            let document = LegacyDocument::from_json(&content)
                .with_context(|| format!("{} is not a grouping result", path.display()))?;
            Ok(procure_core::wire::from_legacy(document))
        }
    }
}

/// Pretty JSON to `output`, or stdout when none is given
pub fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    match output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Wrote {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
