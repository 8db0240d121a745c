//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Procure - Group product data for bulk purchasing
#[derive(Parser)]
#[command(name = "procure")]
#[command(about = "Groups CSV product data into main groups and sub-groups for bulk procurement", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Grouping config override (TOML); defaults to the data directory override or the built-in config
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Never consult the AI backend, even when AI_BACKEND is configured
    #[arg(long, global = true)]
    pub no_oracle: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Group a CSV file
    Group {
        /// CSV file to group
        #[arg(short, long)]
        file: PathBuf,

        /// Strategy: auto, chunked, columns, unique_values, ai_plan, ai_sub_groups
        #[arg(short, long, default_value = "auto")]
        strategy: String,

        /// Column whose values become main groups
        #[arg(short, long)]
        main_column: Option<String>,

        /// Column whose values become sub-groups
        #[arg(short = 'c', long)]
        sub_column: Option<String>,

        /// Write JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the id-keyed storage document, compacted if oversized
        #[arg(long)]
        legacy: bool,

        /// Print a procurement summary
        #[arg(long)]
        summary: bool,
    },

    /// Show headers, detected column roles and distinct-value counts
    Columns {
        /// CSV file to inspect
        #[arg(short, long)]
        file: PathBuf,

        /// Distinct values to list per column
        #[arg(long, default_value = "5")]
        top: usize,
    },

    /// Manage saved structured plans
    Plan {
        #[command(subcommand)]
        action: PlanAction,
    },

    /// Manage AI prompts
    Prompts {
        #[command(subcommand)]
        action: PromptsAction,
    },

    /// Show the effective grouping configuration
    Config,

    /// AI backend commands
    Oracle {
        #[command(subcommand)]
        action: OracleAction,
    },
}

#[derive(Subcommand)]
pub enum PlanAction {
    /// Capture a grouping result as a structured plan
    Create {
        /// Grouping result JSON (canonical or storage document)
        #[arg(short, long)]
        groups: PathBuf,

        /// Where to write the plan
        #[arg(short, long)]
        output: PathBuf,

        /// Plan name (defaults to a timestamped name)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Replay a structured plan on a CSV file
    Apply {
        /// CSV file to group
        #[arg(short, long)]
        file: PathBuf,

        /// Structured plan JSON
        #[arg(short, long)]
        plan: PathBuf,

        /// Write JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check a structured plan for problems
    Validate {
        /// Structured plan JSON
        #[arg(short, long)]
        plan: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum PromptsAction {
    /// List all prompts with their override status
    List,

    /// Show a prompt as the oracle will receive it
    Show {
        /// Prompt ID (e.g., main_group_plan)
        id: String,

        /// Section to print: all, system or user
        #[arg(long, default_value = "all")]
        section: String,
    },

    /// Copy an embedded prompt into the override directory for editing
    Customize {
        /// Prompt ID (e.g., sub_group_plan)
        id: String,

        /// Overwrite an existing override
        #[arg(long)]
        force: bool,
    },

    /// Show the override directory and the overrides in it
    Path,
}

#[derive(Subcommand)]
pub enum OracleAction {
    /// Check the configured AI backend and request a sample plan
    Test,
}
