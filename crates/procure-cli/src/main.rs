//! Procure CLI - Bulk-procurement product grouping
//!
//! Usage:
//!   procure group --file CSV                Group a CSV file (strategy picked automatically)
//!   procure columns --file CSV              Inspect columns before choosing a strategy
//!   procure plan create --groups R -o P     Save a grouping result as a reusable plan
//!   procure oracle test                     Check the AI backend

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use procure_core::prompts::PromptLibrary;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    // Logs go to stderr so JSON on stdout stays clean
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr).compact())
        .init();

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Group {
            file,
            strategy,
            main_column,
            sub_column,
            output,
            legacy,
            summary,
        } => {
            let engine = commands::build_engine(config, !cli.no_oracle)?;
            let options = commands::GroupOptions {
                strategy: strategy.parse()?,
                main_column,
                sub_column,
                output,
                legacy,
                summary,
            };
            commands::cmd_group(&engine, &file, &options).await
        }
        Commands::Columns { file, top } => commands::cmd_columns(&file, top),
        Commands::Plan { action } => {
            let engine = commands::build_engine(config, false)?;
            match action {
                PlanAction::Create { groups, output, name } => {
                    commands::cmd_plan_create(&engine, &groups, &output, name.as_deref())
                }
                PlanAction::Apply { file, plan, output } => {
                    commands::cmd_plan_apply(&engine, &file, &plan, output.as_deref())
                }
                PlanAction::Validate { plan } => commands::cmd_plan_validate(&plan),
            }
        }
        Commands::Prompts { action } => {
            let mut library = PromptLibrary::new();
            match action {
                PromptsAction::List => commands::cmd_prompts_list(&mut library),
                PromptsAction::Show { id, section } => {
                    commands::cmd_prompts_show(&mut library, &id, section.parse()?)
                }
                PromptsAction::Customize { id, force } => {
                    commands::cmd_prompts_customize(&mut library, &id, force).map(|_| ())
                }
                PromptsAction::Path => commands::cmd_prompts_path(&library),
            }
        }
        Commands::Config => commands::cmd_config(config),
        Commands::Oracle { action } => match action {
            OracleAction::Test => commands::cmd_oracle_test(config).await,
        },
    }
}
