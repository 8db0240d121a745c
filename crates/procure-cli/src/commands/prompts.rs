//! Oracle prompt commands
//!
//! Every command takes the library it works on, so overrides can be listed,
//! shown and written against any override directory.

use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use procure_core::prompts::{PromptId, PromptLibrary};
use procure_core::Strategy;

/// Which prompt sections `prompts show` prints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PromptSection {
    #[default]
    All,
    System,
    User,
}

impl std::str::FromStr for PromptSection {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "all" => Ok(PromptSection::All),
            "system" => Ok(PromptSection::System),
            "user" => Ok(PromptSection::User),
            other => Err(anyhow!("Unknown prompt section '{}' (expected all, system or user)", other)),
        }
    }
}

/// Strategies that send this prompt to the oracle
fn used_by(id: PromptId) -> Strategy {
    match id {
        PromptId::MainGroupPlan => Strategy::AiPlan,
        PromptId::SubGroupPlan => Strategy::AiSubGroups,
    }
}

fn parse_id(prompt_id: &str) -> Result<PromptId> {
    PromptId::parse(prompt_id).ok_or_else(|| {
        let known: Vec<&str> = PromptId::all().iter().map(|id| id.as_str()).collect();
        anyhow!("Unknown prompt ID '{}' (available: {})", prompt_id, known.join(", "))
    })
}

pub fn cmd_prompts_list(library: &mut PromptLibrary) -> Result<()> {
    println!("{:<18} {:>3}  {:<16}  {:<14}  SOURCE", "ID", "VER", "TASK TYPE", "USED BY");
    println!("{}", "-".repeat(78));
    for info in library.list() {
        let strategy = PromptId::parse(&info.id).map(used_by);
        let source = match (&info.override_path, info.has_override) {
            (Some(path), true) => path.display().to_string(),
            _ => "embedded".to_string(),
        };
        println!(
            "{:<18} {:>3}  {:<16}  {:<14}  {}",
            info.id,
            info.version,
            info.task_type,
            strategy.map(|s| s.as_str()).unwrap_or("-"),
            source
        );
    }
    Ok(())
}

pub fn cmd_prompts_show(library: &mut PromptLibrary, prompt_id: &str, section: PromptSection) -> Result<()> {
    let id = parse_id(prompt_id)?;
    let prompt = library.get(id)?;

    println!("# {} v{} ({})", prompt.metadata.id, prompt.metadata.version, prompt.metadata.task_type);
    println!("# used by: --strategy {}", used_by(id));
    match &prompt.override_path {
        Some(path) if prompt.is_override => println!("# source: {}", path.display()),
        _ => println!("# source: embedded"),
    }
    println!();

    let body = match section {
        PromptSection::All => Some(prompt.content.as_str()),
        PromptSection::System => prompt.system_section(),
        PromptSection::User => prompt.user_section(),
    };
    match body {
        Some(text) => println!("{}", text.trim()),
        None => bail!("Prompt '{}' has no {:?} section", id.as_str(), section),
    }
    Ok(())
}

/// Write the embedded default for `prompt_id` into the override directory
pub fn cmd_prompts_customize(library: &mut PromptLibrary, prompt_id: &str, force: bool) -> Result<PathBuf> {
    let id = parse_id(prompt_id)?;
    let path = library
        .override_path(id)
        .context("No prompt override directory on this system")?;
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    fs::write(&path, id.default_content()).with_context(|| format!("Failed to write {}", path.display()))?;
    library.clear_cache();

    println!("Wrote {}", path.display());
    println!("Edit it, keeping the frontmatter and the {{{{placeholders}}}}; it replaces the embedded prompt on the next run.");
    Ok(path)
}

/// Print the override directory and the files found in it
pub fn cmd_prompts_path(library: &PromptLibrary) -> Result<()> {
    let Some(dir) = library.override_dir() else {
        bail!("Could not determine the prompt override directory on this system");
    };
    println!("{}", dir.display());
    if !dir.exists() {
        eprintln!("(does not exist yet; `procure prompts customize <id>` creates it)");
        return Ok(());
    }

    let mut names: Vec<String> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.ends_with(".md"))
        .collect();
    names.sort();
    for name in names {
        let id = name.trim_end_matches(".md");
        match PromptId::parse(id) {
            Some(_) => println!("  {}", name),
            None => println!("  {} (ignored: no prompt with this ID)", name),
        }
    }
    Ok(())
}
