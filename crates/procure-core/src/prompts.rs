//! Prompt templates for the AI backend
//!
//! Each prompt is resolved in two layers:
//! 1. An override file in the data dir (~/.local/share/procure/prompts/overrides/<id>.md)
//! 2. The default compiled into the binary
//!
//! Prompt files carry YAML frontmatter followed by `# System` and `# User`
//! sections. Templates use `{{var}}` placeholders and `{{#if var}}...{{/if}}`
//! blocks that are dropped when `var` is missing or empty.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{Error, Result};

mod defaults {
    pub const MAIN_GROUP_PLAN: &str = include_str!("../../../prompts/main_group_plan.md");
    pub const SUB_GROUP_PLAN: &str = include_str!("../../../prompts/sub_group_plan.md");
}

/// Known prompt IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    /// Map main (and optionally sub) column values onto groups
    MainGroupPlan,
    /// Split one group's values into sub-groups
    SubGroupPlan,
}

impl PromptId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MainGroupPlan => "main_group_plan",
            Self::SubGroupPlan => "sub_group_plan",
        }
    }

    pub fn all() -> &'static [PromptId] {
        &[Self::MainGroupPlan, Self::SubGroupPlan]
    }

    /// Look up a prompt by its string identifier
    pub fn parse(id: &str) -> Option<PromptId> {
        Self::all().iter().copied().find(|p| p.as_str() == id)
    }

    pub fn default_content(&self) -> &'static str {
        match self {
            Self::MainGroupPlan => defaults::MAIN_GROUP_PLAN,
            Self::SubGroupPlan => defaults::SUB_GROUP_PLAN,
        }
    }
}

/// Prompt frontmatter
#[derive(Debug, Clone, Deserialize)]
pub struct PromptMetadata {
    pub id: String,
    pub version: u32,
    /// Kind of task the prompt asks for (grouping_plan, ...)
    pub task_type: String,
}

/// A loaded prompt
#[derive(Debug, Clone)]
pub struct Prompt {
    pub metadata: PromptMetadata,
    /// Body after the frontmatter
    pub content: String,
    pub is_override: bool,
    pub override_path: Option<PathBuf>,
}

impl Prompt {
    pub fn system_section(&self) -> Option<&str> {
        extract_section(&self.content, "# System")
    }

    pub fn user_section(&self) -> Option<&str> {
        extract_section(&self.content, "# User")
    }

    /// Render the whole body
    pub fn render(&self, vars: &HashMap<&str, &str>) -> String {
        fill_template(&self.content, vars)
    }

    /// Render the system section; empty when the prompt has none
    pub fn render_system(&self, vars: &HashMap<&str, &str>) -> String {
        self.system_section()
            .map(|s| fill_template(s, vars))
            .unwrap_or_default()
    }

    /// Render the user section, or the whole body if there is no `# User` header
    pub fn render_user(&self, vars: &HashMap<&str, &str>) -> String {
        match self.user_section() {
            Some(user) => fill_template(user, vars),
            None => self.render(vars),
        }
    }
}

/// Loads and caches prompts
pub struct PromptLibrary {
    override_dir: Option<PathBuf>,
    cache: HashMap<PromptId, Prompt>,
}

impl PromptLibrary {
    /// Library with the default override directory
    pub fn new() -> Self {
        Self {
            override_dir: default_prompts_dir(),
            cache: HashMap::new(),
        }
    }

    pub fn with_override_dir(path: PathBuf) -> Self {
        Self {
            override_dir: Some(path),
            cache: HashMap::new(),
        }
    }

    /// Library that never looks at override files
    pub fn embedded_only() -> Self {
        Self {
            override_dir: None,
            cache: HashMap::new(),
        }
    }

    /// Get a prompt, loading it on first use
    pub fn get(&mut self, id: PromptId) -> Result<&Prompt> {
        if !self.cache.contains_key(&id) {
            let prompt = self.load(id)?;
            self.cache.insert(id, prompt);
        }
        self.cache
            .get(&id)
            .ok_or_else(|| Error::NotFound(format!("prompt {}", id.as_str())))
    }

    fn load(&self, id: PromptId) -> Result<Prompt> {
        if let Some(path) = self.override_path(id).filter(|p| p.exists()) {
            let content = fs::read_to_string(&path)
                .map_err(|e| Error::InvalidData(format!("Failed to read prompt override: {}", e)))?;
            let (metadata, body) = parse_prompt(&content)?;
            return Ok(Prompt {
                metadata,
                content: body,
                is_override: true,
                override_path: Some(path),
            });
        }

        let (metadata, body) = parse_prompt(id.default_content())?;
        Ok(Prompt {
            metadata,
            content: body,
            is_override: false,
            override_path: None,
        })
    }

    /// All prompts with their override status
    pub fn list(&mut self) -> Vec<PromptInfo> {
        let mut infos = Vec::new();
        for &id in PromptId::all() {
            let has_override = self.has_override(id);
            let override_path = if has_override { self.override_path(id) } else { None };
            let (version, task_type) = match self.get(id) {
                Ok(p) => (p.metadata.version, p.metadata.task_type.clone()),
                Err(_) => (0, String::new()),
            };
            infos.push(PromptInfo {
                id: id.as_str().to_string(),
                version,
                task_type,
                has_override,
                override_path,
            });
        }
        infos
    }

    pub fn has_override(&self, id: PromptId) -> bool {
        self.override_path(id).is_some_and(|p| p.exists())
    }

    /// Where the override for `id` would live
    pub fn override_path(&self, id: PromptId) -> Option<PathBuf> {
        self.override_dir
            .as_ref()
            .map(|d| d.join(format!("{}.md", id.as_str())))
    }

    pub fn override_dir(&self) -> Option<&PathBuf> {
        self.override_dir.as_ref()
    }

    /// Forget loaded prompts so edited overrides are picked up
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::new()
    }
}

/// Listing entry for a prompt
#[derive(Debug, Clone)]
pub struct PromptInfo {
    pub id: String,
    pub version: u32,
    pub task_type: String,
    pub has_override: bool,
    pub override_path: Option<PathBuf>,
}

pub fn default_prompts_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("procure").join("prompts").join("overrides"))
}

/// Split a prompt file into frontmatter and body
fn parse_prompt(content: &str) -> Result<(PromptMetadata, String)> {
    let content = content.trim();
    let rest = content
        .strip_prefix("---")
        .ok_or_else(|| Error::InvalidData("Prompt must start with YAML frontmatter (---)".into()))?;

    let end = rest
        .find("---")
        .ok_or_else(|| Error::InvalidData("Prompt frontmatter not closed (missing second ---)".into()))?;

    let metadata: PromptMetadata = serde_yaml::from_str(rest[..end].trim())
        .map_err(|e| Error::InvalidData(format!("Invalid prompt frontmatter: {}", e)))?;

    Ok((metadata, rest[end + 3..].trim().to_string()))
}

/// Text under `header` up to the next top-level header
fn extract_section<'a>(content: &'a str, header: &str) -> Option<&'a str> {
    let start = content.find(header)?;
    let after = &content[start + header.len()..];
    let end = after.find("\n# ").unwrap_or(after.len());
    Some(after[..end].trim())
}

/// Resolve conditional blocks, then substitute `{{var}}` placeholders
fn fill_template(template: &str, vars: &HashMap<&str, &str>) -> String {
    let mut result = resolve_conditionals(template, vars);
    for (key, value) in vars {
        result = result.replace(&format!("{{{{{}}}}}", key), value);
    }
    result
}

/// Keep `{{#if var}}` blocks whose variable is set and non-empty, drop the rest
fn resolve_conditionals(template: &str, vars: &HashMap<&str, &str>) -> String {
    const OPEN: &str = "{{#if ";
    const CLOSE: &str = "{{/if}}";

    let mut result = template.to_string();
    while let Some(open) = result.find(OPEN) {
        let name_start = open + OPEN.len();
        let Some(name_len) = result[name_start..].find("}}") else {
            break;
        };
        let block_start = name_start + name_len + 2;
        let Some(block_len) = result[block_start..].find(CLOSE) else {
            break;
        };
        let block_end = block_start + block_len;

        let name = &result[name_start..name_start + name_len];
        let keep = vars.get(name).is_some_and(|v| !v.is_empty());
        let replacement = if keep { &result[block_start..block_end] } else { "" };
        result = format!("{}{}{}", &result[..open], replacement, &result[block_end + CLOSE.len()..]);
    }
    result
}
