//! JSON parsing helpers for AI backend responses
//!
//! Models wrap their JSON in markdown fences or chatter, so the payload is
//! located first: fenced block if present, then the outermost `{...}`.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::plan::{GroupingPlan, SubGroupPlan};

const RAW_PREVIEW_CHARS: usize = 200;

/// Keys every grouping plan must carry
pub const REQUIRED_PLAN_KEYS: &[&str] = &["main_group_mappings", "sub_group_mappings", "grouping_strategy"];

/// Parse a main grouping plan, rejecting responses missing any required key
pub fn parse_grouping_plan(response: &str) -> Result<GroupingPlan> {
    let value = parse_json_object(response)?;
    for key in REQUIRED_PLAN_KEYS {
        if value.get(*key).is_none() {
            return Err(Error::InvalidData(format!(
                "AI plan missing required key '{}' | Raw: {}",
                key,
                preview(response.trim())
            )));
        }
    }
    serde_json::from_value(value).map_err(|e| Error::InvalidData(format!("Invalid grouping plan from AI: {}", e)))
}

/// Parse a sub-group plan; an empty `sub_groups` list is an error
pub fn parse_sub_group_plan(response: &str) -> Result<SubGroupPlan> {
    let value = parse_json_object(response)?;
    let plan: SubGroupPlan = serde_json::from_value(value)
        .map_err(|e| Error::InvalidData(format!("Invalid sub-group plan from AI: {}", e)))?;
    if plan.sub_groups.is_empty() {
        return Err(Error::InvalidData("AI sub-group plan has no sub_groups".into()));
    }
    Ok(plan)
}

/// Locate and parse the JSON object in a model response
pub fn parse_json_object(response: &str) -> Result<Value> {
    let json_str = extract_json(response)?;
    let value: Value = serde_json::from_str(json_str)
        .map_err(|e| Error::InvalidData(format!("Invalid JSON from AI: {} | Raw: {}", e, preview(json_str))))?;
    if !value.is_object() {
        return Err(Error::InvalidData(format!("AI response is not a JSON object | Raw: {}", preview(json_str))));
    }
    Ok(value)
}

/// The `{...}` substring of a response, after removing code fences
pub fn extract_json(response: &str) -> Result<&str> {
    let body = strip_code_fences(response.trim());
    match (body.find('{'), body.rfind('}')) {
        (Some(s), Some(e)) if s < e => Ok(&body[s..=e]),
        _ => Err(Error::InvalidData(format!(
            "No JSON found in AI response | Raw: {}",
            preview(response.trim())
        ))),
    }
}

/// Contents of the first ```json fence, else the first bare ``` fence, else the input
pub fn strip_code_fences(response: &str) -> &str {
    if let Some(start) = response.find("```json") {
        let rest = &response[start + "```json".len()..];
        return match rest.find("```") {
            Some(end) => rest[..end].trim(),
            None => rest.trim(),
        };
    }
    if let Some(start) = response.find("```") {
        let rest = &response[start + 3..];
        if let Some(end) = rest.find("```") {
            return rest[..end].trim();
        }
    }
    response
}

/// First characters of `s` for error messages
fn preview(s: &str) -> String {
    match s.char_indices().nth(RAW_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &s[..cut]),
        None => s.to_string(),
    }
}
