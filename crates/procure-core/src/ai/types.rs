//! Request types shared by all AI backends

use serde::{Deserialize, Serialize};

pub use crate::dataset::ValueCount;

/// What a backend is asked to plan for.
///
/// For a main grouping plan `column_name` is the main column and the
/// optional sub column values ride along; for a sub-group plan
/// `context_name` names the main group being split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest {
    pub context_name: String,
    pub column_name: String,
    pub values_with_counts: Vec<ValueCount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_column_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_values_with_counts: Vec<ValueCount>,
}

impl PlanRequest {
    pub fn new(context_name: impl Into<String>, column_name: impl Into<String>, values: Vec<ValueCount>) -> Self {
        Self {
            context_name: context_name.into(),
            column_name: column_name.into(),
            values_with_counts: values,
            sub_column_name: None,
            sub_values_with_counts: Vec::new(),
        }
    }

    pub fn with_sub_column(mut self, name: impl Into<String>, values: Vec<ValueCount>) -> Self {
        self.sub_column_name = Some(name.into());
        self.sub_values_with_counts = values;
        self
    }

    /// Values as prompt lines for a main plan: `- "value": count`
    pub fn main_value_lines(&self) -> String {
        quoted_lines(&self.values_with_counts)
    }

    pub fn sub_value_lines(&self) -> String {
        quoted_lines(&self.sub_values_with_counts)
    }

    /// Values as prompt lines for a sub-group plan: `- value (n items)`
    pub fn item_lines(&self) -> String {
        self.values_with_counts
            .iter()
            .map(|v| format!("- {} ({} items)", v.value, v.count))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn quoted_lines(values: &[ValueCount]) -> String {
    values
        .iter()
        .map(|v| format!("- {:?}: {}", v.value, v.count))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prompt text ready to send, built from a `PlanRequest`
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPrompt {
    pub system: String,
    pub user: String,
}

impl RenderedPrompt {
    /// System and user text in a single block, for completion-style APIs
    pub fn combined(&self) -> String {
        if self.system.is_empty() {
            self.user.clone()
        } else {
            format!("{}\n\n{}", self.system, self.user)
        }
    }
}
