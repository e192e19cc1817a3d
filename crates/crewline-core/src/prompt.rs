//! Prompt building blocks shared by every agent of a workflow.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{CrewError, Result};
use crate::template::{format_template, placeholders};

const DEFAULT_PERSONALITY: &str = "You are {role}.\nYour goal: {goal}\n{backstory}";
const DEFAULT_TASK_WITH_CONTEXT: &str =
    "{task}\n\nUse the following context from previous tasks:\n{context}";
const DEFAULT_EXPECTED_OUTPUT: &str = "Expected output: {expected_output}";
const DEFAULT_LANGUAGE: &str = "Respond in {language}.";

/// Templates used to compose the system prompt of a completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptTemplates {
    /// Agent persona: `{role}`, `{goal}`, `{backstory}`
    pub personality: String,
    /// Task prompt merged with upstream context: `{task}`, `{context}`
    pub task_with_context: String,
    /// Output contract directive: `{expected_output}`
    pub expected_output: String,
    /// Response language directive: `{language}`
    pub language: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            personality: DEFAULT_PERSONALITY.to_string(),
            task_with_context: DEFAULT_TASK_WITH_CONTEXT.to_string(),
            expected_output: DEFAULT_EXPECTED_OUTPUT.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

impl PromptTemplates {
    /// Check that every template references the placeholders it is filled with.
    pub fn validate(&self) -> Result<()> {
        require("task_with_context", &self.task_with_context, &["task", "context"])?;
        require("expected_output", &self.expected_output, &["expected_output"])?;
        require("language", &self.language, &["language"])?;
        Ok(())
    }

    pub fn personality(&self, role: &str, goal: &str, backstory: &str) -> String {
        let values = HashMap::from([("role", role), ("goal", goal), ("backstory", backstory)]);
        format_template(&self.personality, &values)
    }

    pub fn task_with_context(&self, task: &str, context: &str) -> String {
        let values = HashMap::from([("task", task), ("context", context)]);
        format_template(&self.task_with_context, &values)
    }

    /// The expected-output directive appended to a task description.
    ///
    /// Fails when the template would drop the contract entirely.
    pub fn expected_output(&self, expected_output: &str) -> Result<String> {
        require("expected_output", &self.expected_output, &["expected_output"])?;
        let values = HashMap::from([("expected_output", expected_output)]);
        Ok(format_template(&self.expected_output, &values))
    }

    pub fn language(&self, language: &str) -> String {
        let values = HashMap::from([("language", language)]);
        format_template(&self.language, &values)
    }
}

fn require(name: &str, template: &str, keys: &[&str]) -> Result<()> {
    let found = placeholders(template);
    let missing: Vec<&str> = keys
        .iter()
        .copied()
        .filter(|key| !found.iter().any(|f| f == key))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(CrewError::PromptFormat(format!(
            "template '{}' is missing placeholder(s): {}",
            name,
            missing
                .iter()
                .map(|k| format!("{{{}}}", k))
                .collect::<Vec<_>>()
                .join(", ")
        )))
    }
}
