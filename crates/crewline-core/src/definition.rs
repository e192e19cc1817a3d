//! YAML schema for workflow definitions.
//!
//! A definition declares agents once and chains tasks that reference them
//! by id. Tasks run in the order they are listed; `context` may only name
//! tasks listed earlier.
//!
//! ```yaml
//! name: "Form migration"
//! description: "Analyze a block, then translate its logic"
//!
//! templates:
//!   language: "Answer only in {language}."
//!
//! agents:
//!   - id: analyzer
//!     role: "Logic Analyzer"
//!     goal: "Find the triggers and program units of a block"
//!     backstory: "Expert in legacy form migrations"
//!     language: en
//!     response_format:
//!       type: json_object
//!
//! tasks:
//!   - name: analyze
//!     agent: analyzer
//!     description: "List the triggers of block ${BLOCK:-EMP}."
//!     expected_output: "A JSON object with triggers and program units."
//!     messages:
//!       - role: user
//!         content: "..."
//!     config:
//!       temperature: 0.2
//!       max_tokens: 2048
//!
//!   - name: translate
//!     agent: analyzer
//!     description: "Translate the logic."
//!     expected_output: "TypeScript functions."
//!     context: [analyze]
//!     output_file: "outputs/translate.ts"
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::agent::{Agent, AgentConfig};
use crate::backend::{ChatMessage, CompletionBackend};
use crate::config::{resolve_env_vars, GenerationDefaults, GenerationParameters};
use crate::error::{CrewError, Result};
use crate::hooks::write_output_to;
use crate::prompt::PromptTemplates;
use crate::task::{Task, CONTEXT_SEPARATOR};
use crate::workflow::Workflow;

/// Top-level workflow definition loaded from a YAML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Workflow name
    pub name: String,

    /// Optional description
    #[serde(default)]
    pub description: Option<String>,

    /// Prompt template overrides
    #[serde(default)]
    pub templates: PromptTemplates,

    /// Generation defaults for tasks that leave parameters unset
    #[serde(default)]
    pub defaults: GenerationDefaults,

    pub agents: Vec<AgentDefinition>,

    /// Ordered task list; order is execution order
    pub tasks: Vec<TaskDefinition>,
}

/// An agent declared in a workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    /// Identifier referenced by tasks
    pub id: String,

    #[serde(flatten)]
    pub config: AgentConfig,
}

/// A single task in the workflow chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDefinition {
    /// Task name (unique within the workflow, used for context references)
    pub name: String,

    /// Agent id
    pub agent: String,

    pub description: String,

    pub expected_output: String,

    /// Names of earlier tasks whose outputs become this task's context
    #[serde(default)]
    pub context: Vec<String>,

    /// Conversation turns sent after the system prompt
    #[serde(default)]
    pub messages: Vec<ChatMessage>,

    /// Generation parameters (temperature, max_tokens)
    #[serde(default)]
    pub config: GenerationParameters,

    /// Write the output to this file once the task completes
    #[serde(default)]
    pub output_file: Option<String>,
}

impl WorkflowDefinition {
    /// Parse a workflow definition from a YAML string, expanding
    /// `${ENV_VAR}` references.
    ///
    /// References are resolved inside string values after parsing, so a
    /// variable's content never changes the document structure.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let parse_error = |e: serde_yaml::Error| CrewError::Parse {
            what: "workflow YAML".to_string(),
            message: e.to_string(),
        };

        let mut document: serde_yaml::Value = serde_yaml::from_str(yaml).map_err(parse_error)?;
        resolve_env_in_value(&mut document);
        let definition: Self = serde_yaml::from_value(document).map_err(parse_error)?;

        definition.validate()?;
        Ok(definition)
    }

    /// Load a workflow definition from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CrewError::invalid_config(format!(
                "Failed to read workflow file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml(&content)
    }

    /// Structural checks: unique ids and names, known agents, context that
    /// only points backwards, valid templates.
    pub fn validate(&self) -> Result<()> {
        if self.tasks.is_empty() {
            return Err(CrewError::invalid_config(format!(
                "workflow '{}' has no tasks",
                self.name
            )));
        }

        self.templates.validate()?;

        let mut agent_ids = HashSet::new();
        for agent in &self.agents {
            if !agent_ids.insert(agent.id.as_str()) {
                return Err(CrewError::invalid_config(format!(
                    "duplicate agent id '{}'",
                    agent.id
                )));
            }
            agent.config.validate().map_err(|e| scoped("agent", &agent.id, e))?;
        }

        let mut earlier: HashSet<&str> = HashSet::new();
        for task in &self.tasks {
            if !agent_ids.contains(task.agent.as_str()) {
                return Err(CrewError::invalid_config(format!(
                    "task '{}' references unknown agent '{}'",
                    task.name, task.agent
                )));
            }
            if task.description.trim().is_empty() || task.expected_output.trim().is_empty() {
                return Err(CrewError::invalid_config(format!(
                    "task '{}': 'description' and 'expected_output' must not be empty",
                    task.name
                )));
            }
            for upstream in &task.context {
                if !earlier.contains(upstream.as_str()) {
                    return Err(CrewError::invalid_config(format!(
                        "task '{}' uses '{}' as context, but no earlier task has that name",
                        task.name, upstream
                    )));
                }
            }
            if !earlier.insert(task.name.as_str()) {
                return Err(CrewError::invalid_config(format!(
                    "duplicate task name '{}'",
                    task.name
                )));
            }
        }

        Ok(())
    }

    /// Instantiate agents and tasks against `backend`.
    pub fn build(&self, backend: Arc<dyn CompletionBackend>) -> Result<Workflow> {
        self.validate()?;

        let templates = Arc::new(self.templates.clone());

        let mut agents: HashMap<&str, Arc<Agent>> = HashMap::new();
        let mut agent_list = Vec::with_capacity(self.agents.len());
        for def in &self.agents {
            let agent = Agent::new(def.config.clone(), backend.clone())
                .map_err(|e| scoped("agent", &def.id, e))?
                .with_templates(templates.clone())
                .with_defaults(self.defaults);
            let agent = Arc::new(agent);
            agents.insert(def.id.as_str(), agent.clone());
            agent_list.push(agent);
        }

        let mut built: HashMap<&str, Arc<Task>> = HashMap::new();
        let mut tasks = Vec::with_capacity(self.tasks.len());
        for def in &self.tasks {
            let agent = agents
                .get(def.agent.as_str())
                .cloned()
                .ok_or_else(|| CrewError::invalid_config(format!("unknown agent '{}'", def.agent)))?;

            let upstream = def
                .context
                .iter()
                .map(|name| {
                    built.get(name.as_str()).cloned().ok_or_else(|| {
                        CrewError::invalid_config(format!("unknown context task '{}'", name))
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            let mut builder = Task::builder()
                .name(def.name.clone())
                .description(def.description.clone())
                .expected_output(def.expected_output.clone())
                .agent(agent)
                .contexts(upstream)
                .messages(def.messages.iter().cloned())
                .generation(def.config);

            if let Some(ref path) = def.output_file {
                builder = builder.on_complete_hook(write_output_to(path));
            }

            let task = builder.build().map_err(|e| scoped("task", &def.name, e))?;
            built.insert(def.name.as_str(), task.clone());
            tasks.push(task);
        }

        Workflow::new(tasks, agent_list)
    }

    /// Hand the final outputs of earlier workflows to every task as an
    /// extra user message. No-op when `previous` is empty.
    pub fn carry_context(&mut self, previous: &[String]) {
        let previous: Vec<&str> = previous
            .iter()
            .map(String::as_str)
            .filter(|output| !output.is_empty())
            .collect();
        if previous.is_empty() {
            return;
        }

        let content = format!(
            "{}\n{}",
            CARRIED_CONTEXT_HEADER,
            previous.join(CONTEXT_SEPARATOR)
        );
        for task in &mut self.tasks {
            task.messages.push(ChatMessage::user(content.clone()));
        }
    }
}

/// First line of the message added by [`WorkflowDefinition::carry_context`].
pub const CARRIED_CONTEXT_HEADER: &str = "Context accumulated from previous workflows:";

fn scoped(kind: &str, id: &str, error: CrewError) -> CrewError {
    match error {
        CrewError::InvalidConfig(msg) => {
            CrewError::invalid_config(format!("{} '{}': {}", kind, id, msg))
        }
        other => other,
    }
}

/// Expand `${VAR}` references in every string scalar. Keys are left alone.
fn resolve_env_in_value(value: &mut serde_yaml::Value) {
    match value {
        serde_yaml::Value::String(s) => {
            if s.contains("${") {
                *s = resolve_env_vars(s);
            }
        }
        serde_yaml::Value::Sequence(items) => items.iter_mut().for_each(resolve_env_in_value),
        serde_yaml::Value::Mapping(map) => {
            map.iter_mut().for_each(|(_, v)| resolve_env_in_value(v))
        }
        serde_yaml::Value::Tagged(tagged) => resolve_env_in_value(&mut tagged.value),
        _ => {}
    }
}
