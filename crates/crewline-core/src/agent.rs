//! Agent: persona and output contract that turns a task into one
//! completion round trip.
//!
//! An agent holds no runtime state. It is shared across tasks (and across
//! workflows) through `Arc<Agent>`.
//!
//! ```text
//! personality (role / goal / backstory)
//! task block  (task prompt, or task prompt + upstream context)
//! language directive
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::backend::{CompletionBackend, CompletionRequest, ResponseShape, UsageInfo};
use crate::config::GenerationDefaults;
use crate::error::{CrewError, Result};
use crate::prompt::PromptTemplates;
use crate::task::Task;

// ─── Language ─────────────────────────────────────────────────────────────

/// Language the agent is told to answer in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Language {
    #[default]
    Spanish,
    English,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::Spanish => "es",
            Language::English => "en",
        }
    }

    /// Name used inside the language directive.
    pub fn name(&self) -> &'static str {
        match self {
            Language::Spanish => "spanish",
            Language::English => "english",
        }
    }
}

impl FromStr for Language {
    type Err = CrewError;

    fn from_str(code: &str) -> Result<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "es" => Ok(Language::Spanish),
            "en" => Ok(Language::English),
            other => Err(CrewError::invalid_config(format!(
                "Invalid language code: '{}' (expected one of: es, en)",
                other
            ))),
        }
    }
}

impl TryFrom<String> for Language {
    type Error = CrewError;

    fn try_from(code: String) -> Result<Self> {
        code.parse()
    }
}

impl From<Language> for String {
    fn from(language: Language) -> Self {
        language.code().to_string()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// ─── Agent ────────────────────────────────────────────────────────────────

/// Input for [`Agent::new`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    pub role: String,
    pub goal: String,
    #[serde(default)]
    pub backstory: Option<String>,
    /// Language code (`es`, `en`); defaults to `es`
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default, rename = "response_format")]
    pub response_shape: ResponseShape,
}

impl AgentConfig {
    pub fn new(role: impl Into<String>, goal: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            goal: goal.into(),
            ..Default::default()
        }
    }

    pub fn backstory(mut self, backstory: impl Into<String>) -> Self {
        self.backstory = Some(backstory.into());
        self
    }

    pub fn language(mut self, code: impl Into<String>) -> Self {
        self.language = Some(code.into());
        self
    }

    pub fn response_shape(mut self, shape: ResponseShape) -> Self {
        self.response_shape = shape;
        self
    }

    /// Language code parsed, or the default when unset.
    pub fn parsed_language(&self) -> Result<Language> {
        match self.language.as_deref() {
            Some(code) => code.parse(),
            None => Ok(Language::default()),
        }
    }

    /// Checks applied by [`Agent::new`], without binding a backend.
    pub fn validate(&self) -> Result<()> {
        if self.role.trim().is_empty() || self.goal.trim().is_empty() {
            return Err(CrewError::invalid_config(
                "Both 'role' and 'goal' are required to create an Agent.",
            ));
        }
        self.parsed_language().map(|_| ())
    }
}

/// Reply produced by one agent round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskResponse {
    pub response: String,
    pub model: Option<String>,
    pub usage: Option<UsageInfo>,
}

pub struct Agent {
    role: String,
    goal: String,
    backstory: String,
    language: Language,
    response_shape: ResponseShape,
    backend: Arc<dyn CompletionBackend>,
    templates: Arc<PromptTemplates>,
    defaults: GenerationDefaults,
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("role", &self.role)
            .field("goal", &self.goal)
            .field("language", &self.language)
            .field("response_shape", &self.response_shape)
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl Agent {
    /// Validate `config` and bind the agent to `backend`.
    pub fn new(config: AgentConfig, backend: Arc<dyn CompletionBackend>) -> Result<Self> {
        config.validate()?;
        let language = config.parsed_language()?;

        Ok(Self {
            role: config.role,
            goal: config.goal,
            backstory: config.backstory.unwrap_or_default(),
            language,
            response_shape: config.response_shape,
            backend,
            templates: Arc::new(PromptTemplates::default()),
            defaults: GenerationDefaults::default(),
        })
    }

    /// Use shared prompt templates instead of the built-in ones.
    pub fn with_templates(mut self, templates: Arc<PromptTemplates>) -> Self {
        self.templates = templates;
        self
    }

    /// Replace the generation defaults applied when a task leaves them unset.
    pub fn with_defaults(mut self, defaults: GenerationDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    pub fn backstory(&self) -> &str {
        &self.backstory
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn response_shape(&self) -> &ResponseShape {
        &self.response_shape
    }

    pub fn templates(&self) -> &PromptTemplates {
        &self.templates
    }

    pub fn defaults(&self) -> &GenerationDefaults {
        &self.defaults
    }

    /// Full system prompt for `task`, with `context` merged in when present.
    pub fn compose_prompt(&self, task: &Task, context: Option<&str>) -> Result<String> {
        let personality = self
            .templates
            .personality(&self.role, &self.goal, &self.backstory);

        let task_prompt = task.prompt()?;
        let task_block = match context.filter(|c| !c.is_empty()) {
            Some(context) => self.templates.task_with_context(&task_prompt, context),
            None => task_prompt,
        };

        let language = self.templates.language(self.language.name());

        Ok(format!("{}\n{}\n{}", personality, task_block, language))
    }

    /// Build the backend request for `task`.
    pub fn build_request(&self, task: &Task, context: Option<&str>) -> Result<CompletionRequest> {
        let system_prompt = self.compose_prompt(task, context)?;
        let (temperature, max_output_tokens) = task.generation().resolve(&self.defaults);

        Ok(CompletionRequest {
            system_prompt,
            messages: task.messages().to_vec(),
            temperature,
            max_output_tokens,
            response_shape: self.response_shape.clone(),
        })
    }

    /// Run `task` through the backend once. Never retries.
    pub async fn execute_task(&self, task: &Task, context: Option<&str>) -> Result<TaskResponse> {
        let request = self.build_request(task, context)?;
        tracing::debug!(
            "[Agent] Task prompt generated for '{}':\n{}",
            self.role,
            request.system_prompt
        );

        let completion = match self.backend.complete(request).await {
            Ok(completion) => completion,
            Err(e) => {
                tracing::error!(
                    "[Agent] '{}' failed on task '{}' via {}: {}",
                    self.role,
                    task.description(),
                    self.backend.name(),
                    e
                );
                return Err(e.into());
            }
        };

        match completion.text {
            Some(text) if !text.is_empty() => Ok(TaskResponse {
                response: text,
                model: completion.model,
                usage: completion.usage,
            }),
            _ => {
                tracing::error!(
                    "[Agent] '{}' received an empty completion for task '{}'",
                    self.role,
                    task.description()
                );
                Err(CrewError::EmptyCompletion)
            }
        }
    }
}
