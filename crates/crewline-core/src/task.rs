//! Task: a unit of delegated work.
//!
//! A task owns its output. The output is written when the bound agent
//! returns, and is read by downstream tasks that list this one as upstream
//! context. Tasks are shared as `Arc<Task>`.

use std::future::Future;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agent::{Agent, TaskResponse};
use crate::backend::ChatMessage;
use crate::config::GenerationParameters;
use crate::error::{CrewError, HookError, Result};

/// Separator placed between upstream outputs in the aggregated context.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Callback run after a task stores its output: `(output, task)`.
pub type CompletionHook = Arc<
    dyn Fn(String, Arc<Task>) -> BoxFuture<'static, std::result::Result<(), HookError>>
        + Send
        + Sync,
>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "EXECUTING")]
    Executing,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "FAILED")]
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Executing => "EXECUTING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

#[derive(Debug)]
struct TaskState {
    status: TaskStatus,
    output: Option<String>,
}

pub struct Task {
    id: Uuid,
    name: String,
    description: String,
    expected_output: String,
    agent: Arc<Agent>,
    upstream: Vec<Arc<Task>>,
    messages: Vec<ChatMessage>,
    generation: GenerationParameters,
    on_complete: Option<CompletionHook>,
    state: RwLock<TaskState>,
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("agent", &self.agent.role())
            .field("upstream", &self.upstream.iter().map(|t| &t.name).collect::<Vec<_>>())
            .field("status", &self.status())
            .finish()
    }
}

impl Task {
    pub fn builder() -> TaskBuilder {
        TaskBuilder::default()
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Short label; the description when none was given.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn expected_output(&self) -> &str {
        &self.expected_output
    }

    pub fn agent(&self) -> &Arc<Agent> {
        &self.agent
    }

    pub fn upstream(&self) -> &[Arc<Task>] {
        &self.upstream
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn generation(&self) -> &GenerationParameters {
        &self.generation
    }

    pub fn status(&self) -> TaskStatus {
        self.read_state().status
    }

    /// The output of the last successful run, if any.
    pub fn output(&self) -> Option<String> {
        self.read_state().output.clone()
    }

    /// Task body: description followed by the expected-output directive.
    pub fn prompt(&self) -> Result<String> {
        let expected = self
            .agent
            .templates()
            .expected_output(&self.expected_output)
            .map_err(|e| {
                tracing::error!(
                    "[Task] Failed to format expected output for '{}': {}",
                    self.name,
                    e
                );
                e
            })?;
        Ok(format!("{}\n{}", self.description, expected))
    }

    /// Current outputs of the upstream tasks, in upstream order, skipping
    /// unset or empty ones. Recomputed on every call.
    pub fn aggregate_context(&self) -> String {
        self.upstream
            .iter()
            .filter_map(|task| task.output())
            .filter(|output| !output.is_empty())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR)
    }

    /// Run the task through its agent.
    ///
    /// On success the output is stored before `on_complete` runs, so a
    /// failing hook reports a task failure while `output()` already returns
    /// the new value. When the agent call fails the previous output is left
    /// untouched.
    pub async fn execute(self: &Arc<Self>) -> Result<TaskResponse> {
        self.write_state().status = TaskStatus::Executing;

        match self.run().await {
            Ok(response) => {
                self.write_state().status = TaskStatus::Completed;
                Ok(response)
            }
            Err(e) => {
                self.write_state().status = TaskStatus::Failed;
                tracing::error!("[Task] '{}' failed: {}", self.name, e);
                Err(e.in_task(&self.description))
            }
        }
    }

    async fn run(self: &Arc<Self>) -> Result<TaskResponse> {
        let context = self.aggregate_context();
        let context = (!context.is_empty()).then_some(context.as_str());

        let response = self.agent.execute_task(self, context).await?;

        self.write_state().output = Some(response.response.clone());

        if let Some(hook) = &self.on_complete {
            hook(response.response.clone(), Arc::clone(self))
                .await
                .map_err(CrewError::Hook)?;
        }

        Ok(response)
    }

    fn read_state(&self) -> RwLockReadGuard<'_, TaskState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, TaskState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

// ─── Builder ──────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct TaskBuilder {
    name: Option<String>,
    description: Option<String>,
    expected_output: Option<String>,
    agent: Option<Arc<Agent>>,
    upstream: Vec<Arc<Task>>,
    messages: Vec<ChatMessage>,
    generation: GenerationParameters,
    on_complete: Option<CompletionHook>,
}

impl TaskBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn expected_output(mut self, expected_output: impl Into<String>) -> Self {
        self.expected_output = Some(expected_output.into());
        self
    }

    pub fn agent(mut self, agent: Arc<Agent>) -> Self {
        self.agent = Some(agent);
        self
    }

    /// Add an upstream task whose output becomes part of this task's context.
    pub fn context(mut self, task: Arc<Task>) -> Self {
        self.upstream.push(task);
        self
    }

    pub fn contexts(mut self, tasks: impl IntoIterator<Item = Arc<Task>>) -> Self {
        self.upstream.extend(tasks);
        self
    }

    /// Append a conversation turn sent after the system prompt.
    pub fn message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    pub fn messages(mut self, messages: impl IntoIterator<Item = ChatMessage>) -> Self {
        self.messages.extend(messages);
        self
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.generation.temperature = Some(temperature);
        self
    }

    pub fn max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.generation.max_output_tokens = Some(max_output_tokens);
        self
    }

    pub fn generation(mut self, generation: GenerationParameters) -> Self {
        self.generation = generation;
        self
    }

    /// Register an async callback that runs once the output is stored.
    pub fn on_complete<F, Fut>(self, hook: F) -> Self
    where
        F: Fn(String, Arc<Task>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), HookError>> + Send + 'static,
    {
        let boxed: CompletionHook = Arc::new(
            move |output: String, task: Arc<Task>| -> BoxFuture<'static, std::result::Result<(), HookError>> {
                Box::pin(hook(output, task))
            },
        );
        self.on_complete_hook(boxed)
    }

    pub fn on_complete_hook(mut self, hook: CompletionHook) -> Self {
        self.on_complete = Some(hook);
        self
    }

    pub fn build(self) -> Result<Arc<Task>> {
        let description = self.description.filter(|d| !d.trim().is_empty());
        let expected_output = self.expected_output.filter(|e| !e.trim().is_empty());

        let (Some(description), Some(agent), Some(expected_output)) =
            (description, self.agent, expected_output)
        else {
            return Err(CrewError::invalid_config(
                "Task requires 'description', 'agent', and 'expected_output' to be defined.",
            ));
        };

        Ok(Arc::new(Task {
            id: Uuid::new_v4(),
            name: self.name.unwrap_or_else(|| description.clone()),
            description,
            expected_output,
            agent,
            upstream: self.upstream,
            messages: self.messages,
            generation: self.generation,
            on_complete: self.on_complete,
            state: RwLock::new(TaskState {
                status: TaskStatus::Pending,
                output: None,
            }),
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::agent::AgentConfig;
    use crate::backend::ScriptedBackend;
    use crate::prompt::PromptTemplates;

    fn setup() -> (Arc<ScriptedBackend>, Arc<Agent>) {
        let backend = Arc::new(ScriptedBackend::new());
        let agent = Arc::new(Agent::new(AgentConfig::new("Writer", "Write"), backend.clone()).unwrap());
        (backend, agent)
    }

    fn simple(agent: &Arc<Agent>, description: &str) -> TaskBuilder {
        Task::builder()
            .description(description)
            .expected_output("Plain text.")
            .agent(agent.clone())
    }

    #[test]
    fn test_required_fields() {
        let (_, agent) = setup();

        let missing_description = Task::builder().expected_output("x").agent(agent.clone()).build();
        assert!(matches!(missing_description, Err(CrewError::InvalidConfig(_))));

        let missing_expected = Task::builder().description("x").agent(agent.clone()).build();
        assert!(matches!(missing_expected, Err(CrewError::InvalidConfig(_))));

        let missing_agent = Task::builder().description("x").expected_output("y").build();
        assert!(matches!(missing_agent, Err(CrewError::InvalidConfig(_))));

        let blank = Task::builder().description("  ").expected_output("y").agent(agent).build();
        assert!(matches!(blank, Err(CrewError::InvalidConfig(_))));
    }

    #[test]
    fn test_prompt_is_description_plus_directive() {
        let (_, agent) = setup();
        let task = simple(&agent, "Summarize.").build().unwrap();
        assert_eq!(task.prompt().unwrap(), "Summarize.\nExpected output: Plain text.");
        assert_eq!(task.name(), "Summarize.");
        assert_eq!(task.status(), TaskStatus::Pending);
        assert_eq!(task.output(), None);
    }

    #[test]
    fn test_prompt_format_error() {
        let backend = Arc::new(ScriptedBackend::new());
        let templates = Arc::new(PromptTemplates {
            expected_output: "no placeholder".to_string(),
            ..Default::default()
        });
        let agent = Arc::new(
            Agent::new(AgentConfig::new("r", "g"), backend)
                .unwrap()
                .with_templates(templates),
        );
        let task = simple(&agent, "d").build().unwrap();
        assert!(matches!(task.prompt(), Err(CrewError::PromptFormat(_))));
    }

    #[tokio::test]
    async fn test_context_skips_empty_outputs() {
        let (backend, agent) = setup();
        backend.push_text("x").push_empty().push_text("final");

        let a = simple(&agent, "A").build().unwrap();
        let b = simple(&agent, "B").build().unwrap();
        let c = simple(&agent, "C").contexts([a.clone(), b.clone()]).build().unwrap();

        a.execute().await.unwrap();
        assert!(b.execute().await.is_err());
        assert_eq!(b.output(), None);

        assert_eq!(c.aggregate_context(), "x");
        c.execute().await.unwrap();

        let requests = backend.requests();
        assert!(requests[2].system_prompt.contains("previous tasks:\nx\n"));
    }

    #[tokio::test]
    async fn test_context_joined_in_upstream_order() {
        let (backend, agent) = setup();
        backend.push_text("first").push_text("second");

        let a = simple(&agent, "A").build().unwrap();
        let b = simple(&agent, "B").build().unwrap();
        a.execute().await.unwrap();
        b.execute().await.unwrap();

        let c = simple(&agent, "C").context(b.clone()).context(a.clone()).build().unwrap();
        assert_eq!(c.aggregate_context(), "second\n\nfirst");
    }

    #[tokio::test]
    async fn test_execute_sets_output_and_status() {
        let (backend, agent) = setup();
        backend.push_text("hello");

        let task = simple(&agent, "Greet").build().unwrap();
        let reply = task.execute().await.unwrap();

        assert_eq!(reply.response, "hello");
        assert_eq!(task.output().as_deref(), Some("hello"));
        assert_eq!(task.status(), TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_empty_completion_leaves_output_unset() {
        let (backend, agent) = setup();
        backend.push_empty();

        let task = simple(&agent, "Greet").build().unwrap();
        let err = task.execute().await.unwrap_err();

        match &err {
            CrewError::TaskExecution { description, source } => {
                assert_eq!(description, "Greet");
                assert!(matches!(**source, CrewError::EmptyCompletion));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(task.output(), None);
        assert_eq!(task.status(), TaskStatus::Failed);
    }

    #[tokio::test]
    async fn test_empty_string_completion_leaves_output_unset() {
        let (backend, agent) = setup();
        backend.push_text("");
        let hook_calls = Arc::new(AtomicUsize::new(0));
        let calls = hook_calls.clone();

        let task = simple(&agent, "Summarize")
            .on_complete(move |_, _| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .build()
            .unwrap();
        let err = task.execute().await.unwrap_err();

        assert!(matches!(
            err,
            CrewError::TaskExecution { ref source, .. } if matches!(**source, CrewError::EmptyCompletion)
        ));
        assert_eq!(task.output(), None);
        assert_eq!(task.status(), TaskStatus::Failed);
        assert_eq!(hook_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_hook_sees_output_and_runs_once() {
        let (backend, agent) = setup();
        backend.push_text("done");
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();

        let task = simple(&agent, "Work")
            .on_complete(move |output, task| {
                let seen = seen.clone();
                async move {
                    assert_eq!(output, "done");
                    assert_eq!(task.output().as_deref(), Some("done"));
                    seen.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .build()
            .unwrap();

        task.execute().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failing_hook_fails_task_but_output_stays() {
        let (backend, agent) = setup();
        backend.push_text("persist me");

        let task = simple(&agent, "Persist")
            .on_complete(|_, _| async { Err::<(), HookError>("disk full".into()) })
            .build()
            .unwrap();

        let err = task.execute().await.unwrap_err();
        assert!(matches!(err.root_cause(), CrewError::Hook(_)));
        assert!(err.to_string().contains("disk full"));
        assert_eq!(task.output().as_deref(), Some("persist me"));
        assert_eq!(task.status(), TaskStatus::Failed);
    }

    #[tokio::test]
    async fn test_reexecution_recomputes_output() {
        let (backend, agent) = setup();
        backend.push_text("v1").push_text("v2");

        let task = simple(&agent, "Draft").build().unwrap();
        task.execute().await.unwrap();
        task.execute().await.unwrap();
        assert_eq!(task.output().as_deref(), Some("v2"));
        assert_eq!(backend.call_count(), 2);
    }
}
