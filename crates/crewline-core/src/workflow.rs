//! Workflow: runs tasks strictly in list order.
//!
//! List order is the only dependency mechanism: a task's upstream tasks must
//! appear earlier in the list, otherwise their output is not there yet when
//! the task runs. The result of a run is the output of the last task.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::agent::Agent;
use crate::error::{CrewError, Result};
use crate::task::Task;

/// Timing record for one executed task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskRun {
    pub index: usize,
    pub task_id: Uuid,
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u128,
}

/// Result of a successful workflow run.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowRun {
    /// Output of the final task
    pub output: String,
    pub runs: Vec<TaskRun>,
}

/// An upstream reference that is not satisfied by list order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderViolation {
    pub task: String,
    pub upstream: String,
    /// Position of the upstream task in the list, if it is listed at all
    pub upstream_index: Option<usize>,
}

impl std::fmt::Display for OrderViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.upstream_index {
            Some(i) => write!(
                f,
                "task '{}' uses '{}' as context, but '{}' runs later (position {})",
                self.task,
                self.upstream,
                self.upstream,
                i + 1
            ),
            None => write!(
                f,
                "task '{}' uses '{}' as context, but '{}' is not part of the workflow",
                self.task, self.upstream, self.upstream
            ),
        }
    }
}

#[derive(Debug)]
pub struct Workflow {
    tasks: Vec<Arc<Task>>,
    agents: Vec<Arc<Agent>>,
}

impl Workflow {
    /// Create a workflow. `agents` is bookkeeping only; each task already
    /// carries its own agent.
    pub fn new(tasks: Vec<Arc<Task>>, agents: Vec<Arc<Agent>>) -> Result<Self> {
        if tasks.is_empty() {
            return Err(CrewError::invalid_config(
                "A workflow needs at least one task.",
            ));
        }

        let workflow = Self { tasks, agents };
        for violation in workflow.check_order() {
            tracing::warn!("[Workflow] {}", violation);
        }
        Ok(workflow)
    }

    pub fn tasks(&self) -> &[Arc<Task>] {
        &self.tasks
    }

    pub fn agents(&self) -> &[Arc<Agent>] {
        &self.agents
    }

    /// The task whose output is the workflow result.
    pub fn final_task(&self) -> &Arc<Task> {
        // `new` rejects empty task lists.
        &self.tasks[self.tasks.len() - 1]
    }

    /// Upstream references that list order does not satisfy.
    pub fn check_order(&self) -> Vec<OrderViolation> {
        let mut violations = Vec::new();

        for (i, task) in self.tasks.iter().enumerate() {
            for upstream in task.upstream() {
                let position = self.tasks.iter().position(|t| Arc::ptr_eq(t, upstream));
                if position.map_or(true, |p| p >= i) {
                    violations.push(OrderViolation {
                        task: task.name().to_string(),
                        upstream: upstream.name().to_string(),
                        upstream_index: position,
                    });
                }
            }
        }

        violations
    }

    /// Execute every task in order and return the final output.
    pub async fn initiate(&self) -> Result<String> {
        self.run().await.map(|run| run.output)
    }

    /// Execute every task in order, recording timings.
    ///
    /// The first failing task aborts the run; tasks that already completed
    /// keep their outputs.
    pub async fn run(&self) -> Result<WorkflowRun> {
        let total = self.tasks.len();
        let mut runs = Vec::with_capacity(total);
        let mut output = String::new();

        for (index, task) in self.tasks.iter().enumerate() {
            tracing::info!("[Workflow] Executing task {}/{}: {}", index + 1, total, task.name());
            tracing::debug!("[Workflow] Working agent: {}", task.agent().role());

            let started_at = Utc::now();
            let clock = Instant::now();

            output = task.execute().await?.response;

            let run = TaskRun {
                index,
                task_id: task.id(),
                name: task.name().to_string(),
                started_at,
                completed_at: Utc::now(),
                duration_ms: clock.elapsed().as_millis(),
            };
            tracing::info!("[Workflow] Task completed, took {}ms", run.duration_ms);
            runs.push(run);
        }

        tracing::info!("[Workflow] Workflow completed ({} task(s))", total);
        tracing::debug!("[Workflow] Final output: {}", output);

        Ok(WorkflowRun { output, runs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentConfig;
    use crate::backend::ScriptedBackend;
    use crate::error::BackendError;
    use crate::task::TaskStatus;

    fn setup() -> (Arc<ScriptedBackend>, Arc<Agent>) {
        let backend = Arc::new(ScriptedBackend::new());
        let agent = Arc::new(Agent::new(AgentConfig::new("Writer", "Write"), backend.clone()).unwrap());
        (backend, agent)
    }

    fn task(agent: &Arc<Agent>, name: &str) -> Arc<Task> {
        Task::builder()
            .name(name)
            .description(format!("Do {}", name))
            .expected_output("Text")
            .agent(agent.clone())
            .build()
            .unwrap()
    }

    #[test]
    fn test_empty_workflow_rejected() {
        let err = Workflow::new(Vec::new(), Vec::new()).unwrap_err();
        assert!(matches!(err, CrewError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_single_task_result() {
        let (backend, agent) = setup();
        backend.push_text("hello");
        let only = task(&agent, "greet");

        let workflow = Workflow::new(vec![only.clone()], vec![agent]).unwrap();
        assert_eq!(workflow.initiate().await.unwrap(), "hello");
        assert_eq!(only.output().as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_failure_aborts_remaining_tasks() {
        let (backend, agent) = setup();
        backend
            .push_text("one")
            .push_error(BackendError::Http("connection reset".to_string()));

        let (t1, t2, t3) = (task(&agent, "t1"), task(&agent, "t2"), task(&agent, "t3"));
        let workflow = Workflow::new(vec![t1.clone(), t2.clone(), t3.clone()], vec![agent]).unwrap();

        let err = workflow.initiate().await.unwrap_err();
        assert!(matches!(err, CrewError::TaskExecution { ref description, .. } if description == "Do t2"));

        assert_eq!(backend.call_count(), 2);
        assert_eq!(t1.output().as_deref(), Some("one"));
        assert_eq!(t2.status(), TaskStatus::Failed);
        assert_eq!(t3.status(), TaskStatus::Pending);
        assert_eq!(t3.output(), None);
    }

    #[tokio::test]
    async fn test_run_records_timings_in_order() {
        let (backend, agent) = setup();
        backend.push_text("a").push_text("b");

        let first = task(&agent, "first");
        let second = Task::builder()
            .name("second")
            .description("Use first")
            .expected_output("Text")
            .agent(agent.clone())
            .context(first.clone())
            .build()
            .unwrap();

        let workflow = Workflow::new(vec![first, second], vec![agent]).unwrap();
        let run = workflow.run().await.unwrap();

        assert_eq!(run.output, "b");
        let names: Vec<&str> = run.runs.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert!(run.runs.iter().all(|r| r.completed_at >= r.started_at));
        assert!(backend.requests()[1].system_prompt.contains("\na\n"));
    }

    #[tokio::test]
    async fn test_run_report_serializes_to_json() {
        let (backend, agent) = setup();
        backend.push_text("done");
        let only = task(&agent, "only");
        let id = only.id();

        let run = Workflow::new(vec![only], vec![agent]).unwrap().run().await.unwrap();
        let json = serde_json::to_value(&run).unwrap();

        assert_eq!(json["output"], "done");
        assert_eq!(json["runs"][0]["task_id"], id.to_string());
        assert_eq!(json["runs"][0]["name"], "only");
    }

    #[test]
    fn test_check_order_reports_late_and_missing_upstream() {
        let (_, agent) = setup();
        let early = task(&agent, "early");
        let outsider = task(&agent, "outsider");
        let consumer = Task::builder()
            .name("consumer")
            .description("Consume")
            .expected_output("Text")
            .agent(agent.clone())
            .contexts([early.clone(), outsider])
            .build()
            .unwrap();

        let workflow = Workflow::new(vec![consumer, early], vec![agent]).unwrap();
        let violations = workflow.check_order();

        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].upstream, "early");
        assert_eq!(violations[0].upstream_index, Some(1));
        assert_eq!(violations[1].upstream, "outsider");
        assert_eq!(violations[1].upstream_index, None);
        assert!(violations[1].to_string().contains("not part of the workflow"));
    }
}
