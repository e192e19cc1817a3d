//! Crewline Core: agents, tasks and linear workflows over a
//! text-completion backend.
//!
//! ```text
//! Workflow ──► Task ──► Agent ──► CompletionBackend
//!   (order)    (context    (prompt      (OpenAI-compatible HTTP,
//!               fan-in)     composition)  scripted replies)
//! ```
//!
//! A workflow runs its tasks one after another. Each task collects the
//! outputs of its upstream tasks as context, asks its agent for a
//! completion, stores the reply as its output and fires its completion
//! hook. The workflow result is the output of the last task.
//!
//! Workflows can be assembled in code or loaded from YAML through
//! [`definition::WorkflowDefinition`].

pub mod agent;
pub mod backend;
pub mod config;
pub mod definition;
pub mod error;
pub mod hooks;
pub mod prompt;
pub mod task;
pub mod template;
pub mod workflow;

// Convenience re-exports
pub use agent::{Agent, AgentConfig, Language, TaskResponse};
pub use backend::{ChatMessage, CompletionBackend, MessageRole, ResponseShape};
pub use definition::WorkflowDefinition;
pub use error::{BackendError, CrewError, Result};
pub use task::{Task, TaskStatus};
pub use workflow::{Workflow, WorkflowRun};
