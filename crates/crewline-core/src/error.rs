//! Core error types for Crewline.
//!
//! `CrewError` is returned by every fallible operation in the core.
//! `BackendError` describes what went wrong on the far side of a
//! [`CompletionBackend`](crate::backend::CompletionBackend) call and is kept
//! as a closed set so callers can match on it exhaustively.

/// Error type for completion hooks registered with `Task::on_complete`.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T> = std::result::Result<T, CrewError>;

#[derive(Debug, thiserror::Error)]
pub enum CrewError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Received an empty completion from the backend")]
    EmptyCompletion,

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Failed to execute task '{description}': {source}")]
    TaskExecution {
        description: String,
        #[source]
        source: Box<CrewError>,
    },

    #[error("Failed to format prompt: {0}")]
    PromptFormat(String),

    #[error("Completion hook failed: {0}")]
    Hook(#[source] HookError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse {what}: {message}")]
    Parse { what: String, message: String },
}

impl CrewError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        CrewError::InvalidConfig(message.into())
    }

    /// Wrap `self` with the description of the task it happened in.
    pub fn in_task(self, description: &str) -> Self {
        CrewError::TaskExecution {
            description: description.to_string(),
            source: Box::new(self),
        }
    }

    /// Walk through `TaskExecution` wrappers to the error that started it.
    pub fn root_cause(&self) -> &CrewError {
        match self {
            CrewError::TaskExecution { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Failures reported by a completion backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Unknown backend failure: {0}")]
    Unknown(String),
}

impl BackendError {
    /// HTTP status code, when the failure came with one.
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
