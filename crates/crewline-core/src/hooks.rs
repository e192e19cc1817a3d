//! Ready-made completion hooks.

use std::path::PathBuf;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::HookError;
use crate::task::{CompletionHook, Task};

/// Hook that writes the task output to `path`, creating parent directories.
pub fn write_output_to(path: impl Into<PathBuf>) -> CompletionHook {
    let path = path.into();
    Arc::new(
        move |output: String, task: Arc<Task>| -> BoxFuture<'static, Result<(), HookError>> {
            let path = path.clone();
            Box::pin(async move {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(&path, output.as_bytes()).await?;
                tracing::info!(
                    "[Hooks] Wrote output of '{}' to {}",
                    task.name(),
                    path.display()
                );
                Ok(())
            })
        },
    )
}
