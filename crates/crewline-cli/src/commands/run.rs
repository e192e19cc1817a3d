//! `crewline run`: execute one or more workflow definitions.
//!
//! Files run one after another. A failing workflow is reported and the
//! batch moves on instead of aborting; the command fails at the end if any
//! workflow failed. With `--chain`, the final output of every successful
//! workflow is handed to the tasks of the workflows that follow it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crewline_core::backend::{CompletionBackend, OpenAiBackend, ScriptedBackend};
use crewline_core::config::BackendConfig;
use crewline_core::definition::WorkflowDefinition;
use crewline_core::WorkflowRun;

/// Reply used for every task under `--dry-run`.
pub const DRY_RUN_REPLY: &str = "[dry-run] no completion requested";

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Directory that receives one `<file stem>.txt` per successful workflow
    pub out_dir: Option<PathBuf>,
    /// Print the final output of each workflow
    pub verbose: bool,
    /// Answer every task locally instead of calling the API
    pub dry_run: bool,
    /// Pass earlier final outputs to later workflows
    pub chain: bool,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

impl RunOptions {
    fn backend(&self) -> Result<Arc<dyn CompletionBackend>, String> {
        if self.dry_run {
            return Ok(Arc::new(ScriptedBackend::with_fallback(DRY_RUN_REPLY)));
        }

        let mut config = BackendConfig::from_env().map_err(|e| e.to_string())?;
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(api_key) = &self.api_key {
            config.api_key = api_key.clone();
        }

        let backend = OpenAiBackend::new(config).map_err(|e| e.to_string())?;
        Ok(Arc::new(backend))
    }
}

/// Run every workflow file in `files`, in order.
pub async fn run(files: &[String], options: &RunOptions) -> Result<(), String> {
    if files.is_empty() {
        return Err("No workflow files given".to_string());
    }

    // One client for the whole batch.
    let backend = options.backend()?;
    if options.dry_run {
        println!("🧪 Dry run: tasks are answered locally, no API calls are made");
        println!();
    }

    run_batch(files, options, backend).await
}

/// Run `files` in order against an already constructed backend.
pub async fn run_batch(
    files: &[String],
    options: &RunOptions,
    backend: Arc<dyn CompletionBackend>,
) -> Result<(), String> {
    let targets: Vec<Option<PathBuf>> = match &options.out_dir {
        Some(dir) => output_paths(dir, files)?.into_iter().map(Some).collect(),
        None => vec![None; files.len()],
    };

    let mut carried: Vec<String> = Vec::new();
    let mut failed = Vec::new();
    for (file, target) in files.iter().zip(targets) {
        let previous: &[String] = if options.chain { &carried } else { &[] };
        let outcome = run_file(file, backend.clone(), previous, target.as_deref(), options).await;
        match outcome {
            Ok(output) => carried.push(output),
            Err(e) => {
                eprintln!("❌ {}: {}", file, e);
                failed.push(file.as_str());
            }
        }
        println!();
    }

    if failed.is_empty() {
        println!("🎉 {} workflow(s) completed successfully!", files.len());
        Ok(())
    } else {
        Err(format!(
            "{} of {} workflow(s) failed: {}",
            failed.len(),
            files.len(),
            failed.join(", ")
        ))
    }
}

async fn run_file(
    file: &str,
    backend: Arc<dyn CompletionBackend>,
    previous: &[String],
    target: Option<&Path>,
    options: &RunOptions,
) -> Result<String, String> {
    let mut definition = WorkflowDefinition::from_file(file).map_err(|e| e.to_string())?;

    println!("📄 Loaded workflow: {} ({})", definition.name, file);
    println!(
        "   {} agent(s), {} task(s)",
        definition.agents.len(),
        definition.tasks.len()
    );
    if !previous.is_empty() {
        println!("   🔗 Carrying output of {} earlier workflow(s)", previous.len());
        definition.carry_context(previous);
    }

    let workflow = definition.build(backend).map_err(|e| e.to_string())?;
    let result = workflow.run().await.map_err(|e| e.to_string())?;

    print_summary(&result);

    if options.verbose {
        println!("--- output ---");
        println!("{}", result.output);
        println!("--------------");
    }

    if let Some(path) = target {
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| format!("Failed to create {}: {}", dir.display(), e))?;
        }
        tokio::fs::write(path, result.output.as_bytes())
            .await
            .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
        println!("   💾 Output written to {}", path.display());
    }

    Ok(result.output)
}

fn print_summary(result: &WorkflowRun) {
    for run in &result.runs {
        println!("   ✓ {}. {} ({}ms)", run.index + 1, run.name, run.duration_ms);
    }
}

/// Where the final output of `file` goes inside `out_dir`.
pub fn output_path(out_dir: &Path, file: &str) -> PathBuf {
    let stem = Path::new(file)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workflow".to_string());
    out_dir.join(format!("{}.txt", stem))
}

/// Output paths for a batch; fails when two files would share one.
pub fn output_paths(out_dir: &Path, files: &[String]) -> Result<Vec<PathBuf>, String> {
    let mut seen: HashMap<PathBuf, &str> = HashMap::new();
    let mut paths = Vec::with_capacity(files.len());

    for file in files {
        let path = output_path(out_dir, file);
        if let Some(other) = seen.insert(path.clone(), file) {
            return Err(format!(
                "'{}' and '{}' would both write {}; rename one of them",
                other,
                file,
                path.display()
            ));
        }
        paths.push(path);
    }

    Ok(paths)
}
