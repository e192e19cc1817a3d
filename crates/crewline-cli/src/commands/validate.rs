//! `crewline validate`: check a workflow definition without running it.

use crewline_core::definition::WorkflowDefinition;

/// Validate a workflow YAML file and print its task list.
pub async fn validate(workflow_file: &str) -> Result<(), String> {
    let definition = WorkflowDefinition::from_file(workflow_file).map_err(|e| e.to_string())?;

    println!("✅ Workflow '{}' is valid", definition.name);
    if let Some(description) = &definition.description {
        println!("   {}", description);
    }
    println!("   Agents: {}", definition.agents.len());
    println!("   Tasks: {}", definition.tasks.len());

    for (i, task) in definition.tasks.iter().enumerate() {
        let context = if task.context.is_empty() {
            String::new()
        } else {
            format!(", context: {}", task.context.join(", "))
        };
        println!("   {}. {} (agent: {}{})", i + 1, task.name, task.agent, context);
    }

    Ok(())
}
