//! Workflow command handlers.

use anyhow::{Context, Result, bail};
use fdrz_core::api::{
    NewWorkflow, Workflow, WorkflowPatch, WorkflowStatus, WorkflowsApi, filter_workflows,
};

use super::{App, api_error};

async fn api(app: &App) -> Result<WorkflowsApi> {
    app.require_token().await?;
    Ok(WorkflowsApi::new(app.gateway.clone()))
}

pub async fn list(app: &App, search: Option<&str>, json: bool) -> Result<()> {
    let workflows = api(app).await?.list().await.map_err(api_error)?;
    let shown = filter_workflows(&workflows, search.unwrap_or_default());

    if json {
        let out = serde_json::to_string_pretty(&shown).context("encode workflows")?;
        println!("{out}");
        return Ok(());
    }

    if shown.is_empty() {
        match search {
            Some(term) if !term.trim().is_empty() => {
                println!("No workflows match '{}'.", term.trim());
            }
            _ => println!("No workflows found."),
        }
        return Ok(());
    }
    let id_width = shown.iter().map(|w| w.id.chars().count()).max().unwrap_or(0);
    for workflow in shown {
        println!(
            "{:<id_width$}  {:<9}  {}",
            workflow.id,
            workflow.status.as_str(),
            workflow.name
        );
    }
    Ok(())
}

pub async fn show(app: &App, id: &str, json: bool) -> Result<()> {
    let workflow = api(app)
        .await?
        .get(id)
        .await
        .map_err(api_error)
        .with_context(|| format!("load workflow '{id}'"))?;
    if json {
        let out = serde_json::to_string_pretty(&workflow).context("encode workflow")?;
        println!("{out}");
    } else {
        print_workflow(&workflow);
    }
    Ok(())
}

pub async fn create(
    app: &App,
    name: String,
    description: Option<String>,
    status: Option<WorkflowStatus>,
) -> Result<()> {
    if name.trim().is_empty() {
        bail!("Workflow name cannot be empty");
    }
    let request = NewWorkflow {
        name,
        description,
        status,
    };
    let workflow = api(app)
        .await?
        .create(&request)
        .await
        .map_err(api_error)
        .context("create workflow")?;
    println!("✓ Created workflow {} ({})", workflow.name, workflow.id);
    Ok(())
}

pub async fn update(
    app: &App,
    id: &str,
    name: Option<String>,
    description: Option<String>,
    status: Option<WorkflowStatus>,
) -> Result<()> {
    let patch = WorkflowPatch {
        name,
        description,
        status,
    };
    if patch.is_empty() {
        bail!("Nothing to update (pass --name, --description or --status)");
    }
    let workflow = api(app)
        .await?
        .update(id, &patch)
        .await
        .map_err(api_error)
        .with_context(|| format!("update workflow '{id}'"))?;
    println!("✓ Updated workflow {} ({})", workflow.name, workflow.id);
    Ok(())
}

pub async fn delete(app: &App, id: &str) -> Result<()> {
    api(app)
        .await?
        .delete(id)
        .await
        .map_err(api_error)
        .with_context(|| format!("delete workflow '{id}'"))?;
    println!("✓ Deleted workflow {id}");
    Ok(())
}

fn print_workflow(workflow: &Workflow) {
    println!("{}  {}", workflow.id, workflow.name);
    println!("  Status:  {}", workflow.status);
    if !workflow.description.is_empty() {
        println!("  About:   {}", workflow.description);
    }
    if !workflow.created_by.is_empty() {
        println!("  Owner:   {}", workflow.created_by);
    }
    if !workflow.created_at.is_empty() {
        println!("  Created: {}", workflow.created_at);
    }
    if !workflow.updated_at.is_empty() {
        println!("  Updated: {}", workflow.updated_at);
    }
}
