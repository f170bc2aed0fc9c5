//! `forge workflow run <name>` / `forge workflow resume <id>`: drive a
//! named workflow definition, or a checkpointed run, to completion while
//! rendering its event stream.

use forge_core::WorkflowId;
use forge_kernel::Kernel;

use crate::formatter::{render_event, OutputFormat};
use crate::theme::Theme;

/// Start a named workflow (`.forge/workflows/<name>.yaml`) with `inputs`
/// parsed as a JSON object, and stream its progress to completion.
pub(crate) async fn run(kernel: &Kernel, name: &str, inputs: serde_json::Value, format: OutputFormat) -> anyhow::Result<()> {
    let (workflow_id, events) = kernel.run_workflow(name, inputs).await?;
    println!("{}", Theme::info(&format!("workflow {workflow_id} started")));
    stream_to_completion(events, format).await
}

/// Resume a checkpointed workflow run by id and stream its progress to
/// completion.
pub(crate) async fn resume(kernel: &Kernel, id: &str, format: OutputFormat) -> anyhow::Result<()> {
    let workflow_id: WorkflowId = id.parse().map_err(|_| anyhow::anyhow!("invalid workflow id: {id}"))?;
    let (workflow_id, events) = kernel.resume_workflow(workflow_id).await?;
    println!("{}", Theme::info(&format!("workflow {workflow_id} resumed")));
    stream_to_completion(events, format).await
}

async fn stream_to_completion(mut events: forge_events::EventReceiver, format: OutputFormat) -> anyhow::Result<()> {
    use forge_events::ForgeEvent;

    while let Some(event) = events.recv().await {
        let is_terminal = matches!(event.as_ref(), ForgeEvent::WorkflowProgress { completed, total, .. } if completed == total);
        render_event(event.as_ref(), format);
        if is_terminal || matches!(event.as_ref(), ForgeEvent::Error { .. }) {
            break;
        }
    }
    Ok(())
}
