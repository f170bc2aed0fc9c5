//! Renders [`ForgeEvent`]s to the terminal, either as colored prose or as
//! newline-delimited JSON for piping into another tool.

use colored::Colorize;
use forge_events::ForgeEvent;

use crate::theme::Theme;

/// Selected output rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OutputFormat {
    /// Colored, human-oriented prose.
    Pretty,
    /// One JSON object per event, for piping.
    Json,
}

/// Render one event to stdout in the selected format.
///
/// `LlmChunk` is the only variant printed without a trailing newline in
/// pretty mode, since chunks are meant to read as one continuously
/// streaming line.
pub(crate) fn render_event(event: &ForgeEvent, format: OutputFormat) {
    if format == OutputFormat::Json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(error) => eprintln!("{}", Theme::error(&format!("failed to serialize event: {error}"))),
        }
        return;
    }

    match event {
        ForgeEvent::LlmChunk { delta, .. } => {
            print!("{delta}");
            let _ = std::io::Write::flush(&mut std::io::stdout());
        }
        ForgeEvent::ToolStart { tool, .. } => {
            println!("\n{}", format!("→ {tool}").blue());
        }
        ForgeEvent::ToolEnd { tool, is_error, duration_ms, .. } => {
            let status = if *is_error { "failed".red() } else { "done".green() };
            println!("{}", format!("  {tool} {status} ({duration_ms}ms)").dimmed());
        }
        ForgeEvent::StepStart { step_id, .. } => {
            println!("{}", format!("▶ step {step_id}").cyan());
        }
        ForgeEvent::StepEnd { step_id, success, .. } => {
            let status = if *success { "completed".green() } else { "failed".red() };
            println!("{}", format!("  step {step_id} {status}"));
        }
        ForgeEvent::WorkflowProgress { completed, total, .. } => {
            println!("{}", Theme::info(&format!("progress: {completed}/{total} steps")));
        }
        ForgeEvent::PermissionPrompt { request, .. } => {
            println!(
                "\n{}",
                Theme::warning(&format!("permission requested: {} on {}", request.action, request.resource))
            );
            println!("  {}", request.description.dimmed());
        }
        ForgeEvent::Warning { message, .. } => {
            println!("{}", Theme::warning(message));
        }
        ForgeEvent::Error { kind, message, .. } => {
            println!("{}", Theme::error(&format!("[{kind}] {message}")));
        }
        ForgeEvent::FinalMessage { text, .. } => {
            println!("\n{text}");
        }
    }
}
