//! `forge sessions list|show|delete`.

use colored::Colorize;
use forge_core::SessionId;
use forge_kernel::Kernel;

use crate::theme::Theme;

/// List every persisted session as a summary table.
pub(crate) async fn list(kernel: &Kernel) -> anyhow::Result<()> {
    let summaries = kernel.list_sessions().await?;
    if summaries.is_empty() {
        println!("{}", Theme::info("no sessions found"));
        return Ok(());
    }

    println!("{:>38} {:>20} {:>8} {}", "ID".dimmed(), "UPDATED".dimmed(), "MSGS".dimmed(), "TITLE".dimmed());
    println!("{}", Theme::separator());
    for summary in summaries {
        println!(
            "{:>38} {:>20} {:>8} {}",
            Theme::id(&summary.id.to_string()),
            summary.updated_at.format("%Y-%m-%d %H:%M"),
            summary.message_count,
            summary.title.as_deref().unwrap_or("(untitled)"),
        );
    }
    Ok(())
}

/// Print a session's full message transcript.
pub(crate) async fn show(kernel: &Kernel, id: &str) -> anyhow::Result<()> {
    let id = parse_session_id(id)?;
    let session = kernel.resume_session(&id).await?;

    println!("{}", Theme::header(&format!("Session {}", session.id)));
    println!("  model: {}", session.model_id.as_deref().unwrap_or("unknown"));
    println!(
        "  tokens: {} prompt / {} completion",
        session.token_usage.prompt_tokens, session.token_usage.completion_tokens
    );
    println!();

    for message in &session.messages {
        println!("{}", Theme::separator());
        println!("{message:?}");
    }
    Ok(())
}

/// Delete a session and its backups.
pub(crate) async fn delete(kernel: &Kernel, id: &str) -> anyhow::Result<()> {
    let id = parse_session_id(id)?;
    kernel.delete_session(&id).await?;
    println!("{}", Theme::success(&format!("deleted session {id}")));
    Ok(())
}

fn parse_session_id(id: &str) -> anyhow::Result<SessionId> {
    id.parse().map_err(|_| anyhow::anyhow!("invalid session id: {id}"))
}
