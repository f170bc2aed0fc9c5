//! Interactive REPL: reads one line of user input at a time, drives it
//! through the kernel, and renders the resulting event stream until the
//! turn reaches a terminal state.

use std::io::Write as _;

use forge_core::SessionId;
use forge_events::{ForgeEvent, PermissionDecision};
use forge_kernel::Kernel;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::formatter::{render_event, OutputFormat};
use crate::theme::Theme;

/// Run the REPL, optionally resuming `session` (parsed as a [`SessionId`]).
pub(crate) async fn run(kernel: &Kernel, session: Option<String>, format: OutputFormat) -> anyhow::Result<()> {
    let mut session_id = match session {
        Some(raw) => Some(raw.parse::<SessionId>().map_err(|_| anyhow::anyhow!("invalid session id: {raw}"))?),
        None => None,
    };

    let mut stdin = BufReader::new(tokio::io::stdin());
    println!("{}", Theme::info("Type a message and press enter. `exit` to quit."));

    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line).await? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        let (started_session, run_id, mut events) = kernel.run(session_id.clone(), line.to_string()).await?;
        session_id = Some(started_session);

        loop {
            let Some(event) = events.recv().await else { break };
            if event.metadata().agent_run_id.as_ref() != Some(&run_id) {
                continue;
            }

            if let ForgeEvent::PermissionPrompt { request, .. } = event.as_ref() {
                render_event(event.as_ref(), format);
                let decision = prompt_decision(&mut stdin).await?;
                kernel.container().event_bus.respond_permission(request.id, decision);
                continue;
            }

            let is_terminal = matches!(event.as_ref(), ForgeEvent::FinalMessage { .. } | ForgeEvent::Error { .. });
            render_event(event.as_ref(), format);
            if is_terminal {
                break;
            }
        }
    }

    Ok(())
}

async fn prompt_decision(stdin: &mut BufReader<tokio::io::Stdin>) -> anyhow::Result<PermissionDecision> {
    print!("  allow? [y/N] ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    stdin.read_line(&mut line).await?;
    Ok(match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => PermissionDecision::Allow,
        _ => PermissionDecision::Deny,
    })
}
