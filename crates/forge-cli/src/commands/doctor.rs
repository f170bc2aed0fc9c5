//! Health checks against the local environment and configuration, without
//! requiring a full kernel bootstrap to succeed first.

use colored::Colorize;
use forge_kernel::Kernel;

use crate::theme::Theme;

/// Run through configuration, config-dir, API-key, and bootstrap checks,
/// printing a pass/warn/fail line for each.
pub(crate) async fn run() -> anyhow::Result<()> {
    println!("{}", Theme::header("Forge Doctor"));
    println!();

    print!("  Checking configuration... ");
    let workspace_root = std::env::current_dir()?;
    match forge_config::load(Some(&workspace_root), None) {
        Ok(config) => {
            println!("{}", "OK".green());
            println!("    Provider: {} ({})", config.model.provider, config.model.model);
        }
        Err(error) => {
            println!("{}", "FAIL".red());
            println!("    {error}");
        }
    }

    print!("  Checking config directory... ");
    match forge_core::dirs::config_dir() {
        Ok(dir) => {
            println!("{}", "OK".green());
            println!("    {}", dir.display());
        }
        Err(error) => {
            println!("{}", "FAIL".red());
            println!("    {error}");
        }
    }

    print!("  Checking LLM credentials... ");
    if std::env::var("FORGE_LLM_API_KEY").is_ok() {
        println!("{}", "OK".green());
    } else {
        println!("{}", "WARN".yellow());
        println!("    {}", "no FORGE_LLM_API_KEY set; bootstrap will fail unless config.yaml carries an api_key".dimmed());
    }

    print!("  Checking kernel bootstrap... ");
    match Kernel::bootstrap(workspace_root).await {
        Ok(kernel) => {
            println!("{}", "OK".green());
            let container = kernel.container();
            println!("    Tools registered: {}", container.registry.len());
            println!("    Agent types: {}", container.agent_types.len());
        }
        Err(error) => {
            println!("{}", "FAIL".red());
            println!("    {error}");
        }
    }

    println!();
    println!("{}", Theme::success("Doctor run complete"));
    Ok(())
}
