//! `forge init`: scaffold a `.forge/` directory in the current workspace.

use crate::theme::Theme;

const TEMPLATE_CONFIG: &str = r#"# Forge project configuration.
# Uncomment and edit; unset fields fall back to the user config / built-in
# defaults, then FORGE_LLM_API_KEY for the model's api_key.

# [model]
# provider = "claude"
# model = "claude-sonnet-4-20250514"
# max_tokens = 4096
# temperature = 0.7

# [runtime]
# max_tokens = 200000
# max_wall_seconds = 600
"#;

/// Scaffold `.forge/config.toml` and `.forge/workflows/` under the current
/// directory. A no-op if `.forge` already exists.
pub(crate) fn run() -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let dot_forge = cwd.join(".forge");

    if dot_forge.exists() {
        println!("{}", Theme::info(&format!("workspace already initialized at {}", dot_forge.display())));
        return Ok(());
    }

    std::fs::create_dir_all(dot_forge.join("workflows"))?;

    let config_path = dot_forge.join("config.toml");
    std::fs::write(&config_path, TEMPLATE_CONFIG)?;

    println!("{}", Theme::success(&format!("initialized workspace at {}", dot_forge.display())));
    println!("  config:    {}", config_path.display());
    println!("  workflows: {}", dot_forge.join("workflows").display());
    Ok(())
}
