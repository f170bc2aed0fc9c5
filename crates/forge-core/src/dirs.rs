//! Resolution of the on-disk directory the substrate persists state under.
//!
//! Precedence: `FORGE_CONFIG_DIR` env var, then `~/.forge`. The resolved
//! directory holds `config.toml`, `permissions.yaml`, `sessions/`, and
//! `hooks/` — the layout named in the persisted-state contract.

use std::path::{Path, PathBuf};

use directories::BaseDirs;

use crate::error::{ForgeError, ForgeResult};

/// The environment variable that overrides the config/state directory.
pub const FORGE_CONFIG_DIR_ENV: &str = "FORGE_CONFIG_DIR";

/// Resolve the root config/state directory, honoring `FORGE_CONFIG_DIR`.
///
/// # Errors
///
/// Returns [`ForgeError::Internal`] if no override is set and the platform
/// home directory cannot be determined.
pub fn config_dir() -> ForgeResult<PathBuf> {
    if let Ok(dir) = std::env::var(FORGE_CONFIG_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    let base = BaseDirs::new()
        .ok_or_else(|| ForgeError::Internal("could not determine home directory".to_string()))?;
    Ok(base.home_dir().join(".forge"))
}

/// The sessions directory (`<config_dir>/sessions`).
pub fn sessions_dir(config_dir: &Path) -> PathBuf {
    config_dir.join("sessions")
}

/// The session backups directory (`<config_dir>/sessions/backups`).
pub fn session_backups_dir(config_dir: &Path) -> PathBuf {
    sessions_dir(config_dir).join("backups")
}

/// The session index file (`<config_dir>/sessions/index.json`).
pub fn session_index_path(config_dir: &Path) -> PathBuf {
    sessions_dir(config_dir).join("index.json")
}

/// The hooks directory (`<config_dir>/hooks`).
pub fn hooks_dir(config_dir: &Path) -> PathBuf {
    config_dir.join("hooks")
}

/// The user-level hook definitions file (`<config_dir>/hooks.yaml`).
pub fn hooks_config_path(config_dir: &Path) -> PathBuf {
    config_dir.join("hooks.yaml")
}

/// The project-level hook definitions file, relative to a workspace root.
pub fn project_hooks_path(workspace_root: &Path) -> PathBuf {
    workspace_root.join(".forge").join("hooks.yaml")
}

/// A named workflow definition file (`<workspace_root>/.forge/workflows/<name>.yaml`).
pub fn named_workflow_path(workspace_root: &Path, name: &str) -> PathBuf {
    workspace_root.join(".forge").join("workflows").join(format!("{name}.yaml"))
}

/// The project-level permission rules file, relative to a workspace root.
pub fn project_permissions_path(workspace_root: &Path) -> PathBuf {
    workspace_root.join(".forge").join("permissions.yaml")
}

/// The user-level permission rules file (`<config_dir>/permissions.yaml`).
pub fn user_permissions_path(config_dir: &Path) -> PathBuf {
    config_dir.join("permissions.yaml")
}

/// The workflow checkpoint directory (`<config_dir>/workflows`).
pub fn workflows_dir(config_dir: &Path) -> PathBuf {
    config_dir.join("workflows")
}

/// The checkpoint file for one workflow run (`<config_dir>/workflows/<id>.json`).
pub fn workflow_checkpoint_path(config_dir: &Path, workflow_id: &crate::types::WorkflowId) -> PathBuf {
    workflows_dir(config_dir).join(format!("{workflow_id}.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_override_wins() {
        std::env::set_var(FORGE_CONFIG_DIR_ENV, "/tmp/forge-test-dir");
        assert_eq!(config_dir().unwrap(), PathBuf::from("/tmp/forge-test-dir"));
        std::env::remove_var(FORGE_CONFIG_DIR_ENV);
    }

    #[test]
    fn derived_paths_nest_under_config_dir() {
        let root = PathBuf::from("/tmp/forge-test-dir2");
        assert_eq!(sessions_dir(&root), root.join("sessions"));
        assert_eq!(session_backups_dir(&root), root.join("sessions/backups"));
        assert_eq!(session_index_path(&root), root.join("sessions/index.json"));
        assert_eq!(hooks_dir(&root), root.join("hooks"));
        assert_eq!(hooks_config_path(&root), root.join("hooks.yaml"));
    }

    #[test]
    fn project_scoped_paths_nest_under_workspace_dot_forge() {
        let root = PathBuf::from("/tmp/forge-test-workspace");
        assert_eq!(project_hooks_path(&root), root.join(".forge/hooks.yaml"));
        assert_eq!(named_workflow_path(&root, "release"), root.join(".forge/workflows/release.yaml"));
    }

    #[test]
    fn workflow_paths_nest_under_config_dir() {
        let root = PathBuf::from("/tmp/forge-test-dir3");
        let id = crate::types::WorkflowId::new();
        assert_eq!(workflows_dir(&root), root.join("workflows"));
        assert_eq!(workflow_checkpoint_path(&root, &id), root.join("workflows").join(format!("{id}.json")));
    }
}
