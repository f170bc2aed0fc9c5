//! Config file discovery and layered loading.
//!
//! Implements `Config::load()`:
//! 1. Parse the embedded `defaults.toml` → base.
//! 2. Merge `~/.forge/config.toml` (user), if present.
//! 3. Merge `{workspace}/.forge/config.toml` (project), if present.
//! 4. Apply environment variable fallbacks for fields still unset.
//! 5. Deserialize the merged tree into [`Config`].
//! 6. Validate.

use std::path::{Path, PathBuf};

use directories::BaseDirs;
use tracing::info;

use crate::env::apply_env_fallbacks;
use crate::error::{ConfigError, ConfigResult};
use crate::merge::deep_merge;
use crate::types::Config;
use crate::validate;

const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Load configuration with the full precedence chain: defaults → user →
/// project → environment fallbacks.
///
/// `workspace_root` is the project directory (e.g. the repo root); the
/// project layer is skipped if `None`. `home_override` replaces the
/// platform home directory lookup for user-level discovery — primarily for
/// tests.
///
/// # Errors
///
/// Returns a [`ConfigError`] if any config file is malformed, or if the
/// merged configuration fails validation.
pub fn load(workspace_root: Option<&Path>, home_override: Option<&Path>) -> ConfigResult<Config> {
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|source| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source,
        })?;

    let user_path = user_config_path(home_override)?;
    if let Some(overlay) = try_load_file(&user_path)? {
        deep_merge(&mut merged, &overlay);
        info!(path = %user_path.display(), "loaded user config");
    }

    if let Some(root) = workspace_root {
        let project_path = root.join(".forge").join("config.toml");
        if let Some(overlay) = try_load_file(&project_path)? {
            deep_merge(&mut merged, &overlay);
            info!(path = %project_path.display(), "loaded project config");
        }
    }

    let mut config: Config = merged.try_into().map_err(|source| ConfigError::ParseError {
        path: "<merged config>".to_owned(),
        source,
    })?;

    apply_env_fallbacks(&mut config);
    validate::validate(&config)?;
    Ok(config)
}

/// Load configuration from a single file, with no layering. Used by `forge
/// config validate <path>`-style tooling.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
/// validation.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
        path: path.display().to_string(),
        source,
    })?;
    let mut config: Config = toml::from_str(&text).map_err(|source| ConfigError::ParseError {
        path: path.display().to_string(),
        source,
    })?;
    apply_env_fallbacks(&mut config);
    validate::validate(&config)?;
    Ok(config)
}

fn user_config_path(home_override: Option<&Path>) -> ConfigResult<PathBuf> {
    if let Ok(dir) = std::env::var("FORGE_CONFIG_DIR") {
        return Ok(PathBuf::from(dir).join("config.toml"));
    }
    if let Some(home) = home_override {
        return Ok(home.join("config.toml"));
    }
    let base = BaseDirs::new().ok_or(ConfigError::NoHomeDirectory)?;
    Ok(base.home_dir().join(".forge").join("config.toml"))
}

fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    match std::fs::read_to_string(path) {
        Ok(text) => {
            let value = toml::from_str(&text).map_err(|source| ConfigError::ParseError {
                path: path.display().to_string(),
                source,
            })?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_alone_load_and_validate() {
        let dir = tempfile::tempdir().unwrap();
        let config = load(None, Some(dir.path())).unwrap();
        assert_eq!(config.model.provider, "claude");
    }

    #[test]
    fn user_config_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("config.toml")).unwrap();
        writeln!(file, "[model]\nmax_tokens = 8192\n").unwrap();
        let config = load(None, Some(dir.path())).unwrap();
        assert_eq!(config.model.max_tokens, 8192);
        assert_eq!(config.model.provider, "claude");
    }

    #[test]
    fn project_config_overrides_user_config() {
        let home = tempfile::tempdir().unwrap();
        let mut user_file = std::fs::File::create(home.path().join("config.toml")).unwrap();
        writeln!(user_file, "[runtime]\nmax_depth = 2\n").unwrap();

        let workspace = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(workspace.path().join(".forge")).unwrap();
        let mut project_file = std::fs::File::create(workspace.path().join(".forge/config.toml")).unwrap();
        writeln!(project_file, "[runtime]\nmax_depth = 9\n").unwrap();

        let config = load(Some(workspace.path()), Some(home.path())).unwrap();
        assert_eq!(config.runtime.max_depth, 9);
    }

    #[test]
    fn invalid_config_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("config.toml")).unwrap();
        writeln!(file, "[model]\nprovider = \"unsupported\"\n").unwrap();
        assert!(load(None, Some(dir.path())).is_err());
    }

    #[test]
    fn load_file_reads_single_file_with_no_layering() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("standalone.toml");
        std::fs::write(&path, "[model]\nmax_tokens = 2048\n").unwrap();
        let config = load_file(&path).unwrap();
        assert_eq!(config.model.max_tokens, 2048);
    }
}
