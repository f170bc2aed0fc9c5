//! Environment variable fallback resolution.
//!
//! Environment variables never override an explicit TOML value; they only
//! fill in fields a loaded config left at their type default.

use crate::types::Config;

/// Applies `FORGE_LLM_API_KEY`, `FORGE_LLM_MODEL`, `FORGE_LLM_PROVIDER` as
/// fallbacks for the corresponding `[model]` fields when the merged config
/// left them unset.
pub fn apply_env_fallbacks(config: &mut Config) {
    if config.model.api_key.is_none() {
        if let Ok(key) = std::env::var("FORGE_LLM_API_KEY") {
            config.model.api_key = Some(key);
        }
    }
    if let Ok(model) = std::env::var("FORGE_LLM_MODEL") {
        config.model.model = model;
    }
    if let Ok(provider) = std::env::var("FORGE_LLM_PROVIDER") {
        config.model.provider = provider;
    }
}

/// Whether `FORGE_DEBUG` requests verbose logging regardless of the
/// configured level.
#[must_use]
pub fn debug_requested() -> bool {
    std::env::var("FORGE_DEBUG").is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_env_fallback_fills_unset_field() {
        std::env::remove_var("FORGE_LLM_MODEL");
        std::env::remove_var("FORGE_LLM_PROVIDER");
        std::env::set_var("FORGE_LLM_API_KEY", "sk-test");
        let mut config = Config::default();
        apply_env_fallbacks(&mut config);
        assert_eq!(config.model.api_key.as_deref(), Some("sk-test"));
        std::env::remove_var("FORGE_LLM_API_KEY");
    }

    #[test]
    fn explicit_config_value_is_not_overridden() {
        std::env::set_var("FORGE_LLM_API_KEY", "sk-env");
        let mut config = Config::default();
        config.model.api_key = Some("sk-explicit".to_string());
        apply_env_fallbacks(&mut config);
        assert_eq!(config.model.api_key.as_deref(), Some("sk-explicit"));
        std::env::remove_var("FORGE_LLM_API_KEY");
    }

    #[test]
    fn debug_flag_recognizes_truthy_values() {
        std::env::set_var("FORGE_DEBUG", "true");
        assert!(debug_requested());
        std::env::remove_var("FORGE_DEBUG");
        assert!(!debug_requested());
    }
}
