//! Post-merge configuration validation.
//!
//! Validates that deserialized [`Config`](crate::Config) values are within
//! acceptable ranges and that cross-field invariants hold.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Upper bound on `model.max_tokens`, chosen to catch obvious typos rather
/// than any particular provider's real ceiling.
const MAX_TOKENS_UPPER_BOUND: usize = 16_000_000;

/// Validate a fully-merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_model(config)?;
    validate_runtime(config)?;
    validate_rate_limits(config)?;
    validate_workflow(config)?;
    validate_subagents(config)?;
    Ok(())
}

fn field_error(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_owned(),
        message: message.into(),
    }
}

fn validate_model(config: &Config) -> ConfigResult<()> {
    let m = &config.model;

    if !matches!(m.provider.as_str(), "claude" | "openai-compat") {
        return Err(field_error(
            "model.provider",
            format!("unsupported provider '{}'; expected one of: claude, openai-compat", m.provider),
        ));
    }

    if !(0.0..=1.0).contains(&m.temperature) {
        return Err(field_error(
            "model.temperature",
            format!("temperature {} must be between 0.0 and 1.0", m.temperature),
        ));
    }

    if m.max_tokens == 0 || m.max_tokens > MAX_TOKENS_UPPER_BOUND {
        return Err(field_error(
            "model.max_tokens",
            format!("max_tokens must be between 1 and {MAX_TOKENS_UPPER_BOUND}"),
        ));
    }

    Ok(())
}

fn validate_runtime(config: &Config) -> ConfigResult<()> {
    let r = &config.runtime;
    if r.max_depth == 0 {
        return Err(field_error("runtime.max_depth", "must be at least 1"));
    }
    if r.tool_fan_out == 0 {
        return Err(field_error("runtime.tool_fan_out", "must be at least 1"));
    }
    if r.max_tokens == 0 {
        return Err(field_error("runtime.max_tokens", "must be greater than 0"));
    }
    Ok(())
}

fn validate_rate_limits(config: &Config) -> ConfigResult<()> {
    let rl = &config.rate_limits;
    if rl.denial_threshold == 0 {
        return Err(field_error("rate_limits.denial_threshold", "must be at least 1"));
    }
    if rl.window_seconds == 0 {
        return Err(field_error("rate_limits.window_seconds", "must be greater than 0"));
    }
    Ok(())
}

fn validate_workflow(config: &Config) -> ConfigResult<()> {
    if config.workflow.max_parallel_steps == 0 {
        return Err(field_error("workflow.max_parallel_steps", "must be at least 1"));
    }
    Ok(())
}

fn validate_subagents(config: &Config) -> ConfigResult<()> {
    if config.subagents.max_concurrent == 0 {
        return Err(field_error("subagents.max_concurrent", "must be at least 1"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn unsupported_provider_rejected() {
        let mut config = Config::default();
        config.model.provider = "unknown".to_string();
        let err = validate(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { field, .. } if field == "model.provider"));
    }

    #[test]
    fn temperature_out_of_range_rejected() {
        let mut config = Config::default();
        config.model.temperature = 2.0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn zero_fan_out_rejected() {
        let mut config = Config::default();
        config.runtime.tool_fan_out = 0;
        assert!(validate(&config).is_err());
    }
}
