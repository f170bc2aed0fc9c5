//! Environment variable denylist enforced on every hook and tool subprocess.
//!
//! Hooks run as child processes with the parent's environment inherited by
//! default; without this denylist a hook could smuggle in `LD_PRELOAD` or a
//! similar loader hijack and execute arbitrary code in-process for every
//! subsequent command.

/// Environment variable names (exact match) that are stripped from every
/// hook/tool subprocess environment before spawn.
pub const DENIED_ENV_VARS: &[&str] = &["LD_PRELOAD", "LD_LIBRARY_PATH", "PYTHONPATH"];

/// Environment variable name prefixes that are stripped in addition to the
/// exact-match list above.
pub const DENIED_ENV_PREFIXES: &[&str] = &["DYLD_"];

/// Whether `name` is denied by the hook/tool subprocess environment policy.
#[must_use]
pub fn is_denied(name: &str) -> bool {
    DENIED_ENV_VARS.contains(&name) || DENIED_ENV_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// Filter an environment map, returning the entries that are allowed to
/// reach a hook/tool subprocess and the names that were stripped.
pub fn filter_env<I>(vars: I) -> (Vec<(String, String)>, Vec<String>)
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut allowed = Vec::new();
    let mut stripped = Vec::new();
    for (key, value) in vars {
        if is_denied(&key) {
            stripped.push(key);
        } else {
            allowed.push((key, value));
        }
    }
    (allowed, stripped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_denied() {
        assert!(is_denied("LD_PRELOAD"));
        assert!(is_denied("LD_LIBRARY_PATH"));
        assert!(is_denied("PYTHONPATH"));
    }

    #[test]
    fn prefix_denied() {
        assert!(is_denied("DYLD_INSERT_LIBRARIES"));
        assert!(is_denied("DYLD_LIBRARY_PATH"));
    }

    #[test]
    fn unrelated_vars_allowed() {
        assert!(!is_denied("PATH"));
        assert!(!is_denied("HOME"));
        assert!(!is_denied("FORGE_CONFIG_DIR"));
    }

    #[test]
    fn filter_env_splits_allowed_and_stripped() {
        let input = vec![
            ("PATH".to_string(), "/usr/bin".to_string()),
            ("LD_PRELOAD".to_string(), "evil.so".to_string()),
            ("DYLD_INSERT_LIBRARIES".to_string(), "evil.dylib".to_string()),
        ];
        let (allowed, stripped) = filter_env(input);
        assert_eq!(allowed, vec![("PATH".to_string(), "/usr/bin".to_string())]);
        assert_eq!(stripped, vec!["LD_PRELOAD".to_string(), "DYLD_INSERT_LIBRARIES".to_string()]);
    }
}
