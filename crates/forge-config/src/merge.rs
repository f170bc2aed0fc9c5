//! Layered TOML merging.
//!
//! Tables merge recursively per-field; scalars and arrays from the overlay
//! replace the base value outright.

/// Recursively deep-merge `overlay` into `base`, in place.
pub fn deep_merge(base: &mut toml::Value, overlay: &toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                if let Some(base_val) = base_table.get_mut(key) {
                    deep_merge(base_val, overlay_val);
                } else {
                    base_table.insert(key.clone(), overlay_val.clone());
                }
            }
        }
        (base, overlay) => {
            *base = overlay.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toml::toml;

    #[test]
    fn scalar_overlay_replaces_base() {
        let mut base = toml::Value::Table(toml! { [model]
            provider = "claude"
            max_tokens = 4096
        });
        let overlay = toml::Value::Table(toml! { [model]
            max_tokens = 8192
        });
        deep_merge(&mut base, &overlay);
        assert_eq!(base["model"]["provider"].as_str(), Some("claude"));
        assert_eq!(base["model"]["max_tokens"].as_integer(), Some(8192));
    }

    #[test]
    fn nested_tables_merge_recursively() {
        let mut base = toml::Value::Table(toml! {
            [runtime]
            max_iterations = 100
            max_depth = 5
        });
        let overlay = toml::Value::Table(toml! {
            [runtime]
            max_depth = 3
        });
        deep_merge(&mut base, &overlay);
        assert_eq!(base["runtime"]["max_iterations"].as_integer(), Some(100));
        assert_eq!(base["runtime"]["max_depth"].as_integer(), Some(3));
    }

    #[test]
    fn new_table_introduced_by_overlay_is_inserted() {
        let mut base = toml::Value::Table(toml::map::Map::new());
        let overlay = toml::Value::Table(toml! {
            [logging]
            level = "debug"
        });
        deep_merge(&mut base, &overlay);
        assert_eq!(base["logging"]["level"].as_str(), Some("debug"));
    }
}
