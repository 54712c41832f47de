use std::path::Path;

use forthboy::ConsoleSettings;
use gameforth::ForthParams;
use miette::{Context, IntoDiagnostic};
use serde::{Deserialize, Serialize};

/// Settings read from the `--config` file. Missing tables and keys keep
/// their defaults.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub forth: ForthParams,
    pub console: ConsoleSettings,
}

impl Config {
    pub fn load(path: Option<&Path>) -> miette::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to read config {}", path.display()))?;
        let config = Self::from_toml(&text)
            .wrap_err_with(|| format!("failed to parse config {}", path.display()))?;
        tracing::debug!(?config, "loaded config");
        Ok(config)
    }

    fn from_toml(s: &str) -> miette::Result<Self> {
        toml::from_str(s).into_diagnostic()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [forth]
            step_budget = 5000
            data_stack_elems = 64

            [console]
            entry_point = "frame"
            "#,
        )
        .unwrap();
        assert_eq!(config.forth.step_budget, Some(5000));
        assert_eq!(config.forth.data_stack_elems, 64);
        assert_eq!(config.forth.memory_bytes, ForthParams::default().memory_bytes);
        assert_eq!(config.console.entry_point, "frame");
        assert_eq!(config.console.tick_interval_ms, 33);
    }

    #[test]
    fn empty_config_is_default() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Config::from_toml("[forth]\nstack = 3\n").is_err());
        assert!(Config::from_toml("[video]\nscale = 3\n").is_err());
    }
}
