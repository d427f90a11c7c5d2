//! Environment variable and config file support for [`RuntimeBuilder`](super::builder::RuntimeBuilder).
//!
//! # Configuration Precedence
//!
//! Settings are resolved in this order (highest priority first):
//!
//! 1. **Programmatic**: values set via builder methods (`poll_budget(64)`)
//! 2. **Environment variables**: values from `COTASK_*` env vars
//! 3. **Config file**: values loaded from a TOML file (requires `config-file` feature)
//! 4. **Defaults**: built-in defaults from [`RuntimeConfig::default()`]
//!
//! # Supported Environment Variables
//!
//! | Variable | Type | Maps to |
//! |----------|------|---------|
//! | `COTASK_POLL_BUDGET` | `usize` | `poll_budget` |
//! | `COTASK_CATCH_PANICS` | `bool` | `catch_panics` |
//! | `COTASK_FRAME_CAPACITY` | `usize` | `frame_capacity` |
//! | `COTASK_TRACE_CAPACITY` | `usize` | `trace_capacity` |

use super::config::{ConfigError, RuntimeConfig};

/// Environment variable name for the per-`run` poll budget.
pub const ENV_POLL_BUDGET: &str = "COTASK_POLL_BUDGET";
/// Environment variable name for panic capture.
pub const ENV_CATCH_PANICS: &str = "COTASK_CATCH_PANICS";
/// Environment variable name for the initial frame arena capacity.
pub const ENV_FRAME_CAPACITY: &str = "COTASK_FRAME_CAPACITY";
/// Environment variable name for the trace node reservation.
pub const ENV_TRACE_CAPACITY: &str = "COTASK_TRACE_CAPACITY";

/// Apply environment variable overrides to a [`RuntimeConfig`].
///
/// Only variables that are set in the environment are applied.
/// Returns an error if a variable is set but contains an unparseable value.
pub fn apply_env_overrides(config: &mut RuntimeConfig) -> Result<(), ConfigError> {
    apply_overrides_from(config, |name| std::env::var(name).ok())
}

/// Apply overrides read through `lookup` instead of the process environment.
pub fn apply_overrides_from<F>(config: &mut RuntimeConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup(ENV_POLL_BUDGET) {
        config.poll_budget = parse_usize(ENV_POLL_BUDGET, &val)?;
    }
    if let Some(val) = lookup(ENV_CATCH_PANICS) {
        config.catch_panics = parse_bool(ENV_CATCH_PANICS, &val)?;
    }
    if let Some(val) = lookup(ENV_FRAME_CAPACITY) {
        config.frame_capacity = parse_usize(ENV_FRAME_CAPACITY, &val)?;
    }
    if let Some(val) = lookup(ENV_TRACE_CAPACITY) {
        config.trace_capacity = parse_usize(ENV_TRACE_CAPACITY, &val)?;
    }
    Ok(())
}

fn parse_usize(var_name: &str, val: &str) -> Result<usize, ConfigError> {
    val.trim()
        .parse::<usize>()
        .map_err(|_| ConfigError::InvalidValue {
            key: var_name.to_owned(),
            expected: "unsigned integer",
            value: val.to_owned(),
        })
}

fn parse_bool(var_name: &str, val: &str) -> Result<bool, ConfigError> {
    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: var_name.to_owned(),
            expected: "bool (true/false/1/0/yes/no)",
            value: val.to_owned(),
        }),
    }
}

// =========================================================================
// TOML config file support (feature-gated)
// =========================================================================

/// TOML-deserializable runtime configuration.
///
/// ```toml
/// [runtime]
/// poll_budget = 256
/// catch_panics = true
/// frame_capacity = 128
/// trace_capacity = 128
/// ```
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
pub struct RuntimeTomlConfig {
    /// Runtime settings.
    #[serde(default)]
    pub runtime: RuntimeToml,
}

/// Runtime section of the TOML config.
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
pub struct RuntimeToml {
    /// Frames resumed per `run` call.
    pub poll_budget: Option<usize>,
    /// Capture panics as exceptions.
    pub catch_panics: Option<bool>,
    /// Initial frame arena capacity.
    pub frame_capacity: Option<usize>,
    /// Trace node reservation.
    pub trace_capacity: Option<usize>,
}

/// Apply a parsed TOML config to a [`RuntimeConfig`].
///
/// Only fields that are `Some` in the TOML struct override the config.
#[cfg(feature = "config-file")]
pub fn apply_toml_config(config: &mut RuntimeConfig, toml: &RuntimeTomlConfig) {
    if let Some(v) = toml.runtime.poll_budget {
        config.poll_budget = v;
    }
    if let Some(v) = toml.runtime.catch_panics {
        config.catch_panics = v;
    }
    if let Some(v) = toml.runtime.frame_capacity {
        config.frame_capacity = v;
    }
    if let Some(v) = toml.runtime.trace_capacity {
        config.trace_capacity = v;
    }
}

/// Parse a TOML string into a [`RuntimeTomlConfig`].
#[cfg(feature = "config-file")]
pub fn parse_toml_str(toml_str: &str) -> Result<RuntimeTomlConfig, ConfigError> {
    Ok(toml::from_str(toml_str)?)
}

/// Read and parse a TOML file into a [`RuntimeTomlConfig`].
#[cfg(feature = "config-file")]
pub fn parse_toml_file(path: &std::path::Path) -> Result<RuntimeTomlConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_toml_str(&content)
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn parse_usize_valid() {
        assert_eq!(parse_usize("X", "42").unwrap(), 42);
        assert_eq!(parse_usize("X", " 7 ").unwrap(), 7);
    }

    #[test]
    fn parse_usize_invalid() {
        let err = parse_usize("X", "-1").unwrap_err();
        assert!(err.to_string().contains("invalid value for X"));
    }

    #[test]
    fn parse_bool_truthy_and_falsy() {
        for val in ["true", "1", "yes", "on", "TRUE"] {
            assert!(parse_bool("X", val).unwrap(), "{val}");
        }
        for val in ["false", "0", "no", "off", "Off"] {
            assert!(!parse_bool("X", val).unwrap(), "{val}");
        }
        assert!(parse_bool("X", "maybe").is_err());
    }

    #[test]
    fn overrides_apply_each_variable() {
        crate::test_utils::init_test_logging();
        crate::test_phase!("overrides_apply_each_variable");
        let mut config = RuntimeConfig::default();
        apply_overrides_from(
            &mut config,
            lookup_from(&[
                (ENV_POLL_BUDGET, "16"),
                (ENV_CATCH_PANICS, "no"),
                (ENV_FRAME_CAPACITY, "512"),
                (ENV_TRACE_CAPACITY, "8"),
            ]),
        )
        .unwrap();
        assert_eq!(config.poll_budget, 16);
        assert!(!config.catch_panics);
        assert_eq!(config.frame_capacity, 512);
        assert_eq!(config.trace_capacity, 8);
        crate::test_complete!("overrides_apply_each_variable");
    }

    #[test]
    fn unset_variables_leave_defaults() {
        let mut config = RuntimeConfig::default();
        apply_overrides_from(&mut config, lookup_from(&[])).unwrap();
        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn invalid_variable_returns_error() {
        let mut config = RuntimeConfig::default();
        let err = apply_overrides_from(&mut config, lookup_from(&[(ENV_POLL_BUDGET, "many")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
        assert_eq!(config.poll_budget, RuntimeConfig::DEFAULT_POLL_BUDGET);
    }

    #[test]
    fn process_environment_is_read() {
        let _guard = crate::test_utils::env_lock();
        let mut config = RuntimeConfig::default();
        // None of the variables are set by the test harness.
        if std::env::var(ENV_POLL_BUDGET).is_err() {
            apply_env_overrides(&mut config).unwrap();
            assert_eq!(config.poll_budget, RuntimeConfig::DEFAULT_POLL_BUDGET);
        }
    }
}

#[cfg(all(test, feature = "config-file"))]
mod toml_tests {
    use super::*;

    #[test]
    fn parse_toml_full_config() {
        let toml_str = r"
[runtime]
poll_budget = 256
catch_panics = false
frame_capacity = 128
trace_capacity = 32
";
        let parsed = parse_toml_str(toml_str).unwrap();
        assert_eq!(parsed.runtime.poll_budget, Some(256));
        assert_eq!(parsed.runtime.catch_panics, Some(false));
        assert_eq!(parsed.runtime.frame_capacity, Some(128));
        assert_eq!(parsed.runtime.trace_capacity, Some(32));
    }

    #[test]
    fn parse_toml_empty_config() {
        let parsed = parse_toml_str("").unwrap();
        let mut config = RuntimeConfig::default();
        apply_toml_config(&mut config, &parsed);
        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn parse_toml_wrong_type() {
        let result = parse_toml_str("[runtime]\npoll_budget = \"lots\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn toml_file_not_found() {
        let err = parse_toml_file(std::path::Path::new("/nonexistent/cotask.toml")).unwrap_err();
        assert!(
            matches!(&err, ConfigError::Read { path, .. } if path == "/nonexistent/cotask.toml"),
            "{err}"
        );
        assert!(err.to_string().contains("failed to read"));
    }

    #[test]
    fn toml_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runtime.toml");
        std::fs::write(&path, "[runtime]\npoll_budget = 64\n").unwrap();

        let parsed = parse_toml_file(&path).unwrap();
        let mut config = RuntimeConfig::default();
        apply_toml_config(&mut config, &parsed);
        assert_eq!(config.poll_budget, 64);
        assert!(config.catch_panics);
    }
}
