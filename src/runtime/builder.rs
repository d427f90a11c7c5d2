//! Runtime builder.

use super::Runtime;
use super::config::{ConfigError, RuntimeConfig};
use super::env_config;

/// Builder for constructing a runtime with custom configuration.
///
/// Values set through builder methods win over environment variables, which
/// win over a config file, which wins over [`RuntimeConfig::default()`].
#[derive(Debug, Clone, Default)]
pub struct RuntimeBuilder {
    poll_budget: Option<usize>,
    catch_panics: Option<bool>,
    frame_capacity: Option<usize>,
    trace_capacity: Option<usize>,
    read_env: bool,
    #[cfg(feature = "config-file")]
    config_file: Option<std::path::PathBuf>,
}

impl RuntimeBuilder {
    /// Create a new builder with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how many woken frames a single `run` call may resume.
    #[must_use]
    pub const fn poll_budget(mut self, budget: usize) -> Self {
        self.poll_budget = Some(budget);
        self
    }

    /// Choose whether panics in task bodies become exceptions.
    #[must_use]
    pub const fn catch_panics(mut self, enable: bool) -> Self {
        self.catch_panics = Some(enable);
        self
    }

    /// Set the initial frame arena capacity.
    #[must_use]
    pub const fn frame_capacity(mut self, capacity: usize) -> Self {
        self.frame_capacity = Some(capacity);
        self
    }

    /// Set how many trace nodes to reserve on the driving thread.
    #[must_use]
    pub const fn trace_capacity(mut self, capacity: usize) -> Self {
        self.trace_capacity = Some(capacity);
        self
    }

    /// Read `COTASK_*` environment variables when building.
    #[must_use]
    pub const fn with_env_overrides(mut self) -> Self {
        self.read_env = true;
        self
    }

    /// Load settings from a TOML file when building.
    #[cfg(feature = "config-file")]
    #[must_use]
    pub fn config_file(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Resolve the final configuration without building a runtime.
    pub fn resolve(&self) -> Result<RuntimeConfig, ConfigError> {
        let mut config = RuntimeConfig::default();
        #[cfg(feature = "config-file")]
        if let Some(path) = &self.config_file {
            let parsed = env_config::parse_toml_file(path)?;
            env_config::apply_toml_config(&mut config, &parsed);
        }
        if self.read_env {
            env_config::apply_env_overrides(&mut config)?;
        }
        if let Some(v) = self.poll_budget {
            config.poll_budget = v;
        }
        if let Some(v) = self.catch_panics {
            config.catch_panics = v;
        }
        if let Some(v) = self.frame_capacity {
            config.frame_capacity = v;
        }
        if let Some(v) = self.trace_capacity {
            config.trace_capacity = v;
        }
        config.validate()?;
        Ok(config)
    }

    /// Build a runtime from this configuration.
    pub fn build(self) -> Result<Runtime, ConfigError> {
        Ok(Runtime::with_config(self.resolve()?))
    }
}
