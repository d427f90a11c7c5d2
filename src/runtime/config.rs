//! Runtime configuration types.

use thiserror::Error;

/// Errors produced while building a runtime configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable or config key held a value of the wrong shape.
    #[error("invalid value for {key}: expected {expected}, got {value:?}")]
    InvalidValue {
        /// The variable or key that was rejected.
        key: String,
        /// What the key accepts.
        expected: &'static str,
        /// The raw value that failed to parse.
        value: String,
    },
    /// The parsed configuration violates a constraint.
    #[error("invalid runtime configuration: {0}")]
    Invalid(String),
    /// A config file could not be read.
    #[cfg(feature = "config-file")]
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// The file that could not be read.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A config file could not be parsed.
    #[cfg(feature = "config-file")]
    #[error("failed to parse TOML config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Configuration for a [`Runtime`](super::Runtime).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Maximum number of woken frames resumed by a single [`Runtime::run`](super::Runtime::run) call.
    pub poll_budget: usize,
    /// Convert panics inside task bodies into [`ErrorKind::Panicked`](crate::ErrorKind::Panicked)
    /// exceptions instead of unwinding out of the driver.
    pub catch_panics: bool,
    /// Initial capacity of the frame arena.
    pub frame_capacity: usize,
    /// Number of trace nodes reserved on the driving thread at construction.
    pub trace_capacity: usize,
}

impl RuntimeConfig {
    /// Default poll budget per `run` call.
    pub const DEFAULT_POLL_BUDGET: usize = 1024;
    /// Default frame arena capacity.
    pub const DEFAULT_FRAME_CAPACITY: usize = 64;
    /// Default trace node reservation.
    pub const DEFAULT_TRACE_CAPACITY: usize = 64;

    /// Checks that the configuration can drive frames.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_budget == 0 {
            return Err(ConfigError::Invalid(
                "poll_budget must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            poll_budget: Self::DEFAULT_POLL_BUDGET,
            catch_panics: true,
            frame_capacity: Self::DEFAULT_FRAME_CAPACITY,
            trace_capacity: Self::DEFAULT_TRACE_CAPACITY,
        }
    }
}
