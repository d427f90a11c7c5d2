//! Tracing compatibility layer for structured logging.
//!
//! This module provides a unified interface for logging that works whether or
//! not the `tracing-integration` feature is enabled:
//!
//! - **With feature enabled**: Re-exports from the `tracing` crate.
//! - **Without feature**: No-op macros that compile to nothing.
//!
//! Not to be confused with [`crate::trace`], which records *suspension points*
//! of task frames; this module only concerns log output.
//!
//! # Usage
//!
//! ```rust,ignore
//! use cotask::tracing_compat::{debug, trace};
//!
//! debug!(frame = %id, "frame attached");
//! ```

#[cfg(feature = "tracing-integration")]
pub use tracing::{Level, debug, debug_span, error, info, trace, warn};

// When tracing is disabled, provide no-op macros
#[cfg(not(feature = "tracing-integration"))]
mod noop {
    //! No-op implementations when tracing is disabled.

    #[doc(hidden)]
    #[macro_export]
    macro_rules! __cotask_noop_event {
        ($($arg:tt)*) => {};
    }

    #[doc(hidden)]
    #[macro_export]
    macro_rules! __cotask_noop_span {
        ($($arg:tt)*) => {
            $crate::tracing_compat::NoopSpan
        };
    }

    pub use crate::__cotask_noop_event as debug;
    pub use crate::__cotask_noop_event as error;
    pub use crate::__cotask_noop_event as info;
    pub use crate::__cotask_noop_event as trace;
    pub use crate::__cotask_noop_event as warn;
    pub use crate::__cotask_noop_span as debug_span;
}

#[cfg(not(feature = "tracing-integration"))]
pub use noop::*;

/// A no-op span returned by the span macros when tracing is disabled.
#[cfg(not(feature = "tracing-integration"))]
#[derive(Debug, Clone, Copy)]
pub struct NoopSpan;

#[cfg(not(feature = "tracing-integration"))]
impl NoopSpan {
    /// Returns a no-op guard that does nothing on drop.
    #[inline]
    #[must_use]
    pub const fn enter(&self) -> NoopGuard {
        NoopGuard
    }

    /// Returns self (no-op).
    #[inline]
    #[must_use]
    pub const fn entered(self) -> Self {
        self
    }
}

/// A no-op span guard that does nothing on drop.
#[cfg(not(feature = "tracing-integration"))]
#[derive(Debug)]
pub struct NoopGuard;

/// No-op level type for when tracing is disabled.
#[cfg(not(feature = "tracing-integration"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Level;

#[cfg(not(feature = "tracing-integration"))]
impl Level {
    /// Trace level (most verbose).
    pub const TRACE: Self = Self;
    /// Debug level.
    pub const DEBUG: Self = Self;
    /// Info level.
    pub const INFO: Self = Self;
    /// Warn level.
    pub const WARN: Self = Self;
    /// Error level.
    pub const ERROR: Self = Self;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_logging;

    #[test]
    fn macros_compile_in_both_modes() {
        init_test_logging();
        crate::test_phase!("macros_compile_in_both_modes");
        trace!("trace message");
        debug!(count = 42, "debug with field");
        info!(name = "test", "info with field");
        warn!("warn message");
        error!("error message");

        let span = debug_span!("frame", id = 3);
        let _guard = span.enter();
        let _ = Level::DEBUG;
        crate::test_complete!("macros_compile_in_both_modes");
    }
}
