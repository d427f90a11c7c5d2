//! Test utilities for cotask.
//!
//! This module provides shared helpers for unit and integration tests:
//! - Consistent tracing-based logging initialization
//! - Phase/section macros for readable test output
//! - Runtime constructors and a task runner
//! - A drop counter for ownership tests
//!
//! # Example
//! ```
//! use cotask::test_utils::{init_test_logging, run_task};
//! use cotask::Task;
//!
//! init_test_logging();
//! let value = run_task(Task::new(async { Ok(7) })).expect("task completes");
//! assert_eq!(value, 7);
//! ```

use crate::error::Result;
use crate::runtime::{Runtime, RuntimeConfig};
use crate::task::{Task, TaskEnv};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use tracing_subscriber::fmt::format::FmtSpan;

static INIT_LOGGING: Once = Once::new();
static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Stack size used by [`run_on_large_stack`].
pub const LARGE_STACK_SIZE: usize = 2 * 1024 * 1024;

/// Initialize test logging with trace-level output.
///
/// Safe to call multiple times; only initializes once.
pub fn init_test_logging() {
    init_test_logging_with_level(tracing::Level::TRACE);
}

/// Initialize test logging with a custom level.
///
/// The first call wins; later calls are no-ops.
pub fn init_test_logging_with_level(level: tracing::Level) {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_test_writer()
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(false)
            .try_init();
    });
}

/// Acquire the global environment lock for tests that read env vars.
#[allow(dead_code)]
pub(crate) fn env_lock() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Create a runtime with the default configuration.
#[must_use]
pub fn test_runtime() -> Runtime {
    Runtime::new()
}

/// Create a runtime that lets panics propagate instead of capturing them.
#[must_use]
pub fn test_runtime_without_panic_capture() -> Runtime {
    Runtime::with_config(RuntimeConfig {
        catch_panics: false,
        ..RuntimeConfig::default()
    })
}

/// Drive `task` to completion on a fresh runtime and return its result.
pub fn run_task<T, E>(task: Task<T, E>) -> Result<T>
where
    T: 'static,
    E: crate::env::Inherit + crate::env::Environment + 'static,
{
    init_test_logging();
    test_runtime().block_on(task)
}

/// Drive a task with the default environment to completion.
pub fn run_default<T: 'static>(task: Task<T, TaskEnv>) -> Result<T> {
    run_task(task)
}

/// Run `f` on a dedicated thread with a fixed-size stack and return its value.
///
/// Used to show that deep await chains do not grow the native stack.
pub fn run_on_large_stack<F, R>(f: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let handle = std::thread::Builder::new()
        .name("cotask-large-stack".into())
        .stack_size(LARGE_STACK_SIZE)
        .spawn(f)
        .expect("spawn test thread");
    match handle.join() {
        Ok(value) => value,
        Err(payload) => std::panic::resume_unwind(payload),
    }
}

/// Counts how many times tracked values are dropped.
#[derive(Debug, Clone, Default)]
pub struct DropCounter {
    drops: Arc<AtomicUsize>,
}

impl DropCounter {
    /// Creates a new counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a guard that bumps the counter when dropped.
    #[must_use]
    pub fn guard(&self) -> DropGuard {
        DropGuard {
            drops: Arc::clone(&self.drops),
        }
    }

    /// Returns the number of guards dropped so far.
    #[must_use]
    pub fn count(&self) -> usize {
        self.drops.load(Ordering::SeqCst)
    }
}

/// Bumps its [`DropCounter`] exactly once when dropped.
#[derive(Debug)]
pub struct DropGuard {
    drops: Arc<AtomicUsize>,
}

impl Drop for DropGuard {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Log a test phase transition with a visual separator.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(phase = %$name, "========================================");
        tracing::info!(phase = %$name, "TEST PHASE: {}", $name);
        tracing::info!(phase = %$name, "========================================");
    };
}

/// Log a section within a test phase.
#[macro_export]
macro_rules! test_section {
    ($name:expr) => {
        tracing::debug!(section = %$name, "--- {} ---", $name);
    };
}

/// Log test completion with summary.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = %$name, "test completed successfully: {}", $name);
    };
    ($name:expr, $($key:ident = $value:expr),* $(,)?) => {
        tracing::info!(
            test = %$name,
            $($key = %$value,)*
            "test completed successfully: {}",
            $name
        );
    };
}

/// Log before assertions for context.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {
        tracing::debug!(
            expected = ?$expected,
            actual = ?$actual,
            "Asserting: {}",
            $msg
        );
        assert!($cond, "{}: expected {:?}, got {:?}", $msg, $expected, $actual);
    };
}
