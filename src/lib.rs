//! Cotask: lazily started, single-owner async tasks driven by symmetric transfer.
//!
//! # Overview
//!
//! A [`Task`] is a unit of asynchronous work that does nothing until it is
//! awaited. Awaiting it attaches a *frame* to the [`Runtime`], records the
//! awaiting frame as the continuation, and transfers control to the new
//! frame. When the frame completes, control transfers back to the
//! continuation. Transfers go through a trampoline, so native stack depth
//! stays constant however deep an await chain grows.
//!
//! # Core Guarantees
//!
//! - **Single owner**: a task is consumed by its await; its result is read
//!   exactly once and its frame is destroyed by the awaiter
//! - **Lazy start**: dropping a task that was never awaited never runs it
//! - **Constant stack**: a 100 000-deep await chain runs on a small stack
//! - **Inheritable environments**: each frame carries an environment of
//!   facets, built from the awaiting frame's environment
//! - **Cooperative cancellation**: [`stopped()`] completes a frame without a
//!   result and notifies the awaiter, which may recover
//! - **Cheap traces**: each suspension point stores one location; a full
//!   [`Trace`] is only assembled when asked for
//!
//! # Module Structure
//!
//! - [`task`]: the `Task` handle and its awaiter
//! - [`detached`]: fire-and-forget roots and [`UnhandledExit`]
//! - [`runtime`]: the trampoline, its configuration and builder
//! - [`promise`]: symmetric results and stop handlers
//! - [`env`]: environments, facets and queries
//! - [`trace`](mod@trace): suspension-point traces
//! - [`types`]: identifiers and frame states
//! - [`error`](mod@error): error types
//! - [`util`]: internal utilities (arena)
//! - [`tracing_compat`]: optional tracing integration (requires `tracing-integration` feature)
//!
//! # Example
//!
//! ```
//! use cotask::{DetachedTask, Runtime, Task, current_trace};
//!
//! fn example_task() -> Task<i32> {
//!     Task::named("example_task", async {
//!         let trace = current_trace().await;
//!         assert_eq!(trace.entries()[0].function(), "example_task");
//!         Ok(42)
//!     })
//! }
//!
//! let runtime = Runtime::new();
//! runtime
//!     .start(DetachedTask::named("main", async {
//!         let value = example_task().await?;
//!         assert_eq!(value, 42);
//!         Ok(())
//!     }))
//!     .unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_inception)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]

pub mod detached;
pub mod env;
pub mod error;
pub mod promise;
pub mod runtime;
pub mod task;
pub mod trace;
pub mod tracing_compat;
pub mod types;
pub mod util;

// ── Test-only modules ───────────────────────────────────────────────────
#[cfg(any(test, feature = "test-internals"))]
pub mod test_utils;

// Re-exports for convenient access to core types
pub use detached::{DetachedEnv, DetachedTask, UnhandledExit};
pub use error::{Error, ErrorKind, Result, ResultExt};
pub use promise::{StopHandler, SymmetricResult, stopped};
pub use runtime::{
    ConfigError, FrameInfo, Runtime, RuntimeBuilder, RuntimeConfig, in_frame, yield_now,
};
pub use task::{Task, TaskAwaiter, TaskEnv};
pub use trace::{Trace, TraceEntry, TraceExt, current_trace};
pub use types::{FrameId, FrameKind, FrameState, PanicPayload};

// Re-export the attribute macros when the macros feature is enabled
#[cfg(feature = "macros")]
pub use cotask_macros::{detached, task};
