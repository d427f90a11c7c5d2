//! Promise state shared by every frame.
//!
//! Each frame carries a continuation (the frame to resume when it
//! completes), a lazily established environment and a [`StopHandler`]. The
//! three are set together, exactly once, when an awaiter attaches itself to
//! the frame:
//!
//! 1. the environment inherits from the awaiter's environment, or is
//!    default-constructed when the awaiter has none;
//! 2. the stop handler resolves to [`StopHandler::Notify`] for stop-aware
//!    awaiters and [`StopHandler::Terminate`] otherwise;
//! 3. the awaiter is recorded as the continuation.
//!
//! Completion values travel through a [`SymmetricResult`].

pub mod stop;
pub mod symmetric;

pub use stop::{StopHandler, Stopped, stopped};
pub use symmetric::{ResultState, SymmetricResult};
