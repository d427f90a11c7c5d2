//! Core types for the cotask runtime.
//!
//! - [`id`]: Identifier types (`FrameId`)
//! - [`state`]: Frame lifecycle states and panic payloads

pub mod id;
pub mod state;

pub use id::FrameId;
pub use state::{FrameKind, FrameState, PanicPayload};
