//! Internal utilities for the cotask runtime.
//!
//! These utilities are intentionally minimal and dependency-free.

pub mod arena;

pub use arena::{Arena, ArenaIndex};
