//! Identifier types for runtime entities.
//!
//! Frames are referenced by generation-checked arena indices, so an identifier
//! held past its frame's destruction resolves to nothing rather than to a
//! recycled frame.

use crate::util::ArenaIndex;
use core::fmt;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A unique identifier for a frame attached to a [`Runtime`](crate::Runtime).
///
/// A frame is the suspendable state of one task instantiation. It receives an
/// id when it is attached to a runtime: when a task is first awaited, or when
/// a detached task is started.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameId(pub(crate) ArenaIndex);

impl FrameId {
    /// Creates a frame ID from an arena index (internal use).
    #[inline]
    #[must_use]
    pub(crate) const fn from_arena(index: ArenaIndex) -> Self {
        Self(index)
    }

    /// Returns the underlying arena index.
    #[inline]
    #[must_use]
    pub const fn arena_index(self) -> ArenaIndex {
        self.0
    }

    /// Creates a frame ID for testing purposes.
    #[doc(hidden)]
    #[must_use]
    pub const fn new_for_test(index: u32, generation: u32) -> Self {
        Self(ArenaIndex::new(index, generation))
    }
}

impl fmt::Debug for FrameId {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FrameId({}:{})", self.0.index(), self.0.generation())
    }
}

impl fmt::Display for FrameId {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "F{}", self.0.index())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct SerdeArenaIndex {
    index: u32,
    generation: u32,
}

impl Serialize for FrameId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        SerdeArenaIndex {
            index: self.0.index(),
            generation: self.0.generation(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FrameId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = SerdeArenaIndex::deserialize(deserializer)?;
        Ok(Self(ArenaIndex::new(raw.index, raw.generation)))
    }
}
