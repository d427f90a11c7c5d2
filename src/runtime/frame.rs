//! Frame records held in the runtime's arena.

use std::rc::Rc;
use std::task::Waker;

use serde::Serialize;

use super::stored_task::ErasedBody;
use crate::env::Environment;
use crate::env::trace::TraceLink;
use crate::promise::StopHandler;
use crate::types::{FrameId, FrameKind, FrameState};

/// What the trampoline does after polling a frame that returned `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transfer {
    /// Start the given child frame; several may be requested in one poll.
    Await(FrameId),
    /// The frame completed by cancellation.
    Stop,
}

/// The suspendable state of one task instantiation.
pub(crate) struct Frame {
    pub(crate) kind: FrameKind,
    pub(crate) name: &'static str,
    pub(crate) state: FrameState,
    pub(crate) continuation: Option<FrameId>,
    pub(crate) stop_handler: StopHandler,
    pub(crate) env: Option<Rc<dyn Environment>>,
    pub(crate) trace: Option<TraceLink>,
    /// `None` while the body is being polled.
    pub(crate) body: Option<Box<dyn ErasedBody>>,
    pub(crate) waker: Waker,
    /// Driven by `block_on`: completing without a continuation is expected.
    pub(crate) externally_driven: bool,
}

impl Frame {
    /// Task frames handle stops of the frames they await; detached roots do not.
    pub(crate) fn is_stop_aware(&self) -> bool {
        self.kind == FrameKind::Task
    }

    pub(crate) fn info(&self, id: FrameId) -> FrameInfo {
        FrameInfo {
            id,
            name: self.name,
            kind: self.kind,
            state: self.state,
            continuation: self.continuation,
            stop_handler: self.stop_handler,
        }
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("state", &self.state)
            .field("continuation", &self.continuation)
            .field("stop_handler", &self.stop_handler)
            .field("trace", &self.trace)
            .finish_non_exhaustive()
    }
}

/// A snapshot of a frame for inspection and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameInfo {
    /// The frame's id.
    pub id: FrameId,
    /// The function name the frame was created for.
    pub name: &'static str,
    /// Task or detached root.
    #[serde(serialize_with = "serialize_display")]
    pub kind: FrameKind,
    /// Lifecycle state.
    #[serde(serialize_with = "serialize_display")]
    pub state: FrameState,
    /// The frame resumed when this one completes.
    pub continuation: Option<FrameId>,
    /// Where a stop of this frame is delivered.
    pub stop_handler: StopHandler,
}

fn serialize_display<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: std::fmt::Display,
    S: serde::Serializer,
{
    serializer.collect_str(value)
}
