//! Waker implementation with deduplication.
//!
//! Frames are resumed on the driving thread only, but a waker may be invoked
//! from anywhere. Waking a frame pushes its id onto the shared ready queue,
//! which [`Runtime::run`](super::Runtime::run) drains.
//!
//! Note: This implementation uses safe Rust only (no unsafe).

use std::collections::VecDeque;
use std::sync::Arc;
use std::task::{Wake, Waker};

use parking_lot::Mutex;

use crate::types::FrameId;

/// Frames woken since the last drain, in wake order.
#[derive(Debug, Default)]
pub(crate) struct ReadyQueue {
    woken: Mutex<VecDeque<FrameId>>,
}

impl ReadyQueue {
    /// Creates an empty queue.
    #[must_use]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Creates a waker for a specific frame.
    #[must_use]
    pub(crate) fn waker_for(self: &Arc<Self>, frame: FrameId) -> Waker {
        Waker::from(Arc::new(FrameWaker {
            queue: Arc::clone(self),
            frame,
        }))
    }

    /// Removes the oldest woken frame.
    pub(crate) fn pop(&self) -> Option<FrameId> {
        self.woken.lock().pop_front()
    }

    /// Returns the number of frames waiting to be resumed.
    pub(crate) fn len(&self) -> usize {
        self.woken.lock().len()
    }

    /// Queues `frame` unless it is already waiting.
    pub(crate) fn wake(&self, frame: FrameId) {
        let mut woken = self.woken.lock();
        if !woken.contains(&frame) {
            woken.push_back(frame);
        }
    }
}

/// A waker for a specific frame.
struct FrameWaker {
    queue: Arc<ReadyQueue>,
    frame: FrameId,
}

impl Wake for FrameWaker {
    fn wake(self: Arc<Self>) {
        self.queue.wake(self.frame);
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.queue.wake(self.frame);
    }
}
