//! Cooperative cancellation.
//!
//! A frame completes by cancellation when its body awaits [`stopped()`].
//! The runtime then consults the frame's [`StopHandler`], which was resolved
//! once, when the frame's continuation was attached:
//!
//! - [`StopHandler::Notify`] hands the stop to the awaiting task frame. That
//!   frame recovers with its `on_stopped` hook if it has one, or marks itself
//!   stopped and forwards to its own handler.
//! - [`StopHandler::Terminate`] logs and aborts the process. A stop is never
//!   silently dropped.

use core::fmt;
use core::future::Future;
use core::marker::PhantomData;
use core::panic::Location;
use core::pin::Pin;
use core::task::{Context, Poll};

use serde::Serialize;

use crate::runtime::context;
use crate::runtime::frame::Transfer;
use crate::types::FrameId;

/// Where a stopped frame delivers its cancellation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum StopHandler {
    /// Nobody cooperates: abort the process.
    #[default]
    Terminate,
    /// Deliver the stop to the awaiting frame.
    Notify(FrameId),
}

impl StopHandler {
    /// Resolves the handler for a frame whose awaiter is `awaiter`.
    ///
    /// Only stop-aware awaiters receive notifications.
    #[must_use]
    pub const fn resolve(awaiter: FrameId, awaiter_is_stop_aware: bool) -> Self {
        if awaiter_is_stop_aware {
            Self::Notify(awaiter)
        } else {
            Self::Terminate
        }
    }
}

impl fmt::Display for StopHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Terminate => f.write_str("terminate"),
            Self::Notify(id) => write!(f, "notify {id}"),
        }
    }
}

/// Future returned by [`stopped()`].
///
/// It never resolves: the frame awaiting it completes by cancellation.
#[must_use = "futures do nothing unless awaited"]
pub struct Stopped<T> {
    location: &'static Location<'static>,
    _output: PhantomData<fn() -> T>,
}

/// Completes the current frame by cancellation instead of a result.
///
/// Usable in any position that expects a value, for example
/// `let config = match load() { Some(c) => c, None => stopped().await };`.
///
/// # Panics
///
/// Panics when polled outside a frame driven by a [`Runtime`](crate::Runtime).
#[track_caller]
pub fn stopped<T>() -> Stopped<T> {
    Stopped {
        location: Location::caller(),
        _output: PhantomData,
    }
}

impl<T> Future for Stopped<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<T> {
        let Some(current) = context::current() else {
            panic!("`stopped()` awaited outside a cotask runtime");
        };
        current.record_suspension(self.location);
        current.request_transfer(Transfer::Stop);
        Poll::Pending
    }
}

impl<T> fmt::Debug for Stopped<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stopped")
            .field("location", &self.location)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_depends_on_awaiter() {
        let parent = FrameId::new_for_test(1, 0);
        assert_eq!(
            StopHandler::resolve(parent, true),
            StopHandler::Notify(parent)
        );
        assert_eq!(StopHandler::resolve(parent, false), StopHandler::Terminate);
        assert_eq!(StopHandler::default(), StopHandler::Terminate);
    }

    #[test]
    fn display() {
        assert_eq!(StopHandler::Terminate.to_string(), "terminate");
        assert_eq!(
            StopHandler::Notify(FrameId::new_for_test(4, 1)).to_string(),
            "notify F4"
        );
    }

    #[test]
    #[should_panic(expected = "outside a cotask runtime")]
    fn stopped_outside_runtime_panics() {
        use std::sync::Arc;
        use std::task::{Wake, Waker};

        struct Noop;
        impl Wake for Noop {
            fn wake(self: Arc<Self>) {}
        }

        let waker = Waker::from(Arc::new(Noop));
        let mut cx = Context::from_waker(&waker);
        let mut fut = stopped::<()>();
        let _ = Pin::new(&mut fut).poll(&mut cx);
    }
}
