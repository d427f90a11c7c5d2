//! Cooperative yielding back to the runtime.

use std::future::Future;
use std::panic::Location;
use std::pin::Pin;
use std::task::{Context, Poll};

use super::context;

/// Future that yields execution back to the runtime.
#[derive(Debug)]
#[must_use = "futures do nothing unless awaited"]
pub struct YieldNow {
    yielded: bool,
    location: &'static Location<'static>,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.yielded {
            Poll::Ready(())
        } else {
            self.yielded = true;
            if let Some(current) = context::current() {
                current.record_suspension(self.location);
            }
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

/// Suspends the current frame and schedules its own wake-up.
///
/// The frame is resumed by the next [`Runtime::run`](super::Runtime::run).
#[track_caller]
pub fn yield_now() -> YieldNow {
    YieldNow {
        yielded: false,
        location: Location::caller(),
    }
}
