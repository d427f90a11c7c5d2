//! The frame currently being polled.
//!
//! While the trampoline polls a frame body it installs a [`Current`] in a
//! thread-local slot. Await points use it to reach the runtime: to attach
//! children, request a transfer, record their suspension location and look
//! up the frame's environment.

use core::cell::RefCell;
use core::panic::Location;
use std::rc::Rc;

use super::Shared;
use super::frame::Transfer;
use crate::env::Environment;
use crate::env::trace::TraceLink;
use crate::types::FrameId;

thread_local! {
    static CURRENT: RefCell<Option<Current>> = const { RefCell::new(None) };
}

/// Handle to the runtime and the frame being polled.
#[derive(Clone)]
pub(crate) struct Current {
    pub(crate) shared: Rc<Shared>,
    pub(crate) frame: FrameId,
}

impl Current {
    /// Asks the trampoline to continue with `transfer` once the poll returns.
    pub(crate) fn request_transfer(&self, transfer: Transfer) {
        self.shared.request_transfer(transfer);
    }

    /// Stores `location` as this frame's latest suspension point.
    pub(crate) fn record_suspension(&self, location: &'static Location<'static>) {
        self.shared.record_suspension(self.frame, location);
    }

    /// Returns this frame's environment, if it has one.
    pub(crate) fn environment(&self) -> Option<Rc<dyn Environment>> {
        self.shared.environment(self.frame)
    }

    /// Returns this frame's trace node, if its environment carries one.
    pub(crate) fn trace_link(&self) -> Option<TraceLink> {
        self.shared.trace_link(self.frame)
    }
}

/// Guard that restores the previous frame on drop.
pub(crate) struct CurrentGuard {
    prev: Option<Current>,
}

impl Drop for CurrentGuard {
    fn drop(&mut self) {
        let prev = self.prev.take();
        CURRENT.with(|slot| {
            *slot.borrow_mut() = prev;
        });
    }
}

/// Returns the frame being polled, if any.
pub(crate) fn current() -> Option<Current> {
    CURRENT.with(|slot| slot.borrow().clone())
}

/// Installs `current` for the duration of the guard.
#[must_use]
pub(crate) fn set_current(current: Current) -> CurrentGuard {
    let prev = CURRENT.with(|slot| slot.borrow_mut().replace(current));
    CurrentGuard { prev }
}

/// Returns true while a frame body is being polled on this thread.
#[must_use]
pub fn in_frame() -> bool {
    CURRENT.with(|slot| slot.borrow().is_some())
}
