//! Detached root tasks and their unhandled-exception carrier.
//!
//! A [`DetachedTask`] has no awaiter: it is the root of an await chain and
//! starts running as soon as it is handed to [`Runtime::start`]. A root that
//! returns destroys its own frame. A root that raises surfaces the exception
//! as an [`UnhandledExit`] out of whichever `resume`/`run` call was driving
//! it; the carrier keeps the failed frame alive so the exception can be
//! inspected, and destroys the frame when its last clone is dropped.
//!
//! [`Runtime::start`]: crate::Runtime::start

use core::cell::RefCell;
use core::fmt;
use core::future::Future;
use std::rc::Rc;

use crate::env;
use crate::env::trace::TraceFacet;
use crate::error::{Error, Result};
use crate::runtime::Shared;
use crate::runtime::stored_task::StoredTask;
use crate::task::frame_name;
use crate::types::{FrameId, FrameKind};

/// The environment of every detached root: a fresh trace chain.
pub type DetachedEnv = TraceFacet;

/// A fire-and-forget root task.
#[must_use = "detached tasks do nothing unless started"]
pub struct DetachedTask {
    name: &'static str,
    body: Box<StoredTask<()>>,
}

impl DetachedTask {
    /// Creates a detached task named after its body's enclosing function.
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Result<()>> + 'static,
    {
        Self::named(frame_name::<F>(), future)
    }

    /// Creates a named detached task.
    pub fn named<F>(name: &'static str, future: F) -> Self
    where
        F: Future<Output = Result<()>> + 'static,
    {
        Self {
            name,
            body: Box::new(StoredTask::new(future)),
        }
    }

    /// Returns the name recorded in traces for this task's frame.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn attach(self, shared: &Shared) -> FrameId {
        shared.insert_frame(
            FrameKind::Detached,
            self.name,
            self.body,
            None,
            env::establish::<DetachedEnv>,
        )
    }
}

impl fmt::Debug for DetachedTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetachedTask")
            .field("name", &self.name)
            .finish()
    }
}

/// Owns the deferred destruction of a failed detached frame.
pub(crate) struct FrameCapsule {
    frame: FrameId,
    destroy: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl FrameCapsule {
    pub(crate) fn new(frame: FrameId, destroy: Box<dyn FnOnce()>) -> Self {
        Self {
            frame,
            destroy: RefCell::new(Some(destroy)),
        }
    }
}

impl Drop for FrameCapsule {
    fn drop(&mut self) {
        if let Some(destroy) = self.destroy.get_mut().take() {
            destroy();
        }
    }
}

impl fmt::Debug for FrameCapsule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameCapsule")
            .field("frame", &self.frame)
            .field("armed", &self.destroy.borrow().is_some())
            .finish()
    }
}

/// An exception that escaped a detached root task.
///
/// Clones share ownership of the failed frame; the frame is destroyed when
/// the last clone is dropped.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unhandled exception in detached task `{name}`: {cause}")]
pub struct UnhandledExit {
    name: &'static str,
    #[source]
    cause: Error,
    capsule: Rc<FrameCapsule>,
}

impl UnhandledExit {
    pub(crate) fn new(name: &'static str, cause: Error, capsule: FrameCapsule) -> Self {
        Self {
            name,
            cause,
            capsule: Rc::new(capsule),
        }
    }

    /// Returns the name of the task that raised.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the exception the task raised.
    #[must_use]
    pub const fn cause(&self) -> &Error {
        &self.cause
    }

    /// Returns the failed frame, attached until the carrier is dropped.
    #[must_use]
    pub fn frame(&self) -> FrameId {
        self.capsule.frame
    }
}
