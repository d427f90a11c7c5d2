//! Stored frame bodies.
//!
//! `StoredTask` holds the body future of one frame together with the
//! frame's [`SymmetricResult`] and optional stop recovery. The runtime keeps
//! bodies behind [`ErasedBody`] so frames of every result type share one
//! arena; the awaiter that knows `T` downcasts back to read the result.

use std::any::Any;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::error::{Error, Result};
use crate::promise::SymmetricResult;
use crate::types::PanicPayload;

/// How a body finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Completion {
    /// A value was stored.
    Returned,
    /// An exception (error return or caught panic) was stored.
    Raised,
}

/// Recovery run when a frame this body awaits is stopped.
pub(crate) type StopRecovery<T> = Box<dyn FnOnce() -> Result<T>>;

/// Type-erased view of a [`StoredTask`].
pub(crate) trait ErasedBody {
    /// Polls the body, storing its outcome once it completes.
    fn poll_body(&mut self, cx: &mut Context<'_>, catch_panics: bool) -> Poll<Completion>;

    /// Runs the stop recovery, if one is installed.
    ///
    /// Returns `None` when the body does not handle stops.
    fn recover_stopped(&mut self) -> Option<Completion>;

    /// Returns the stored exception, if any.
    fn exception(&self) -> Option<Error>;

    /// Upcasts for downcasting back to `StoredTask<T>`.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A frame body: the pinned future plus its result slot.
pub(crate) struct StoredTask<T> {
    future: Option<Pin<Box<dyn Future<Output = Result<T>>>>>,
    result: SymmetricResult<T>,
    on_stopped: Option<StopRecovery<T>>,
}

impl<T: 'static> StoredTask<T> {
    /// Creates a new stored body from a future.
    pub(crate) fn new<F>(future: F) -> Self
    where
        F: Future<Output = Result<T>> + 'static,
    {
        Self {
            future: Some(Box::pin(future)),
            result: SymmetricResult::new(),
            on_stopped: None,
        }
    }

    /// Installs the stop recovery.
    pub(crate) fn set_on_stopped(&mut self, recover: StopRecovery<T>) {
        self.on_stopped = Some(recover);
    }

    /// Takes the completion out of the result slot.
    pub(crate) fn take_result(&mut self) -> Result<T> {
        self.result.take()
    }

    fn finish(&mut self, outcome: Result<T>) -> Completion {
        // Locals of the body (including awaiters of child frames) go now.
        self.future = None;
        let completion = match &outcome {
            Ok(_) => Completion::Returned,
            Err(_) => Completion::Raised,
        };
        self.result.complete(outcome);
        completion
    }
}

impl<T: 'static> ErasedBody for StoredTask<T> {
    fn poll_body(&mut self, cx: &mut Context<'_>, catch_panics: bool) -> Poll<Completion> {
        let Some(future) = self.future.as_mut() else {
            return Poll::Ready(if self.result.exception().is_some() {
                Completion::Raised
            } else {
                Completion::Returned
            });
        };
        let polled = if catch_panics {
            match catch_unwind(AssertUnwindSafe(|| future.as_mut().poll(cx))) {
                Ok(polled) => polled,
                Err(payload) => {
                    self.future = None;
                    self.result
                        .capture_panic(PanicPayload::from_unwind(payload.as_ref()));
                    return Poll::Ready(Completion::Raised);
                }
            }
        } else {
            future.as_mut().poll(cx)
        };
        match polled {
            Poll::Ready(outcome) => Poll::Ready(self.finish(outcome)),
            Poll::Pending => Poll::Pending,
        }
    }

    fn recover_stopped(&mut self) -> Option<Completion> {
        let recover = self.on_stopped.take()?;
        Some(self.finish(recover()))
    }

    fn exception(&self) -> Option<Error> {
        self.result.exception().cloned()
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl<T> std::fmt::Debug for StoredTask<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredTask")
            .field("running", &self.future.is_some())
            .field("result", &self.result)
            .field("recovers_stops", &self.on_stopped.is_some())
            .finish()
    }
}
