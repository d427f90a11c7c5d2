//! Error types and error handling strategy for cotask.
//!
//! Error handling follows these principles:
//!
//! - An exception raised inside a task body is captured into the frame's
//!   symmetric result and handed to the awaiter exactly once, as `Err`.
//! - Panics inside a task body are caught at the frame boundary and turned
//!   into [`ErrorKind::Panicked`] exceptions.
//! - Cancellation ("stopped") is *not* an error. It is a separate completion
//!   kind handled by the [`promise::stop`](crate::promise::stop) machinery.
//! - Unhandled exceptions escaping a detached root are wrapped into
//!   [`UnhandledExit`](crate::detached::UnhandledExit), which also owns the
//!   deferred destruction of the failed frame.
//! - Contract violations (taking a result twice, awaiting outside a runtime)
//!   panic; they are programming errors, not reported errors.

use core::fmt;
use std::any::Any;
use std::sync::Arc;

use crate::types::PanicPayload;

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Raised by user code inside a task body.
    User,
    /// A task body panicked.
    Panicked,
    /// The runtime ran out of ready frames before the awaited task completed.
    Stalled,
    /// Internal runtime error (bug).
    Internal,
}

impl ErrorKind {
    /// Returns the kind name as a static string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Panicked => "Panicked",
            Self::Stalled => "Stalled",
            Self::Internal => "Internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The main error type: the "exception" carried by a symmetric result.
///
/// `Error` is cheap to clone; the optional source is shared.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
    panic: Option<PanicPayload>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            source: None,
            panic: None,
        }
    }

    /// Creates a user error with a message.
    #[must_use]
    pub fn user(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::User).with_message(msg)
    }

    /// Wraps an arbitrary error raised by user code.
    ///
    /// The original error stays reachable through [`std::error::Error::source`]
    /// and [`Error::downcast_ref`]. Wrapping an `Error` returns it unchanged.
    #[must_use]
    pub fn from_source<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let boxed: Box<dyn Any> = Box::new(err);
        match boxed.downcast::<Self>() {
            Ok(this) => *this,
            Err(other) => match other.downcast::<E>() {
                Ok(err) => Self::new(ErrorKind::User).with_source(*err),
                Err(_) => unreachable!("boxed value is either Error or E"),
            },
        }
    }

    /// Creates an error describing a panic caught at a frame boundary.
    #[must_use]
    pub fn panicked(payload: PanicPayload) -> Self {
        Self {
            kind: ErrorKind::Panicked,
            message: Some(payload.message().to_owned()),
            source: None,
            panic: Some(payload),
        }
    }

    /// Creates an internal error (runtime bug).
    #[must_use]
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal).with_message(detail)
    }

    /// Creates the error returned when no frame can make progress.
    #[must_use]
    pub fn stalled(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Stalled).with_message(detail)
    }

    /// Adds a message description to the error.
    #[must_use]
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Adds a source error to the chain.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns the caught panic, if this error came from one.
    #[must_use]
    pub const fn panic_payload(&self) -> Option<&PanicPayload> {
        self.panic.as_ref()
    }

    /// Returns true if this error came from a caught panic.
    #[must_use]
    pub const fn is_panic(&self) -> bool {
        matches!(self.kind, ErrorKind::Panicked)
    }

    /// Returns the wrapped source error as `E`, if that is its type.
    #[must_use]
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        let source: &(dyn std::error::Error + 'static) = self.source.as_deref()?;
        source.downcast_ref::<E>()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        match (&self.message, &self.source) {
            (Some(msg), _) => write!(f, ": {msg}"),
            (None, Some(source)) => write!(f, ": {source}"),
            (None, None) => Ok(()),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

impl From<PanicPayload> for Error {
    fn from(payload: PanicPayload) -> Self {
        Self::panicked(payload)
    }
}

/// Extension trait for adding context to Results.
#[allow(clippy::result_large_err)]
pub trait ResultExt<T> {
    /// Wraps the error and attaches a context message.
    fn context(self, msg: impl Into<String>) -> Result<T>;
    /// Wraps the error and attaches a lazily computed context message.
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E> ResultExt<T> for core::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::from_source(e).with_message(msg))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| Error::from_source(e).with_message(f()))
    }
}

/// A specialized Result type for cotask operations.
#[allow(clippy::result_large_err)]
pub type Result<T> = core::result::Result<T, Error>;
