//! Frame lifecycle states.

use core::fmt;
use std::any::Any;

/// What kind of promise a frame was created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// A frame owned by a [`Task`](crate::Task); destroyed by its awaiter.
    Task,
    /// A tree root with no awaiter; destroys itself on completion.
    Detached,
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Task => write!(f, "task"),
            Self::Detached => write!(f, "detached"),
        }
    }
}

/// The lifecycle state of a frame.
///
/// ```text
/// Created ─► Running ─┬─► Suspended ─► Running ...
///                     ├─► Returned
///                     ├─► Raised
///                     └─► Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameState {
    /// Attached but never resumed.
    Created,
    /// Currently being polled by the trampoline.
    Running,
    /// Parked at a suspension point.
    Suspended,
    /// Completed with a value.
    Returned,
    /// Completed with an exception.
    Raised,
    /// Completed by cancellation instead of a result.
    Stopped,
}

impl FrameState {
    /// Returns true for the three completion states.
    #[must_use]
    pub const fn is_complete(self) -> bool {
        matches!(self, Self::Returned | Self::Raised | Self::Stopped)
    }

    /// Returns true if the trampoline may resume a frame in this state.
    #[must_use]
    pub const fn is_resumable(self) -> bool {
        matches!(self, Self::Created | Self::Suspended)
    }
}

impl fmt::Display for FrameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Suspended => "suspended",
            Self::Returned => "returned",
            Self::Raised => "raised",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Payload from a panic caught inside a task body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanicPayload {
    message: String,
}

impl PanicPayload {
    /// Creates a new panic payload with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Extracts the message from a payload returned by `catch_unwind`.
    #[must_use]
    pub fn from_unwind(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&'static str>()
            .map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_owned());
        Self { message }
    }

    /// Returns the panic message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for PanicPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "panic: {}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_states() {
        assert!(FrameState::Returned.is_complete());
        assert!(FrameState::Raised.is_complete());
        assert!(FrameState::Stopped.is_complete());
        assert!(!FrameState::Suspended.is_complete());
        assert!(FrameState::Created.is_resumable());
        assert!(FrameState::Suspended.is_resumable());
        assert!(!FrameState::Running.is_resumable());
    }

    #[test]
    fn panic_payload_from_unwind() {
        let err = std::panic::catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(PanicPayload::from_unwind(err.as_ref()).message(), "boom");

        let err = std::panic::catch_unwind(|| panic!("code {}", 7)).unwrap_err();
        assert_eq!(PanicPayload::from_unwind(err.as_ref()).message(), "code 7");

        let err = std::panic::catch_unwind(|| std::panic::panic_any(42_u8)).unwrap_err();
        assert_eq!(
            PanicPayload::from_unwind(err.as_ref()).message(),
            "non-string panic payload"
        );
    }
}
