//! Tri-state result slot shared by every promise type.
//!
//! A frame writes its completion into a [`SymmetricResult`] at most once;
//! the continuation that resumes afterwards reads it exactly once with
//! [`SymmetricResult::take`], which turns a stored exception back into `Err`.

use core::fmt;

use crate::error::{Error, Result};
use crate::types::PanicPayload;

/// Observable state of a [`SymmetricResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultState {
    /// Nothing has been stored yet.
    Empty,
    /// A value is stored.
    Value,
    /// An exception is stored.
    Exception,
    /// The stored completion has been taken.
    Taken,
}

enum Slot<T> {
    Empty,
    Value(T),
    Exception(Error),
    Taken,
}

/// Storage for "value, exception, or nothing yet".
pub struct SymmetricResult<T> {
    slot: Slot<T>,
}

impl<T> SymmetricResult<T> {
    /// Creates an empty slot.
    #[must_use]
    pub const fn new() -> Self {
        Self { slot: Slot::Empty }
    }

    /// Stores a value, replacing anything previously stored.
    pub fn return_value(&mut self, value: T) {
        self.slot = Slot::Value(value);
    }

    /// Stores an exception raised by the frame body.
    pub fn capture(&mut self, err: Error) {
        self.slot = Slot::Exception(err);
    }

    /// Stores a panic caught at the frame boundary as an exception.
    pub fn capture_panic(&mut self, payload: PanicPayload) {
        self.capture(Error::panicked(payload));
    }

    /// Stores the outcome of a body, value or exception.
    pub fn complete(&mut self, outcome: Result<T>) {
        match outcome {
            Ok(value) => self.return_value(value),
            Err(err) => self.capture(err),
        }
    }

    /// Returns the stored value or re-raises the stored exception.
    ///
    /// # Panics
    ///
    /// Panics if the slot is empty or was already taken; both are contract
    /// violations by the continuation.
    pub fn take(&mut self) -> Result<T> {
        match core::mem::replace(&mut self.slot, Slot::Taken) {
            Slot::Value(value) => Ok(value),
            Slot::Exception(err) => Err(err),
            Slot::Empty => panic!("symmetric result taken before completion"),
            Slot::Taken => panic!("symmetric result taken twice"),
        }
    }

    /// Returns the stored exception without taking it.
    #[must_use]
    pub const fn exception(&self) -> Option<&Error> {
        match &self.slot {
            Slot::Exception(err) => Some(err),
            _ => None,
        }
    }

    /// Clears the slot back to empty.
    pub fn reset(&mut self) {
        self.slot = Slot::Empty;
    }

    /// Reports what the slot currently holds.
    #[must_use]
    pub const fn state(&self) -> ResultState {
        match self.slot {
            Slot::Empty => ResultState::Empty,
            Slot::Value(_) => ResultState::Value,
            Slot::Exception(_) => ResultState::Exception,
            Slot::Taken => ResultState::Taken,
        }
    }

    /// Returns true if a value or exception is waiting to be taken.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self.slot, Slot::Value(_) | Slot::Exception(_))
    }
}

impl SymmetricResult<()> {
    /// Marks a unit-returning frame as completed normally.
    pub fn return_void(&mut self) {
        self.return_value(());
    }
}

impl<T> Default for SymmetricResult<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for SymmetricResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymmetricResult")
            .field("state", &self.state())
            .finish()
    }
}
