//! Suspension-point traces.
//!
//! A [`Trace`] is a value snapshot of the suspension points along the await
//! chain that leads to the current frame, innermost first. Capturing one
//! walks the trace facets' links and costs O(depth); nothing is collected
//! until a trace is requested, apart from the single location store each
//! suspension point performs.
//!
//! # Format
//!
//! An entry renders as `<function> at <file>:<line>:<column>`. A width pads
//! or truncates the function name:
//!
//! ```text
//! {:12}  example_task at src/main.rs:10:5        (padded to 12)
//! {:8}   examp... at src/main.rs:10:5            (cut to 5 + "...")
//! ```
//!
//! A trace renders its entries as `#<index> <entry>`, one per line, with no
//! trailing newline.

use core::fmt;
use core::future::Future;
use core::panic::Location;
use core::pin::Pin;
use core::task::{Context, Poll};

use pin_project::pin_project;
use serde::ser::{SerializeSeq, SerializeStruct};
use serde::{Serialize, Serializer};
use smallvec::SmallVec;

use crate::env::trace::{self as facet, TraceLink};
use crate::runtime::context;

/// Narrowest width honored when rendering entry names.
pub const MIN_NAME_WIDTH: usize = 4;

/// One suspension point: the frame's function name and the await location.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TraceEntry {
    function: &'static str,
    location: &'static Location<'static>,
}

impl TraceEntry {
    /// Creates an entry.
    #[must_use]
    pub const fn new(function: &'static str, location: &'static Location<'static>) -> Self {
        Self { function, location }
    }

    /// Returns the name of the function that suspended.
    #[must_use]
    pub const fn function(&self) -> &'static str {
        self.function
    }

    /// Returns the source location of the suspension point.
    #[must_use]
    pub const fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// Returns the source file of the suspension point.
    #[must_use]
    pub fn file(&self) -> &'static str {
        self.location.file()
    }

    /// Returns the line of the suspension point.
    #[must_use]
    pub fn line(&self) -> u32 {
        self.location.line()
    }

    /// Returns the column of the suspension point.
    #[must_use]
    pub fn column(&self) -> u32 {
        self.location.column()
    }
}

fn write_name(f: &mut fmt::Formatter<'_>, name: &str, width: usize) -> fmt::Result {
    let width = width.max(MIN_NAME_WIDTH);
    let len = name.chars().count();
    if len > width {
        let cut = name
            .char_indices()
            .nth(width - 3)
            .map_or(name.len(), |(idx, _)| idx);
        write!(f, "{}...", &name[..cut])
    } else {
        write!(f, "{name}{:pad$}", "", pad = width - len)
    }
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match f.width() {
            Some(width) => write_name(f, self.function, width)?,
            None => f.write_str(self.function)?,
        }
        write!(
            f,
            " at {}:{}:{}",
            self.location.file(),
            self.location.line(),
            self.location.column()
        )
    }
}

impl fmt::Debug for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceEntry")
            .field("function", &self.function)
            .field("file", &self.location.file())
            .field("line", &self.location.line())
            .field("column", &self.location.column())
            .finish()
    }
}

impl Serialize for TraceEntry {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("TraceEntry", 4)?;
        state.serialize_field("function", self.function)?;
        state.serialize_field("file", self.location.file())?;
        state.serialize_field("line", &self.location.line())?;
        state.serialize_field("column", &self.location.column())?;
        state.end()
    }
}

/// A captured chain of suspension points, innermost first.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Trace {
    entries: SmallVec<[TraceEntry; 8]>,
}

impl Trace {
    /// Walks the chain starting at `link`.
    ///
    /// Nodes without a recorded point are skipped; a destroyed node ends the
    /// walk.
    #[must_use]
    pub fn capture(link: TraceLink) -> Self {
        Self {
            entries: facet::walk(link),
        }
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no suspension point was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the entries, innermost first.
    #[must_use]
    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    /// Iterates over the entries, innermost first.
    pub fn iter(&self) -> impl Iterator<Item = &TraceEntry> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a Trace {
    type Item = &'a TraceEntry;
    type IntoIter = core::slice::Iter<'a, TraceEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = f.width();
        for (index, entry) in self.entries.iter().enumerate() {
            if index > 0 {
                f.write_str("\n")?;
            }
            match width {
                Some(w) => write!(f, "#{index} {entry:w$}")?,
                None => write!(f, "#{index} {entry}")?,
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.iter()).finish()
    }
}

impl Serialize for Trace {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.entries.len()))?;
        for entry in &self.entries {
            seq.serialize_element(entry)?;
        }
        seq.end()
    }
}

/// Future returned by [`current_trace()`].
#[derive(Debug)]
#[must_use = "futures do nothing unless awaited"]
pub struct CurrentTrace {
    location: &'static Location<'static>,
}

/// Captures the trace of the current frame.
///
/// The await itself is recorded as the current frame's suspension point, so
/// the first entry names the awaiting function. Outside a runtime-driven
/// frame, or in a frame whose environment has no trace facet, the trace is
/// empty.
#[track_caller]
pub fn current_trace() -> CurrentTrace {
    CurrentTrace {
        location: Location::caller(),
    }
}

impl Future for CurrentTrace {
    type Output = Trace;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Trace> {
        let trace = context::current()
            .and_then(|current| {
                current.record_suspension(self.location);
                current.trace_link()
            })
            .map(Trace::capture)
            .unwrap_or_default();
        Poll::Ready(trace)
    }
}

/// Future adapter that records its await location as a suspension point.
#[pin_project]
#[derive(Debug)]
#[must_use = "futures do nothing unless awaited"]
pub struct Traced<F> {
    #[pin]
    inner: F,
    location: &'static Location<'static>,
}

impl<F: Future> Future for Traced<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<F::Output> {
        let this = self.project();
        if let Some(current) = context::current() {
            current.record_suspension(*this.location);
        }
        this.inner.poll(cx)
    }
}

/// Extension trait routing any future through the suspension-point hook.
pub trait TraceExt: Future + Sized {
    /// Records the location of this call whenever the future is polled.
    #[track_caller]
    fn traced(self) -> Traced<Self> {
        Traced {
            inner: self,
            location: Location::caller(),
        }
    }
}

impl<F: Future> TraceExt for F {}
