//! The single-owner, lazily started task handle.
//!
//! A [`Task`] is an unstarted frame. Nothing runs until the task is awaited
//! from inside another frame; awaiting consumes the handle, attaches the
//! awaiting frame as continuation and transfers control to the new frame.
//! From then on the [`TaskAwaiter`] owns the frame and destroys it when the
//! result has been read, or when the awaiter itself is dropped.

use core::any::type_name;
use core::fmt;
use core::future::{Future, IntoFuture};
use core::marker::PhantomData;
use core::panic::Location;
use core::pin::Pin;
use core::task::{Context, Poll};
use std::rc::{Rc, Weak};

use crate::compose_environment;
use crate::env::trace::{InplaceTrace, TraceFacet};
use crate::env::{self, Environment, Inherit};
use crate::error::Result;
use crate::runtime::Shared;
use crate::runtime::context;
use crate::runtime::frame::Transfer;
use crate::runtime::stored_task::StoredTask;
use crate::types::{FrameId, FrameKind};

compose_environment! {
    /// The default task environment: suspension-point tracing only.
    #[derive(Debug)]
    pub struct TaskEnv {
        /// Links this frame's suspension points into the trace chain.
        pub trace: TraceFacet => [InplaceTrace],
    }
}

/// Derives a frame name from the type of its body.
///
/// Async blocks are named after the function that contains them.
pub(crate) fn frame_name<F>() -> &'static str {
    let mut name = type_name::<F>();
    while let Some((head, tail)) = name.rsplit_once("::") {
        if !tail.starts_with("{{") {
            break;
        }
        name = head;
    }
    name
}

/// A lazily started unit of asynchronous work producing `T`.
///
/// `E` is the environment the task's frame is established with when it is
/// first awaited; it inherits from the awaiting frame's environment.
///
/// ```
/// use cotask::{Runtime, Task};
///
/// fn double(x: u32) -> Task<u32> {
///     Task::new(async move { Ok(x * 2) })
/// }
///
/// let runtime = Runtime::new();
/// let value = runtime
///     .block_on(Task::new(async { Ok(double(21).await? + 0) }))
///     .unwrap();
/// assert_eq!(value, 42);
/// ```
#[must_use = "tasks do nothing unless awaited"]
pub struct Task<T, E = TaskEnv> {
    name: &'static str,
    body: Box<StoredTask<T>>,
    _env: PhantomData<fn() -> E>,
}

impl<T: 'static> Task<T> {
    /// Creates a task with the default environment.
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Result<T>> + 'static,
    {
        Self::named(frame_name::<F>(), future)
    }

    /// Creates a named task with the default environment.
    pub fn named<F>(name: &'static str, future: F) -> Self
    where
        F: Future<Output = Result<T>> + 'static,
    {
        Self::named_with_env(name, future)
    }
}

impl<T, E> Task<T, E>
where
    T: 'static,
    E: Inherit + Environment,
{
    /// Creates a task whose frame uses environment `E`.
    pub fn with_env<F>(future: F) -> Self
    where
        F: Future<Output = Result<T>> + 'static,
    {
        Self::named_with_env(frame_name::<F>(), future)
    }

    /// Creates a named task whose frame uses environment `E`.
    pub fn named_with_env<F>(name: &'static str, future: F) -> Self
    where
        F: Future<Output = Result<T>> + 'static,
    {
        Self {
            name,
            body: Box::new(StoredTask::new(future)),
            _env: PhantomData,
        }
    }

    /// Installs the recovery run when a frame this task awaits is stopped.
    ///
    /// Without a recovery, a stop is forwarded to this task's own awaiter.
    pub fn on_stopped<R>(mut self, recover: R) -> Self
    where
        R: FnOnce() -> Result<T> + 'static,
    {
        self.body.set_on_stopped(Box::new(recover));
        self
    }

    /// Returns the name recorded in traces for this task's frame.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Attaches the frame to a runtime with `awaiter` as its continuation.
    pub(crate) fn attach(self, shared: &Shared, awaiter: Option<FrameId>) -> FrameId {
        shared.insert_frame(
            FrameKind::Task,
            self.name,
            self.body,
            awaiter,
            env::establish::<E>,
        )
    }
}

impl<T, E> fmt::Debug for Task<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").field("name", &self.name).finish()
    }
}

impl<T, E> IntoFuture for Task<T, E>
where
    T: 'static,
    E: Inherit + Environment,
{
    type Output = Result<T>;
    type IntoFuture = TaskAwaiter<T, E>;

    #[track_caller]
    fn into_future(self) -> TaskAwaiter<T, E> {
        TaskAwaiter {
            state: AwaitState::Unattached(self),
            location: Location::caller(),
        }
    }
}

enum AwaitState<T, E> {
    Unattached(Task<T, E>),
    Attached {
        frame: FrameId,
        runtime: Weak<Shared>,
    },
    Done,
}

/// The awaiting side of a [`Task`]; owns the task's frame once attached.
#[must_use = "futures do nothing unless awaited"]
pub struct TaskAwaiter<T, E = TaskEnv> {
    state: AwaitState<T, E>,
    location: &'static Location<'static>,
}

impl<T, E> TaskAwaiter<T, E> {
    /// Returns the attached frame, once the task has started.
    #[must_use]
    pub const fn frame(&self) -> Option<FrameId> {
        match &self.state {
            AwaitState::Attached { frame, .. } => Some(*frame),
            _ => None,
        }
    }
}

impl<T, E> Future for TaskAwaiter<T, E>
where
    T: 'static,
    E: Inherit + Environment,
{
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<T>> {
        let this = self.get_mut();
        match core::mem::replace(&mut this.state, AwaitState::Done) {
            AwaitState::Unattached(task) => {
                let Some(current) = context::current() else {
                    panic!("a cotask Task was awaited outside a cotask runtime");
                };
                current.record_suspension(this.location);
                let child = task.attach(&current.shared, Some(current.frame));
                this.state = AwaitState::Attached {
                    frame: child,
                    runtime: Rc::downgrade(&current.shared),
                };
                current.request_transfer(Transfer::Await(child));
                Poll::Pending
            }
            AwaitState::Attached { frame, runtime } => {
                let result = runtime
                    .upgrade()
                    .and_then(|shared| shared.take_result::<T>(frame));
                match result {
                    Some(result) => Poll::Ready(result),
                    None => {
                        this.state = AwaitState::Attached { frame, runtime };
                        Poll::Pending
                    }
                }
            }
            AwaitState::Done => panic!("TaskAwaiter polled after completion"),
        }
    }
}

impl<T, E> Drop for TaskAwaiter<T, E> {
    fn drop(&mut self) {
        if let AwaitState::Attached { frame, runtime } = &self.state {
            if let Some(shared) = runtime.upgrade() {
                drop(shared.remove_frame(*frame));
            }
        }
    }
}

impl<T, E> fmt::Debug for TaskAwaiter<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            AwaitState::Unattached(_) => "unattached",
            AwaitState::Attached { .. } => "attached",
            AwaitState::Done => "done",
        };
        f.debug_struct("TaskAwaiter")
            .field("state", &state)
            .field("frame", &self.frame())
            .finish()
    }
}
