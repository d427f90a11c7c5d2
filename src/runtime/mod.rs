//! The trampoline executor.
//!
//! Frames never poll each other. When a frame awaits a task, the awaiter
//! attaches the child frame, asks for a transfer and returns `Pending`; the
//! trampoline then resumes the child as its next step. When the child
//! completes, the trampoline resumes the child's continuation as the step
//! after that. Every hop of an await chain is one loop iteration, so native
//! stack depth stays constant however deeply tasks nest.
//!
//! ```text
//!   resume(root)
//!     step(root)  -> Await(a)
//!     step(a)     -> Await(b)
//!     step(b)     -> completed, continuation a
//!     step(a)     -> completed, continuation root
//!     step(root)  -> completed (detached: frame destroyed)
//! ```
//!
//! A frame may start several children in one poll (a join over two
//! awaiters, say). The children run in the order they were awaited, ahead of
//! anything they hand control back to.
//!
//! Frames suspended on something other than a task (for example
//! [`yield_now`]) are resumed through their waker: waking pushes the frame
//! onto a ready queue that [`Runtime::run`] drains.

pub mod builder;
pub mod config;
pub(crate) mod context;
pub mod env_config;
pub(crate) mod frame;
pub(crate) mod stored_task;
pub(crate) mod waker;
pub mod yield_now;

pub use builder::RuntimeBuilder;
pub use config::{ConfigError, RuntimeConfig};
pub use context::in_frame;
pub use frame::FrameInfo;
pub use yield_now::{YieldNow, yield_now};

use core::cell::RefCell;
use core::panic::Location;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::task::{Context, Poll};

use smallvec::SmallVec;

use crate::detached::{DetachedTask, FrameCapsule, UnhandledExit};
use crate::env::trace::{self as trace_facet, InplaceTrace, TraceLink};
use crate::env::{Environment, Inherit, query_dyn};
use crate::error::{Error, Result};
use crate::promise::StopHandler;
use crate::task::Task;
use crate::tracing_compat::{debug, debug_span, error, trace, warn};
use crate::types::{FrameId, FrameKind, FrameState};
use crate::util::Arena;
use context::Current;
use frame::{Frame, Transfer};
use stored_task::{Completion, ErasedBody, StoredTask};
use waker::ReadyQueue;

/// State shared between the runtime handle and the frames it drives.
pub(crate) struct Shared {
    frames: RefCell<Arena<Frame>>,
    transfers: RefCell<SmallVec<[Transfer; 1]>>,
    ready: Arc<ReadyQueue>,
    config: RuntimeConfig,
}

impl Shared {
    pub(crate) fn request_transfer(&self, transfer: Transfer) {
        self.transfers.borrow_mut().push(transfer);
    }

    pub(crate) fn record_suspension(&self, frame: FrameId, location: &'static Location<'static>) {
        let target = {
            let frames = self.frames.borrow();
            frames
                .get(frame.arena_index())
                .and_then(|f| f.trace.map(|link| (f.name, link)))
        };
        if let Some((name, link)) = target {
            trace_facet::record(link, name, location);
        }
    }

    pub(crate) fn environment(&self, frame: FrameId) -> Option<Rc<dyn Environment>> {
        let frames = self.frames.borrow();
        frames.get(frame.arena_index())?.env.clone()
    }

    pub(crate) fn trace_link(&self, frame: FrameId) -> Option<TraceLink> {
        let frames = self.frames.borrow();
        frames.get(frame.arena_index())?.trace
    }

    pub(crate) fn is_stop_aware(&self, frame: FrameId) -> bool {
        let frames = self.frames.borrow();
        frames
            .get(frame.arena_index())
            .is_some_and(Frame::is_stop_aware)
    }

    pub(crate) fn is_complete(&self, frame: FrameId) -> bool {
        let frames = self.frames.borrow();
        frames
            .get(frame.arena_index())
            .is_none_or(|f| f.state.is_complete())
    }

    /// Attaches a body as a new frame whose continuation is `awaiter`.
    ///
    /// Establishes the environment, then the stop handler, then the
    /// continuation.
    pub(crate) fn insert_frame<T, F>(
        &self,
        kind: FrameKind,
        name: &'static str,
        body: Box<StoredTask<T>>,
        awaiter: Option<FrameId>,
        make_env: F,
    ) -> FrameId
    where
        T: 'static,
        F: FnOnce(Option<&dyn Environment>) -> Rc<dyn Environment>,
    {
        let parent_env = awaiter.and_then(|id| self.environment(id));
        let env = make_env(parent_env.as_deref());
        let trace = query_dyn::<InplaceTrace>(&*env);
        let stop_handler = awaiter.map_or(StopHandler::Terminate, |id| {
            StopHandler::resolve(id, self.is_stop_aware(id))
        });
        let body: Box<dyn ErasedBody> = body;
        let ready = Arc::clone(&self.ready);
        let index = self.frames.borrow_mut().insert_with(|index| Frame {
            kind,
            name,
            state: FrameState::Created,
            continuation: awaiter,
            stop_handler,
            env: Some(env),
            trace,
            body: Some(body),
            waker: ready.waker_for(FrameId::from_arena(index)),
            externally_driven: false,
        });
        let id = FrameId::from_arena(index);
        trace!(
            frame = %id,
            task = name,
            kind = %kind,
            continuation = ?awaiter,
            stop_handler = %stop_handler,
            "frame attached"
        );
        id
    }

    /// Detaches a frame from the arena; the caller drops it.
    pub(crate) fn remove_frame(&self, frame: FrameId) -> Option<Frame> {
        let removed = self.frames.borrow_mut().remove(frame.arena_index());
        if removed.is_some() {
            trace!(frame = %frame, "frame destroyed");
        }
        removed
    }

    /// Destroys a completed frame and returns its result.
    ///
    /// Returns `None` while the frame has not produced a result.
    pub(crate) fn take_result<T: 'static>(&self, frame: FrameId) -> Option<Result<T>> {
        let ready = {
            let frames = self.frames.borrow();
            frames.get(frame.arena_index()).is_some_and(|f| {
                matches!(f.state, FrameState::Returned | FrameState::Raised) && f.body.is_some()
            })
        };
        if !ready {
            return None;
        }
        let mut removed = self.remove_frame(frame)?;
        let result = removed
            .body
            .as_mut()
            .and_then(|body| body.as_any_mut().downcast_mut::<StoredTask<T>>())
            .map(StoredTask::take_result);
        drop(removed);
        result
    }
}

/// A single-threaded executor driving frames by symmetric transfer.
///
/// `Runtime` is `!Send`: frames, environments and trace nodes live on the
/// thread that created them. Wakers handed to frame bodies are `Send + Sync`.
pub struct Runtime {
    shared: Rc<Shared>,
}

impl Runtime {
    /// Creates a runtime with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Returns a builder for a customized runtime.
    #[must_use]
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime with an explicit configuration.
    #[must_use]
    pub fn with_config(config: RuntimeConfig) -> Self {
        trace_facet::reserve(config.trace_capacity);
        debug!(
            poll_budget = config.poll_budget,
            catch_panics = config.catch_panics,
            frame_capacity = config.frame_capacity,
            "runtime created"
        );
        Self {
            shared: Rc::new(Shared {
                frames: RefCell::new(Arena::with_capacity(config.frame_capacity)),
                transfers: RefCell::new(SmallVec::new()),
                ready: Arc::new(ReadyQueue::new()),
                config,
            }),
        }
    }

    /// Returns the configuration this runtime was built with.
    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.shared.config
    }

    /// Attaches a detached task without resuming it.
    ///
    /// An external driver starts it later with [`Runtime::resume`].
    pub fn attach(&self, task: DetachedTask) -> FrameId {
        task.attach(&self.shared)
    }

    /// Attaches and resumes a detached task.
    ///
    /// Runs until the task's await chain completes or suspends on something
    /// other than a task.
    pub fn start(&self, task: DetachedTask) -> core::result::Result<FrameId, UnhandledExit> {
        let id = self.attach(task);
        self.resume(id)?;
        Ok(id)
    }

    /// Resumes `frame` and every frame control transfers to afterwards.
    ///
    /// Resuming a destroyed, running or completed frame does nothing.
    pub fn resume(&self, frame: FrameId) -> core::result::Result<(), UnhandledExit> {
        let mut pending = VecDeque::from([frame]);
        while let Some(id) = pending.pop_front() {
            if let Err(exit) = self.step(id, &mut pending) {
                // Left for `run`; entries whose frames are gone are ignored.
                for id in pending {
                    self.shared.ready.wake(id);
                }
                return Err(exit);
            }
        }
        Ok(())
    }

    /// Resumes frames woken through their wakers, up to the poll budget.
    ///
    /// Returns how many wake-ups were processed.
    pub fn run(&self) -> core::result::Result<usize, UnhandledExit> {
        let budget = self.shared.config.poll_budget.max(1);
        let mut resumed = 0;
        while resumed < budget {
            let Some(id) = self.shared.ready.pop() else {
                break;
            };
            resumed += 1;
            self.resume(id)?;
        }
        Ok(resumed)
    }

    /// Drives `task` to completion and returns its result.
    ///
    /// The task is the root of its await chain: its environment is
    /// default-constructed and a stop reaching it terminates the process.
    /// Unhandled exceptions of detached tasks resumed meanwhile are returned
    /// as their cause.
    ///
    /// # Errors
    ///
    /// Returns the task's exception, or [`ErrorKind::Stalled`](crate::ErrorKind::Stalled)
    /// when no frame can make progress before the task completes.
    pub fn block_on<T, E>(&self, task: Task<T, E>) -> Result<T>
    where
        T: 'static,
        E: Inherit + Environment,
    {
        let id = task.attach(&self.shared, None);
        let _span = debug_span!("block_on", frame = %id).entered();
        if let Some(frame) = self.shared.frames.borrow_mut().get_mut(id.arena_index()) {
            frame.externally_driven = true;
        }
        let outcome = self.drive(id);
        match outcome {
            Ok(()) => self.shared.take_result::<T>(id).unwrap_or_else(|| {
                Err(Error::internal(format!("frame {id} completed without a result")))
            }),
            Err(err) => {
                drop(self.shared.remove_frame(id));
                Err(err)
            }
        }
    }

    fn drive(&self, id: FrameId) -> Result<()> {
        self.resume(id).map_err(|exit| exit.cause().clone())?;
        while !self.shared.is_complete(id) {
            let resumed = self.run().map_err(|exit| exit.cause().clone())?;
            if resumed == 0 && !self.shared.is_complete(id) {
                warn!(frame = %id, "no frame can make progress");
                return Err(Error::stalled(format!(
                    "frame {id} is suspended and nothing is scheduled to wake it"
                )));
            }
        }
        Ok(())
    }

    /// Returns true once `frame` has completed or been destroyed.
    #[must_use]
    pub fn is_done(&self, frame: FrameId) -> bool {
        self.shared.is_complete(frame)
    }

    /// Returns the number of frames attached to this runtime.
    #[must_use]
    pub fn live_frames(&self) -> usize {
        self.shared.frames.borrow().len()
    }

    /// Returns the number of wake-ups waiting for [`Runtime::run`].
    #[must_use]
    pub fn pending_wakeups(&self) -> usize {
        self.shared.ready.len()
    }

    /// Returns a snapshot of `frame`, if it is still attached.
    #[must_use]
    pub fn frame_info(&self, frame: FrameId) -> Option<FrameInfo> {
        let frames = self.shared.frames.borrow();
        frames.get(frame.arena_index()).map(|f| f.info(frame))
    }

    /// Returns snapshots of every attached frame.
    #[must_use]
    pub fn frames(&self) -> Vec<FrameInfo> {
        let frames = self.shared.frames.borrow();
        frames
            .iter()
            .map(|(index, f)| f.info(FrameId::from_arena(index)))
            .collect()
    }

    /// Polls one frame and queues the frames that run next.
    fn step(
        &self,
        id: FrameId,
        pending: &mut VecDeque<FrameId>,
    ) -> core::result::Result<(), UnhandledExit> {
        let (mut body, waker) = {
            let mut frames = self.shared.frames.borrow_mut();
            let Some(frame) = frames.get_mut(id.arena_index()) else {
                debug!(frame = %id, "resume of a destroyed frame ignored");
                return Ok(());
            };
            if !frame.state.is_resumable() {
                trace!(frame = %id, state = %frame.state, "resume of a non-resumable frame ignored");
                return Ok(());
            }
            let Some(body) = frame.body.take() else {
                error!(frame = %id, "frame has no body to resume");
                return Ok(());
            };
            frame.state = FrameState::Running;
            (body, frame.waker.clone())
        };

        self.shared.transfers.borrow_mut().clear();
        let polled = {
            let _guard = context::set_current(Current {
                shared: Rc::clone(&self.shared),
                frame: id,
            });
            let mut cx = Context::from_waker(&waker);
            body.poll_body(&mut cx, self.shared.config.catch_panics)
        };
        let transfers = core::mem::take(&mut *self.shared.transfers.borrow_mut());
        let stopped = transfers.contains(&Transfer::Stop);

        let (kind, continuation, externally_driven) = {
            let mut frames = self.shared.frames.borrow_mut();
            let Some(frame) = frames.get_mut(id.arena_index()) else {
                drop(frames);
                drop(body);
                warn!(frame = %id, "frame destroyed while it was running");
                return Ok(());
            };
            frame.body = Some(body);
            frame.state = match polled {
                Poll::Ready(Completion::Returned) => FrameState::Returned,
                Poll::Ready(Completion::Raised) => FrameState::Raised,
                Poll::Pending if stopped => FrameState::Stopped,
                Poll::Pending => FrameState::Suspended,
            };
            trace!(frame = %id, state = %frame.state, "frame polled");
            (frame.kind, frame.continuation, frame.externally_driven)
        };

        let next = match polled {
            Poll::Pending if stopped => self.deliver_stop(id),
            Poll::Pending => {
                pending.extend(transfers.iter().filter_map(|transfer| match transfer {
                    Transfer::Await(child) => Some(*child),
                    Transfer::Stop => None,
                }));
                None
            }
            Poll::Ready(completion) => {
                self.complete(id, kind, completion, continuation, externally_driven)?
            }
        };
        pending.extend(next);
        Ok(())
    }

    fn complete(
        &self,
        id: FrameId,
        kind: FrameKind,
        completion: Completion,
        continuation: Option<FrameId>,
        externally_driven: bool,
    ) -> core::result::Result<Option<FrameId>, UnhandledExit> {
        match kind {
            FrameKind::Task => match continuation {
                Some(next) => Ok(Some(next)),
                None if externally_driven => Ok(None),
                None => {
                    error!(frame = %id, "task completed without a continuation");
                    Ok(None)
                }
            },
            FrameKind::Detached => match completion {
                Completion::Returned => {
                    debug!(frame = %id, "detached task finished");
                    drop(self.shared.remove_frame(id));
                    Ok(None)
                }
                Completion::Raised => Err(self.unhandled_exit(id)),
            },
        }
    }

    /// Wraps a failed detached frame into its carrier; the frame stays
    /// attached until the last clone of the carrier is dropped.
    fn unhandled_exit(&self, id: FrameId) -> UnhandledExit {
        let (name, cause) = {
            let frames = self.shared.frames.borrow();
            let frame = frames.get(id.arena_index());
            let name = frame.map_or("<destroyed>", |f| f.name);
            let cause = frame
                .and_then(|f| f.body.as_ref())
                .and_then(|body| body.exception())
                .unwrap_or_else(|| Error::internal("detached frame raised without an exception"));
            (name, cause)
        };
        error!(frame = %id, task = name, cause = %cause, "unhandled exception in detached task");
        let runtime: Weak<Shared> = Rc::downgrade(&self.shared);
        let capsule = FrameCapsule::new(
            id,
            Box::new(move || {
                if let Some(shared) = runtime.upgrade() {
                    drop(shared.remove_frame(id));
                }
            }),
        );
        UnhandledExit::new(name, cause, capsule)
    }

    /// Delivers a stop from `stopped` along the stop handlers.
    ///
    /// Returns the frame to resume next when a task frame recovers.
    fn deliver_stop(&self, stopped: FrameId) -> Option<FrameId> {
        let mut current = stopped;
        loop {
            let (handler, name) = {
                let frames = self.shared.frames.borrow();
                let frame = frames.get(current.arena_index())?;
                (frame.stop_handler, frame.name)
            };
            let parent = match handler {
                StopHandler::Terminate => terminate(current, name),
                StopHandler::Notify(parent) => parent,
            };

            let body = {
                let mut frames = self.shared.frames.borrow_mut();
                frames
                    .get_mut(parent.arena_index())
                    .and_then(|f| f.body.take())
            };
            let Some(mut body) = body else {
                error!(frame = %parent, "stop delivered to a frame without a body");
                return None;
            };
            let recovered = body.recover_stopped();

            let mut frames = self.shared.frames.borrow_mut();
            let frame = frames.get_mut(parent.arena_index())?;
            frame.body = Some(body);
            match recovered {
                Some(completion) => {
                    frame.state = match completion {
                        Completion::Returned => FrameState::Returned,
                        Completion::Raised => FrameState::Raised,
                    };
                    debug!(frame = %parent, stopped = %current, "task recovered from stop");
                    return match frame.continuation {
                        Some(next) => Some(next),
                        None if frame.externally_driven => None,
                        None => {
                            error!(frame = %parent, "task completed without a continuation");
                            None
                        }
                    };
                }
                None => {
                    frame.state = FrameState::Stopped;
                    debug!(frame = %parent, stopped = %current, "stop forwarded");
                    current = parent;
                }
            }
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        let live = self.shared.frames.borrow().len();
        if live > 0 {
            debug!(live_frames = live, "runtime dropped with attached frames");
        }
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.shared.config)
            .field("live_frames", &self.live_frames())
            .field("pending_wakeups", &self.pending_wakeups())
            .finish()
    }
}

/// A stop reached a frame whose awaiter cannot handle it.
fn terminate(frame: FrameId, name: &'static str) -> ! {
    error!(
        frame = %frame,
        task = name,
        "stop reached a frame with no stop-aware awaiter; terminating"
    );
    eprintln!("cotask: `{name}` ({frame}) was stopped and nothing handles it; aborting");
    std::process::abort()
}
