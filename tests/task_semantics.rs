//! Integration tests for task ownership, result delivery and the trampoline.

use std::cell::Cell;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use cotask::test_utils::{
    DropCounter, init_test_logging, run_default, run_on_large_stack, test_runtime,
    test_runtime_without_panic_capture,
};
use cotask::{
    DetachedTask, Error, ErrorKind, FrameState, Runtime, Task, TaskAwaiter, test_complete,
    test_phase, test_section, yield_now,
};
use proptest::prelude::*;

fn value<T: 'static>(v: T) -> Task<T> {
    Task::named("value", async move { Ok(v) })
}

fn nested_value(v: i64, depth: usize) -> Task<i64> {
    Task::named("nested_value", async move {
        if depth == 0 {
            Ok(v)
        } else {
            nested_value(v, depth - 1).await
        }
    })
}

fn chain(depth: u64) -> Task<u64> {
    Task::named("chain", async move {
        if depth == 0 {
            Ok(0)
        } else {
            Ok(chain(depth - 1).await? + 1)
        }
    })
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("sensor {0} offline")]
struct SensorOffline(u32);

fn read_sensor(id: u32) -> Task<f64> {
    Task::named("read_sensor", async move {
        Err(Error::from_source(SensorOffline(id)))
    })
}

proptest! {
    #[test]
    fn awaited_value_round_trips(v in any::<i64>(), depth in 0usize..24) {
        let got = run_default(Task::new(async move { nested_value(v, depth).await }));
        prop_assert_eq!(got.ok(), Some(v));
    }

    #[test]
    fn awaited_strings_round_trip(s in ".{0,64}") {
        let expected = s.clone();
        let got = run_default(Task::new(async move { value(s).await }));
        prop_assert_eq!(got.ok(), Some(expected));
    }
}

#[test]
fn unit_and_struct_results_round_trip() {
    init_test_logging();
    test_phase!("unit_and_struct_results_round_trip");

    #[derive(Debug, Clone, PartialEq)]
    struct Reading {
        id: u32,
        celsius: f32,
    }

    let runtime = test_runtime();
    runtime
        .block_on(Task::new(async { value(()).await }))
        .expect("unit result");
    let reading = runtime
        .block_on(Task::new(async {
            value(Reading {
                id: 3,
                celsius: 21.5,
            })
            .await
        }))
        .expect("struct result");
    assert_eq!(reading, Reading { id: 3, celsius: 21.5 });
    assert_eq!(runtime.live_frames(), 0);
    test_complete!("unit_and_struct_results_round_trip");
}

#[test]
fn exception_reaches_awaiter_unchanged() {
    init_test_logging();
    test_phase!("exception_reaches_awaiter_unchanged");
    let err = run_default(Task::new(async {
        let reading = read_sensor(9).await?;
        Ok(reading * 2.0)
    }))
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::User);
    assert_eq!(err.downcast_ref::<SensorOffline>(), Some(&SensorOffline(9)));
    assert_eq!(err.to_string(), "User: sensor 9 offline");
    test_complete!("exception_reaches_awaiter_unchanged");
}

#[test]
fn exception_can_be_handled_by_awaiter() {
    let recovered = run_default(Task::new(async {
        match read_sensor(1).await {
            Ok(v) => Ok(v),
            Err(err) if err.downcast_ref::<SensorOffline>().is_some() => Ok(-1.0),
            Err(err) => Err(err),
        }
    }))
    .expect("handled");
    assert!((recovered + 1.0).abs() < f64::EPSILON);
}

#[test]
fn panic_in_body_becomes_exception() {
    init_test_logging();
    let runtime = test_runtime();
    let err = runtime
        .block_on(Task::new(async {
            let inner: Task<u8> = Task::named("explodes", async {
                if std::hint::black_box(true) {
                    panic!("gear stripped");
                }
                Ok(0)
            });
            inner.await
        }))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Panicked);
    assert_eq!(err.panic_payload().map(|p| p.message()), Some("gear stripped"));
    assert_eq!(runtime.live_frames(), 0);
}

#[test]
#[should_panic(expected = "gear stripped")]
fn panic_propagates_without_capture() {
    let runtime = test_runtime_without_panic_capture();
    let _ = runtime.block_on(Task::<u8>::new(async {
        if std::hint::black_box(true) {
            panic!("gear stripped");
        }
        Ok(0)
    }));
}

#[test]
fn deep_chain_runs_on_bounded_stack() {
    init_test_logging();
    test_phase!("deep_chain_runs_on_bounded_stack");
    let depth = run_on_large_stack(|| {
        let runtime = Runtime::new();
        let depth = runtime.block_on(chain(100_000)).expect("chain completes");
        assert_eq!(runtime.live_frames(), 0);
        depth
    });
    assert_eq!(depth, 100_000);
    test_complete!("deep_chain_runs_on_bounded_stack", depth = depth);
}

#[test]
fn never_awaited_task_never_runs() {
    let counter = DropCounter::new();
    let guard = counter.guard();
    let ran = Rc::new(Cell::new(false));
    let flag = Rc::clone(&ran);
    let task: Task<()> = Task::new(async move {
        let _guard = guard;
        flag.set(true);
        Ok(())
    });
    assert_eq!(counter.count(), 0);
    drop(task);
    assert!(!ran.get());
    assert_eq!(counter.count(), 1);
}

#[test]
fn awaited_task_is_destroyed_exactly_once() {
    init_test_logging();
    let counter = DropCounter::new();
    let guard = counter.guard();
    let runtime = test_runtime();
    let v = runtime
        .block_on(Task::new(async move {
            let inner = Task::named("owns_guard", async move {
                let _guard = guard;
                Ok(5)
            });
            let v = inner.await?;
            Ok(v)
        }))
        .expect("completes");
    assert_eq!(v, 5);
    assert_eq!(counter.count(), 1);
    assert_eq!(runtime.live_frames(), 0);
}

/// Polls a task's awaiter once, then drops it on the next poll.
struct Abandon<T: 'static> {
    awaiter: Option<TaskAwaiter<T>>,
}

impl<T: 'static> Future for Abandon<T> {
    type Output = bool;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<bool> {
        let this = self.get_mut();
        if let Some(awaiter) = this.awaiter.as_mut() {
            if awaiter.frame().is_none() {
                let started = Pin::new(awaiter).poll(cx).is_pending();
                cx.waker().wake_by_ref();
                return if started {
                    Poll::Pending
                } else {
                    Poll::Ready(false)
                };
            }
        }
        this.awaiter = None;
        Poll::Ready(true)
    }
}

#[test]
fn awaiter_abandoned_mid_suspension_destroys_child() {
    init_test_logging();
    test_phase!("awaiter_abandoned_mid_suspension_destroys_child");
    let counter = DropCounter::new();
    let guard = counter.guard();
    let finished = Rc::new(Cell::new(false));
    let flag = Rc::clone(&finished);

    let child: Task<()> = Task::named("sleepy", async move {
        let _guard = guard;
        yield_now().await;
        flag.set(true);
        Ok(())
    });

    let runtime = test_runtime();
    let abandoned = Rc::new(Cell::new(false));
    let seen = Rc::clone(&abandoned);
    runtime
        .start(DetachedTask::named("owner", async move {
            let dropped = Abandon {
                awaiter: Some(child.into_future()),
            }
            .await;
            seen.set(dropped);
            Ok(())
        }))
        .expect("owner starts");

    test_section!("child suspended, owner queued");
    assert_eq!(runtime.live_frames(), 2);
    assert_eq!(counter.count(), 0);

    runtime.run().expect("no unhandled exits");
    assert!(abandoned.get());
    assert!(!finished.get());
    assert_eq!(counter.count(), 1);
    assert_eq!(runtime.live_frames(), 0);
    test_complete!("awaiter_abandoned_mid_suspension_destroys_child");
}

#[test]
fn yield_now_resumes_through_run() {
    init_test_logging();
    let runtime = Runtime::builder()
        .poll_budget(1)
        .build()
        .expect("valid config");
    let hops = Rc::new(Cell::new(0));
    let counted = Rc::clone(&hops);
    let id = runtime
        .start(DetachedTask::named("hopper", async move {
            for _ in 0..3 {
                counted.set(counted.get() + 1);
                yield_now().await;
            }
            Ok(())
        }))
        .expect("starts");

    assert_eq!(hops.get(), 1);
    assert_eq!(
        runtime.frame_info(id).map(|info| info.state),
        Some(FrameState::Suspended)
    );
    assert_eq!(runtime.pending_wakeups(), 1);

    assert_eq!(runtime.run().expect("run"), 1);
    assert_eq!(hops.get(), 2);
    assert_eq!(runtime.run().expect("run"), 1);
    assert_eq!(runtime.run().expect("run"), 1);
    assert!(runtime.is_done(id));
    assert_eq!(runtime.run().expect("run"), 0);
    assert_eq!(runtime.live_frames(), 0);
}

#[test]
fn block_on_drives_yielding_chain() {
    let v = run_default(Task::new(async {
        let inner = Task::named("yields", async {
            yield_now().await;
            yield_now().await;
            Ok(11)
        });
        Ok(inner.await? * 2)
    }))
    .expect("completes");
    assert_eq!(v, 22);
}

#[test]
fn block_on_reports_stall() {
    init_test_logging();
    let runtime = test_runtime();
    let err = runtime
        .block_on(Task::<()>::new(async {
            std::future::pending::<()>().await;
            Ok(())
        }))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Stalled);
    assert_eq!(runtime.live_frames(), 0);
}

#[test]
fn frames_are_inspectable_while_suspended() {
    let runtime = test_runtime();
    let id = runtime
        .start(DetachedTask::named("inspect_me", async {
            yield_now().await;
            Ok(())
        }))
        .expect("starts");
    let info = runtime.frame_info(id).expect("attached");
    assert_eq!(info.name, "inspect_me");
    assert_eq!(info.continuation, None);
    assert_eq!(runtime.frames().len(), 1);

    let json = serde_json::to_value(info).expect("serialize");
    assert_eq!(json["name"], "inspect_me");
    assert_eq!(json["kind"], "detached");
    assert_eq!(json["state"], "suspended");
    assert_eq!(json["stop_handler"], "Terminate");

    runtime.run().expect("run");
    assert!(runtime.frame_info(id).is_none());
}

/// Polls both awaiters from one poll of the same frame and sums the results.
fn join_sum(a: Task<u32>, b: Task<u32>) -> Task<u32> {
    Task::named("join_sum", async move {
        let mut left = a.into_future();
        let mut right = b.into_future();
        let (mut x, mut y) = (None, None);
        std::future::poll_fn(|cx| {
            if x.is_none() {
                if let Poll::Ready(v) = Pin::new(&mut left).poll(cx) {
                    x = Some(v);
                }
            }
            if y.is_none() {
                if let Poll::Ready(v) = Pin::new(&mut right).poll(cx) {
                    y = Some(v);
                }
            }
            if x.is_some() && y.is_some() {
                Poll::Ready(())
            } else {
                Poll::Pending
            }
        })
        .await;
        Ok(x.expect("left done")? + y.expect("right done")?)
    })
}

#[test]
fn children_started_in_one_poll_all_run() {
    init_test_logging();
    test_phase!("children_started_in_one_poll_all_run");
    let runtime = test_runtime();
    let sum = runtime
        .block_on(join_sum(value(1), value(2)))
        .expect("both children complete");
    assert_eq!(sum, 3);
    assert_eq!(runtime.live_frames(), 0);

    test_section!("first child suspends");
    let slow = Task::named("slow", async {
        yield_now().await;
        Ok(10)
    });
    let sum = runtime
        .block_on(join_sum(slow, value(5)))
        .expect("both children complete");
    assert_eq!(sum, 15);
    assert_eq!(runtime.live_frames(), 0);
    test_complete!("children_started_in_one_poll_all_run");
}

#[test]
fn detached_root_joins_children_started_together() {
    let runtime = test_runtime();
    let seen = Rc::new(Cell::new(0));
    let record = Rc::clone(&seen);
    let id = runtime
        .start(DetachedTask::named("joiner", async move {
            record.set(join_sum(value(20), value(22)).await?);
            Ok(())
        }))
        .expect("starts");
    assert_eq!(seen.get(), 42);
    assert!(runtime.is_done(id));
    assert_eq!(runtime.live_frames(), 0);
}
