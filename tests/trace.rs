//! Integration tests for suspension-point traces.

use std::cell::RefCell;
use std::rc::Rc;

use cotask::env::trace::{InplaceTrace, live_nodes};
use cotask::env::{EmptyEnv, query};
use cotask::test_utils::{init_test_logging, run_default, test_runtime};
use cotask::{
    DetachedTask, Task, Trace, TraceExt, current_trace, test_complete, test_phase, yield_now,
};
use proptest::prelude::*;

type Slot = Rc<RefCell<Option<Trace>>>;

fn task_c(slot: Slot) -> Task<()> {
    Task::named("task_c", async move {
        *slot.borrow_mut() = Some(current_trace().await);
        Ok(())
    })
}

fn task_b(slot: Slot) -> Task<()> {
    Task::named("task_b", async move { task_c(slot).await })
}

fn task_a(slot: Slot) -> Task<()> {
    Task::named("task_a", async move { task_b(slot).await })
}

fn names(trace: &Trace) -> Vec<&'static str> {
    trace.iter().map(|entry| entry.function()).collect()
}

#[test]
fn trace_lists_every_frame_innermost_first() {
    init_test_logging();
    test_phase!("trace_lists_every_frame_innermost_first");
    let slot: Slot = Rc::default();
    let runtime = test_runtime();
    let inner = Rc::clone(&slot);
    runtime
        .start(DetachedTask::named("root", async move { task_a(inner).await }))
        .expect("no unhandled exit");

    let trace = slot.borrow_mut().take().expect("trace captured");
    assert_eq!(trace.len(), 4);
    assert_eq!(names(&trace), ["task_c", "task_b", "task_a", "root"]);
    for entry in &trace {
        assert!(entry.file().ends_with("trace.rs"), "{entry}");
        assert!(entry.line() > 0);
    }
    assert_eq!(runtime.live_frames(), 0);
    test_complete!("trace_lists_every_frame_innermost_first", entries = trace.len());
}

#[test]
fn trace_nodes_are_released_with_frames() {
    init_test_logging();
    let before = live_nodes();
    let slot: Slot = Rc::default();
    run_default(Task::new({
        let slot = Rc::clone(&slot);
        async move { task_a(slot).await }
    }))
    .expect("completes");
    assert_eq!(live_nodes(), before);
}

#[test]
fn trace_rendering_format() {
    let slot: Slot = Rc::default();
    let inner = Rc::clone(&slot);
    run_default(Task::named("render_root", async move { task_b(inner).await }))
        .expect("completes");
    let trace = slot.borrow_mut().take().expect("trace captured");

    let plain = trace.to_string();
    let lines: Vec<&str> = plain.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("#0 task_c at "), "{plain}");
    assert!(lines[1].starts_with("#1 task_b at "), "{plain}");
    assert!(lines[2].starts_with("#2 render_root at "), "{plain}");
    assert!(!plain.ends_with('\n'));

    let padded = format!("{trace:12}");
    assert!(padded.starts_with("#0 task_c       at "), "{padded}");

    let cut = format!("{trace:8}");
    assert!(cut.lines().nth(2).unwrap().starts_with("#2 rende... at "), "{cut}");
}

#[test]
fn trace_serializes_as_entry_list() {
    let slot: Slot = Rc::default();
    let inner = Rc::clone(&slot);
    run_default(Task::named("json_root", async move { task_c(inner).await }))
        .expect("completes");
    let trace = slot.borrow_mut().take().expect("trace captured");
    let json = serde_json::to_value(&trace).expect("serialize");
    let entries = json.as_array().expect("array");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["function"], "task_c");
    assert_eq!(entries[1]["function"], "json_root");
    assert!(entries[0]["line"].as_u64().is_some());
}

#[test]
fn latest_suspension_point_wins() {
    let trace = run_default(Task::named("hops", async {
        yield_now().await;
        let first = current_trace().await;
        let second = current_trace().await;
        assert_ne!(first.entries()[0].line(), second.entries()[0].line());
        Ok(second)
    }))
    .expect("completes");
    assert_eq!(trace.len(), 1);
}

#[test]
fn traced_adapter_records_its_location() {
    let entry = run_default(Task::named("adapter", async {
        let traced_line = line!() + 1;
        let value = std::future::ready(5).traced().await;
        assert_eq!(value, 5);
        let link = query::<InplaceTrace>().expect("frame has a trace facet");
        let trace = Trace::capture(link);
        assert_eq!(trace.entries()[0].line(), traced_line);
        Ok(trace.entries()[0])
    }))
    .expect("completes");
    assert_eq!(entry.function(), "adapter");
}

#[test]
fn environment_without_trace_facet_yields_empty_trace() {
    let trace = run_default(Task::new(async {
        Task::<Trace, EmptyEnv>::named_with_env("untraced", async { Ok(current_trace().await) })
            .await
    }))
    .expect("completes");
    assert!(trace.is_empty());
}

#[test]
fn trace_outside_runtime_is_empty() {
    use std::future::Future;
    use std::sync::Arc;
    use std::task::{Context, Poll, Wake, Waker};

    struct Noop;
    impl Wake for Noop {
        fn wake(self: Arc<Self>) {}
    }
    let waker = Waker::from(Arc::new(Noop));
    let mut cx = Context::from_waker(&waker);
    let mut fut = std::pin::pin!(current_trace());
    match fut.as_mut().poll(&mut cx) {
        Poll::Ready(trace) => assert!(trace.is_empty()),
        Poll::Pending => panic!("current_trace is always ready"),
    }
}

fn nest(depth: usize) -> Task<usize> {
    Task::named("nest", async move {
        if depth == 0 {
            Ok(current_trace().await.len())
        } else {
            nest(depth - 1).await
        }
    })
}

proptest! {
    #[test]
    fn trace_depth_matches_await_depth(depth in 0usize..40) {
        let len = run_default(nest(depth));
        prop_assert_eq!(len.ok(), Some(depth + 1));
    }
}
