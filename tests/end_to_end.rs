//! End-to-end scenario: a detached root awaits a nested task chain that
//! prints its own suspension trace.

use std::cell::RefCell;
use std::fmt::Write as _;

use cotask::test_utils::{init_test_logging, test_runtime};
use cotask::{Result, current_trace, test_complete, test_phase};

thread_local! {
    static OUTPUT: RefCell<String> = const { RefCell::new(String::new()) };
}

fn emit(line: &str) {
    println!("{line}");
    OUTPUT.with(|out| {
        let mut out = out.borrow_mut();
        out.push_str(line);
        out.push('\n');
    });
}

#[cotask::task]
async fn example_task() -> Result<i32> {
    let trace = current_trace().await;
    let mut rendered = String::new();
    let _ = write!(rendered, "{trace:36}");
    emit(&rendered);
    Ok(42)
}

#[cotask::task]
async fn example_nested_task() -> Result<i32> {
    example_task().await
}

#[cotask::detached(name = "main")]
async fn example_root() -> Result<()> {
    let value = example_nested_task().await?;
    emit(&format!("Result from example_task: {value}"));
    Ok(())
}

#[test]
fn nested_example_prints_trace_then_result() {
    init_test_logging();
    test_phase!("nested_example_prints_trace_then_result");
    let runtime = test_runtime();
    runtime.start(example_root()).expect("root succeeds");
    assert_eq!(runtime.live_frames(), 0);

    let output = OUTPUT.with(|out| out.borrow().clone());
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines.len(), 4, "{output}");

    assert!(lines[0].starts_with("#0 end_to_end::example_task"), "{output}");
    assert!(lines[1].starts_with("#1 end_to_end::example_nested_task"), "{output}");
    assert!(lines[2].starts_with("#2 main"), "{output}");
    for line in &lines[..3] {
        let name_field = &line[3..3 + 36];
        assert_eq!(name_field.chars().count(), 36, "{line}");
        assert!(line[3 + 36..].starts_with(" at "), "{line}");
        assert!(line.contains("end_to_end.rs:"), "{line}");
    }
    assert_eq!(lines[3], "Result from example_task: 42");
    test_complete!("nested_example_prints_trace_then_result");
}
