//! Tests for the `#[task]` and `#[detached]` attribute macros.

use std::cell::Cell;
use std::rc::Rc;

use cotask::env::trace::{InplaceTrace, TraceFacet};
use cotask::env::{Environment, Inherit, Query, Queryable, Request, query, query_dyn};
use cotask::test_utils::{run_default, test_runtime};
use cotask::{Error, ErrorKind, Result, Task, compose_environment};

#[cotask::task]
async fn add(a: u32, b: u32) -> Result<u32> {
    Ok(a + b)
}

#[cotask::task]
async fn checked_div(a: u32, b: u32) -> cotask::Result<u32> {
    if b == 0 {
        return Err(Error::user("division by zero"));
    }
    Ok(a / b)
}

#[cotask::task(name = "labelled")]
async fn renamed() -> Result<&'static str> {
    Ok("done")
}

#[cotask::task]
async fn generic_echo<T: 'static>(value: T) -> Result<T> {
    Ok(value)
}

struct Tenant;
impl Query for Tenant {
    type Output = &'static str;
}

#[derive(Debug)]
struct TenantFacet {
    name: &'static str,
}

impl Default for TenantFacet {
    fn default() -> Self {
        Self { name: "anonymous" }
    }
}

impl Inherit for TenantFacet {
    fn inherit(source: &dyn Environment) -> Self {
        Self {
            name: query_dyn::<Tenant>(source).unwrap_or_else(|| Self::default().name),
        }
    }
}

impl Queryable<Tenant> for TenantFacet {
    fn query(&self, _: Tenant) -> &'static str {
        self.name
    }
}

impl Environment for TenantFacet {
    fn provide(&self, request: &mut Request<'_>) {
        request.provide::<Tenant>(|| self.name);
    }
}

compose_environment! {
    #[derive(Debug)]
    struct TenantEnv {
        trace: TraceFacet => [InplaceTrace],
        tenant: TenantFacet => [Tenant],
    }
}

#[cotask::task(env = TenantEnv)]
async fn tenant_name() -> Result<&'static str> {
    Ok(query::<Tenant>().unwrap_or("missing"))
}

#[cotask::detached]
async fn bump(counter: Rc<Cell<u32>>) -> Result<()> {
    let sum = add(1, 2).await?;
    counter.set(counter.get() + sum);
    Ok(())
}

#[test]
fn task_attribute_builds_lazy_tasks() {
    let task = add(2, 3);
    assert_eq!(task.name(), "macros::add");
    assert_eq!(run_default(Task::new(async { add(2, 3).await })).ok(), Some(5));
}

#[test]
fn early_return_raises_to_awaiter() {
    let err = run_default(Task::new(async { checked_div(1, 0).await })).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::User);
    assert_eq!(err.message(), Some("division by zero"));
    assert_eq!(
        run_default(Task::new(async { checked_div(9, 3).await })).ok(),
        Some(3)
    );
}

#[test]
fn name_argument_overrides_frame_name() {
    assert_eq!(renamed().name(), "labelled");
}

#[test]
fn generic_functions_keep_their_parameters() {
    let got = run_default(Task::new(async { generic_echo(String::from("echo")).await }));
    assert_eq!(got.ok().as_deref(), Some("echo"));
}

/// A root environment that names the tenant being served.
#[derive(Debug, Default)]
struct AcmeTenant;

impl Inherit for AcmeTenant {}

impl Environment for AcmeTenant {
    fn provide(&self, request: &mut Request<'_>) {
        request.provide::<Tenant>(|| "acme");
    }
}

#[test]
fn env_argument_selects_environment() {
    let task: Task<&'static str, TenantEnv> = tenant_name();
    let got = test_runtime().block_on(task).expect("completes");
    assert_eq!(got, "anonymous");

    let got = run_default(Task::new(async { tenant_name().await })).expect("completes");
    assert_eq!(got, "anonymous", "inheriting from an unrelated env matches default");
}

#[test]
fn env_argument_inherits_from_awaiter() {
    let got = test_runtime()
        .block_on(Task::<_, AcmeTenant>::named_with_env("acme_root", async {
            tenant_name().await
        }))
        .expect("completes");
    assert_eq!(got, "acme");
}

#[test]
fn detached_attribute_builds_roots() {
    let counter = Rc::new(Cell::new(0));
    let root = bump(Rc::clone(&counter));
    assert_eq!(root.name(), "macros::bump");
    let runtime = test_runtime();
    runtime.start(root).expect("no unhandled exit");
    assert_eq!(counter.get(), 3);
}

#[test]
fn rejected_signatures_fail_to_compile() {
    let cases = trybuild::TestCases::new();
    cases.compile_fail("tests/ui/*.rs");
}
