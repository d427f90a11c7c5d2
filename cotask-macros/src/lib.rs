//! Attribute macros for the cotask task runtime.
//!
//! - `#[task]` turns `async fn f(..) -> Result<T>` into `fn f(..) -> Task<T>`
//! - `#[task(env = MyEnv)]` produces `Task<T, MyEnv>`
//! - `#[detached]` turns `async fn f(..) -> Result<()>` into `fn f(..) -> DetachedTask`
//!
//! Either attribute accepts `name = "..."` to override the frame name shown
//! in traces. The generated function runs nothing; the body starts when the
//! returned task is awaited (or, for `#[detached]`, started on a runtime).
//!
//! ```ignore
//! #[cotask::task]
//! async fn fetch(id: u32) -> cotask::Result<String> {
//!     Ok(format!("item {id}"))
//! }
//! ```

use proc_macro::TokenStream;

mod task;

use task::Flavor;

/// Turns an `async fn` returning `Result<T>` into a function returning an
/// unstarted `cotask::Task<T>`.
#[proc_macro_attribute]
pub fn task(attr: TokenStream, item: TokenStream) -> TokenStream {
    task::task_impl(Flavor::Task, attr, item)
}

/// Turns an `async fn` returning `Result<()>` into a function returning a
/// `cotask::DetachedTask` root.
#[proc_macro_attribute]
pub fn detached(attr: TokenStream, item: TokenStream) -> TokenStream {
    task::task_impl(Flavor::Detached, attr, item)
}
