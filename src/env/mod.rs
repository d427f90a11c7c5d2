//! Inheritable, capability-queried frame environments.
//!
//! An environment is a closed bundle of *facets* attached to a frame when its
//! continuation is established. Each facet answers one or more [`Query`] tags
//! and decides on its own how to inherit from the awaiting frame's
//! environment.
//!
//! Two query paths exist:
//!
//! - **Static**: [`Queryable<Q>`] on the concrete environment type. Asking an
//!   environment for a tag it does not advertise is a compile error.
//! - **Dynamic**: [`Environment::provide`] through [`query_dyn`], used when
//!   the source environment is only known as `&dyn Environment` (inheritance,
//!   or the runtime's view of the current frame).
//!
//! ```
//! use cotask::env::{Environment, Inherit, Query, Queryable, Request, query_dyn};
//! use cotask::compose_environment;
//! use cotask::env::trace::{InplaceTrace, TraceFacet};
//!
//! struct Verbosity;
//! impl Query for Verbosity {
//!     type Output = u8;
//! }
//!
//! #[derive(Debug, Default)]
//! struct LogFacet {
//!     level: u8,
//! }
//!
//! impl Inherit for LogFacet {
//!     fn inherit(source: &dyn Environment) -> Self {
//!         Self { level: query_dyn::<Verbosity>(source).unwrap_or_default() }
//!     }
//! }
//!
//! impl Queryable<Verbosity> for LogFacet {
//!     fn query(&self, _: Verbosity) -> u8 {
//!         self.level
//!     }
//! }
//!
//! impl Environment for LogFacet {
//!     fn provide(&self, request: &mut Request<'_>) {
//!         request.provide::<Verbosity>(|| self.level);
//!     }
//! }
//!
//! compose_environment! {
//!     #[derive(Debug)]
//!     struct AppEnv {
//!         trace: TraceFacet => [InplaceTrace],
//!         log: LogFacet => [Verbosity],
//!     }
//! }
//!
//! let env = AppEnv::default();
//! assert_eq!(env.query(Verbosity), 0);
//! assert!(query_dyn::<InplaceTrace>(&env).is_some());
//! ```

pub mod trace;

use core::any::{Any, TypeId};
use core::fmt;
use std::rc::Rc;

use crate::runtime::context;

/// A stateless tag naming one capability an environment may answer.
pub trait Query: 'static {
    /// The answer type.
    type Output: 'static;
}

/// Static, side-effect-free answer to query `Q`.
pub trait Queryable<Q: Query> {
    /// Answers the query.
    fn query(&self, tag: Q) -> Q::Output;
}

/// Upcast helper for environments stored behind `dyn`.
pub trait AsAny: Any {
    /// Returns `self` as `&dyn Any`.
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Object-safe view of an environment.
pub trait Environment: AsAny {
    /// Answers whichever query `request` carries, if this environment knows it.
    fn provide(&self, request: &mut Request<'_>);
}

/// A pending dynamic query, filled by [`Environment::provide`].
pub struct Request<'a> {
    query: TypeId,
    answer: &'a mut dyn Any,
}

impl Request<'_> {
    /// Supplies the answer for `Q` if this request is for `Q`.
    ///
    /// The first provider wins; later answers for the same query are ignored.
    pub fn provide<Q: Query>(&mut self, answer: impl FnOnce() -> Q::Output) -> &mut Self {
        if self.query == TypeId::of::<Q>() {
            if let Some(slot) = self.answer.downcast_mut::<Option<Q::Output>>() {
                if slot.is_none() {
                    *slot = Some(answer());
                }
            }
        }
        self
    }

    /// Returns true if this request asks for `Q`.
    #[must_use]
    pub fn is<Q: Query>(&self) -> bool {
        self.query == TypeId::of::<Q>()
    }
}

impl fmt::Debug for Request<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request").field("query", &self.query).finish()
    }
}

/// Asks `env` for `Q`, returning `None` when no facet answers it.
pub fn query_dyn<Q: Query>(env: &dyn Environment) -> Option<Q::Output> {
    let mut answer: Option<Q::Output> = None;
    let mut request = Request {
        query: TypeId::of::<Q>(),
        answer: &mut answer,
    };
    env.provide(&mut request);
    answer
}

/// Construction of a facet (or a whole environment) from a parent environment.
///
/// The default implementation ignores the source and default-constructs,
/// which is the right behavior for facets that carry no inheritable state.
pub trait Inherit: Default {
    /// Builds `Self` from whatever `source` answers.
    fn inherit(source: &dyn Environment) -> Self {
        let _ = source;
        Self::default()
    }
}

/// The environment of a frame with no facets.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyEnv;

impl Inherit for EmptyEnv {}

impl Environment for EmptyEnv {
    fn provide(&self, _request: &mut Request<'_>) {}
}

/// Builds the environment of a newly attached frame.
pub(crate) fn establish<E>(parent: Option<&dyn Environment>) -> Rc<dyn Environment>
where
    E: Inherit + Environment,
{
    match parent {
        Some(source) => Rc::new(E::inherit(source)),
        None => Rc::new(E::default()),
    }
}

/// Runs `f` with the current frame's environment, if it is an `E`.
///
/// Returns `None` outside a runtime-driven frame or when the current frame
/// uses a different environment type.
pub fn with_current_env<E, R>(f: impl FnOnce(&E) -> R) -> Option<R>
where
    E: Environment,
{
    let env = context::current()?.environment()?;
    AsAny::as_any(&*env).downcast_ref::<E>().map(f)
}

/// Asks the current frame's environment for `Q`.
///
/// Returns `None` outside a runtime-driven frame or when no facet answers.
#[must_use]
pub fn query<Q: Query>() -> Option<Q::Output> {
    let env = context::current()?.environment()?;
    query_dyn::<Q>(&*env)
}

/// Declares an environment struct composed of facets.
///
/// Each field lists the queries it answers. The generated type implements
/// [`Default`], [`Inherit`] (field by field), [`Environment`] (the union of
/// all fields' answers) and [`Queryable`] for every listed query.
#[macro_export]
macro_rules! compose_environment {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$fmeta:meta])*
                $fvis:vis $field:ident : $facet:ty => [ $($query:ty),* $(,)? ]
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$fmeta])*
                $fvis $field: $facet,
            )*
        }

        impl ::core::default::Default for $name {
            fn default() -> Self {
                Self {
                    $($field: <$facet as ::core::default::Default>::default(),)*
                }
            }
        }

        impl $crate::env::Inherit for $name {
            fn inherit(source: &dyn $crate::env::Environment) -> Self {
                Self {
                    $($field: <$facet as $crate::env::Inherit>::inherit(source),)*
                }
            }
        }

        impl $crate::env::Environment for $name {
            fn provide(&self, request: &mut $crate::env::Request<'_>) {
                $($crate::env::Environment::provide(&self.$field, request);)*
            }
        }

        $($(
            impl $crate::env::Queryable<$query> for $name {
                fn query(&self, tag: $query) -> <$query as $crate::env::Query>::Output {
                    $crate::env::Queryable::<$query>::query(&self.$field, tag)
                }
            }
        )*)*
    };
}
