//! Integration adapter.
//!
//! The one place where a surrounding framework touches the container:
//! around each unit of work (an HTTP request, a job, a message), open a
//! child scope, resolve the work's declared needs, run it with those
//! needs as ordinary arguments, and close the scope again. The scope is
//! closed on every exit path — success, failure, or panic — because the
//! handle closes itself on drop.
//!
//! # Examples
//! ```rust,ignore
//! let result = around_unit_of_work(&container, |(db, users): (Arc<Database>, Arc<UserService>)| {
//!     users.rename(&db, 42, "amina")
//! })?;
//! ```

use std::sync::Arc;

use crate::container::{Container, ScopedContainer};
use crate::context::Context;
use crate::error::Result;

/// Declared needs of a unit of work, resolved from the scope opened for
/// it.
///
/// Implemented for `Arc<T>` of any resolvable binding and for tuples of
/// needs, so handlers declare dependencies as plain parameters.
pub trait FromScope: Sized {
    fn from_scope(scope: &ScopedContainer) -> Result<Self>;
}

impl<T: Send + Sync + 'static> FromScope for Arc<T> {
    fn from_scope(scope: &ScopedContainer) -> Result<Self> {
        scope.get::<T>()
    }
}

impl FromScope for () {
    fn from_scope(_scope: &ScopedContainer) -> Result<Self> {
        Ok(())
    }
}

macro_rules! impl_from_scope_tuple {
    ($($need:ident),+) => {
        impl<$($need: FromScope),+> FromScope for ($($need,)+) {
            fn from_scope(scope: &ScopedContainer) -> Result<Self> {
                Ok(($($need::from_scope(scope)?,)+))
            }
        }
    };
}

impl_from_scope_tuple!(A);
impl_from_scope_tuple!(A, B);
impl_from_scope_tuple!(A, B, C);
impl_from_scope_tuple!(A, B, C, D);
impl_from_scope_tuple!(A, B, C, D, E);
impl_from_scope_tuple!(A, B, C, D, E, F);
impl_from_scope_tuple!(A, B, C, D, E, F, G);
impl_from_scope_tuple!(A, B, C, D, E, F, G, H);

/// Runs `work` inside a fresh child scope of `container`.
///
/// Opens the scope, resolves the declared needs `N`, passes them to
/// `work`, and closes the scope afterwards. Scoped instances never
/// leak past the unit of work.
pub fn around_unit_of_work<N, R>(
    container: &Container,
    work: impl FnOnce(N) -> Result<R>,
) -> Result<R>
where
    N: FromScope,
{
    around_unit_of_work_with_context(container, Context::new(), work)
}

/// Like [`around_unit_of_work`], supplying context values to the opened
/// scope (e.g. the framework's request object).
pub fn around_unit_of_work_with_context<N, R>(
    container: &Container,
    context: Context,
    work: impl FnOnce(N) -> Result<R>,
) -> Result<R>
where
    N: FromScope,
{
    let scope = container.open_scope_with_context(context)?;
    let needs = N::from_scope(&scope)?;
    let out = work(needs);
    scope.close()?;
    out
}
