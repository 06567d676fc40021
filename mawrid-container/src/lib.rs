//! Core container implementation for Mawrid DI.

pub mod adapter;
pub mod container;
pub mod context;
pub mod error;
pub mod graph;
pub mod key;
pub mod provider;
pub mod registry;
pub mod scope;

#[cfg(feature = "async")]
pub mod async_impl;

pub use container::prelude;
pub use error::{MawridError, Result};
pub use key::BindingKey;
pub use scope::{ScopeChain, ScopeLevel};

/// Builds a declared-dependency list from types.
///
/// ```
/// use mawrid_container::{deps, key::BindingKey};
///
/// let list = deps![String, i32];
/// assert_eq!(list, vec![BindingKey::of::<String>(), BindingKey::of::<i32>()]);
/// ```
#[macro_export]
macro_rules! deps {
    ($($ty:ty),* $(,)?) => {
        vec![$($crate::key::BindingKey::of::<$ty>()),*]
    };
}
