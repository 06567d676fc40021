//! # Mawrid — Scoped Dependency Injection for Rust
//!
//! A container that resolves object graphs from type-keyed factory
//! declarations, caches instances per lifecycle scope (`APP → REQUEST →
//! ACTION` by default), redirects aliases to one shared instance, and
//! accepts externally supplied context values. Both a synchronous and
//! an asynchronous container are provided; see
//! [`mawrid_container::container`] and [`mawrid_container::async_impl`].

pub use mawrid_container::*;
pub use mawrid_support::rendering;
