//! Provider modules — groups of related binding declarations.
//!
//! A provider bundles the bindings of one domain area so registration
//! stays modular instead of one giant builder chain.
//!
//! # Examples
//! ```rust,ignore
//! struct DatabaseProvider;
//!
//! impl Provider for DatabaseProvider {
//!     fn register(&self, registrar: &mut dyn BindingRegistrar) {
//!         registrar.register_factory(
//!             BindingKey::of::<Database>(),
//!             APP,
//!             wrap(|_| Ok(Database::connect("postgres://localhost"))),
//!             vec![],
//!             None,
//!         );
//!     }
//! }
//! ```

use crate::key::BindingKey;
use crate::registry::{CoerceFn, DisposerFn, FactoryFn};
use crate::scope::ScopeLevel;

/// A module that declares related bindings into a container builder.
///
/// Split registrations by domain instead of piling everything into one
/// place:
///
/// ```rust,ignore
/// let container = Container::builder()
///     .add_provider(&DatabaseProvider)
///     .add_provider(&AuthProvider)
///     .build()?;
/// ```
pub trait Provider: Send + Sync {
    /// Declares this module's bindings. Called once during container
    /// construction.
    fn register(&self, registrar: &mut dyn BindingRegistrar);

    /// Human-readable name for logs and error messages.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// What providers register against.
///
/// A subset of the builder's surface, kept as its own trait so provider
/// modules can be unit-tested against a mock registrar.
pub trait BindingRegistrar {
    /// Declares a factory binding with its scope, dependency keys, and
    /// optional disposal hook.
    fn register_factory(
        &mut self,
        key: BindingKey,
        scope: ScopeLevel,
        factory: FactoryFn,
        dependencies: Vec<BindingKey>,
        disposer: Option<DisposerFn>,
    );

    /// Declares an alias from `key` to `target` with its coercion.
    fn register_alias(&mut self, key: BindingKey, target: BindingKey, coerce: CoerceFn);

    /// Declares a context binding.
    fn register_context(&mut self, key: BindingKey, scope: ScopeLevel);
}
