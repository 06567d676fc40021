//! # The Container
//!
//! The façade combining the binding registry with the scope tree.
//!
//! # Architecture
//! ```text
//! ContainerBuilder  ──build()──>  Container (owns the root scope)
//!                                    │
//!                               open_scope()
//!                                    │
//!                                    ▼
//!                              ScopedContainer ── open_scope() ── …
//! ```
//!
//! Registration happens once, through the builder; the registry is
//! immutable after `build()`. Every `get` resolves against the root or
//! a child scope, caching each instance in the scope that owns its
//! binding's level.
//!
//! # Examples
//! ```rust
//! use mawrid_container::container::Container;
//! use mawrid_container::deps;
//! use mawrid_container::scope::APP;
//! use std::sync::Arc;
//!
//! struct Database {
//!     url: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! let container = Container::builder()
//!     .provide::<Database>(APP, |_| {
//!         Ok(Database { url: "postgres://localhost".into() })
//!     })
//!     .provide_with::<UserService>(APP, deps![Database], |r| {
//!         let db: Arc<Database> = r.resolve()?;
//!         Ok(UserService { db })
//!     })
//!     .build()
//!     .expect("Failed to build container");
//!
//! let service: Arc<UserService> = container.get().expect("Failed to resolve");
//! assert_eq!(service.db.url, "postgres://localhost");
//! ```

use std::fmt;
use std::sync::Arc;

use mawrid_support::rendering::render_binding_table;
use parking_lot::Mutex;
use tracing::{debug, info, instrument, trace};

use crate::context::{Context, ensure_root_values};
use crate::error::{MawridError, Result, ScopeClosedError, UnknownScopeError};
use crate::graph::{Resolution, probe_ready};
use crate::key::BindingKey;
use crate::provider::{BindingRegistrar, Provider};
use crate::registry::{
    Binding, BindingKind, CoerceFn, DisposerFn, FactoryFn, Registry, Resolver, SharedInstance,
    downcast,
};
use crate::scope::{ScopeChain, ScopeLevel, ScopeNode, ScopeState};

// ============================================================
// ContainerBuilder
// ============================================================

/// Builds a [`Container`] from binding declarations.
///
/// Register every binding, then call [`build()`](ContainerBuilder::build)
/// to get an immutable, thread-safe container. Registration problems
/// (duplicate keys, unknown scope levels) are detected as they happen
/// and surfaced by `build()`.
///
/// # Examples
/// ```rust,ignore
/// let container = Container::builder()
///     .provide_value(APP, Config::load())
///     .provide::<Database>(APP, |r| { ... })
///     .provide_with::<UserService>(REQUEST, deps![Database], |r| { ... })
///     .build()?;
/// ```
pub struct ContainerBuilder {
    registry: Registry<FactoryFn>,
    chain: ScopeChain,
    allow_override: bool,
    errors: Vec<MawridError>,
}

impl ContainerBuilder {
    fn new(chain: ScopeChain) -> Self {
        Self {
            registry: Registry::new(),
            chain,
            allow_override: false,
            errors: Vec::new(),
        }
    }

    /// Allow replacing previously registered bindings.
    pub fn allow_override(mut self, allow: bool) -> Self {
        self.allow_override = allow;
        self
    }

    // ── Factories ──

    /// Registers a factory with no declared dependencies.
    pub fn provide<T: Send + Sync + 'static>(
        self,
        scope: ScopeLevel,
        factory: impl Fn(&dyn Resolver) -> Result<T> + Send + Sync + 'static,
    ) -> Self {
        self.provide_with::<T>(scope, vec![], factory)
    }

    /// Registers a factory together with its declared dependency keys.
    ///
    /// Dependencies are constructed depth-first in the declared order
    /// before the factory runs; the factory then pulls them (already
    /// cached) from its resolver.
    pub fn provide_with<T: Send + Sync + 'static>(
        self,
        scope: ScopeLevel,
        dependencies: Vec<BindingKey>,
        factory: impl Fn(&dyn Resolver) -> Result<T> + Send + Sync + 'static,
    ) -> Self {
        self.register_internal(
            BindingKey::of::<T>(),
            scope,
            BindingKind::Factory {
                factory: wrap_factory(factory),
                disposer: None,
            },
            dependencies,
        )
    }

    /// Registers a factory whose instances get a disposal hook, run
    /// when the owning scope closes (reverse creation order).
    pub fn provide_disposable<T: Send + Sync + 'static>(
        self,
        scope: ScopeLevel,
        dependencies: Vec<BindingKey>,
        factory: impl Fn(&dyn Resolver) -> Result<T> + Send + Sync + 'static,
        disposer: impl Fn(&T) + Send + Sync + 'static,
    ) -> Self {
        self.register_internal(
            BindingKey::of::<T>(),
            scope,
            BindingKind::Factory {
                factory: wrap_factory(factory),
                disposer: Some(wrap_disposer(disposer)),
            },
            dependencies,
        )
    }

    /// Registers a pre-built value. The same instance is handed to
    /// every resolution in the owning scope.
    pub fn provide_value<T: Send + Sync + 'static>(self, scope: ScopeLevel, value: T) -> Self {
        let shared: Arc<T> = Arc::new(value);
        self.register_internal(
            BindingKey::of::<T>(),
            scope,
            BindingKind::Factory {
                factory: Arc::new(move |_| Ok(shared.clone() as SharedInstance)),
                disposer: None,
            },
            vec![],
        )
    }

    /// Registers a factory under a named key, for several bindings of
    /// one type.
    pub fn provide_named<T: Send + Sync + 'static>(
        self,
        name: &'static str,
        scope: ScopeLevel,
        factory: impl Fn(&dyn Resolver) -> Result<T> + Send + Sync + 'static,
    ) -> Self {
        self.register_internal(
            BindingKey::named::<T>(name),
            scope,
            BindingKind::Factory {
                factory: wrap_factory(factory),
                disposer: None,
            },
            vec![],
        )
    }

    // ── Aliases ──

    /// Registers `A` as an alias of the binding for `S`.
    ///
    /// Resolving `A` resolves `S` and applies `coerce` to the shared
    /// instance; the result points into the same allocation, so the
    /// alias never forks identity and is never disposed on its own.
    ///
    /// ```rust,ignore
    /// builder
    ///     .provide::<Console>(APP, |_| Ok(Console::new()))
    ///     .alias::<Console, Arc<dyn Logger>>(|c| c as Arc<dyn Logger>)
    /// ```
    pub fn alias<S, A>(self, coerce: impl Fn(Arc<S>) -> A + Send + Sync + 'static) -> Self
    where
        S: Send + Sync + 'static,
        A: Send + Sync + 'static,
    {
        let root = self.chain.root();
        self.register_internal(
            BindingKey::of::<A>(),
            root,
            BindingKind::Alias {
                target: BindingKey::of::<S>(),
                coerce: wrap_coerce(coerce),
            },
            vec![],
        )
    }

    // ── Context ──

    /// Declares that a value of type `T` is supplied from outside: via
    /// [`build_with_context`](ContainerBuilder::build_with_context) for
    /// the root level, via `open_scope_with_context` for deeper levels.
    pub fn from_context<T: Send + Sync + 'static>(self, scope: ScopeLevel) -> Self {
        self.register_internal(BindingKey::of::<T>(), scope, BindingKind::Context, vec![])
    }

    /// Declares a named context binding of type `T`.
    pub fn from_context_named<T: Send + Sync + 'static>(
        self,
        name: &'static str,
        scope: ScopeLevel,
    ) -> Self {
        self.register_internal(
            BindingKey::named::<T>(name),
            scope,
            BindingKind::Context,
            vec![],
        )
    }

    // ── Provider modules ──

    /// Adds a [`Provider`] module.
    pub fn add_provider(mut self, provider: &dyn Provider) -> Self {
        debug!(provider = provider.name(), "Adding provider");
        provider.register(&mut self);
        self
    }

    // ── Build ──

    /// Builds the container with no context values.
    pub fn build(self) -> Result<Container> {
        self.build_with_context(Context::new())
    }

    /// Builds the container, supplying values for root-level context
    /// bindings.
    ///
    /// # Errors
    /// Surfaces registration errors collected while declaring bindings,
    /// and [`MawridError::MissingContextValue`] for any root-level
    /// context binding without a supplied value.
    #[instrument(skip(self, context), name = "container_build")]
    pub fn build_with_context(mut self, context: Context) -> Result<Container> {
        if !self.errors.is_empty() {
            return Err(self.errors.remove(0));
        }

        info!(registered = self.registry.len(), "Building container");

        ensure_root_values(&self.registry, &self.chain, &context)?;

        let root = ScopeNode::root(self.chain.root(), context.into_values());
        info!("Container built");
        Ok(Container {
            shared: Arc::new(ContainerShared {
                registry: self.registry,
                chain: self.chain,
                resolve_lock: Mutex::new(()),
            }),
            root,
        })
    }

    // ── Internal ──

    fn register_internal(
        mut self,
        key: BindingKey,
        scope: ScopeLevel,
        kind: BindingKind<FactoryFn>,
        dependencies: Vec<BindingKey>,
    ) -> Self {
        self.register_raw(key, scope, kind, dependencies);
        self
    }

    fn register_raw(
        &mut self,
        key: BindingKey,
        scope: ScopeLevel,
        kind: BindingKind<FactoryFn>,
        dependencies: Vec<BindingKey>,
    ) {
        if !self.chain.contains(scope) {
            self.errors
                .push(MawridError::UnknownScope(UnknownScopeError {
                    scope,
                    chain: self.chain.levels().to_vec(),
                    key,
                }));
            return;
        }

        let binding = Binding {
            key,
            scope,
            kind,
            dependencies,
        };
        if let Err(err) = self.registry.register(binding, self.allow_override) {
            self.errors.push(err);
        }
    }
}

impl BindingRegistrar for ContainerBuilder {
    fn register_factory(
        &mut self,
        key: BindingKey,
        scope: ScopeLevel,
        factory: FactoryFn,
        dependencies: Vec<BindingKey>,
        disposer: Option<DisposerFn>,
    ) {
        self.register_raw(
            key,
            scope,
            BindingKind::Factory { factory, disposer },
            dependencies,
        );
    }

    fn register_alias(&mut self, key: BindingKey, target: BindingKey, coerce: CoerceFn) {
        let root = self.chain.root();
        self.register_raw(key, root, BindingKind::Alias { target, coerce }, vec![]);
    }

    fn register_context(&mut self, key: BindingKey, scope: ScopeLevel) {
        self.register_raw(key, scope, BindingKind::Context, vec![]);
    }
}

// ── Typed wrappers ──

pub(crate) fn wrap_factory<T: Send + Sync + 'static>(
    factory: impl Fn(&dyn Resolver) -> Result<T> + Send + Sync + 'static,
) -> FactoryFn {
    Arc::new(move |resolver| Ok(Arc::new(factory(resolver)?) as SharedInstance))
}

pub(crate) fn wrap_disposer<T: Send + Sync + 'static>(
    disposer: impl Fn(&T) + Send + Sync + 'static,
) -> DisposerFn {
    Arc::new(move |instance: SharedInstance| {
        if let Ok(typed) = instance.downcast::<T>() {
            disposer(&typed);
        }
    })
}

pub(crate) fn wrap_coerce<S, A>(coerce: impl Fn(Arc<S>) -> A + Send + Sync + 'static) -> CoerceFn
where
    S: Send + Sync + 'static,
    A: Send + Sync + 'static,
{
    Arc::new(move |instance| {
        let source = downcast::<S>(instance, BindingKey::of::<S>())?;
        Ok(Arc::new(coerce(source)) as SharedInstance)
    })
}

// ═══════════════════════════════════════════
// Container
// ═══════════════════════════════════════════

pub(crate) struct ContainerShared {
    registry: Registry<FactoryFn>,
    chain: ScopeChain,
    /// Serializes constructing resolutions; cache hits bypass it.
    /// One factory invocation per (scope instance, key), even under
    /// concurrent first access.
    resolve_lock: Mutex<()>,
}

/// Immutable, thread-safe synchronous container.
///
/// Created by [`ContainerBuilder::build()`]; owns the root scope and
/// closes it when dropped.
pub struct Container {
    shared: Arc<ContainerShared>,
    root: Arc<ScopeNode>,
}

impl Container {
    /// Creates a builder with the default scope chain
    /// (`APP → REQUEST → ACTION`).
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new(ScopeChain::default())
    }

    /// Creates a builder with a caller-declared scope chain.
    pub fn builder_with_scopes(chain: ScopeChain) -> ContainerBuilder {
        ContainerBuilder::new(chain)
    }

    /// Resolves a binding by type against the root scope.
    ///
    /// ```rust,ignore
    /// let db: Arc<Database> = container.get()?;
    /// ```
    pub fn get<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        let key = BindingKey::of::<T>();
        downcast::<T>(resolve_in(&self.shared, &self.root, &key)?, key)
    }

    /// Resolves a named binding by type against the root scope.
    pub fn get_named<T: Send + Sync + 'static>(&self, name: &'static str) -> Result<Arc<T>> {
        let key = BindingKey::named::<T>(name);
        downcast::<T>(resolve_in(&self.shared, &self.root, &key)?, key)
    }

    /// Opens a scope one level below the root.
    pub fn open_scope(&self) -> Result<ScopedContainer> {
        open_child(&self.shared, &self.root, Context::new())
    }

    /// Opens a scope one level below the root, supplying context values
    /// for bindings owned by the new scope.
    pub fn open_scope_with_context(&self, context: Context) -> Result<ScopedContainer> {
        open_child(&self.shared, &self.root, context)
    }

    /// Closes the root scope, releasing every application-scoped
    /// instance in reverse creation order. Also happens on drop.
    pub fn close(&self) -> Result<()> {
        self.root.close()
    }

    /// Lifecycle state of the root scope.
    pub fn state(&self) -> ScopeState {
        self.root.state()
    }

    /// Renders the registered bindings as an aligned listing, for
    /// logging and diagnostics.
    pub fn describe(&self) -> String {
        let chain = &self.shared.chain;
        render_binding_table(
            &self
                .shared
                .registry
                .rows(|level| chain.rank_of(level).unwrap_or(usize::MAX)),
        )
    }
}

impl Drop for Container {
    fn drop(&mut self) {
        let _ = self.root.close();
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("registered", &self.shared.registry.len())
            .field("state", &self.root.state())
            .finish()
    }
}

// ═══════════════════════════════════════════
// ScopedContainer
// ═══════════════════════════════════════════

/// A child scope opened from a [`Container`] or another scope.
///
/// Instances whose binding declares this scope's level are cached here
/// and released when the scope closes. Dropping the handle closes the
/// scope, so scoped instances are released on every exit path.
pub struct ScopedContainer {
    shared: Arc<ContainerShared>,
    node: Arc<ScopeNode>,
}

impl ScopedContainer {
    /// Resolves a binding by type against this scope.
    pub fn get<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        let key = BindingKey::of::<T>();
        downcast::<T>(resolve_in(&self.shared, &self.node, &key)?, key)
    }

    /// Resolves a named binding by type against this scope.
    pub fn get_named<T: Send + Sync + 'static>(&self, name: &'static str) -> Result<Arc<T>> {
        let key = BindingKey::named::<T>(name);
        downcast::<T>(resolve_in(&self.shared, &self.node, &key)?, key)
    }

    /// Opens a scope one level below this one.
    pub fn open_scope(&self) -> Result<ScopedContainer> {
        open_child(&self.shared, &self.node, Context::new())
    }

    /// Opens a scope one level below this one, supplying context values
    /// for bindings owned by the new scope.
    pub fn open_scope_with_context(&self, context: Context) -> Result<ScopedContainer> {
        open_child(&self.shared, &self.node, context)
    }

    /// Closes this scope, releasing owned instances in reverse creation
    /// order.
    ///
    /// # Errors
    /// Fails with [`MawridError::AlreadyClosed`] on a second close.
    pub fn close(&self) -> Result<()> {
        self.node.close()
    }

    /// This scope's level in the chain.
    pub fn level(&self) -> ScopeLevel {
        self.node.level()
    }

    /// Lifecycle state of this scope.
    pub fn state(&self) -> ScopeState {
        self.node.state()
    }
}

impl Drop for ScopedContainer {
    fn drop(&mut self) {
        let _ = self.node.close();
    }
}

impl fmt::Debug for ScopedContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedContainer")
            .field("level", &self.node.level())
            .field("state", &self.node.state())
            .finish()
    }
}

// ═══════════════════════════════════════════
// Shared resolution plumbing
// ═══════════════════════════════════════════

fn resolve_in(
    shared: &ContainerShared,
    node: &Arc<ScopeNode>,
    key: &BindingKey,
) -> Result<SharedInstance> {
    if node.is_closed() {
        return Err(MawridError::ScopeClosed(ScopeClosedError {
            level: node.level(),
        }));
    }

    trace!(key = %key, level = %node.level(), "Resolving");

    // Lock-free fast path for instances that already exist.
    if let Some(hit) = probe_ready(&shared.registry, &shared.chain, node, key, 0) {
        return hit;
    }

    let _guard = shared.resolve_lock.lock();
    Resolution::new(&shared.registry, &shared.chain).resolve(key, node, None)
}

fn open_child(
    shared: &Arc<ContainerShared>,
    node: &Arc<ScopeNode>,
    context: Context,
) -> Result<ScopedContainer> {
    if node.is_closed() {
        return Err(MawridError::ScopeClosed(ScopeClosedError {
            level: node.level(),
        }));
    }

    let level = shared
        .chain
        .level_at(node.rank() + 1)
        .ok_or(MawridError::NoChildScope {
            level: node.level(),
        })?;

    Ok(ScopedContainer {
        shared: shared.clone(),
        node: node.child(level, context.into_values()),
    })
}

// ═══════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════

pub mod prelude {
    pub use super::{Container, ContainerBuilder, ScopedContainer};
    pub use crate::adapter::{FromScope, around_unit_of_work};
    pub use crate::context::Context;
    pub use crate::deps;
    pub use crate::error::{MawridError, Result};
    pub use crate::key::BindingKey;
    pub use crate::provider::Provider;
    pub use crate::registry::Resolver;
    pub use crate::scope::{ACTION, APP, REQUEST, ScopeChain, ScopeLevel, ScopeState};
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deps;
    use crate::scope::{APP, REQUEST};
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct Database;
    struct UserService;
    struct Greeter;

    #[test]
    fn repeated_get_returns_identical_instance() {
        let container = Container::builder()
            .provide::<Database>(APP, |_| Ok(Database))
            .build()
            .unwrap();

        let first: Arc<Database> = container.get().unwrap();
        let second: Arc<Database> = container.get().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn factory_called_once_per_scope() {
        let calls = Arc::new(AtomicU32::new(0));

        let container = Container::builder()
            .provide::<Database>(APP, {
                let calls = calls.clone();
                move |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Database)
                }
            })
            .build()
            .unwrap();

        let _a: Arc<Database> = container.get().unwrap();
        let _b: Arc<Database> = container.get().unwrap();
        let _c: Arc<Database> = container.get().unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn graph_builds_in_declared_depth_first_order() {
        let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
        let (o1, o2, o3) = (order.clone(), order.clone(), order.clone());

        let container = Container::builder()
            .provide::<Database>(APP, move |_| {
                o1.lock().push("database");
                Ok(Database)
            })
            .provide_with::<UserService>(APP, deps![Database], move |r| {
                let _db: Arc<Database> = r.resolve()?;
                o2.lock().push("user_service");
                Ok(UserService)
            })
            .provide_with::<Greeter>(APP, deps![UserService], move |r| {
                let _svc: Arc<UserService> = r.resolve()?;
                o3.lock().push("greeter");
                Ok(Greeter)
            })
            .build()
            .unwrap();

        let _greeter: Arc<Greeter> = container.get().unwrap();
        assert_eq!(*order.lock(), vec!["database", "user_service", "greeter"]);

        // Everything was cached; a second resolve builds nothing new.
        let _again: Arc<Greeter> = container.get().unwrap();
        assert_eq!(order.lock().len(), 3);
    }

    #[test]
    fn aliases_share_one_underlying_instance() {
        trait Logger: Send + Sync {}
        trait Printer: Send + Sync {}

        struct Console;
        impl Logger for Console {}
        impl Printer for Console {}

        let container = Container::builder()
            .provide::<Console>(APP, |_| Ok(Console))
            .alias::<Console, Arc<dyn Logger>>(|c| c as Arc<dyn Logger>)
            .alias::<Console, Arc<dyn Printer>>(|c| c as Arc<dyn Printer>)
            .build()
            .unwrap();

        let console: Arc<Console> = container.get().unwrap();
        let logger: Arc<Arc<dyn Logger>> = container.get().unwrap();
        let printer: Arc<Arc<dyn Printer>> = container.get().unwrap();

        let console_ptr = Arc::as_ptr(&console) as *const ();
        assert_eq!(console_ptr, Arc::as_ptr(&*logger) as *const ());
        assert_eq!(console_ptr, Arc::as_ptr(&*printer) as *const ());
    }

    #[test]
    fn context_value_shared_across_child_scopes() {
        #[derive(Debug)]
        struct AppSettings {
            app_name: &'static str,
        }

        struct GreetingService;
        struct RequestProbe;

        let container = Container::builder()
            .from_context::<AppSettings>(APP)
            .provide_with::<GreetingService>(APP, deps![AppSettings], |r| {
                let settings: Arc<AppSettings> = r.resolve()?;
                assert_eq!(settings.app_name, "X");
                Ok(GreetingService)
            })
            .provide::<RequestProbe>(REQUEST, |_| Ok(RequestProbe))
            .build_with_context(Context::new().with(AppSettings { app_name: "X" }))
            .unwrap();

        let scope_a = container.open_scope().unwrap();
        let scope_b = container.open_scope().unwrap();

        // APP-scoped service: one instance visible from both children.
        let from_a: Arc<GreetingService> = scope_a.get().unwrap();
        let from_b: Arc<GreetingService> = scope_b.get().unwrap();
        assert!(Arc::ptr_eq(&from_a, &from_b));

        // REQUEST-scoped binding: one instance per child scope.
        let probe_a: Arc<RequestProbe> = scope_a.get().unwrap();
        let probe_b: Arc<RequestProbe> = scope_b.get().unwrap();
        assert!(!Arc::ptr_eq(&probe_a, &probe_b));
    }

    #[test]
    fn request_scope_context_supplied_at_open() {
        #[derive(Debug)]
        struct RequestId(u64);

        let container = Container::builder()
            .from_context::<RequestId>(REQUEST)
            .build()
            .unwrap();

        let scope = container
            .open_scope_with_context(Context::new().with(RequestId(7)))
            .unwrap();
        let id: Arc<RequestId> = scope.get().unwrap();
        assert_eq!(id.0, 7);

        // A sibling scope without the value fails.
        let bare = container.open_scope().unwrap();
        assert!(matches!(
            bare.get::<RequestId>(),
            Err(MawridError::MissingContextValue(_))
        ));
    }

    #[test]
    fn named_context_bindings() {
        let container = Container::builder()
            .from_context_named::<String>("api_key", APP)
            .build_with_context(Context::new().with_named("api_key", String::from("secret")))
            .unwrap();

        let key: Arc<String> = container.get_named("api_key").unwrap();
        assert_eq!(*key, "secret");
    }

    #[test]
    fn missing_root_context_value_fails_build() {
        struct AppSettings;

        let result = Container::builder()
            .from_context::<AppSettings>(APP)
            .build();

        assert!(matches!(
            result,
            Err(MawridError::MissingContextValue(_))
        ));
    }

    #[test]
    fn duplicate_binding_surfaces_at_build() {
        let result = Container::builder()
            .provide::<Database>(APP, |_| Ok(Database))
            .provide::<Database>(APP, |_| Ok(Database))
            .build();

        assert!(matches!(result, Err(MawridError::DuplicateBinding(_))));
    }

    #[test]
    fn override_replaces_binding() {
        let container = Container::builder()
            .allow_override(true)
            .provide_value(APP, 1u32)
            .provide_value(APP, 2u32)
            .build()
            .unwrap();

        let value: Arc<u32> = container.get().unwrap();
        assert_eq!(*value, 2);
    }

    #[test]
    fn unknown_scope_surfaces_at_build() {
        let result = Container::builder()
            .provide::<Database>(ScopeLevel::new("session"), |_| Ok(Database))
            .build();

        match result {
            Err(MawridError::UnknownScope(e)) => assert_eq!(e.scope.name(), "session"),
            other => panic!("expected UnknownScope, got: {other:?}"),
        }
    }

    #[test]
    fn get_unregistered_fails_with_not_found() {
        let container = Container::builder().build().unwrap();

        match container.get::<Database>() {
            Err(MawridError::NotFound(e)) => {
                assert!(e.requested.type_name().contains("Database"));
            }
            other => panic!("expected NotFound, got: {other:?}"),
        }
    }

    #[test]
    fn failed_graph_keeps_completed_dependencies() {
        let db_builds = Arc::new(AtomicU32::new(0));

        let container = Container::builder()
            .provide::<Database>(APP, {
                let db_builds = db_builds.clone();
                move |_| {
                    db_builds.fetch_add(1, Ordering::SeqCst);
                    Ok(Database)
                }
            })
            .provide_with::<UserService>(APP, deps![Database], |_| {
                Err(MawridError::Construction {
                    key: BindingKey::of::<UserService>(),
                    source: "misconfigured".into(),
                })
            })
            .build()
            .unwrap();

        assert!(container.get::<UserService>().is_err());

        // The database finished building before the failure, so it
        // stayed cached; resolving it again builds nothing new.
        let _db: Arc<Database> = container.get().unwrap();
        assert_eq!(db_builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn named_bindings_resolve_separately() {
        let container = Container::builder()
            .provide_named::<String>("primary", APP, |_| Ok(String::from("db-1")))
            .provide_named::<String>("replica", APP, |_| Ok(String::from("db-2")))
            .build()
            .unwrap();

        let primary: Arc<String> = container.get_named("primary").unwrap();
        let replica: Arc<String> = container.get_named("replica").unwrap();
        assert_eq!(*primary, "db-1");
        assert_eq!(*replica, "db-2");
    }

    #[test]
    fn closed_scope_rejects_get() {
        let container = Container::builder()
            .provide::<Database>(REQUEST, |_| Ok(Database))
            .build()
            .unwrap();

        let scope = container.open_scope().unwrap();
        scope.close().unwrap();

        assert!(matches!(
            scope.get::<Database>(),
            Err(MawridError::ScopeClosed(_))
        ));
        assert!(matches!(
            scope.close(),
            Err(MawridError::AlreadyClosed(_))
        ));
    }

    #[test]
    fn disposers_run_in_reverse_creation_order_on_close() {
        struct Connection;
        struct Session;

        let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
        let (d1, d2) = (order.clone(), order.clone());

        let container = Container::builder()
            .provide_disposable::<Connection>(
                REQUEST,
                vec![],
                |_| Ok(Connection),
                move |_| d1.lock().push("connection"),
            )
            .provide_disposable::<Session>(
                REQUEST,
                deps![Connection],
                |r| {
                    let _conn: Arc<Connection> = r.resolve()?;
                    Ok(Session)
                },
                move |_| d2.lock().push("session"),
            )
            .build()
            .unwrap();

        let scope = container.open_scope().unwrap();
        let _session: Arc<Session> = scope.get().unwrap();
        scope.close().unwrap();

        // Session was created after Connection, so it is released first.
        assert_eq!(*order.lock(), vec!["session", "connection"]);
    }

    #[test]
    fn dropping_scope_handle_disposes_instances() {
        struct Connection;

        let disposed = Arc::new(AtomicU32::new(0));

        let container = Container::builder()
            .provide_disposable::<Connection>(
                REQUEST,
                vec![],
                |_| Ok(Connection),
                {
                    let disposed = disposed.clone();
                    move |_| {
                        disposed.fetch_add(1, Ordering::SeqCst);
                    }
                },
            )
            .build()
            .unwrap();

        {
            let scope = container.open_scope().unwrap();
            let _conn: Arc<Connection> = scope.get().unwrap();
        }
        assert_eq!(disposed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn open_scope_past_end_of_chain_fails() {
        let container = Container::builder().build().unwrap();

        let request = container.open_scope().unwrap();
        let action = request.open_scope().unwrap();
        assert!(matches!(
            action.open_scope(),
            Err(MawridError::NoChildScope { .. })
        ));
    }

    #[test]
    fn closing_container_closes_open_request_scopes() {
        let container = Container::builder()
            .provide::<Database>(REQUEST, |_| Ok(Database))
            .build()
            .unwrap();

        let scope = container.open_scope().unwrap();
        container.close().unwrap();

        assert_eq!(scope.state(), ScopeState::Closed);
        assert!(matches!(
            scope.get::<Database>(),
            Err(MawridError::ScopeClosed(_))
        ));
    }

    #[test]
    fn concurrent_first_access_builds_once() {
        use std::thread;
        use std::time::Duration;

        let calls = Arc::new(AtomicU32::new(0));

        let container = Container::builder()
            .provide::<Database>(APP, {
                let calls = calls.clone();
                move |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(20));
                    Ok(Database)
                }
            })
            .build()
            .unwrap();

        let container = &container;
        thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(move || container.get::<Database>().unwrap()))
                .collect();

            let instances: Vec<Arc<Database>> =
                handles.into_iter().map(|h| h.join().unwrap()).collect();
            for instance in &instances[1..] {
                assert!(Arc::ptr_eq(&instances[0], instance));
            }
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn custom_scope_chain() {
        let chain =
            ScopeChain::new(vec![ScopeLevel::new("process"), ScopeLevel::new("job")]).unwrap();

        let container = Container::builder_with_scopes(chain)
            .provide::<Database>(ScopeLevel::new("job"), |_| Ok(Database))
            .build()
            .unwrap();

        let job = container.open_scope().unwrap();
        assert_eq!(job.level().name(), "job");
        assert!(job.get::<Database>().is_ok());
    }

    #[test]
    fn describe_lists_bindings() {
        let container = Container::builder()
            .provide::<Database>(APP, |_| Ok(Database))
            .provide::<UserService>(REQUEST, |_| Ok(UserService))
            .build()
            .unwrap();

        let listing = container.describe();
        assert!(listing.contains("[app]"));
        assert!(listing.contains("[request]"));
        assert!(listing.contains("Database"));
        assert!(listing.contains("factory"));
    }

    #[test]
    fn debug_output() {
        let container = Container::builder()
            .provide_value(APP, 1i32)
            .provide_value(APP, String::from("x"))
            .build()
            .unwrap();

        let debug = format!("{container:?}");
        assert!(debug.contains("Container"));
        assert!(debug.contains("2"));
    }
}
