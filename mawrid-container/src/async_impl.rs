//! Asynchronous container.
//!
//! Mirrors the synchronous container with one difference: a factory's
//! construction step may suspend, e.g. to await a connection handshake.
//! The resolver's own bookkeeping never suspends, sibling dependencies
//! resolve sequentially in declared order, and the first failing
//! dependency aborts the whole resolution.
//!
//! A container is either synchronous or asynchronous, never mixed;
//! pick [`AsyncContainer`] when any factory needs to await. Blocking
//! factories can still be registered through
//! [`provide_blocking`](AsyncContainerBuilder::provide_blocking).
//!
//! # Examples
//! ```rust,ignore
//! let container = AsyncContainer::builder()
//!     .provide::<Database>(APP, |_| Box::pin(async {
//!         Ok(Database::connect("postgres://localhost").await?)
//!     }))
//!     .provide_with::<UserService>(REQUEST, deps![Database], |r| Box::pin(async move {
//!         let db: Arc<Database> = r.resolve().await?;
//!         Ok(UserService { db })
//!     }))
//!     .build()?;
//!
//! let service: Arc<UserService> = container.open_scope()?.get().await?;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use mawrid_support::rendering::render_binding_table;
use parking_lot::Mutex;
use tracing::{debug, info, instrument, trace};

use crate::container::{wrap_coerce, wrap_disposer};
use crate::context::{Context, ensure_root_values};
use crate::error::{
    MawridError, MissingContextValueError, NotFoundError, Result, ScopeClosedError,
    UnknownScopeError,
};
use crate::graph::{Consumer, PathState, locate_owner, probe_ready};
use crate::key::BindingKey;
use crate::provider::{BindingRegistrar, Provider};
use crate::registry::{
    Binding, BindingKind, CoerceFn, DisposerFn, FactoryFn, Registry, Resolver, SharedInstance,
    downcast,
};
use crate::scope::{ScopeChain, ScopeLevel, ScopeNode, ScopeState};

/// Boxed future, the shape async factories return.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Factory function for asynchronous containers.
pub type AsyncFactoryFn =
    Arc<dyn for<'a> Fn(&'a dyn AsyncResolver) -> BoxFuture<'a, Result<SharedInstance>> + Send + Sync>;

/// What async factory functions use to resolve their own dependencies.
#[async_trait]
pub trait AsyncResolver: Send + Sync {
    async fn resolve_key(&self, key: &BindingKey) -> Result<SharedInstance>;
}

impl dyn AsyncResolver + '_ {
    /// Resolves a typed dependency.
    ///
    /// ```rust,ignore
    /// let db: Arc<Database> = r.resolve().await?;
    /// ```
    pub async fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        let key = BindingKey::of::<T>();
        downcast::<T>(self.resolve_key(&key).await?, key)
    }

    /// Resolves a typed dependency registered under a name.
    pub async fn resolve_named<T: Send + Sync + 'static>(
        &self,
        name: &'static str,
    ) -> Result<Arc<T>> {
        let key = BindingKey::named::<T>(name);
        downcast::<T>(self.resolve_key(&key).await?, key)
    }
}

// ============================================================
// AsyncContainerBuilder
// ============================================================

/// Builds an [`AsyncContainer`] from binding declarations.
///
/// Same declaration rules as the synchronous builder; factories return
/// boxed futures and may await inside.
pub struct AsyncContainerBuilder {
    registry: Registry<AsyncFactoryFn>,
    chain: ScopeChain,
    allow_override: bool,
    errors: Vec<MawridError>,
}

impl AsyncContainerBuilder {
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

    /// Registers an async factory with no declared dependencies.
    pub fn provide<T: Send + Sync + 'static>(
        self,
        scope: ScopeLevel,
        factory: impl for<'a> Fn(&'a dyn AsyncResolver) -> BoxFuture<'a, Result<T>>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.provide_with::<T>(scope, vec![], factory)
    }

    /// Registers an async factory with its declared dependency keys.
    pub fn provide_with<T: Send + Sync + 'static>(
        self,
        scope: ScopeLevel,
        dependencies: Vec<BindingKey>,
        factory: impl for<'a> Fn(&'a dyn AsyncResolver) -> BoxFuture<'a, Result<T>>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.register_internal(
            BindingKey::of::<T>(),
            scope,
            BindingKind::Factory {
                factory: wrap_async_factory(factory),
                disposer: None,
            },
            dependencies,
        )
    }

    /// Registers an async factory whose instances get a disposal hook,
    /// run when the owning scope closes (reverse creation order).
    pub fn provide_disposable<T: Send + Sync + 'static>(
        self,
        scope: ScopeLevel,
        dependencies: Vec<BindingKey>,
        factory: impl for<'a> Fn(&'a dyn AsyncResolver) -> BoxFuture<'a, Result<T>>
        + Send
        + Sync
        + 'static,
        disposer: impl Fn(&T) + Send + Sync + 'static,
    ) -> Self {
        self.register_internal(
            BindingKey::of::<T>(),
            scope,
            BindingKind::Factory {
                factory: wrap_async_factory(factory),
                disposer: Some(wrap_disposer(disposer)),
            },
            dependencies,
        )
    }

    /// Registers an async factory under a named key, for several
    /// bindings of one type.
    pub fn provide_named<T: Send + Sync + 'static>(
        self,
        name: &'static str,
        scope: ScopeLevel,
        factory: impl for<'a> Fn(&'a dyn AsyncResolver) -> BoxFuture<'a, Result<T>>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.register_internal(
            BindingKey::named::<T>(name),
            scope,
            BindingKind::Factory {
                factory: wrap_async_factory(factory),
                disposer: None,
            },
            vec![],
        )
    }

    /// Registers a blocking factory.
    ///
    /// The factory runs without suspending and sees exactly its
    /// declared dependencies, which the resolver constructs (awaiting
    /// as needed) before the factory is invoked.
    pub fn provide_blocking<T: Send + Sync + 'static>(
        self,
        scope: ScopeLevel,
        dependencies: Vec<BindingKey>,
        factory: impl Fn(&dyn Resolver) -> Result<T> + Send + Sync + 'static,
    ) -> Self {
        let key = BindingKey::of::<T>();
        let factory = wrap_blocking_factory(
            key.clone(),
            dependencies.clone(),
            Arc::new(move |r: &dyn Resolver| Ok(Arc::new(factory(r)?) as SharedInstance)),
        );
        self.register_internal(
            key,
            scope,
            BindingKind::Factory {
                factory,
                disposer: None,
            },
            dependencies,
        )
    }

    /// Registers a pre-built value.
    pub fn provide_value<T: Send + Sync + 'static>(self, scope: ScopeLevel, value: T) -> Self {
        let shared: Arc<T> = Arc::new(value);
        self.register_internal(
            BindingKey::of::<T>(),
            scope,
            BindingKind::Factory {
                factory: Arc::new(move |_| {
                    let shared = shared.clone();
                    Box::pin(async move { Ok(shared as SharedInstance) })
                }),
                disposer: None,
            },
            vec![],
        )
    }

    /// Registers `A` as an alias of the binding for `S`; see the
    /// synchronous builder for the identity rules.
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

    /// Declares that a value of type `T` is supplied from outside.
    pub fn from_context<T: Send + Sync + 'static>(self, scope: ScopeLevel) -> Self {
        self.register_internal(BindingKey::of::<T>(), scope, BindingKind::Context, vec![])
    }

    /// Adds a [`Provider`] module. Its factories are blocking; they see
    /// their declared dependencies like
    /// [`provide_blocking`](AsyncContainerBuilder::provide_blocking).
    pub fn add_provider(mut self, provider: &dyn Provider) -> Self {
        debug!(provider = provider.name(), "Adding provider");
        provider.register(&mut self);
        self
    }

    /// Builds the container with no context values.
    pub fn build(self) -> Result<AsyncContainer> {
        self.build_with_context(Context::new())
    }

    /// Builds the container, supplying values for root-level context
    /// bindings.
    #[instrument(skip(self, context), name = "async_container_build")]
    pub fn build_with_context(mut self, context: Context) -> Result<AsyncContainer> {
        if !self.errors.is_empty() {
            return Err(self.errors.remove(0));
        }

        info!(registered = self.registry.len(), "Building async container");

        ensure_root_values(&self.registry, &self.chain, &context)?;

        let root = ScopeNode::root(self.chain.root(), context.into_values());
        info!("Async container built");
        Ok(AsyncContainer {
            shared: Arc::new(AsyncContainerShared {
                registry: self.registry,
                chain: self.chain,
                resolve_lock: tokio::sync::Mutex::new(()),
            }),
            root,
        })
    }

    fn register_internal(
        mut self,
        key: BindingKey,
        scope: ScopeLevel,
        kind: BindingKind<AsyncFactoryFn>,
        dependencies: Vec<BindingKey>,
    ) -> Self {
        self.register_raw(key, scope, kind, dependencies);
        self
    }

    fn register_raw(
        &mut self,
        key: BindingKey,
        scope: ScopeLevel,
        kind: BindingKind<AsyncFactoryFn>,
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

impl BindingRegistrar for AsyncContainerBuilder {
    fn register_factory(
        &mut self,
        key: BindingKey,
        scope: ScopeLevel,
        factory: FactoryFn,
        dependencies: Vec<BindingKey>,
        disposer: Option<DisposerFn>,
    ) {
        let factory = wrap_blocking_factory(key.clone(), dependencies.clone(), factory);
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

fn wrap_async_factory<T, F>(factory: F) -> AsyncFactoryFn
where
    T: Send + Sync + 'static,
    F: for<'a> Fn(&'a dyn AsyncResolver) -> BoxFuture<'a, Result<T>> + Send + Sync + 'static,
{
    Arc::new(move |resolver| {
        let fut = factory(resolver);
        Box::pin(async move { Ok(Arc::new(fut.await?) as SharedInstance) })
    })
}

/// Adapts a blocking factory into the async registry: its declared
/// dependencies are resolved (awaiting as needed) up front, then the
/// factory runs against a prefetched view of exactly those values.
fn wrap_blocking_factory(
    key: BindingKey,
    dependencies: Vec<BindingKey>,
    factory: FactoryFn,
) -> AsyncFactoryFn {
    Arc::new(move |resolver| {
        let key = key.clone();
        let dependencies = dependencies.clone();
        let factory = factory.clone();
        Box::pin(async move {
            let mut values = HashMap::new();
            for dep in &dependencies {
                values.insert(dep.clone(), resolver.resolve_key(dep).await?);
            }
            let view = PrefetchedResolver {
                consumer: key,
                values,
            };
            factory(&view)
        })
    })
}

/// Synchronous resolver view over already-resolved declared
/// dependencies, handed to blocking factories.
struct PrefetchedResolver {
    consumer: BindingKey,
    values: HashMap<BindingKey, SharedInstance>,
}

impl Resolver for PrefetchedResolver {
    fn resolve_key(&self, key: &BindingKey) -> Result<SharedInstance> {
        self.values.get(key).cloned().ok_or_else(|| {
            MawridError::NotFound(NotFoundError {
                requested: key.clone(),
                required_by: Some(self.consumer.clone()),
                suggestions: self.values.keys().cloned().collect(),
            })
        })
    }
}

// ═══════════════════════════════════════════
// AsyncContainer
// ═══════════════════════════════════════════

struct AsyncContainerShared {
    registry: Registry<AsyncFactoryFn>,
    chain: ScopeChain,
    /// Serializes constructing resolutions; cache hits bypass it.
    resolve_lock: tokio::sync::Mutex<()>,
}

/// Immutable, thread-safe asynchronous container.
///
/// Created by [`AsyncContainerBuilder::build()`]; owns the root scope
/// and closes it when dropped.
pub struct AsyncContainer {
    shared: Arc<AsyncContainerShared>,
    root: Arc<ScopeNode>,
}

impl AsyncContainer {
    /// Creates a builder with the default scope chain
    /// (`APP → REQUEST → ACTION`).
    pub fn builder() -> AsyncContainerBuilder {
        AsyncContainerBuilder::new(ScopeChain::default())
    }

    /// Creates a builder with a caller-declared scope chain.
    pub fn builder_with_scopes(chain: ScopeChain) -> AsyncContainerBuilder {
        AsyncContainerBuilder::new(chain)
    }

    /// Resolves a binding by type against the root scope.
    pub async fn get<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        let key = BindingKey::of::<T>();
        downcast::<T>(resolve_in(&self.shared, &self.root, &key).await?, key)
    }

    /// Resolves a named binding by type against the root scope.
    pub async fn get_named<T: Send + Sync + 'static>(&self, name: &'static str) -> Result<Arc<T>> {
        let key = BindingKey::named::<T>(name);
        downcast::<T>(resolve_in(&self.shared, &self.root, &key).await?, key)
    }

    /// Opens a scope one level below the root.
    pub fn open_scope(&self) -> Result<AsyncScopedContainer> {
        open_child(&self.shared, &self.root, Context::new())
    }

    /// Opens a scope one level below the root, supplying context values
    /// for bindings owned by the new scope.
    pub fn open_scope_with_context(&self, context: Context) -> Result<AsyncScopedContainer> {
        open_child(&self.shared, &self.root, context)
    }

    /// Closes the root scope. Also happens on drop.
    pub fn close(&self) -> Result<()> {
        self.root.close()
    }

    /// Lifecycle state of the root scope.
    pub fn state(&self) -> ScopeState {
        self.root.state()
    }

    /// Renders the registered bindings as an aligned listing.
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

impl Drop for AsyncContainer {
    fn drop(&mut self) {
        let _ = self.root.close();
    }
}

impl fmt::Debug for AsyncContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncContainer")
            .field("registered", &self.shared.registry.len())
            .field("state", &self.root.state())
            .finish()
    }
}

/// A child scope opened from an [`AsyncContainer`] or another scope.
///
/// Dropping the handle closes the scope, so scoped instances are
/// released on every exit path, including cancellation of the enclosing
/// future.
pub struct AsyncScopedContainer {
    shared: Arc<AsyncContainerShared>,
    node: Arc<ScopeNode>,
}

impl AsyncScopedContainer {
    /// Resolves a binding by type against this scope.
    pub async fn get<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        let key = BindingKey::of::<T>();
        downcast::<T>(resolve_in(&self.shared, &self.node, &key).await?, key)
    }

    /// Resolves a named binding by type against this scope.
    pub async fn get_named<T: Send + Sync + 'static>(&self, name: &'static str) -> Result<Arc<T>> {
        let key = BindingKey::named::<T>(name);
        downcast::<T>(resolve_in(&self.shared, &self.node, &key).await?, key)
    }

    /// Opens a scope one level below this one.
    pub fn open_scope(&self) -> Result<AsyncScopedContainer> {
        open_child(&self.shared, &self.node, Context::new())
    }

    /// Opens a scope one level below this one, supplying context values.
    pub fn open_scope_with_context(&self, context: Context) -> Result<AsyncScopedContainer> {
        open_child(&self.shared, &self.node, context)
    }

    /// Closes this scope, releasing owned instances in reverse creation
    /// order.
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

impl Drop for AsyncScopedContainer {
    fn drop(&mut self) {
        let _ = self.node.close();
    }
}

impl fmt::Debug for AsyncScopedContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncScopedContainer")
            .field("level", &self.node.level())
            .field("state", &self.node.state())
            .finish()
    }
}

async fn resolve_in(
    shared: &AsyncContainerShared,
    node: &Arc<ScopeNode>,
    key: &BindingKey,
) -> Result<SharedInstance> {
    if node.is_closed() {
        return Err(MawridError::ScopeClosed(ScopeClosedError {
            level: node.level(),
        }));
    }

    trace!(key = %key, level = %node.level(), "Resolving (async)");

    if let Some(hit) = probe_ready(&shared.registry, &shared.chain, node, key, 0) {
        return hit;
    }

    let _guard = shared.resolve_lock.lock().await;
    AsyncResolution::new(&shared.registry, &shared.chain)
        .resolve(key, node, None)
        .await
}

fn open_child(
    shared: &Arc<AsyncContainerShared>,
    node: &Arc<ScopeNode>,
    context: Context,
) -> Result<AsyncScopedContainer> {
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

    Ok(AsyncScopedContainer {
        shared: shared.clone(),
        node: node.child(level, context.into_values()),
    })
}

// ═══════════════════════════════════════════
// Async resolution
// ═══════════════════════════════════════════

/// The ephemeral resolution graph of one async `get` call. Identical
/// algorithm to the synchronous [`Resolution`](crate::graph::Resolution);
/// only the factory invocation awaits.
struct AsyncResolution<'a> {
    registry: &'a Registry<AsyncFactoryFn>,
    chain: &'a ScopeChain,
    state: Mutex<PathState>,
}

impl<'a> AsyncResolution<'a> {
    fn new(registry: &'a Registry<AsyncFactoryFn>, chain: &'a ScopeChain) -> Self {
        Self {
            registry,
            chain,
            state: Mutex::new(PathState::new()),
        }
    }

    fn resolve<'s>(
        &'s self,
        key: &'s BindingKey,
        scope: &'s Arc<ScopeNode>,
        consumer: Option<&'s Consumer>,
    ) -> BoxFuture<'s, Result<SharedInstance>> {
        Box::pin(async move {
            let binding = self.registry.get(key).ok_or_else(|| {
                MawridError::NotFound(NotFoundError {
                    requested: key.clone(),
                    required_by: self.state.lock().required_by(),
                    suggestions: self.registry.suggestions(key),
                })
            })?;

            match &binding.kind {
                BindingKind::Alias { target, coerce } => {
                    trace!(from = %key, to = %target, "Following alias");
                    self.state.lock().enter(key)?;
                    let resolved = self.resolve(target, scope, consumer).await;
                    self.state.lock().leave(key);
                    coerce(resolved?)
                }
                BindingKind::Context => {
                    let owner = locate_owner(self.chain, binding, scope, consumer)?;
                    owner.context_value(key).ok_or_else(|| {
                        MawridError::MissingContextValue(MissingContextValueError {
                            key: key.clone(),
                            scope: binding.scope,
                        })
                    })
                }
                BindingKind::Factory { factory, disposer } => {
                    let owner = locate_owner(self.chain, binding, scope, consumer)?;
                    if let Some(instance) = owner.cached(key) {
                        trace!(key = %key, level = %owner.level(), "Cache hit");
                        return Ok(instance);
                    }

                    self.state.lock().enter(key)?;
                    let built = self.construct(binding, factory, scope, &owner).await;
                    self.state.lock().leave(key);

                    let instance = built?;
                    owner.store(key.clone(), instance.clone(), disposer.clone());
                    Ok(instance)
                }
            }
        })
    }

    async fn construct(
        &self,
        binding: &Binding<AsyncFactoryFn>,
        factory: &AsyncFactoryFn,
        scope: &Arc<ScopeNode>,
        owner: &Arc<ScopeNode>,
    ) -> Result<SharedInstance> {
        let consumer = Consumer {
            key: binding.key.clone(),
            rank: owner.rank(),
            level: owner.level(),
        };

        for dep in &binding.dependencies {
            self.resolve(dep, scope, Some(&consumer)).await?;
        }

        trace!(key = %binding.key, level = %owner.level(), "Invoking factory (async)");
        let bridge = AsyncFactoryResolver {
            resolution: self,
            scope: scope.clone(),
            consumer,
        };
        factory(&bridge).await
    }
}

struct AsyncFactoryResolver<'r, 'a> {
    resolution: &'r AsyncResolution<'a>,
    scope: Arc<ScopeNode>,
    consumer: Consumer,
}

#[async_trait]
impl AsyncResolver for AsyncFactoryResolver<'_, '_> {
    async fn resolve_key(&self, key: &BindingKey) -> Result<SharedInstance> {
        self.resolution
            .resolve(key, &self.scope, Some(&self.consumer))
            .await
    }
}

// ═══════════════════════════════════════════
// Async integration adapter
// ═══════════════════════════════════════════

/// Declared needs of an async unit of work; the async counterpart of
/// [`FromScope`](crate::adapter::FromScope). Tuple elements resolve
/// sequentially, keeping construction order deterministic.
#[async_trait]
pub trait FromScopeAsync: Sized {
    async fn from_scope(scope: &AsyncScopedContainer) -> Result<Self>;
}

#[async_trait]
impl<T: Send + Sync + 'static> FromScopeAsync for Arc<T> {
    async fn from_scope(scope: &AsyncScopedContainer) -> Result<Self> {
        scope.get::<T>().await
    }
}

#[async_trait]
impl FromScopeAsync for () {
    async fn from_scope(_scope: &AsyncScopedContainer) -> Result<Self> {
        Ok(())
    }
}

macro_rules! impl_from_scope_async_tuple {
    ($($need:ident),+) => {
        #[async_trait]
        impl<$($need: FromScopeAsync + Send),+> FromScopeAsync for ($($need,)+) {
            async fn from_scope(scope: &AsyncScopedContainer) -> Result<Self> {
                Ok(($($need::from_scope(scope).await?,)+))
            }
        }
    };
}

impl_from_scope_async_tuple!(A);
impl_from_scope_async_tuple!(A, B);
impl_from_scope_async_tuple!(A, B, C);
impl_from_scope_async_tuple!(A, B, C, D);
impl_from_scope_async_tuple!(A, B, C, D, E);
impl_from_scope_async_tuple!(A, B, C, D, E, F);
impl_from_scope_async_tuple!(A, B, C, D, E, F, G);
impl_from_scope_async_tuple!(A, B, C, D, E, F, G, H);

/// Runs an async unit of work inside a fresh child scope.
///
/// The scope closes on every exit path: after the work completes,
/// when resolving the needs fails, and when the returned future is
/// dropped before finishing (cancellation), because the scope handle
/// closes itself on drop.
pub async fn around_unit_of_work<N, R, W, Fut>(container: &AsyncContainer, work: W) -> Result<R>
where
    N: FromScopeAsync,
    W: FnOnce(N) -> Fut,
    Fut: Future<Output = Result<R>>,
{
    around_unit_of_work_with_context(container, Context::new(), work).await
}

/// Like [`around_unit_of_work`], supplying context values to the opened
/// scope.
pub async fn around_unit_of_work_with_context<N, R, W, Fut>(
    container: &AsyncContainer,
    context: Context,
    work: W,
) -> Result<R>
where
    N: FromScopeAsync,
    W: FnOnce(N) -> Fut,
    Fut: Future<Output = Result<R>>,
{
    let scope = container.open_scope_with_context(context)?;
    let needs = N::from_scope(&scope).await?;
    let out = work(needs).await;
    scope.close()?;
    out
}
