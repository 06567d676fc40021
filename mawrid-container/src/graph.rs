//! Graph resolution.
//!
//! One [`Resolution`] exists per `get` call. It walks the requested
//! binding's transitive dependencies depth-first in declared order,
//! reuses instances cached in the owning scopes, and tracks the
//! in-progress path so cycles fail fast instead of recursing forever.
//! The whole structure is discarded when the call returns; nothing of
//! it is persisted on the container.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::error::{
    CyclicDependencyError, MawridError, MissingContextValueError, NotFoundError, Result,
    ScopeClosedError, ScopeMismatchError, UnknownScopeError,
};
use crate::key::BindingKey;
use crate::registry::{Binding, BindingKind, FactoryFn, Registry, Resolver, SharedInstance};
use crate::scope::{ScopeChain, ScopeLevel, ScopeNode};

/// In-progress DFS bookkeeping shared across the recursion of one call.
///
/// Guarded by a mutex so factory callbacks can reach it through shared
/// references; the lock is only ever held for the bookkeeping itself,
/// never while a factory runs.
pub(crate) struct PathState {
    path: Vec<BindingKey>,
    visiting: HashSet<BindingKey>,
}

impl PathState {
    pub fn new() -> Self {
        Self {
            path: Vec::new(),
            visiting: HashSet::new(),
        }
    }

    /// Marks `key` as being resolved.
    ///
    /// # Errors
    /// Fails with [`MawridError::CyclicDependency`] if `key` is already
    /// on the in-progress path; the error carries the full cycle.
    pub fn enter(&mut self, key: &BindingKey) -> Result<()> {
        if self.visiting.contains(key) {
            let start = self.path.iter().position(|k| k == key).unwrap_or(0);
            let mut chain = self.path[start..].to_vec();
            chain.push(key.clone());

            warn!(cycle = ?chain, "Cyclic dependency detected");
            return Err(MawridError::CyclicDependency(CyclicDependencyError {
                chain,
            }));
        }

        self.visiting.insert(key.clone());
        self.path.push(key.clone());
        Ok(())
    }

    /// Unmarks `key` after its subtree finished (successfully or not).
    pub fn leave(&mut self, key: &BindingKey) {
        self.path.pop();
        self.visiting.remove(key);
    }

    /// The binding whose dependencies are currently being resolved.
    pub fn required_by(&self) -> Option<BindingKey> {
        self.path.last().cloned()
    }
}

/// The factory binding on whose behalf a dependency is being resolved.
#[derive(Clone)]
pub(crate) struct Consumer {
    pub key: BindingKey,
    pub rank: usize,
    pub level: ScopeLevel,
}

/// Finds the scope instance owning `binding`, enforcing the lifetime
/// rules on the way: a consumer may only depend on bindings at its own
/// or a longer-lived level, and the binding's level must be reachable
/// walking up from `scope`.
pub(crate) fn locate_owner<F>(
    chain: &ScopeChain,
    binding: &Binding<F>,
    scope: &Arc<ScopeNode>,
    consumer: Option<&Consumer>,
) -> Result<Arc<ScopeNode>> {
    let rank = chain.rank_of(binding.scope).ok_or_else(|| {
        MawridError::UnknownScope(UnknownScopeError {
            scope: binding.scope,
            chain: chain.levels().to_vec(),
            key: binding.key.clone(),
        })
    })?;

    if let Some(consumer) = consumer {
        // A longer-lived binding may not depend on a shorter-lived one.
        if rank > consumer.rank {
            warn!(
                consumer = %consumer.key,
                dependency = %binding.key,
                "Scope mismatch"
            );
            return Err(MawridError::ScopeMismatch(ScopeMismatchError {
                dependency: binding.key.clone(),
                dependency_scope: binding.scope,
                consumer: Some(consumer.key.clone()),
                consumer_scope: consumer.level,
            }));
        }
    }

    let owner = scope.find_owner(rank).ok_or_else(|| {
        MawridError::ScopeMismatch(ScopeMismatchError {
            dependency: binding.key.clone(),
            dependency_scope: binding.scope,
            consumer: consumer.map(|c| c.key.clone()),
            consumer_scope: scope.level(),
        })
    })?;

    if owner.is_closed() {
        return Err(MawridError::ScopeClosed(ScopeClosedError {
            level: owner.level(),
        }));
    }
    Ok(owner)
}

/// Probes for an already-available instance without the resolution
/// lock: cached factory products, context values, and alias redirects
/// over either. Anything needing construction or error reporting falls
/// through to the locked path.
pub(crate) fn probe_ready<F>(
    registry: &Registry<F>,
    chain: &ScopeChain,
    node: &Arc<ScopeNode>,
    key: &BindingKey,
    depth: usize,
) -> Option<Result<SharedInstance>> {
    // Alias loops are diagnosed by the locked path.
    if depth > 32 {
        return None;
    }

    let binding = registry.get(key)?;
    match &binding.kind {
        BindingKind::Factory { .. } => {
            let rank = chain.rank_of(binding.scope)?;
            let owner = node.find_owner(rank)?;
            owner.cached(key).map(Ok)
        }
        BindingKind::Context => {
            let rank = chain.rank_of(binding.scope)?;
            let owner = node.find_owner(rank)?;
            owner.context_value(key).map(Ok)
        }
        BindingKind::Alias { target, coerce } => {
            let resolved = probe_ready(registry, chain, node, target, depth + 1)?;
            Some(resolved.and_then(|instance| coerce(instance)))
        }
    }
}

/// The ephemeral resolution graph of one synchronous `get` call.
pub(crate) struct Resolution<'a> {
    registry: &'a Registry<FactoryFn>,
    chain: &'a ScopeChain,
    state: Mutex<PathState>,
}

impl<'a> Resolution<'a> {
    pub fn new(registry: &'a Registry<FactoryFn>, chain: &'a ScopeChain) -> Self {
        Self {
            registry,
            chain,
            state: Mutex::new(PathState::new()),
        }
    }

    /// Resolves `key` against `scope`, building missing instances.
    ///
    /// `consumer` is the factory binding whose declared or pulled
    /// dependency this is; `None` for a direct `get`.
    pub fn resolve(
        &self,
        key: &BindingKey,
        scope: &Arc<ScopeNode>,
        consumer: Option<&Consumer>,
    ) -> Result<SharedInstance> {
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
                // Aliases are on the path too, so alias loops surface
                // as cycles instead of unbounded recursion.
                self.state.lock().enter(key)?;
                let resolved = self.resolve(target, scope, consumer);
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
                let built = self.construct(binding, factory, scope, &owner);
                self.state.lock().leave(key);

                let instance = built?;
                owner.store(key.clone(), instance.clone(), disposer.clone());
                Ok(instance)
            }
        }
    }

    /// Builds the instance: declared dependencies first, depth-first in
    /// declared order, then the factory itself with a resolver bridge.
    fn construct(
        &self,
        binding: &Binding<FactoryFn>,
        factory: &FactoryFn,
        scope: &Arc<ScopeNode>,
        owner: &Arc<ScopeNode>,
    ) -> Result<SharedInstance> {
        let consumer = Consumer {
            key: binding.key.clone(),
            rank: owner.rank(),
            level: owner.level(),
        };

        for dep in &binding.dependencies {
            self.resolve(dep, scope, Some(&consumer))?;
        }

        trace!(key = %binding.key, level = %owner.level(), "Invoking factory");
        let bridge = FactoryResolver {
            resolution: self,
            scope: scope.clone(),
            consumer,
        };
        factory(&bridge)
    }
}

/// Resolver handed to factory functions; routes pulls back into the
/// in-flight resolution with the consumer's context attached.
struct FactoryResolver<'r, 'a> {
    resolution: &'r Resolution<'a>,
    scope: Arc<ScopeNode>,
    consumer: Consumer,
}

impl Resolver for FactoryResolver<'_, '_> {
    fn resolve_key(&self, key: &BindingKey) -> Result<SharedInstance> {
        self.resolution
            .resolve(key, &self.scope, Some(&self.consumer))
    }
}
