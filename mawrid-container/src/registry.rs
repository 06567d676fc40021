//! Binding registry.
//!
//! The registry maps a [`BindingKey`] to the rule that produces its
//! instances: a factory, an alias redirect, or a context declaration.
//! It is populated through a builder and becomes immutable once a
//! container owns it.

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use mawrid_support::rendering::BindingRow;
use tracing::{debug, trace};

use crate::error::{DuplicateBindingError, MawridError, Result};
use crate::key::BindingKey;
use crate::scope::ScopeLevel;

/// A type-erased instance as held by scope caches: one shared
/// allocation per (scope instance, key).
pub type SharedInstance = Arc<dyn Any + Send + Sync>;

/// Factory function for synchronous containers.
///
/// A factory receives a [`Resolver`] to pull its own dependencies and
/// returns the type-erased instance.
///
/// `Arc` rather than `Box` because factories are shared between threads
/// and cloned into resolution state.
pub type FactoryFn = Arc<dyn Fn(&dyn Resolver) -> Result<SharedInstance> + Send + Sync>;

/// Disposal hook run when the owning scope closes, in reverse creation
/// order.
pub type DisposerFn = Arc<dyn Fn(SharedInstance) + Send + Sync>;

/// Coercion applied by an alias binding to the target's instance,
/// e.g. `Arc<Console>` to `Arc<dyn Logger>`. The coercion shares the
/// target allocation; it never copies the instance.
pub type CoerceFn = Arc<dyn Fn(SharedInstance) -> Result<SharedInstance> + Send + Sync>;

/// What factory functions use to resolve their own dependencies.
///
/// Separate from the container so factories stay decoupled from the
/// concrete resolution machinery.
pub trait Resolver {
    fn resolve_key(&self, key: &BindingKey) -> Result<SharedInstance>;
}

impl dyn Resolver + '_ {
    /// Resolves a typed dependency.
    ///
    /// ```rust,ignore
    /// let db: Arc<Database> = r.resolve()?;
    /// ```
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        let key = BindingKey::of::<T>();
        downcast::<T>(self.resolve_key(&key)?, key)
    }

    /// Resolves a typed dependency registered under a name.
    pub fn resolve_named<T: Send + Sync + 'static>(&self, name: &'static str) -> Result<Arc<T>> {
        let key = BindingKey::named::<T>(name);
        downcast::<T>(self.resolve_key(&key)?, key)
    }
}

/// Recovers `Arc<T>` from a type-erased instance.
pub(crate) fn downcast<T: Send + Sync + 'static>(
    instance: SharedInstance,
    key: BindingKey,
) -> Result<Arc<T>> {
    instance
        .downcast::<T>()
        .map_err(|_| MawridError::Construction {
            key,
            source: format!("type mismatch: expected {}", type_name::<T>()).into(),
        })
}

/// How a binding produces instances.
pub(crate) enum BindingKind<F> {
    /// Built by a factory, cached in the declared scope, optionally
    /// released through a disposal hook.
    Factory {
        factory: F,
        disposer: Option<DisposerFn>,
    },
    /// Redirect to another binding's instance. Never caches, never
    /// disposes; the coercion shares the target's allocation.
    Alias {
        target: BindingKey,
        coerce: CoerceFn,
    },
    /// Supplied from outside when the owning scope opens.
    Context,
}

impl<F> BindingKind<F> {
    pub fn kind_name(&self) -> &'static str {
        match self {
            BindingKind::Factory { .. } => "factory",
            BindingKind::Alias { .. } => "alias",
            BindingKind::Context => "context",
        }
    }
}

/// One registered binding.
pub(crate) struct Binding<F> {
    pub key: BindingKey,
    pub scope: ScopeLevel,
    pub kind: BindingKind<F>,
    /// Declared dependency keys, in construction order.
    pub dependencies: Vec<BindingKey>,
}

impl<F> std::fmt::Debug for Binding<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("key", &self.key)
            .field("scope", &self.scope)
            .field("kind", &self.kind.kind_name())
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

/// Stores all bindings of one container.
///
/// Generic over the factory type so the synchronous and asynchronous
/// containers share the same storage and lookup rules.
#[derive(Debug)]
pub(crate) struct Registry<F> {
    bindings: HashMap<BindingKey, Binding<F>>,
}

impl<F> Registry<F> {
    pub fn new() -> Self {
        Self {
            bindings: HashMap::new(),
        }
    }

    /// Registers a binding.
    ///
    /// # Errors
    /// Returns [`MawridError::DuplicateBinding`] if the key is already
    /// bound and `allow_override` is false.
    pub fn register(&mut self, binding: Binding<F>, allow_override: bool) -> Result<()> {
        let key = binding.key.clone();

        if !allow_override && self.bindings.contains_key(&key) {
            return Err(MawridError::DuplicateBinding(DuplicateBindingError { key }));
        }

        debug!(key = %key, scope = %binding.scope, kind = binding.kind.kind_name(), "Registered binding");
        self.bindings.insert(key, binding);
        Ok(())
    }

    /// Looks up a binding by key. Alias redirects are the resolver's
    /// job; this returns the alias binding itself.
    pub fn get(&self, key: &BindingKey) -> Option<&Binding<F>> {
        trace!(key = %key, "Registry lookup");
        self.bindings.get(key)
    }

    /// Number of registered bindings.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// All context declarations, for build-time completeness checks.
    pub fn context_bindings(&self) -> impl Iterator<Item = &Binding<F>> {
        self.bindings
            .values()
            .filter(|b| matches!(b.kind, BindingKind::Context))
    }

    /// Registered keys with names close to `target`, for "did you
    /// mean?" suggestions.
    pub fn suggestions(&self, target: &BindingKey) -> Vec<BindingKey> {
        let wanted = target.type_name().to_lowercase();
        self.bindings
            .keys()
            .filter(|k| {
                if *k == target {
                    return false;
                }
                let name = k.type_name().to_lowercase();
                name.contains(&wanted) || wanted.contains(&name) || near_match(&wanted, &name)
            })
            .cloned()
            .collect()
    }

    /// Rows for the container's `describe` listing, sorted by scope
    /// then key for stable output.
    pub fn rows(&self, chain_rank: impl Fn(ScopeLevel) -> usize) -> Vec<BindingRow> {
        let mut bindings: Vec<&Binding<F>> = self.bindings.values().collect();
        bindings.sort_by_key(|b| (chain_rank(b.scope), b.key.type_name(), b.key.name()));
        bindings
            .into_iter()
            .map(|b| BindingRow {
                scope: b.scope.name().to_string(),
                kind: b.kind.kind_name().to_string(),
                key: b.key.to_string(),
            })
            .collect()
    }
}

/// Quick closeness heuristic for suggestions: length within 3 and at
/// least 60% of aligned characters equal. Not a full edit distance.
fn near_match(a: &str, b: &str) -> bool {
    if a.len().abs_diff(b.len()) > 3 {
        return false;
    }

    let common = a.chars().zip(b.chars()).filter(|(ca, cb)| ca == cb).count();
    let max_len = a.len().max(b.len());
    if max_len == 0 {
        return true;
    }
    common * 100 / max_len >= 60
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::{APP, REQUEST};

    struct Database;

    fn factory_binding(key: BindingKey, scope: ScopeLevel) -> Binding<FactoryFn> {
        Binding {
            key,
            scope,
            kind: BindingKind::Factory {
                factory: Arc::new(|_| Ok(Arc::new(42i32) as SharedInstance)),
                disposer: None,
            },
            dependencies: vec![],
        }
    }

    #[test]
    fn register_and_get() {
        let mut registry = Registry::new();
        let key = BindingKey::of::<Database>();
        registry
            .register(factory_binding(key.clone(), APP), false)
            .unwrap();
        assert!(registry.get(&key).is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn duplicate_fails() {
        let mut registry = Registry::new();
        let key = BindingKey::of::<Database>();
        registry
            .register(factory_binding(key.clone(), APP), false)
            .unwrap();
        match registry.register(factory_binding(key, APP), false) {
            Err(MawridError::DuplicateBinding(e)) => {
                assert!(e.key.type_name().contains("Database"));
            }
            other => panic!("expected DuplicateBinding, got: {other:?}"),
        }
    }

    #[test]
    fn duplicate_with_override_ok() {
        let mut registry = Registry::new();
        let key = BindingKey::of::<Database>();
        registry
            .register(factory_binding(key.clone(), APP), false)
            .unwrap();
        assert!(registry.register(factory_binding(key, APP), true).is_ok());
    }

    #[test]
    fn alias_binding_is_stored_as_is() {
        let mut registry: Registry<FactoryFn> = Registry::new();
        let target = BindingKey::of::<Database>();
        registry
            .register(
                Binding {
                    key: BindingKey::of::<i64>(),
                    scope: APP,
                    kind: BindingKind::Alias {
                        target: target.clone(),
                        coerce: Arc::new(|instance| Ok(instance)),
                    },
                    dependencies: vec![],
                },
                false,
            )
            .unwrap();

        match &registry.get(&BindingKey::of::<i64>()).unwrap().kind {
            BindingKind::Alias { target: t, .. } => assert_eq!(*t, target),
            other => panic!("expected alias, got: {:?}", other.kind_name()),
        }
    }

    #[test]
    fn context_bindings_iterated() {
        let mut registry: Registry<FactoryFn> = Registry::new();
        registry
            .register(
                Binding {
                    key: BindingKey::of::<String>(),
                    scope: APP,
                    kind: BindingKind::Context,
                    dependencies: vec![],
                },
                false,
            )
            .unwrap();
        registry
            .register(factory_binding(BindingKey::of::<Database>(), REQUEST), false)
            .unwrap();

        assert_eq!(registry.context_bindings().count(), 1);
    }

    #[test]
    fn suggestions_find_near_misses() {
        struct UserService;

        let mut registry = Registry::new();
        registry
            .register(factory_binding(BindingKey::of::<UserService>(), APP), false)
            .unwrap();

        // A lookup for a differently-named key of the same spelling
        // neighborhood should surface UserService.
        let missing = BindingKey::named::<UserService>("service");
        let found = registry.suggestions(&missing);
        assert_eq!(found.len(), 1);
        assert!(found[0].type_name().contains("UserService"));
    }

    #[test]
    fn near_match_heuristic() {
        assert!(near_match("userservice", "userservise"));
        assert!(near_match("database", "databse"));
        assert!(!near_match("database", "logger"));
    }
}
