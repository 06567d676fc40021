//! Externally supplied values.
//!
//! A [`Context`] carries pre-built values into the container for every
//! binding declared with `from_context`: at build time for root-level
//! bindings, at `open_scope_with_context` for deeper levels. The values
//! are immutable for the life of the scope that receives them.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{MawridError, MissingContextValueError, Result};
use crate::key::BindingKey;
use crate::registry::{Registry, SharedInstance};
use crate::scope::ScopeChain;

/// A type-keyed set of values supplied from outside the container.
///
/// # Examples
/// ```rust,ignore
/// let container = Container::builder()
///     .from_context::<AppSettings>(APP)
///     .provide_with::<GreetingService>(APP, deps![AppSettings], |r| {
///         let settings: Arc<AppSettings> = r.resolve()?;
///         Ok(GreetingService { settings })
///     })
///     .build_with_context(Context::new().with(AppSettings::default()))?;
/// ```
#[derive(Default)]
pub struct Context {
    values: HashMap<BindingKey, SharedInstance>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Supplies a value for the context binding of type `T`.
    pub fn with<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.values
            .insert(BindingKey::of::<T>(), Arc::new(value) as SharedInstance);
        self
    }

    /// Supplies a value for a named context binding of type `T`.
    pub fn with_named<T: Send + Sync + 'static>(mut self, name: &'static str, value: T) -> Self {
        self.values
            .insert(BindingKey::named::<T>(name), Arc::new(value) as SharedInstance);
        self
    }

    /// Whether a value was supplied for `key`.
    pub(crate) fn contains(&self, key: &BindingKey) -> bool {
        self.values.contains_key(key)
    }

    pub(crate) fn into_values(self) -> HashMap<BindingKey, SharedInstance> {
        self.values
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.values.keys()).finish()
    }
}

/// Build-time completeness check: every context binding declared at the
/// root level must have a supplied value.
pub(crate) fn ensure_root_values<F>(
    registry: &Registry<F>,
    chain: &ScopeChain,
    context: &Context,
) -> Result<()> {
    let root = chain.root();
    for binding in registry.context_bindings() {
        if binding.scope == root && !context.contains(&binding.key) {
            return Err(MawridError::MissingContextValue(MissingContextValueError {
                key: binding.key.clone(),
                scope: binding.scope,
            }));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct AppSettings {
        app_name: &'static str,
    }

    #[test]
    fn supplied_value_is_present() {
        let context = Context::new().with(AppSettings { app_name: "X" });
        assert!(context.contains(&BindingKey::of::<AppSettings>()));
        assert!(!context.contains(&BindingKey::of::<String>()));
    }

    #[test]
    fn named_values_are_distinct() {
        let context = Context::new()
            .with(String::from("plain"))
            .with_named("primary", String::from("named"));

        assert!(context.contains(&BindingKey::of::<String>()));
        assert!(context.contains(&BindingKey::named::<String>("primary")));
        assert!(!context.contains(&BindingKey::named::<String>("replica")));
    }

    #[test]
    fn into_values_keeps_everything() {
        let values = Context::new()
            .with(1u32)
            .with(String::from("x"))
            .into_values();
        assert_eq!(values.len(), 2);
    }
}
