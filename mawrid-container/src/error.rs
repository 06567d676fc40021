//! Error types for container operations.
//!
//! Every failure carries enough context to act on: what was requested,
//! what required it, and where applicable a rendered dependency chain.

use std::fmt;

use mawrid_support::rendering::render_chain;

use crate::key::BindingKey;
use crate::scope::ScopeLevel;

/// Main error type for all container operations.
#[derive(Debug, thiserror::Error)]
pub enum MawridError {
    /// The key is already bound and overriding is disabled.
    #[error("{}", .0)]
    DuplicateBinding(DuplicateBindingError),

    /// A binding was declared against a scope level outside the chain.
    #[error("{}", .0)]
    UnknownScope(UnknownScopeError),

    /// The requested binding was never registered.
    #[error("{}", .0)]
    NotFound(NotFoundError),

    /// A binding depends on one with a shorter lifetime, or a
    /// shorter-lived binding was requested from a longer-lived scope.
    #[error("{}", .0)]
    ScopeMismatch(ScopeMismatchError),

    /// The resolution path came back to a binding still being resolved.
    #[error("{}", .0)]
    CyclicDependency(CyclicDependencyError),

    /// A resolution was attempted against a closed scope.
    #[error("{}", .0)]
    ScopeClosed(ScopeClosedError),

    /// A scope was closed twice.
    #[error("{}", .0)]
    AlreadyClosed(AlreadyClosedError),

    /// A context binding has no supplied value in its owning scope.
    #[error("{}", .0)]
    MissingContextValue(MissingContextValueError),

    /// `open_scope` was called on a scope at the end of the chain.
    #[error("no scope level below {level:?} in the chain")]
    NoChildScope { level: ScopeLevel },

    /// The declared scope chain is empty or repeats a level.
    #[error("invalid scope chain: {reason}")]
    InvalidScopeChain { reason: String },

    /// A factory returned an error while building its instance.
    #[error("failed to construct {key}: {source}")]
    Construction {
        key: BindingKey,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Error when a key is bound twice.
#[derive(Debug)]
pub struct DuplicateBindingError {
    pub key: BindingKey,
}

impl fmt::Display for DuplicateBindingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "binding already registered: {}", self.key)?;
        write!(
            f,
            "\n  Hint: enable allow_override on the builder to replace it explicitly"
        )
    }
}

/// Error when a registration names a scope level outside the chain.
#[derive(Debug)]
pub struct UnknownScopeError {
    pub scope: ScopeLevel,
    pub chain: Vec<ScopeLevel>,
    pub key: BindingKey,
}

impl fmt::Display for UnknownScopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown scope level {:?} in registration of {}",
            self.scope.name(),
            self.key
        )?;
        let names: Vec<&str> = self.chain.iter().map(|l| l.name()).collect();
        write!(f, "\n  Declared chain: {}", render_chain(&names))
    }
}

/// Error when a binding was never registered.
///
/// Includes what required the missing binding and near-matches that ARE
/// registered, for "did you mean?" output.
#[derive(Debug)]
pub struct NotFoundError {
    pub requested: BindingKey,
    pub required_by: Option<BindingKey>,
    pub suggestions: Vec<BindingKey>,
}

impl fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "binding not found: {}", self.requested)?;

        if let Some(ref parent) = self.required_by {
            write!(f, "\n  Required by: {parent}")?;
        }

        if !self.suggestions.is_empty() {
            write!(f, "\n  Did you mean one of:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n    - {suggestion}")?;
            }
        }

        write!(
            f,
            "\n  Hint: register {} with provide() before building the container",
            self.requested.type_name()
        )
    }
}

/// Error when scope lifetimes are violated.
///
/// A longer-lived binding may not depend on a shorter-lived one, and a
/// shorter-lived binding cannot be resolved from a scope that does not
/// reach its level.
#[derive(Debug)]
pub struct ScopeMismatchError {
    /// The binding being resolved.
    pub dependency: BindingKey,
    pub dependency_scope: ScopeLevel,
    /// The factory binding that asked for it, when resolving a
    /// dependency; `None` for a direct `get`.
    pub consumer: Option<BindingKey>,
    /// The consumer binding's scope, or the scope the direct `get` ran
    /// against.
    pub consumer_scope: ScopeLevel,
}

impl fmt::Display for ScopeMismatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.consumer {
            Some(consumer) => {
                write!(
                    f,
                    "scope mismatch: {} ({}) cannot depend on {} ({})",
                    consumer, self.consumer_scope, self.dependency, self.dependency_scope,
                )?;
                write!(
                    f,
                    "\n  A {}-scoped binding outlives every {}-scoped instance",
                    self.consumer_scope, self.dependency_scope,
                )?;
                write!(
                    f,
                    "\n  Hint: move {} to scope {:?} or wider",
                    self.dependency,
                    self.consumer_scope.name(),
                )
            }
            None => {
                write!(
                    f,
                    "scope mismatch: {} is scoped {:?} but was requested from the {:?} scope",
                    self.dependency,
                    self.dependency_scope.name(),
                    self.consumer_scope.name(),
                )?;
                write!(
                    f,
                    "\n  Hint: open a child scope down to {:?} first",
                    self.dependency_scope.name()
                )
            }
        }
    }
}

/// Error when the in-progress resolution path forms a cycle.
///
/// The chain shows the full path, first and last entry being the same
/// binding.
#[derive(Debug)]
pub struct CyclicDependencyError {
    pub chain: Vec<BindingKey>,
}

impl fmt::Display for CyclicDependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.chain.iter().map(|k| k.type_name()).collect();
        write!(f, "cyclic dependency detected:\n  {}", render_chain(&names))?;
        write!(
            f,
            "\n  Hint: break the cycle by restructuring one of these bindings"
        )
    }
}

/// Error when resolving against a closed scope.
#[derive(Debug)]
pub struct ScopeClosedError {
    pub level: ScopeLevel,
}

impl fmt::Display for ScopeClosedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope {:?} is closed", self.level.name())
    }
}

/// Error when a scope is closed a second time.
#[derive(Debug)]
pub struct AlreadyClosedError {
    pub level: ScopeLevel,
}

impl fmt::Display for AlreadyClosedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope {:?} was already closed", self.level.name())
    }
}

/// Error when a context binding has no supplied value.
#[derive(Debug)]
pub struct MissingContextValueError {
    pub key: BindingKey,
    pub scope: ScopeLevel,
}

impl fmt::Display for MissingContextValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no context value supplied for {} (scope {:?})",
            self.key,
            self.scope.name()
        )?;
        write!(
            f,
            "\n  Hint: pass the value via Context::with when building the container or opening the scope"
        )
    }
}

/// Convenient Result type for container operations.
pub type Result<T> = std::result::Result<T, MawridError>;
