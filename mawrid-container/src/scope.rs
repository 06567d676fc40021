//! Lifecycle scopes.
//!
//! A container works against a caller-declared chain of scope levels.
//! The first level is the root (application) scope; each later level is
//! opened per unit of work and closed when that work finishes:
//! - [`APP`] — one instance for the whole application
//! - [`REQUEST`] — one instance per request scope
//! - [`ACTION`] — one instance per nested action scope
//!
//! Levels earlier in the chain outlive levels later in the chain. A
//! binding declared at an earlier level may never depend on one declared
//! at a later level.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::{AlreadyClosedError, MawridError, Result};
use crate::key::BindingKey;
use crate::registry::{DisposerFn, SharedInstance};

/// One named level in a scope chain.
///
/// Levels are plain static names; their lifetime ordering comes from
/// their position in the [`ScopeChain`] they belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeLevel {
    name: &'static str,
}

impl ScopeLevel {
    /// Declares a scope level with the given name.
    pub const fn new(name: &'static str) -> Self {
        Self { name }
    }

    /// Returns the level's name.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for ScopeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Application-wide root level of the default chain.
pub const APP: ScopeLevel = ScopeLevel::new("app");
/// Per-request level of the default chain.
pub const REQUEST: ScopeLevel = ScopeLevel::new("request");
/// Per-action level of the default chain, nested under a request.
pub const ACTION: ScopeLevel = ScopeLevel::new("action");

/// An ordered chain of scope levels, root first.
///
/// The chain is declared once when the builder is created and is fixed
/// for the container's lifetime.
///
/// # Examples
/// ```
/// use mawrid_container::scope::{ScopeChain, ScopeLevel, APP, REQUEST};
///
/// let chain = ScopeChain::new(vec![APP, REQUEST]).unwrap();
/// assert_eq!(chain.root(), APP);
/// assert_eq!(chain.rank_of(REQUEST), Some(1));
///
/// let custom = ScopeChain::new(vec![
///     ScopeLevel::new("process"),
///     ScopeLevel::new("job"),
/// ]).unwrap();
/// assert_eq!(custom.root().name(), "process");
/// ```
#[derive(Debug, Clone)]
pub struct ScopeChain {
    levels: Vec<ScopeLevel>,
}

impl ScopeChain {
    /// Declares a chain from the given levels, root first.
    ///
    /// # Errors
    /// Fails with [`MawridError::InvalidScopeChain`] if the chain is
    /// empty or repeats a level.
    pub fn new(levels: Vec<ScopeLevel>) -> Result<Self> {
        if levels.is_empty() {
            return Err(MawridError::InvalidScopeChain {
                reason: "a scope chain needs at least a root level".into(),
            });
        }
        let mut seen = HashSet::new();
        for level in &levels {
            if !seen.insert(level.name()) {
                return Err(MawridError::InvalidScopeChain {
                    reason: format!("scope level {level:?} appears twice"),
                });
            }
        }
        Ok(Self { levels })
    }

    /// Returns the root (longest-lived) level.
    #[inline]
    pub fn root(&self) -> ScopeLevel {
        self.levels[0]
    }

    /// Returns the position of `level` in the chain, root = 0.
    pub fn rank_of(&self, level: ScopeLevel) -> Option<usize> {
        self.levels.iter().position(|l| *l == level)
    }

    /// Returns the level at the given rank.
    pub fn level_at(&self, rank: usize) -> Option<ScopeLevel> {
        self.levels.get(rank).copied()
    }

    /// Returns `true` if `level` is part of this chain.
    pub fn contains(&self, level: ScopeLevel) -> bool {
        self.rank_of(level).is_some()
    }

    /// Returns all levels, root first.
    pub fn levels(&self) -> &[ScopeLevel] {
        &self.levels
    }
}

impl Default for ScopeChain {
    /// The chain used by [`Container::builder`](crate::container::Container::builder):
    /// `APP → REQUEST → ACTION`.
    fn default() -> Self {
        Self {
            levels: vec![APP, REQUEST, ACTION],
        }
    }
}

/// Observable lifecycle state of a scope instance.
///
/// A scope is `Open` from the moment it is created (the root opens at
/// container construction) until it is closed exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    Open,
    Closed,
}

impl fmt::Display for ScopeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeState::Open => write!(f, "open"),
            ScopeState::Closed => write!(f, "closed"),
        }
    }
}

/// A constructed instance together with its optional disposal hook,
/// journaled in creation order so closing can release in reverse.
pub(crate) struct DisposalEntry {
    pub key: BindingKey,
    pub instance: SharedInstance,
    pub disposer: Option<DisposerFn>,
}

/// Runtime node of the scope tree.
///
/// Each node owns the instances constructed for its level, the context
/// values supplied when it was opened, and weak links to the child
/// scopes opened under it. Lookup walks upward only; a parent never
/// reaches into a child's cache.
pub(crate) struct ScopeNode {
    level: ScopeLevel,
    rank: usize,
    parent: Option<Arc<ScopeNode>>,
    cache: DashMap<BindingKey, SharedInstance>,
    context: HashMap<BindingKey, SharedInstance>,
    created: Mutex<Vec<DisposalEntry>>,
    children: Mutex<Vec<Weak<ScopeNode>>>,
    closed: AtomicBool,
}

impl ScopeNode {
    /// Opens the root node of a scope tree.
    pub fn root(level: ScopeLevel, context: HashMap<BindingKey, SharedInstance>) -> Arc<Self> {
        debug!(level = %level, "Opening root scope");
        Arc::new(Self {
            level,
            rank: 0,
            parent: None,
            cache: DashMap::new(),
            context,
            created: Mutex::new(Vec::new()),
            children: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    /// Opens a child node one level below `self`.
    pub fn child(
        self: &Arc<Self>,
        level: ScopeLevel,
        context: HashMap<BindingKey, SharedInstance>,
    ) -> Arc<Self> {
        debug!(level = %level, parent = %self.level, "Opening child scope");
        let node = Arc::new(Self {
            level,
            rank: self.rank + 1,
            parent: Some(self.clone()),
            cache: DashMap::new(),
            context,
            created: Mutex::new(Vec::new()),
            children: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        });
        self.children.lock().push(Arc::downgrade(&node));
        node
    }

    #[inline]
    pub fn level(&self) -> ScopeLevel {
        self.level
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.rank
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn state(&self) -> ScopeState {
        if self.is_closed() {
            ScopeState::Closed
        } else {
            ScopeState::Open
        }
    }

    /// Walks from `self` toward the root looking for the node at `rank`.
    ///
    /// Returns `None` when `rank` is below `self` in the chain, which is
    /// the scope-mismatch case the resolver reports.
    pub fn find_owner(self: &Arc<Self>, rank: usize) -> Option<Arc<ScopeNode>> {
        let mut node = self.clone();
        loop {
            if node.rank == rank {
                return Some(node);
            }
            match &node.parent {
                Some(parent) if node.rank > rank => {
                    let next = parent.clone();
                    node = next;
                }
                _ => return None,
            }
        }
    }

    /// Returns the cached instance for `key`, if this node built one.
    pub fn cached(&self, key: &BindingKey) -> Option<SharedInstance> {
        self.cache.get(key).map(|entry| entry.value().clone())
    }

    /// Returns the externally supplied value for `key`, if this node was
    /// opened with one.
    pub fn context_value(&self, key: &BindingKey) -> Option<SharedInstance> {
        self.context.get(key).cloned()
    }

    /// Caches a freshly built instance and journals it for disposal.
    pub fn store(&self, key: BindingKey, instance: SharedInstance, disposer: Option<DisposerFn>) {
        trace!(key = %key, level = %self.level, "Caching instance");
        self.cache.insert(key.clone(), instance.clone());
        self.created.lock().push(DisposalEntry {
            key,
            instance,
            disposer,
        });
    }

    /// Closes this scope: closes any still-open children, releases owned
    /// instances in reverse creation order (running each disposal hook
    /// once), and clears the cache.
    ///
    /// # Errors
    /// Fails with [`MawridError::AlreadyClosed`] on a second close.
    pub fn close(&self) -> Result<()> {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(MawridError::AlreadyClosed(AlreadyClosedError {
                level: self.level,
            }));
        }

        debug!(level = %self.level, "Closing scope");

        // Children first: a scope never outlives its parent.
        let children: Vec<Weak<ScopeNode>> = self.children.lock().drain(..).collect();
        for child in children.into_iter().rev() {
            if let Some(child) = child.upgrade() {
                match child.close() {
                    Ok(()) | Err(MawridError::AlreadyClosed(_)) => {}
                    Err(other) => return Err(other),
                }
            }
        }

        let entries: Vec<DisposalEntry> = self.created.lock().drain(..).collect();
        for entry in entries.into_iter().rev() {
            if let Some(disposer) = entry.disposer {
                trace!(key = %entry.key, level = %self.level, "Running disposal hook");
                disposer(entry.instance);
            }
        }
        self.cache.clear();
        Ok(())
    }
}

impl fmt::Debug for ScopeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeNode")
            .field("level", &self.level)
            .field("rank", &self.rank)
            .field("state", &self.state())
            .field("cached", &self.cache.len())
            .finish()
    }
}
