//! Binding identification keys.
//!
//! [`BindingKey`] identifies one binding in the registry. It pairs a
//! [`TypeId`] with an optional static name, so several bindings of the
//! same Rust type can live side by side.

use std::any::{TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identifies a binding in the container.
///
/// A key is a Rust type ([`TypeId`]) plus an optional name. The name is
/// only needed when the same type is bound more than once.
///
/// # Examples
/// ```
/// use mawrid_container::key::BindingKey;
///
/// let key = BindingKey::of::<String>();
/// assert_eq!(key.type_name(), "alloc::string::String");
/// assert_eq!(key.name(), None);
///
/// let key = BindingKey::named::<String>("database_url");
/// assert_eq!(key.name(), Some("database_url"));
/// ```
#[derive(Clone)]
pub struct BindingKey {
    type_id: TypeId,
    type_name: &'static str,
    name: Option<&'static str>,
}

impl BindingKey {
    /// Creates a key for type `T`.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            name: None,
        }
    }

    /// Creates a named key for type `T`.
    ///
    /// Named keys let you bind the same type under several identities:
    ///
    /// ```
    /// use mawrid_container::key::BindingKey;
    ///
    /// let primary = BindingKey::named::<String>("primary_db");
    /// let replica = BindingKey::named::<String>("replica_db");
    /// assert_ne!(primary, replica);
    /// ```
    #[inline]
    pub fn named<T: ?Sized + 'static>(name: &'static str) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            name: Some(name),
        }
    }

    /// Returns the [`TypeId`] behind this key.
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the human-readable type name, used in error messages.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns the optional binding name.
    #[inline]
    pub fn name(&self) -> Option<&'static str> {
        self.name
    }
}

// Equality and hashing go by TypeId + name; the rendered type name is
// display-only.
impl PartialEq for BindingKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.name == other.name
    }
}

impl Eq for BindingKey {}

impl Hash for BindingKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
        self.name.hash(state);
    }
}

impl fmt::Debug for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name {
            Some(name) => write!(f, "BindingKey({}, name={:?})", self.type_name, name),
            None => write!(f, "BindingKey({})", self.type_name),
        }
    }
}

impl fmt::Display for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name {
            Some(name) => write!(f, "{} (name={:?})", self.type_name, name),
            None => write!(f, "{}", self.type_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Database;

    #[test]
    fn key_of_type() {
        let key = BindingKey::of::<Database>();
        assert!(key.type_name().contains("Database"));
        assert_eq!(key.name(), None);
    }

    #[test]
    fn key_equality_same_type() {
        assert_eq!(BindingKey::of::<String>(), BindingKey::of::<String>());
    }

    #[test]
    fn key_inequality_different_types() {
        assert_ne!(BindingKey::of::<String>(), BindingKey::of::<i32>());
    }

    #[test]
    fn named_keys_differ_by_name() {
        assert_ne!(
            BindingKey::named::<String>("a"),
            BindingKey::named::<String>("b")
        );
        assert_ne!(BindingKey::named::<String>("a"), BindingKey::of::<String>());
    }

    #[test]
    fn key_as_map_key() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(BindingKey::of::<String>(), "string");
        map.insert(BindingKey::named::<String>("other"), "named");
        assert_eq!(map.get(&BindingKey::of::<String>()), Some(&"string"));
        assert_eq!(map.get(&BindingKey::named::<String>("other")), Some(&"named"));
        assert_eq!(map.get(&BindingKey::of::<bool>()), None);
    }

    #[test]
    fn unsized_type_key() {
        trait Repo {}
        let _key = BindingKey::of::<dyn Repo>();
    }
}
