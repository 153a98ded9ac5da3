//! Type-erased equatable values.
//!
//! [`AnyValue`] wraps any `Eq + Hash + Debug` value behind an `Arc` while keeping
//! equality and hashing meaningful across the erasure: two values are equal only
//! if they have the same concrete type and compare equal as that type.

use core::any::{Any, TypeId};
use core::borrow::Borrow;
use core::fmt;
use core::hash::{Hash, Hasher};
use std::sync::Arc;

/// Object-safe view of an `Eq + Hash + Debug` value.
pub(crate) trait DynValue: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn dyn_eq(&self, other: &dyn DynValue) -> bool;
    fn dyn_hash(&self, state: &mut dyn Hasher);
    fn dyn_fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
    fn type_name(&self) -> &'static str;
}

impl<V> DynValue for V
where
    V: Eq + Hash + fmt::Debug + Send + Sync + 'static,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn DynValue) -> bool {
        other.as_any().downcast_ref::<V>().is_some_and(|other| self == other)
    }

    fn dyn_hash(&self, mut state: &mut dyn Hasher) {
        TypeId::of::<V>().hash(&mut state);
        self.hash(&mut state);
    }

    fn dyn_fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }

    fn type_name(&self) -> &'static str {
        core::any::type_name::<V>()
    }
}

impl PartialEq for dyn DynValue {
    fn eq(&self, other: &Self) -> bool {
        self.dyn_eq(other)
    }
}

impl Eq for dyn DynValue {}

impl Hash for dyn DynValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.dyn_hash(state);
    }
}

/// Borrowed lookup key for maps keyed by [`AnyValue`]; hashes and compares
/// exactly like `AnyValue::new(value)` without allocating.
#[inline]
pub(crate) fn borrowed<V>(value: &V) -> &(dyn DynValue + 'static)
where
    V: Eq + Hash + fmt::Debug + Send + Sync + 'static,
{
    value
}

/// Shared, type-erased, hashable value.
#[derive(Clone)]
pub struct AnyValue(Arc<dyn DynValue>);

impl AnyValue {
    pub fn new<V>(value: V) -> Self
    where
        V: Eq + Hash + fmt::Debug + Send + Sync + 'static,
    {
        Self(Arc::new(value))
    }

    /// `TypeId` of the wrapped value.
    #[inline]
    pub fn value_type_id(&self) -> TypeId {
        self.0.as_any().type_id()
    }

    #[inline]
    pub fn value_type_name(&self) -> &'static str {
        self.0.type_name()
    }

    #[inline]
    pub fn is<V: 'static>(&self) -> bool {
        self.0.as_any().is::<V>()
    }

    #[inline]
    pub fn downcast_ref<V: 'static>(&self) -> Option<&V> {
        self.0.as_any().downcast_ref::<V>()
    }
}

impl PartialEq for AnyValue {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.dyn_eq(&*other.0)
    }
}

impl Eq for AnyValue {}

impl Hash for AnyValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.dyn_hash(state);
    }
}

impl Borrow<dyn DynValue> for AnyValue {
    fn borrow(&self) -> &(dyn DynValue + 'static) {
        &*self.0
    }
}

impl fmt::Debug for AnyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.dyn_fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashSet;

    #[derive(Debug, PartialEq, Eq, Hash)]
    enum Color {
        Red,
    }

    #[test]
    fn test_equality_requires_same_type() {
        assert_eq!(AnyValue::new(7u32), AnyValue::new(7u32));
        assert_ne!(AnyValue::new(7u32), AnyValue::new(7u64));
        assert_ne!(AnyValue::new("red"), AnyValue::new(Color::Red));
    }

    #[test]
    fn test_hash_set_membership() {
        let mut set = FxHashSet::default();
        set.insert(AnyValue::new("x"));
        set.insert(AnyValue::new(Color::Red));
        assert!(set.contains(&AnyValue::new("x")));
        assert!(set.contains(&AnyValue::new(Color::Red)));
        assert!(!set.contains(&AnyValue::new("y")));
    }

    #[test]
    fn test_borrowed_key_finds_owned_entry() {
        let mut set = FxHashSet::default();
        set.insert(AnyValue::new(Color::Red));
        set.insert(AnyValue::new(3u8));
        assert!(set.contains(borrowed(&Color::Red)));
        assert!(set.contains(borrowed(&3u8)));
        assert!(!set.contains(borrowed(&3u16)));
        assert!(set.remove(borrowed(&3u8)));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_downcast() {
        let value = AnyValue::new(Color::Red);
        assert!(value.is::<Color>());
        assert_eq!(value.downcast_ref::<Color>(), Some(&Color::Red));
        assert!(value.downcast_ref::<u8>().is_none());
        assert_eq!(format!("{value:?}"), "Red");
    }
}
