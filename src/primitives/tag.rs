//! Tags: opaque equatable values used to group capabilities independent of type.

use core::any::TypeId;
use core::fmt;
use core::hash::Hash;

use super::value::AnyValue;

/// A tag attached to a capability.
///
/// Any `Eq + Hash + Debug` value can be a tag: strings, enums, integers or
/// type tokens via [`Tag::of_type`]. Tags of different value types never compare
/// equal, so `Tag::new("x")` and `Tag::new(String::from("x"))` are distinct.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Tag(AnyValue);

impl Tag {
    pub fn new<V>(value: V) -> Self
    where
        V: Eq + Hash + fmt::Debug + Send + Sync + 'static,
    {
        Self(AnyValue::new(value))
    }

    /// Tag identified by the type `T` itself.
    pub fn of_type<T: ?Sized + 'static>() -> Self {
        Self::new(TypeTag::of::<T>())
    }

    /// `TypeId` of the wrapped tag value (not of `Tag`).
    #[inline]
    pub fn value_type_id(&self) -> TypeId {
        self.0.value_type_id()
    }

    #[inline]
    pub fn value_type_name(&self) -> &'static str {
        self.0.value_type_name()
    }

    #[inline]
    pub fn is<V: 'static>(&self) -> bool {
        self.0.is::<V>()
    }

    #[inline]
    pub fn downcast_ref<V: 'static>(&self) -> Option<&V> {
        self.0.downcast_ref::<V>()
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({:?})", self.0)
    }
}

impl From<&'static str> for Tag {
    fn from(value: &'static str) -> Self {
        Self::new(value)
    }
}

/// Tag value standing for a type.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeTag {
    id: TypeId,
    name: &'static str,
}

impl TypeTag {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: core::any::type_name::<T>(),
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type {}", self.name)
    }
}

/// Builds a `Vec<Tag>` from heterogeneous tag values.
///
/// ```ignore
/// let tags = tags!["billing", Region::Eu, 42u32];
/// ```
#[macro_export]
macro_rules! tags {
    () => { ::std::vec::Vec::<$crate::Tag>::new() };
    ($($value:expr),+ $(,)?) => {
        ::std::vec![$($crate::Tag::new($value)),+]
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Eq, Hash)]
    enum Region {
        Eu,
        Us,
    }

    #[test]
    fn test_tag_equality() {
        assert_eq!(Tag::new("x"), Tag::from("x"));
        assert_ne!(Tag::new("x"), Tag::new(String::from("x")));
        assert_ne!(Tag::new(Region::Eu), Tag::new(Region::Us));
        assert_eq!(Tag::of_type::<u8>(), Tag::of_type::<u8>());
        assert_ne!(Tag::of_type::<u8>(), Tag::of_type::<u16>());
    }

    #[test]
    fn test_tag_downcast() {
        let tag = Tag::new(Region::Eu);
        assert!(tag.is::<Region>());
        assert_eq!(tag.downcast_ref::<Region>(), Some(&Region::Eu));
        let ty = Tag::of_type::<str>();
        assert!(ty.downcast_ref::<TypeTag>().is_some_and(|t| t.is::<str>()));
    }

    #[test]
    fn test_tags_macro() {
        let tags = crate::tags!["a", Region::Us, 3u8];
        assert_eq!(tags.len(), 3);
        assert_eq!(tags[1], Tag::new(Region::Us));
    }
}
