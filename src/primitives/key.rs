//! Storage keys: runtime type tokens.
//!
//! Every bucket in a composition is addressed by a [`StorageKey`]. A key is the
//! `TypeId` of the type a capability was registered under, paired with its name
//! for diagnostics. Equality and hashing only look at the `TypeId`.

use core::any::TypeId;
use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;

/// Type token identifying one homogeneous bucket.
#[derive(Clone, Copy)]
pub struct StorageKey {
    id: TypeId,
    name: &'static str,
}

impl StorageKey {
    /// Key for the concrete or contract type `T`.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: core::any::type_name::<T>(),
        }
    }

    /// Reserved key holding the primary capability of subjects of type `S`.
    #[inline]
    pub fn primary<S: 'static>() -> Self {
        Self::of::<PrimaryMarker<S>>()
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name, as reported by `core::any::type_name`.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// `true` if this is the primary marker for subjects of type `S`.
    #[inline]
    pub fn is_primary_of<S: 'static>(&self) -> bool {
        self.id == TypeId::of::<PrimaryMarker<S>>()
    }
}

impl PartialEq for StorageKey {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for StorageKey {}

impl Hash for StorageKey {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for StorageKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Orders by name so diagnostic listings are stable across runs.
impl Ord for StorageKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(other.name).then_with(|| self.id.cmp(&other.id))
    }
}

impl fmt::Debug for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StorageKey({})", self.name)
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Marker type behind [`StorageKey::primary`]. Never instantiated.
pub struct PrimaryMarker<S>(PhantomData<fn() -> S>);
