//! The capability contract and the shared handle stored in compositions.

use core::any::{Any, TypeId};
use core::fmt;
use std::sync::Arc;

use crate::primitives::tag::Tag;

/// Anything a capability can be attached to.
///
/// Reference-typed subjects are modeled as `Arc<T>`.
pub trait Subject: Send + Sync + 'static {}

impl<T: Send + Sync + 'static> Subject for T {}

/// A typed, immutable record attached to a subject of type `S`.
///
/// The provided methods describe the optional facets of a capability:
/// - [`order`](Capability::order): `Some(n)` makes it *ordered*; lower runs first.
/// - [`is_primary`](Capability::is_primary): marks the canonical capability of
///   its subject. At most one may exist per composition.
/// - [`tags`](Capability::tags): opaque values used for grouping and filtering.
///
/// Use `#[derive(Capability)]` to generate these from attributes.
pub trait Capability<S: Subject>: Any + Send + Sync {
    fn order(&self) -> Option<i32> {
        None
    }

    fn is_primary(&self) -> bool {
        false
    }

    fn tags(&self) -> &[Tag] {
        &[]
    }
}

/// View of a capability as contract type `K`.
///
/// Implemented for every type as itself, and generated for trait-object
/// contracts by `#[derive(Capability)]` with `#[capability(contracts(dyn K))]`:
///
/// ```ignore
/// impl Implements<dyn Greeter> for Hello {
///     fn upcast(self: Arc<Self>) -> Arc<dyn Greeter> { self }
/// }
/// ```
///
/// Contract types are stored in shared buckets and must be `Send + Sync`;
/// declare trait contracts with those supertraits.
pub trait Implements<K: ?Sized + Send + Sync + 'static> {
    fn upcast(self: Arc<Self>) -> Arc<K>;
}

impl<T: Send + Sync + 'static> Implements<T> for T {
    #[inline]
    fn upcast(self: Arc<Self>) -> Arc<T> {
        self
    }
}

/// Shared handle to one stored capability instance.
///
/// The same allocation backs every bucket the instance is indexed under;
/// [`ptr_eq`](CapabilityRef::ptr_eq) compares instance identity.
pub struct CapabilityRef<S: Subject> {
    pub(crate) seq: u64,
    cap: Arc<dyn Capability<S>>,
    any: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl<S: Subject> CapabilityRef<S> {
    pub(crate) fn new<C: Capability<S>>(seq: u64, cap: Arc<C>) -> Self {
        Self {
            seq,
            cap: cap.clone(),
            any: cap,
            type_name: core::any::type_name::<C>(),
        }
    }

    /// Same instance under a different insertion sequence number.
    pub(crate) fn resequenced(&self, seq: u64) -> Self {
        Self {
            seq,
            cap: self.cap.clone(),
            any: self.any.clone(),
            type_name: self.type_name,
        }
    }

    #[inline]
    pub fn capability(&self) -> &dyn Capability<S> {
        &*self.cap
    }

    #[inline]
    pub fn as_arc(&self) -> &Arc<dyn Capability<S>> {
        &self.cap
    }

    /// Concrete type name of the instance.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    #[inline]
    pub fn concrete_type_id(&self) -> TypeId {
        (*self.any).type_id()
    }

    #[inline]
    pub fn is<C: 'static>(&self) -> bool {
        self.any.is::<C>()
    }

    #[inline]
    pub fn downcast_ref<C: 'static>(&self) -> Option<&C> {
        self.any.downcast_ref::<C>()
    }

    /// Shared handle to the concrete instance, if it is a `C`.
    pub fn downcast<C: Send + Sync + 'static>(&self) -> Option<Arc<C>> {
        self.any.clone().downcast::<C>().ok()
    }

    #[inline]
    pub fn order(&self) -> Option<i32> {
        self.cap.order()
    }

    #[inline]
    pub fn is_primary(&self) -> bool {
        self.cap.is_primary()
    }

    #[inline]
    pub fn tags(&self) -> &[Tag] {
        self.cap.tags()
    }

    #[inline]
    pub fn has_tag(&self, tag: &Tag) -> bool {
        self.cap.tags().contains(tag)
    }

    /// `true` if both handles point at the same instance.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }

    #[inline]
    pub(crate) fn addr(&self) -> *const () {
        Arc::as_ptr(&self.any) as *const ()
    }

    /// Sort key: missing order counts as 0, ties keep insertion order.
    #[inline]
    pub(crate) fn sort_key(&self) -> (i32, u64) {
        (self.order().unwrap_or(0), self.seq)
    }
}

impl<S: Subject> Clone for CapabilityRef<S> {
    fn clone(&self) -> Self {
        self.resequenced(self.seq)
    }
}

impl<S: Subject> fmt::Debug for CapabilityRef<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityRef")
            .field("type", &self.type_name)
            .field("seq", &self.seq)
            .field("order", &self.order())
            .field("primary", &self.is_primary())
            .field("tags", &self.tags())
            .finish()
    }
}

/// `true` if any member carries an explicit order.
pub(crate) fn any_ordered<S: Subject>(refs: &[CapabilityRef<S>]) -> bool {
    refs.iter().any(|r| r.order().is_some())
}
