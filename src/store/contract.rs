//! Contract resolution.
//!
//! A contract list names the storage keys one capability instance is indexed
//! under. Lists are built at the call site, either fluently or with
//! [`contracts!`](crate::contracts), so the core never inspects generic arguments:
//!
//! ```ignore
//! let list = Contracts::new().with::<dyn Priced>().with::<dyn Shippable>().primary();
//! let same = contracts![dyn Priced, dyn Shippable].primary();
//! composer.add_as_all(Standard, list)?;
//! ```
//!
//! The bound `C: Implements<K>` proves at compile time that a view of the
//! capability as `K` exists. [`Contracts::resolve`] checks the rest.

use core::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use super::bucket::{Bucket, BucketMap, ErasedBucket, downcast_mut};
use super::capability::{Capability, CapabilityRef, Implements, Subject};
use crate::error::{ComposeError, Result};
use crate::primitives::key::StorageKey;

type InsertFn<S, C> = fn(&mut BucketMap<S>, StorageKey, &Arc<C>, &CapabilityRef<S>) -> Result<()>;

/// One resolved storage key plus the typed insertion for it.
pub(crate) struct ContractSlot<S: Subject, C> {
    pub(crate) key: StorageKey,
    insert: InsertFn<S, C>,
}

impl<S: Subject, C> ContractSlot<S, C> {
    #[inline]
    pub(crate) fn insert(&self, map: &mut BucketMap<S>, cap: &Arc<C>, r: &CapabilityRef<S>) -> Result<()> {
        (self.insert)(map, self.key, cap, r)
    }
}

impl<S: Subject, C> Clone for ContractSlot<S, C> {
    fn clone(&self) -> Self {
        Self {
            key: self.key,
            insert: self.insert,
        }
    }
}

/// Ordered list of contract types for capability `C` of subject `S`.
pub struct Contracts<S: Subject, C> {
    slots: SmallVec<[ContractSlot<S, C>; 2]>,
}

impl<S: Subject, C: Capability<S>> Contracts<S, C> {
    pub fn new() -> Self {
        Self {
            slots: SmallVec::new(),
        }
    }

    /// Appends contract `K`.
    pub fn with<K>(mut self) -> Self
    where
        K: ?Sized + Send + Sync + 'static,
        C: Implements<K>,
    {
        self.slots.push(ContractSlot {
            key: StorageKey::of::<K>(),
            insert: insert_as::<S, C, K>,
        });
        self
    }

    /// Appends the reserved primary marker.
    pub fn primary(mut self) -> Self {
        self.slots.push(ContractSlot {
            key: StorageKey::primary::<S>(),
            insert: insert_primary::<S, C>,
        });
        self
    }

    /// The concrete type of `C` itself.
    pub fn concrete(self) -> Self {
        self.with::<C>()
    }

    pub fn keys(&self) -> impl Iterator<Item = StorageKey> + '_ {
        self.slots.iter().map(|slot| slot.key)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline]
    pub fn contains_primary(&self) -> bool {
        self.keys().any(|key| key.is_primary_of::<S>())
    }

    /// Validates the list against `cap` and returns the slots to insert into.
    ///
    /// Fails with [`ComposeError::InvalidContract`] if the list is empty, names
    /// a key twice, or requests the primary marker for a non-primary capability.
    pub(crate) fn resolve(&self, cap: &C) -> Result<&[ContractSlot<S, C>]> {
        if self.slots.is_empty() {
            return Err(ComposeError::InvalidContract {
                contract: core::any::type_name::<C>(),
                reason: "contract list is empty",
            });
        }
        for (i, slot) in self.slots.iter().enumerate() {
            if self.slots[..i].iter().any(|prev| prev.key == slot.key) {
                return Err(ComposeError::InvalidContract {
                    contract: slot.key.name(),
                    reason: "contract listed more than once",
                });
            }
            if slot.key.is_primary_of::<S>() && !cap.is_primary() {
                return Err(ComposeError::InvalidContract {
                    contract: slot.key.name(),
                    reason: "capability does not satisfy the primary contract",
                });
            }
        }
        Ok(&self.slots)
    }
}

impl<S: Subject, C: Capability<S>> Default for Contracts<S, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Subject, C> fmt::Debug for Contracts<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.slots.iter().map(|slot| slot.key)).finish()
    }
}

/// Slots for the concrete type of `C`, plus the primary marker if `C` is primary.
pub(crate) fn concrete_slots<S: Subject, C: Capability<S>>(cap: &C) -> SmallVec<[ContractSlot<S, C>; 2]> {
    let list = Contracts::<S, C>::new().concrete();
    let list = if cap.is_primary() { list.primary() } else { list };
    list.slots
}

fn insert_as<S, C, K>(map: &mut BucketMap<S>, key: StorageKey, cap: &Arc<C>, r: &CapabilityRef<S>) -> Result<()>
where
    S: Subject,
    C: Implements<K>,
    K: ?Sized + Send + Sync + 'static,
{
    let bucket = map.entry(key).or_insert_with(|| Box::new(Bucket::<S, K>::new(key)) as Box<dyn ErasedBucket<S>>);
    let bucket = downcast_mut::<S, K>(&mut **bucket).ok_or(ComposeError::InvalidContract {
        contract: key.name(),
        reason: "storage key holds a different element type",
    })?;
    bucket.push(<C as Implements<K>>::upcast(cap.clone()), r.clone());
    Ok(())
}

fn insert_primary<S, C>(map: &mut BucketMap<S>, key: StorageKey, _cap: &Arc<C>, r: &CapabilityRef<S>) -> Result<()>
where
    S: Subject,
{
    let bucket = map
        .entry(key)
        .or_insert_with(|| Box::new(Bucket::<S, dyn Capability<S>>::new(key)) as Box<dyn ErasedBucket<S>>);
    let bucket = downcast_mut::<S, dyn Capability<S>>(&mut **bucket).ok_or(ComposeError::InvalidContract {
        contract: key.name(),
        reason: "storage key holds a different element type",
    })?;
    bucket.push(r.as_arc().clone(), r.clone());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Order;

    trait Priced: Send + Sync {}
    trait Shippable: Send + Sync {}

    struct Standard;
    impl Capability<Order> for Standard {}
    impl Priced for Standard {}
    impl Shippable for Standard {}
    impl Implements<dyn Priced> for Standard {
        fn upcast(self: Arc<Self>) -> Arc<dyn Priced> {
            self
        }
    }
    impl Implements<dyn Shippable> for Standard {
        fn upcast(self: Arc<Self>) -> Arc<dyn Shippable> {
            self
        }
    }

    struct Main;
    impl Capability<Order> for Main {
        fn is_primary(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_resolves_in_declaration_order() {
        let list = Contracts::<Order, Standard>::new().with::<dyn Shippable>().with::<dyn Priced>();
        let keys: Vec<_> = list.resolve(&Standard).unwrap().iter().map(|s| s.key).collect();
        assert_eq!(keys, [StorageKey::of::<dyn Shippable>(), StorageKey::of::<dyn Priced>()]);
    }

    #[test]
    fn test_empty_list_is_invalid() {
        let list = Contracts::<Order, Standard>::new();
        assert!(matches!(list.resolve(&Standard), Err(ComposeError::InvalidContract { .. })));
    }

    #[test]
    fn test_duplicate_contract_is_invalid() {
        let list = Contracts::<Order, Standard>::new().with::<dyn Priced>().with::<dyn Priced>();
        let err = list.resolve(&Standard).err();
        assert!(matches!(
            err,
            Some(ComposeError::InvalidContract { reason: "contract listed more than once", .. })
        ));
    }

    #[test]
    fn test_primary_marker_requires_primary_capability() {
        let list = Contracts::<Order, Standard>::new().primary();
        assert!(list.resolve(&Standard).is_err());
        let list = Contracts::<Order, Main>::new().concrete().primary();
        assert!(list.contains_primary());
        assert_eq!(list.resolve(&Main).unwrap().len(), 2);
    }

    #[test]
    fn test_concrete_slots() {
        assert_eq!(concrete_slots::<Order, _>(&Standard).len(), 1);
        let slots = concrete_slots::<Order, _>(&Main);
        assert_eq!(slots[0].key, StorageKey::of::<Main>());
        assert!(slots[1].key.is_primary_of::<Order>());
    }
}
