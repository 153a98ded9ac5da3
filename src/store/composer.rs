//! The composition builder.
//!
//! A [`Composer`] is bound to one subject. Capabilities are added and removed
//! freely until [`Composer::build`] is called once; afterwards every mutating
//! call fails with [`ComposeError::IllegalState`].
//!
//! ```ignore
//! let mut composer = Composer::new(order);
//! composer
//!     .add(Audit::new())?
//!     .add_as::<dyn Priced, _>(Standard)?
//!     .with_primary(Checkout)?;
//! let composition = composer.build()?;
//! ```

use core::any::Any;
use core::fmt;
use std::collections::BTreeMap;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::bucket::{BucketMap, ErasedBucket};
use super::capability::{Capability, CapabilityRef, Implements, Subject};
use super::composition::Composition;
use super::contract::{ContractSlot, Contracts, concrete_slots};
use super::options::BuildOptions;
use crate::error::{ComposeError, Result};
use crate::primitives::key::StorageKey;

/// One registered instance and every key it is indexed under.
struct Membership<S: Subject> {
    r: CapabilityRef<S>,
    keys: SmallVec<[StorageKey; 2]>,
}

/// Mutable, single-owner builder for a [`Composition`].
pub struct Composer<S: Subject> {
    subject: Arc<S>,
    next_seq: u64,
    members: BTreeMap<u64, Membership<S>>,
    buckets: BucketMap<S>,
    built: bool,
}

impl<S: Subject> Composer<S> {
    pub fn new(subject: S) -> Self {
        Self::from_arc(Arc::new(subject))
    }

    pub fn from_arc(subject: Arc<S>) -> Self {
        Self {
            subject,
            next_seq: 0,
            members: BTreeMap::new(),
            buckets: BucketMap::default(),
            built: false,
        }
    }

    /// Seeds a builder with every capability of `composition`.
    ///
    /// Each instance keeps the keys it was indexed under and gets a fresh id;
    /// relative insertion order is preserved. The original is not touched.
    pub fn from_composition(composition: &Composition<S>) -> Self {
        let remap: FxHashMap<u64, u64> = {
            let mut seqs: Vec<u64> = composition.capabilities().iter().map(|r| r.seq).collect();
            seqs.sort_unstable();
            seqs.into_iter().enumerate().map(|(new, old)| (old, new as u64)).collect()
        };
        let fresh = |seq: u64| remap.get(&seq).copied().unwrap_or(seq);

        let mut composer = Self::from_arc(composition.subject_arc().clone());
        composer.next_seq = remap.len() as u64;
        for bucket in composition.buckets().values() {
            let copy: Box<dyn ErasedBucket<S>> = bucket.resequenced(&fresh);
            let key = copy.key();
            for r in copy.refs() {
                composer
                    .members
                    .entry(r.seq)
                    .or_insert_with(|| Membership { r: r.clone(), keys: SmallVec::new() })
                    .keys
                    .push(key);
            }
            composer.buckets.insert(key, copy);
        }
        composer
    }

    /// Seeds a builder from a type-erased composition, as handed out by registries.
    ///
    /// Fails with [`ComposeError::InvalidArgument`] unless `source` is a
    /// `Composition<S>`.
    pub fn recompose(source: &(dyn Any + Send + Sync)) -> Result<Self> {
        source
            .downcast_ref::<Composition<S>>()
            .map(Self::from_composition)
            .ok_or_else(|| ComposeError::InvalidArgument {
                reason: format!(
                    "source is not a composition for subject `{}`",
                    core::any::type_name::<S>()
                ),
            })
    }

    #[inline]
    pub fn subject(&self) -> &S {
        &self.subject
    }

    #[inline]
    pub fn is_built(&self) -> bool {
        self.built
    }

    /// Number of distinct capability instances.
    #[inline]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// `true` if something is registered under the exact key `T`.
    #[inline]
    pub fn has<T: ?Sized + 'static>(&self) -> bool {
        self.buckets.contains_key(&StorageKey::of::<T>())
    }

    #[inline]
    pub fn has_primary(&self) -> bool {
        self.buckets.contains_key(&StorageKey::primary::<S>())
    }

    /// Registers `cap` under its concrete type, and under the primary marker
    /// if it is primary.
    pub fn add<C: Capability<S>>(&mut self, cap: C) -> Result<&mut Self> {
        self.ensure_unbuilt("add")?;
        let slots = concrete_slots::<S, C>(&cap);
        self.insert(cap, &slots)?;
        Ok(self)
    }

    /// Registers `cap` under contract `K` only.
    pub fn add_as<K, C>(&mut self, cap: C) -> Result<&mut Self>
    where
        K: ?Sized + Send + Sync + 'static,
        C: Capability<S> + Implements<K>,
    {
        self.add_as_all(cap, Contracts::new().with::<K>())
    }

    /// Registers one instance under every key in `contracts`.
    pub fn add_as_all<C: Capability<S>>(&mut self, cap: C, contracts: Contracts<S, C>) -> Result<&mut Self> {
        self.ensure_unbuilt("add")?;
        let slots = contracts.resolve(&cap)?;
        self.insert(cap, slots)?;
        Ok(self)
    }

    /// Like [`add`](Self::add), but a no-op if the concrete key is taken.
    ///
    /// Returns whether `cap` was added.
    pub fn try_add<C: Capability<S>>(&mut self, cap: C) -> Result<bool> {
        self.ensure_unbuilt("add")?;
        if self.has::<C>() {
            return Ok(false);
        }
        self.add(cap).map(|_| true)
    }

    pub fn try_add_as<K, C>(&mut self, cap: C) -> Result<bool>
    where
        K: ?Sized + Send + Sync + 'static,
        C: Capability<S> + Implements<K>,
    {
        self.try_add_as_all(cap, Contracts::new().with::<K>())
    }

    /// Like [`add_as_all`](Self::add_as_all), but a no-op if any listed key is taken.
    pub fn try_add_as_all<C: Capability<S>>(&mut self, cap: C, contracts: Contracts<S, C>) -> Result<bool> {
        self.ensure_unbuilt("add")?;
        if contracts.keys().any(|key| self.buckets.contains_key(&key)) {
            return Ok(false);
        }
        self.add_as_all(cap, contracts).map(|_| true)
    }

    /// Removes every instance matching `predicate` from all keys it is indexed
    /// under, pruning keys left empty. Returns how many instances were removed.
    pub fn remove_where<F>(&mut self, mut predicate: F) -> Result<usize>
    where
        F: FnMut(&CapabilityRef<S>) -> bool,
    {
        self.ensure_unbuilt("remove")?;
        let doomed: Vec<u64> = self
            .members
            .values()
            .filter(|m| predicate(&m.r))
            .map(|m| m.r.seq)
            .collect();
        if doomed.is_empty() {
            return Ok(0);
        }
        self.detach(&doomed);
        tracing::trace!(removed = doomed.len(), remaining = self.members.len(), "capabilities removed");
        Ok(doomed.len())
    }

    /// Replaces any existing primary with `cap`.
    ///
    /// Fails with [`ComposeError::InvalidContract`] if `cap` is not primary.
    pub fn with_primary<C: Capability<S>>(&mut self, cap: C) -> Result<&mut Self> {
        self.ensure_unbuilt("replace primary")?;
        if !cap.is_primary() {
            return Err(ComposeError::InvalidContract {
                contract: core::any::type_name::<C>(),
                reason: "capability does not satisfy the primary contract",
            });
        }
        self.clear_primary();
        self.add(cap)
    }

    /// Removes the primary capability, if any.
    pub fn without_primary(&mut self) -> Result<&mut Self> {
        self.ensure_unbuilt("remove primary")?;
        self.clear_primary();
        Ok(self)
    }

    /// Finalizes with default [`BuildOptions`].
    pub fn build(&mut self) -> Result<Composition<S>> {
        self.build_with(BuildOptions::default())
    }

    /// Finalizes the builder into an immutable [`Composition`].
    ///
    /// The builder is unusable afterwards, even if the primary backstop fails.
    pub fn build_with(&mut self, options: BuildOptions) -> Result<Composition<S>> {
        self.ensure_unbuilt("build")?;
        self.built = true;

        let mut buckets = core::mem::take(&mut self.buckets);
        for bucket in buckets.values_mut() {
            bucket.sort_by_order();
        }
        if let Some(primary) = buckets.get(&StorageKey::primary::<S>()) {
            if let [first, second, ..] = primary.refs() {
                return Err(ComposeError::DuplicatePrimary {
                    subject: core::any::type_name::<S>(),
                    existing: first.type_name(),
                    attempted: second.type_name(),
                });
            }
        }

        let refs: Vec<CapabilityRef<S>> = core::mem::take(&mut self.members)
            .into_values()
            .map(|m| m.r)
            .collect();
        Ok(Composition::assemble(self.subject.clone(), buckets, refs, options))
    }

    fn ensure_unbuilt(&self, operation: &'static str) -> Result<()> {
        if self.built {
            return Err(ComposeError::IllegalState { operation });
        }
        Ok(())
    }

    fn primary_ref(&self) -> Option<&CapabilityRef<S>> {
        self.buckets
            .get(&StorageKey::primary::<S>())
            .and_then(|bucket| bucket.refs().first())
    }

    fn clear_primary(&mut self) {
        let primary: Vec<u64> = self
            .buckets
            .get(&StorageKey::primary::<S>())
            .map(|bucket| bucket.refs().iter().map(|r| r.seq).collect())
            .unwrap_or_default();
        if !primary.is_empty() {
            self.detach(&primary);
        }
    }

    /// Inserts one instance under `slots`, all or nothing.
    fn insert<C: Capability<S>>(&mut self, cap: C, slots: &[ContractSlot<S, C>]) -> Result<()> {
        if slots.iter().any(|slot| slot.key.is_primary_of::<S>()) {
            if let Some(existing) = self.primary_ref() {
                return Err(ComposeError::DuplicatePrimary {
                    subject: core::any::type_name::<S>(),
                    existing: existing.type_name(),
                    attempted: core::any::type_name::<C>(),
                });
            }
        }

        let seq = self.next_seq;
        let cap = Arc::new(cap);
        let r = CapabilityRef::new(seq, cap.clone());
        let mut keys = SmallVec::new();
        for slot in slots {
            if let Err(err) = slot.insert(&mut self.buckets, &cap, &r) {
                // Roll back the keys already written for this instance.
                self.buckets.retain(|_, bucket| {
                    bucket.remove_seqs(&[seq]);
                    bucket.len() > 0
                });
                return Err(err);
            }
            keys.push(slot.key);
        }

        self.next_seq += 1;
        tracing::trace!(capability = r.type_name(), seq, keys = keys.len(), "capability registered");
        self.members.insert(seq, Membership { r, keys });
        Ok(())
    }

    fn detach(&mut self, seqs: &[u64]) {
        let mut touched: SmallVec<[StorageKey; 4]> = SmallVec::new();
        for seq in seqs {
            if let Some(m) = self.members.remove(seq) {
                for key in m.keys {
                    if !touched.contains(&key) {
                        touched.push(key);
                    }
                }
            }
        }
        for key in touched {
            let empty = match self.buckets.get_mut(&key) {
                Some(bucket) => {
                    bucket.remove_seqs(seqs);
                    bucket.len() == 0
                }
                None => false,
            };
            if empty {
                self.buckets.shift_remove(&key);
            }
        }
    }
}

impl<S: Subject> fmt::Debug for Composer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Composer")
            .field("subject", &core::any::type_name::<S>())
            .field("capabilities", &self.members.len())
            .field("keys", &self.buckets.keys().collect::<Vec<_>>())
            .field("built", &self.built)
            .finish()
    }
}
