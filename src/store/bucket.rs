//! Homogeneous per-key storage.
//!
//! A [`Bucket<S, T>`] holds every capability registered under one storage key,
//! viewed as `Arc<T>`. The overall map is heterogeneous, so buckets are stored
//! behind [`ErasedBucket`] and recovered with a downcast keyed by the same type
//! that produced the storage key.

use core::any::Any;
use std::sync::Arc;

use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;

use super::capability::{CapabilityRef, Subject, any_ordered};
use crate::primitives::key::StorageKey;

/// Storage map of a composer or composition, in first-registration order.
pub(crate) type BucketMap<S> = IndexMap<StorageKey, Box<dyn ErasedBucket<S>>, FxBuildHasher>;

/// Ordered, type-homogeneous sequence of capabilities under one key.
///
/// `items[i]` and `refs[i]` always describe the same instance.
pub(crate) struct Bucket<S: Subject, T: ?Sized + Send + Sync + 'static> {
    key: StorageKey,
    items: Vec<Arc<T>>,
    refs: Vec<CapabilityRef<S>>,
}

impl<S: Subject, T: ?Sized + Send + Sync + 'static> Bucket<S, T> {
    pub(crate) fn new(key: StorageKey) -> Self {
        Self {
            key,
            items: Vec::new(),
            refs: Vec::new(),
        }
    }

    #[inline]
    pub(crate) fn push(&mut self, item: Arc<T>, r: CapabilityRef<S>) {
        self.items.push(item);
        self.refs.push(r);
    }

    #[inline]
    pub(crate) fn items(&self) -> &[Arc<T>] {
        &self.items
    }

    #[inline]
    pub(crate) fn refs(&self) -> &[CapabilityRef<S>] {
        &self.refs
    }
}

/// Object-safe operations on a bucket of unknown element type.
pub(crate) trait ErasedBucket<S: Subject>: Send + Sync {
    fn key(&self) -> StorageKey;

    fn len(&self) -> usize;

    fn refs(&self) -> &[CapabilityRef<S>];

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Removes every member whose sequence number is in `seqs`. Returns how many were removed.
    fn remove_seqs(&mut self, seqs: &[u64]) -> usize;

    /// Stable sort by `(order, seq)`, only when at least one member is ordered.
    fn sort_by_order(&mut self);

    /// Copy of this bucket with sequence numbers rewritten by `remap`.
    fn resequenced(&self, remap: &dyn Fn(u64) -> u64) -> Box<dyn ErasedBucket<S>>;
}

impl<S: Subject, T: ?Sized + Send + Sync + 'static> ErasedBucket<S> for Bucket<S, T> {
    fn key(&self) -> StorageKey {
        self.key
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn refs(&self) -> &[CapabilityRef<S>] {
        &self.refs
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn remove_seqs(&mut self, seqs: &[u64]) -> usize {
        let before = self.refs.len();
        let mut i = 0;
        while i < self.refs.len() {
            if seqs.contains(&self.refs[i].seq) {
                self.refs.remove(i);
                self.items.remove(i);
            } else {
                i += 1;
            }
        }
        before - self.refs.len()
    }

    fn sort_by_order(&mut self) {
        if self.refs.len() < 2 || !any_ordered(&self.refs) {
            return;
        }
        let mut pairs: Vec<_> = self.refs.drain(..).zip(self.items.drain(..)).collect();
        pairs.sort_by_key(|(r, _)| r.sort_key());
        for (r, item) in pairs {
            self.refs.push(r);
            self.items.push(item);
        }
    }

    fn resequenced(&self, remap: &dyn Fn(u64) -> u64) -> Box<dyn ErasedBucket<S>> {
        Box::new(Bucket::<S, T> {
            key: self.key,
            items: self.items.clone(),
            refs: self.refs.iter().map(|r| r.resequenced(remap(r.seq))).collect(),
        })
    }
}

/// Recovers the typed bucket behind `bucket`, if its element type is `T`.
#[inline]
pub(crate) fn downcast<S: Subject, T: ?Sized + Send + Sync + 'static>(
    bucket: &dyn ErasedBucket<S>,
) -> Option<&Bucket<S, T>> {
    bucket.as_any().downcast_ref::<Bucket<S, T>>()
}

#[inline]
pub(crate) fn downcast_mut<S: Subject, T: ?Sized + Send + Sync + 'static>(
    bucket: &mut dyn ErasedBucket<S>,
) -> Option<&mut Bucket<S, T>> {
    bucket.as_any_mut().downcast_mut::<Bucket<S, T>>()
}
