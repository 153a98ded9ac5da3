//! The immutable composition and its queries.
//!
//! Every registered key is its own bucket: a query for `T` sees exactly the
//! instances registered under `T`, never instances that merely implement it.
//! A capability added with [`Composer::add`] is invisible to a query by a
//! contract it happens to implement unless it was also registered under that
//! contract.

use core::any::TypeId;
use core::fmt;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use super::bucket::{Bucket, BucketMap, downcast};
use super::capability::{Capability, CapabilityRef, Subject, any_ordered};
use super::composer::Composer;
use super::options::BuildOptions;
use super::tag_index::{TagIndex, positions_with_tag, positions_with_tags};
use crate::error::{ComposeError, Result};
use crate::primitives::key::StorageKey;
use crate::primitives::tag::Tag;

/// Finalized, read-only set of capabilities attached to one subject.
///
/// Holds no interior mutability; share it freely across threads.
pub struct Composition<S: Subject> {
    subject: Arc<S>,
    buckets: BucketMap<S>,
    refs: Vec<CapabilityRef<S>>,
    tags: Vec<Tag>,
    /// Positions in `tags`, grouped by tag value type.
    tags_by_type: FxHashMap<TypeId, Vec<usize>>,
    indices: FxHashMap<StorageKey, TagIndex>,
    options: BuildOptions,
}

impl<S: Subject> Composition<S> {
    /// `buckets` must already be sorted; `refs` must be in insertion order.
    pub(crate) fn assemble(
        subject: Arc<S>,
        buckets: BucketMap<S>,
        mut refs: Vec<CapabilityRef<S>>,
        options: BuildOptions,
    ) -> Self {
        if any_ordered(&refs) {
            refs.sort_by_key(CapabilityRef::sort_key);
        }

        let mut seen = FxHashSet::default();
        let tags: Vec<Tag> = refs
            .iter()
            .flat_map(|r| r.tags())
            .filter(|tag| seen.insert(*tag))
            .cloned()
            .collect();
        let mut tags_by_type: FxHashMap<TypeId, Vec<usize>> = FxHashMap::default();
        for (pos, tag) in tags.iter().enumerate() {
            tags_by_type.entry(tag.value_type_id()).or_default().push(pos);
        }

        let mut indices = FxHashMap::default();
        if options.should_index(refs.len()) {
            for (key, bucket) in &buckets {
                if let Some(index) = TagIndex::build(bucket.refs(), options.index_min_frequency) {
                    indices.insert(*key, index);
                }
            }
        }

        tracing::debug!(
            subject = core::any::type_name::<S>(),
            capabilities = refs.len(),
            keys = buckets.len(),
            tags = tags.len(),
            indexed_keys = indices.len(),
            indexed_tags = indices.values().map(TagIndex::len).sum::<usize>(),
            mode = ?options.tag_indexing,
            "composition built"
        );

        Self {
            subject,
            buckets,
            refs,
            tags,
            tags_by_type,
            indices,
            options,
        }
    }

    #[inline]
    pub fn subject(&self) -> &S {
        &self.subject
    }

    #[inline]
    pub fn subject_arc(&self) -> &Arc<S> {
        &self.subject
    }

    #[inline]
    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Number of distinct capability instances.
    #[inline]
    pub fn len(&self) -> usize {
        self.refs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    /// Keys in first-registration order.
    pub fn storage_keys(&self) -> impl Iterator<Item = StorageKey> + '_ {
        self.buckets.keys().copied()
    }

    /// A fresh builder pre-populated with this composition's capabilities.
    pub fn recompose(&self) -> Composer<S> {
        Composer::from_composition(self)
    }

    pub(crate) fn buckets(&self) -> &BucketMap<S> {
        &self.buckets
    }

    // =========================================================================
    // Typed queries
    // =========================================================================

    fn bucket<T: ?Sized + Send + Sync + 'static>(&self) -> Option<&Bucket<S, T>> {
        self.buckets
            .get(&StorageKey::of::<T>())
            .and_then(|bucket| downcast::<S, T>(&**bucket))
    }

    /// Every capability registered under exactly `T`, in order.
    pub fn get_all<T: ?Sized + Send + Sync + 'static>(&self) -> &[Arc<T>] {
        self.bucket::<T>().map(Bucket::items).unwrap_or(&[])
    }

    #[inline]
    pub fn has<T: ?Sized + 'static>(&self) -> bool {
        self.buckets.contains_key(&StorageKey::of::<T>())
    }

    pub fn count<T: ?Sized + 'static>(&self) -> usize {
        self.buckets
            .get(&StorageKey::of::<T>())
            .map_or(0, |bucket| bucket.len())
    }

    /// First capability under `T`.
    pub fn try_get<T: ?Sized + Send + Sync + 'static>(&self) -> Option<&Arc<T>> {
        self.get_all::<T>().first()
    }

    /// First capability under `T`, or [`ComposeError::NotFound`].
    pub fn get_required<T: ?Sized + Send + Sync + 'static>(&self) -> Result<&Arc<T>> {
        self.try_get::<T>()
            .ok_or_else(|| self.not_found(core::any::type_name::<T>()))
    }

    // =========================================================================
    // Untyped queries
    // =========================================================================

    /// Every distinct instance across all keys, ordered by `(order, insertion)`.
    #[inline]
    pub fn capabilities(&self) -> &[CapabilityRef<S>] {
        &self.refs
    }

    #[inline]
    pub fn iter(&self) -> core::slice::Iter<'_, CapabilityRef<S>> {
        self.refs.iter()
    }

    /// Every distinct instance carrying `tag`, in the order of [`capabilities`](Self::capabilities).
    pub fn capabilities_by_tag(&self, tag: &Tag) -> Vec<&CapabilityRef<S>> {
        self.refs.iter().filter(|r| r.has_tag(tag)).collect()
    }

    // =========================================================================
    // Primary
    // =========================================================================

    fn primary_bucket(&self) -> Option<&Bucket<S, dyn Capability<S>>> {
        self.buckets
            .get(&StorageKey::primary::<S>())
            .and_then(|bucket| downcast::<S, dyn Capability<S>>(&**bucket))
    }

    #[inline]
    pub fn has_primary(&self) -> bool {
        self.buckets.contains_key(&StorageKey::primary::<S>())
    }

    pub fn try_get_primary(&self) -> Option<&CapabilityRef<S>> {
        self.primary_bucket()
            .and_then(|bucket| bucket.refs().first())
    }

    pub fn get_primary(&self) -> Result<&CapabilityRef<S>> {
        self.try_get_primary()
            .ok_or_else(|| self.not_found(StorageKey::primary::<S>().name()))
    }

    /// The primary, if there is one and its concrete type is `C`.
    pub fn try_get_primary_as<C: Send + Sync + 'static>(&self) -> Option<Arc<C>> {
        self.try_get_primary()?.downcast::<C>()
    }

    /// The primary as `C`, or `default` if absent or of another type.
    pub fn get_primary_or_default_as<C: Send + Sync + 'static>(&self, default: Arc<C>) -> Arc<C> {
        self.try_get_primary_as::<C>().unwrap_or(default)
    }

    /// The primary as `C`, or [`ComposeError::NotFound`].
    pub fn get_required_primary_as<C: Send + Sync + 'static>(&self) -> Result<Arc<C>> {
        self.try_get_primary_as::<C>()
            .ok_or_else(|| self.not_found(core::any::type_name::<C>()))
    }

    // =========================================================================
    // Tags
    // =========================================================================

    /// Capabilities under `T` carrying `tag`, in bucket order.
    pub fn get_all_by_tag<T: ?Sized + Send + Sync + 'static>(&self, tag: &Tag) -> Vec<&Arc<T>> {
        let Some(bucket) = self.bucket::<T>() else {
            return Vec::new();
        };
        let index = self.indices.get(&StorageKey::of::<T>());
        positions_with_tag(bucket.refs(), index, tag)
            .iter()
            .map(|&pos| &bucket.items()[pos])
            .collect()
    }

    /// Capabilities under `T` carrying every tag in `tags`, in bucket order.
    ///
    /// Fails with [`ComposeError::NullArgument`] if `tags` is empty.
    pub fn get_all_by_tags<T: ?Sized + Send + Sync + 'static>(&self, tags: &[Tag]) -> Result<Vec<&Arc<T>>> {
        if tags.is_empty() {
            return Err(ComposeError::NullArgument { argument: "tags" });
        }
        let Some(bucket) = self.bucket::<T>() else {
            return Ok(Vec::new());
        };
        let index = self.indices.get(&StorageKey::of::<T>());
        Ok(positions_with_tags(bucket.refs(), index, tags)
            .into_iter()
            .map(|pos| &bucket.items()[pos])
            .collect())
    }

    /// Every distinct tag, in first-seen order over [`capabilities`](Self::capabilities).
    #[inline]
    pub fn all_tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Tag values of type `V`, in first-seen order. Positions per type are
    /// grouped at build time, so this only walks tags of type `V`.
    pub fn all_tags_of<V: 'static>(&self) -> impl Iterator<Item = &V> + '_ {
        self.tags_by_type
            .get(&TypeId::of::<V>())
            .map_or(&[][..], Vec::as_slice)
            .iter()
            .filter_map(|&pos| self.tags[pos].downcast_ref::<V>())
    }

    /// Whether the bucket under `T` was given a tag index.
    #[inline]
    pub fn is_tag_indexed<T: ?Sized + 'static>(&self) -> bool {
        self.indices.contains_key(&StorageKey::of::<T>())
    }

    fn not_found(&self, requested: &'static str) -> ComposeError {
        let mut available: Vec<&'static str> = self.buckets.keys().map(StorageKey::name).collect();
        available.sort_unstable();
        ComposeError::NotFound {
            requested,
            subject: core::any::type_name::<S>(),
            available,
        }
    }
}

impl<'a, S: Subject> IntoIterator for &'a Composition<S> {
    type Item = &'a CapabilityRef<S>;
    type IntoIter = core::slice::Iter<'a, CapabilityRef<S>>;

    fn into_iter(self) -> Self::IntoIter {
        self.refs.iter()
    }
}

impl<S: Subject> fmt::Debug for Composition<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Composition")
            .field("subject", &core::any::type_name::<S>())
            .field("capabilities", &self.refs)
            .field("keys", &self.buckets.keys().collect::<Vec<_>>())
            .field("indexed_keys", &self.indices.len())
            .finish()
    }
}
