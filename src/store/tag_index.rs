//! Tag index and tag queries over one bucket.
//!
//! Positions always refer to a bucket's ordered members and are ascending, so
//! every query result preserves bucket order.

use std::borrow::Cow;

use rustc_hash::{FxHashMap, FxHashSet};

use super::capability::{CapabilityRef, Subject};
use crate::primitives::tag::Tag;

/// Size above which intersection probes the largest remaining set through a hash set.
pub const HASH_PROBE_THRESHOLD: usize = 16;

/// Tag -> member positions for tags shared by at least `min_frequency` members.
#[derive(Debug, Default)]
pub(crate) struct TagIndex {
    positions: FxHashMap<Tag, Vec<usize>>,
}

impl TagIndex {
    /// Builds the index, or `None` if no tag reaches `min_frequency`.
    pub(crate) fn build<S: Subject>(refs: &[CapabilityRef<S>], min_frequency: usize) -> Option<Self> {
        let mut positions: FxHashMap<Tag, Vec<usize>> = FxHashMap::default();
        for (pos, r) in refs.iter().enumerate() {
            for tag in r.tags() {
                let list = positions.entry(tag.clone()).or_default();
                // Duplicate tags on one capability count once.
                if list.last() != Some(&pos) {
                    list.push(pos);
                }
            }
        }
        positions.retain(|_, list| list.len() >= min_frequency.max(1));
        (!positions.is_empty()).then_some(Self { positions })
    }

    #[inline]
    pub(crate) fn get(&self, tag: &Tag) -> Option<&[usize]> {
        self.positions.get(tag).map(Vec::as_slice)
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.positions.len()
    }
}

fn scan<S: Subject>(refs: &[CapabilityRef<S>], tags: &[Tag]) -> Vec<usize> {
    refs.iter()
        .enumerate()
        .filter(|(_, r)| tags.iter().all(|tag| r.has_tag(tag)))
        .map(|(pos, _)| pos)
        .collect()
}

/// Positions of members carrying `tag`.
///
/// Tags below the index frequency are absent from the index and fall back to a scan.
pub(crate) fn positions_with_tag<'a, S: Subject>(
    refs: &[CapabilityRef<S>],
    index: Option<&'a TagIndex>,
    tag: &Tag,
) -> Cow<'a, [usize]> {
    match index.and_then(|index| index.get(tag)) {
        Some(list) => Cow::Borrowed(list),
        None => Cow::Owned(scan(refs, core::slice::from_ref(tag))),
    }
}

/// Positions of members carrying every tag in `tags`. `tags` must be non-empty.
pub(crate) fn positions_with_tags<S: Subject>(
    refs: &[CapabilityRef<S>],
    index: Option<&TagIndex>,
    tags: &[Tag],
) -> Vec<usize> {
    let Some(index) = index else {
        return scan(refs, tags);
    };
    if let [tag] = tags {
        return positions_with_tag(refs, Some(index), tag).into_owned();
    }

    let mut sets: Vec<Cow<'_, [usize]>> = tags
        .iter()
        .map(|tag| positions_with_tag(refs, Some(index), tag))
        .collect();
    sets.sort_by_key(|set| set.len());
    let (baseline, others) = match sets.split_first() {
        Some((baseline, others)) => (baseline, others),
        None => return Vec::new(),
    };
    if baseline.is_empty() {
        return Vec::new();
    }

    let total = refs.len();
    let others_len: usize = others.iter().map(|set| set.len()).sum();
    if baseline.len() * 2 >= total || others_len > total * 2 {
        return scan(refs, tags);
    }

    // `others` is sorted ascending by size; the last set is the largest.
    let (largest, rest) = match others.split_last() {
        Some((largest, rest)) => (largest, rest),
        None => return baseline.to_vec(),
    };
    let probe: Option<FxHashSet<usize>> =
        (largest.len() > HASH_PROBE_THRESHOLD).then(|| largest.iter().copied().collect());
    let in_largest = |pos: &usize| match &probe {
        Some(set) => set.contains(pos),
        None => largest.contains(pos),
    };

    baseline
        .iter()
        .copied()
        .filter(|pos| in_largest(pos) && rest.iter().all(|set| set.contains(pos)))
        .collect()
}
