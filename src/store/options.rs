//! Build configuration for compositions.

/// When a composition builds its tag index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TagIndexing {
    /// Never build an index; tag queries scan their bucket.
    None,
    /// Always build an index.
    Eager,
    /// Build an index once the capability count reaches
    /// [`BuildOptions::auto_index_threshold`].
    #[default]
    Auto,
}

/// Options consumed by [`Composer::build_with`](crate::Composer::build_with).
///
/// Indexing only changes query cost. Every mode returns identical results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BuildOptions {
    pub tag_indexing: TagIndexing,
    /// Minimum number of capabilities sharing a tag before it is indexed.
    pub index_min_frequency: usize,
    /// Capability count at or above which `Auto` builds indices.
    pub auto_index_threshold: usize,
}

impl BuildOptions {
    pub const DEFAULT_MIN_FREQUENCY: usize = 2;
    pub const DEFAULT_AUTO_THRESHOLD: usize = 64;

    pub const fn new() -> Self {
        Self {
            tag_indexing: TagIndexing::Auto,
            index_min_frequency: Self::DEFAULT_MIN_FREQUENCY,
            auto_index_threshold: Self::DEFAULT_AUTO_THRESHOLD,
        }
    }

    pub const fn with_tag_indexing(mut self, mode: TagIndexing) -> Self {
        self.tag_indexing = mode;
        self
    }

    pub const fn with_index_min_frequency(mut self, min: usize) -> Self {
        self.index_min_frequency = min;
        self
    }

    pub const fn with_auto_index_threshold(mut self, threshold: usize) -> Self {
        self.auto_index_threshold = threshold;
        self
    }

    /// Whether a composition holding `capabilities` instances gets a tag index.
    pub const fn should_index(&self, capabilities: usize) -> bool {
        match self.tag_indexing {
            TagIndexing::None => false,
            TagIndexing::Eager => true,
            TagIndexing::Auto => capabilities >= self.auto_index_threshold,
        }
    }
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self::new()
    }
}
