//! # Layer 1: Composition Core
//!
//! Storage and query logic of the capability system.
//!
//! - **Contract**: `Capability` (hooks), `Implements` (contract views), `Contracts` (resolver).
//! - **Storage**: `Bucket` (one homogeneous sequence per `StorageKey`), `TagIndex`.
//! - **Lifecycle**: `Composer` (mutable, single owner) -> `Composition` (immutable, shared).
//!
//! Buckets are internal; queries go through `Composition`.
//!
//! ```compile_fail
//! use tola_compose::store::bucket::Bucket;
//! ```

pub(crate) mod bucket;
pub mod capability;
pub mod composer;
pub mod composition;
pub mod contract;
pub mod options;
pub mod tag_index;

pub use capability::{Capability, CapabilityRef, Implements, Subject};
pub use composer::Composer;
pub use composition::Composition;
pub use contract::Contracts;
pub use options::{BuildOptions, TagIndexing};
pub use tag_index::HASH_PROBE_THRESHOLD;
