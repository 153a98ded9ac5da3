// Feature flags handled:
// - registry: default, enables the process-wide discovery table
// - serde: enables (de)serialization of build options

//! # tola-compose
//!
//! Typed, immutable capability compositions.
//!
//! **Attach typed records to any subject; query them by type, contract, or tag.**
//!
//! ## Architecture
//!
//! A *capability* is an immutable value implementing [`Capability<S>`] for a
//! subject type `S`. A [`Composer`] accumulates capabilities for one subject and
//! is finalized exactly once into a [`Composition`], an immutable lookup structure
//! that is safe to share across threads.
//!
//! ### 1. Storage Keys
//! Every capability is stored once and indexed under one or more [`StorageKey`]s:
//!
//! ```text
//! Capability -> Arc<C> --+--> StorageKey::of::<C>()          (concrete type)
//!                        +--> StorageKey::of::<dyn Contract>  (declared contract)
//!                        +--> StorageKey::primary::<S>()      (primary marker)
//! ```
//!
//! Each key owns one homogeneous bucket (`Bucket<S, T>`), so `get_all::<T>()`
//! returns `&[Arc<T>]` without allocating.
//!
//! ### 2. Ordering
//! Buckets are sorted by `(order, insertion)` at build time. Capabilities without
//! an order count as `0`; buckets without any ordered member keep insertion order.
//!
//! ### 3. Tags
//! Tag queries use a per-bucket tag index when one was built (see [`BuildOptions`])
//! and fall back to scanning the bucket otherwise. Results are identical either way.
//!
//! ```text
//! +-------------------------------------------------------------------+
//! |  Layer 0: Primitives                                              |
//! |  - StorageKey, Tag, TypeTag, AnyValue                             |
//! +-------------------------------------------------------------------+
//!                                |
//!                                v
//! +-------------------------------------------------------------------+
//! |  Layer 1: Composition Core                                        |
//! |  - Capability, Implements, Contracts (resolver)                   |
//! |  - Composer (builder) -> Composition (immutable), TagIndex        |
//! +-------------------------------------------------------------------+
//!                                |
//!                                v
//! +-------------------------------------------------------------------+
//! |  Layer 2: Discovery                                               |
//! |  - Registry (value subjects strong, shared subjects weak)         |
//! +-------------------------------------------------------------------+
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use tola_compose::prelude::*;
//!
//! trait Priced: Send + Sync {
//!     fn price(&self) -> u64;
//! }
//!
//! #[derive(Capability)]
//! #[capability(subject = Order, order = 10)]
//! struct Audit;
//!
//! #[derive(Capability)]
//! #[capability(subject = Order, tags("shipping"), contracts(dyn Priced))]
//! struct Express;
//!
//! impl Priced for Express {
//!     fn price(&self) -> u64 { 25 }
//! }
//!
//! let mut composer = Composer::new(Order::new());
//! composer.add(Audit)?.add_as::<dyn Priced, _>(Express)?;
//! let composition = composer.build()?;
//!
//! assert_eq!(composition.get_all::<dyn Priced>()[0].price(), 25);
//! assert!(composition.get_all::<Express>().is_empty()); // contract only
//! ```

// Allow `::tola_compose` to work inside the crate itself
extern crate self as tola_compose;

// =============================================================================
// Layer 0: Primitives (no dependencies)
// =============================================================================
pub mod primitives;

// =============================================================================
// Layer 1: Composition Core
// =============================================================================
pub mod store;

// =============================================================================
// Layer 2: Discovery
// =============================================================================
#[cfg(feature = "registry")]
pub mod registry;

pub mod error;

// Syntax macros (contracts!, compose!)
pub mod syntax_macros;

// =============================================================================
// Re-exports at Crate Root
// =============================================================================

pub use error::{ComposeError, Result};
pub use primitives::{AnyValue, PrimaryMarker, StorageKey, Tag, TypeTag};
pub use store::{
    BuildOptions, Capability, CapabilityRef, Composer, Composition, Contracts, HASH_PROBE_THRESHOLD,
    Implements, Subject, TagIndexing,
};
#[cfg(feature = "registry")]
pub use registry::Registry;

// Re-export proc-macros
pub use macros::Capability;

/// Common items for the capability system.
pub mod prelude {
    pub use crate::store::{
        // Core Traits
        Capability, Implements, Subject,
        // Lifecycle
        Composer, Composition, CapabilityRef, Contracts,
        // Configuration
        BuildOptions, TagIndexing,
    };
    pub use crate::error::{ComposeError, Result};
    pub use crate::primitives::{StorageKey, Tag, TypeTag};
    pub use macros::Capability;
    // Note: contracts!, compose!, tags! are #[macro_export] so they're at crate root
}
