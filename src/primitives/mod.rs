//! # Layer 0: Primitives
//!
//! Basic building blocks for the capability system:
//! - `key.rs`: Storage keys (runtime type tokens) and the primary marker.
//! - `value.rs`: Type-erased `Eq + Hash` values.
//! - `tag.rs`: Tags and type tags.

pub mod key;
pub mod tag;
pub mod value;

pub use key::{PrimaryMarker, StorageKey};
pub use tag::{Tag, TypeTag};
pub use value::AnyValue;
