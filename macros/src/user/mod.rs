//! User-facing macro implementations
//!
//! | Macro | Usage | Purpose |
//! |-------|-------|---------|
//! | `#[derive(Capability)]` | on struct/enum | Implement the capability contract |

pub mod capability;

pub use capability::expand_derive_capability;
