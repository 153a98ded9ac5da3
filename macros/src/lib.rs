//! Procedural macros for the tola-compose capability system
//!
//! # Macro API
//!
//! | Macro | Target | Purpose |
//! |-------|--------|---------|
//! | `#[derive(Capability)]` | struct/enum | Implement `Capability<S>` and contract views |
//!
//! ## Example
//!
//! ```ignore
//! trait Priced: Send + Sync {
//!     fn price(&self) -> u64;
//! }
//!
//! #[derive(Capability)]
//! #[capability(subject = Order, primary, contracts(dyn Priced))]
//! struct Checkout {
//!     #[capability(order)]
//!     step: i32,
//!     #[capability(tags)]
//!     tags: Vec<Tag>,
//! }
//! ```

use proc_macro::TokenStream;
use syn::parse_macro_input;

// =============================================================================
// Module Declarations (common / user)
// =============================================================================

mod common;
mod user;

// =============================================================================
// User-facing Macros (user/)
// =============================================================================

/// Derive macro implementing `Capability<S>` from `#[capability(..)]` attributes.
///
/// # Container attributes
///
/// | Attribute | Effect |
/// |-----------|--------|
/// | `subject = Ty` | implement `Capability<Ty>` (default: every `Subject`) |
/// | `primary` | `is_primary()` returns `true` |
/// | `order = expr` | constant `order()` |
/// | `tags(expr, ..)` | constant `tags()`, each value wrapped in `Tag::new` |
/// | `contracts(Ty, ..)` | implement `Implements<Ty>` by unsizing `Arc<Self>` |
///
/// # Field attributes
///
/// | Attribute | Field type | Effect |
/// |-----------|------------|--------|
/// | `order` | `i32` or `Option<i32>` | `order()` reads the field |
/// | `tags` | `impl AsRef<[Tag]>` | `tags()` borrows the field |
///
/// # Usage
/// ```ignore
/// #[derive(Capability)]
/// #[capability(subject = Order, order = 10, tags("audit"))]
/// struct Audit;
///
/// #[derive(Capability)]
/// #[capability(contracts(dyn Priced))]
/// struct Express {
///     #[capability(order)]
///     rank: Option<i32>,
/// }
/// ```
#[proc_macro_derive(Capability, attributes(capability))]
pub fn derive_capability(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as syn::DeriveInput);
    user::expand_derive_capability(input).into()
}
