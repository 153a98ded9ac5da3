//! Common parsing utilities
//!
//! Shared parsing helpers for consistent attribute syntax.

use syn::{
    meta::ParseNestedMeta,
    parse::Parse,
    punctuated::Punctuated,
    Token,
};

// =============================================================================
// Comma-separated List Parsing
// =============================================================================

/// Parse the parenthesized, comma-separated list after a nested meta key,
/// e.g. the `("a", "b")` in `tags("a", "b")`.
pub fn parse_meta_list<T: Parse>(meta: &ParseNestedMeta) -> syn::Result<Vec<T>> {
    let content;
    syn::parenthesized!(content in meta.input);
    let items = Punctuated::<T, Token![,]>::parse_terminated(&content)?;
    Ok(items.into_iter().collect())
}

/// Record `value` into `slot`, rejecting a second occurrence of the same key.
pub fn set_once<T>(slot: &mut Option<T>, value: T, meta: &ParseNestedMeta, key: &str) -> syn::Result<()> {
    if slot.is_some() {
        return Err(meta.error(format!("duplicate `{key}` attribute")));
    }
    *slot = Some(value);
    Ok(())
}
